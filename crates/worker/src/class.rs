/// Execution classes for spawned work, used for scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Work whose latency the user feels, such as an explicit flush.
	Interactive,
	/// Deferred work that may be superseded: debounced saves, prefetch, erasure.
	Background,
}

impl TaskClass {
	/// Stable label used in trace fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}
