//! Task primitives shared by the savepoint crates.
//!
//! Provides spawning tagged with an execution class and generation-scoped
//! cancellation tokens whose suspension points (timed waits, gated waits,
//! cancellable calls) all resolve to [`Cancelled`] once the token fires.

mod class;
mod spawn;
mod token;

pub use class::TaskClass;
pub use spawn::spawn;
pub use token::{Cancelled, GenerationClock, GenerationToken};
