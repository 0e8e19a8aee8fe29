/// Whether edits are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditingMode {
	/// Edits are saved to the local cache and the durable store automatically.
	AutoSave,
	/// Edits are tracked but never persisted, typically because the signed-in
	/// identity does not own the project.
	EffectFree,
}

/// Resolves the editing mode for a signed-in identity and a project owner.
pub fn resolve_mode(signed_in: Option<&str>, owner: Option<&str>) -> EditingMode {
	match signed_in {
		Some(user) if Some(user) == owner => EditingMode::AutoSave,
		_ => EditingMode::EffectFree,
	}
}
