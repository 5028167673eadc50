//! An opaque reference to a source, as seen by the reader registry.

use std::path::PathBuf;
use std::sync::Arc;

/// A handle a reader turns into bytes. Readers decide which kinds they
/// accept via [`crate::reader::Reader::can_read`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceRef {
	LocalPath(PathBuf),
	Url(String),
	Memory(Arc<Vec<u8>>),
}

impl SourceRef {
	/// The filename-like suffix used for extension-based dispatch, lower-cased.
	#[must_use]
	pub fn suffix(&self) -> Option<String> {
		match self {
			SourceRef::LocalPath(p) => p.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()),
			SourceRef::Url(u) => u.rsplit('.').next().map(str::to_ascii_lowercase),
			SourceRef::Memory(_) => None,
		}
	}
}
