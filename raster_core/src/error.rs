//! Typed error taxonomy for the production pipeline.
//!
//! Every component returns `anyhow::Result`; a [`RasterError`] variant is
//! attached via `anyhow::Error::from` (or `.context(...)`) at the point a
//! fault is first classified, and can be recovered later with
//! `err.downcast_ref::<RasterError>()` by callers that need to branch on the
//! taxonomy (e.g. the producer driver deciding whether to roll back).

use std::fmt;

/// The error taxonomy from the error-handling design: each variant marks a
/// distinct recovery policy upstream (skip source, skip tile, retry once,
/// abort the run, or unwind silently).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
	/// Wrong or missing parameters, raised at an API boundary such as
	/// `set_store_parameters`, `offer_data_source`, or `compose_raster`.
	InvalidArgument(String),
	/// A reader rejected a source, or `read_metadata` failed for it.
	UnreadableSource(String),
	/// A reader failed during `read`; the source is skipped for this tile.
	DecodeError(String),
	/// Out-of-memory during decode, after the one-retry recovery failed.
	ResourceExhausted(String),
	/// A write failure. Non-fatal per tile, but leaves the dataset incomplete.
	IoError(String),
	/// An ad-hoc mosaic request whose sector does not intersect the catalog.
	OutsideCoverage,
	/// The cooperative stop flag was observed; callers should unwind cleanly.
	Cancelled,
}

impl fmt::Display for RasterError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
			Self::UnreadableSource(msg) => write!(f, "unreadable source: {msg}"),
			Self::DecodeError(msg) => write!(f, "decode error: {msg}"),
			Self::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
			Self::IoError(msg) => write!(f, "I/O error: {msg}"),
			Self::OutsideCoverage => write!(f, "request sector does not intersect the catalog coverage"),
			Self::Cancelled => write!(f, "production was cancelled"),
		}
	}
}

impl std::error::Error for RasterError {}

impl RasterError {
	/// True for error kinds that stop the whole run rather than degrading a
	/// single source or tile.
	#[must_use]
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::ResourceExhausted(_) | Self::InvalidArgument(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_includes_reason() {
		let err = RasterError::InvalidArgument("missing dataCacheName".to_string());
		assert_eq!(err.to_string(), "invalid argument: missing dataCacheName");
	}

	#[test]
	fn outside_coverage_is_not_fatal() {
		assert!(!RasterError::OutsideCoverage.is_fatal());
		assert!(RasterError::ResourceExhausted("oom".into()).is_fatal());
	}
}
