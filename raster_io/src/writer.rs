//! The `Writer` side of the registry.

use raster_core::Raster;
use std::fmt::Debug;
use std::path::Path;

/// An encoder for one or more destination formats.
pub trait Writer: Debug + Send + Sync {
	/// Lower-case file extensions this writer advertises (without the dot).
	fn suffixes(&self) -> &[&str];

	/// MIME types this writer advertises.
	fn mime_types(&self) -> &[&str];

	fn can_write(&self, raster: &Raster, suffix: &str, destination: &Path) -> bool;

	fn write(&self, raster: &Raster, suffix: &str, destination: &Path) -> anyhow::Result<()>;
}
