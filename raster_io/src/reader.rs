//! The `Reader` side of the registry. Readers must be
//! stateless and safe to invoke from multiple threads concurrently.

use crate::source_ref::SourceRef;
use raster_core::{MetadataBag, Raster};
use std::fmt::Debug;

/// A decoder for one or more source formats.
pub trait Reader: Debug + Send + Sync {
	/// Lower-case file extensions this reader advertises (without the dot).
	fn suffixes(&self) -> &[&str];

	/// MIME types this reader advertises.
	fn mime_types(&self) -> &[&str];

	/// Cheap check: true iff a subsequent [`Reader::read`] would succeed for
	/// this source.
	fn can_read(&self, source: &SourceRef, metadata: &MetadataBag) -> bool;

	/// Populates `metadata` with width, height, sector, pixel format, data
	/// type, and byte order, as available.
	fn read_metadata(&self, source: &SourceRef, metadata: &mut MetadataBag) -> anyhow::Result<()>;

	/// Decodes `source` into one or more rasters.
	fn read(&self, source: &SourceRef, metadata: &MetadataBag) -> anyhow::Result<Vec<Raster>>;

	fn is_imagery_raster(&self) -> bool;

	fn is_elevations_raster(&self) -> bool {
		!self.is_imagery_raster()
	}
}
