//! The source catalog: the set of [`CachedRasterProxy`]s a production run
//! or mosaic request draws from. A catalog is homogeneous: mixing pixel
//! formats is rejected at catalog-load time.

use anyhow::{Result, bail};
use raster_core::{PixelFormat, RasterError, Sector};
use raster_io::CachedRasterProxy;

/// An append-only-during-offer, read-only-during-production set of source
/// proxies, all sharing one [`PixelFormat`].
#[derive(Debug, Default, Clone)]
pub struct SourceCatalog {
	entries: Vec<CachedRasterProxy>,
	pixel_format: Option<PixelFormat>,
}

impl SourceCatalog {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `proxy` to the catalog.
	///
	/// # Errors
	///
	/// Returns [`RasterError::InvalidArgument`] if `proxy`'s pixel format
	/// differs from every proxy already in the catalog.
	pub fn add(&mut self, proxy: CachedRasterProxy) -> Result<()> {
		let format = proxy.pixel_format();
		match self.pixel_format {
			Some(existing) if existing != format => {
				bail!(RasterError::InvalidArgument(format!(
					"catalog is homogeneous: cannot mix {existing:?} and {format:?} sources"
				)));
			}
			_ => self.pixel_format = Some(format),
		}
		self.entries.push(proxy);
		Ok(())
	}

	#[must_use]
	pub fn entries(&self) -> &[CachedRasterProxy] {
		&self.entries
	}

	#[must_use]
	pub fn pixel_format(&self) -> Option<PixelFormat> {
		self.pixel_format
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// The union of every entry's sector, or [`Sector::empty`] if the
	/// catalog has no entries.
	#[must_use]
	pub fn coverage(&self) -> Sector {
		self.entries.iter().map(CachedRasterProxy::sector).fold(None, |acc, s| Some(Sector::union_opt(acc, &s))).unwrap_or_else(Sector::empty)
	}

	/// Every entry whose sector has non-zero-area intersection with `sector`.
	pub fn intersecting(&self, sector: &Sector) -> impl Iterator<Item = &CachedRasterProxy> {
		self.entries.iter().filter(move |e| e.sector().intersects(sector))
	}

	/// The smallest declared source pixel size in degrees, on either axis,
	/// across every catalog entry that advertises `WIDTH`/`HEIGHT` metadata.
	/// Used by level-set construction.
	#[must_use]
	pub fn smallest_pixel_size_deg(&self) -> Option<f64> {
		self.entries
			.iter()
			.filter_map(|entry| {
				let width = entry.metadata().get(raster_core::metadata::KEY_WIDTH)?.as_int()? as f64;
				let height = entry.metadata().get(raster_core::metadata::KEY_HEIGHT)?.as_int()? as f64;
				if width <= 0.0 || height <= 0.0 {
					return None;
				}
				let sector = entry.sector();
				Some((sector.delta_lon() / width).min(sector.delta_lat() / height))
			})
			.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
	}

	/// The largest source pixel count along either axis, across every
	/// catalog entry that advertises `WIDTH`/`HEIGHT` metadata. Drives the
	/// large-dataset policy.
	#[must_use]
	pub fn max_source_pixels(&self) -> u32 {
		self.entries
			.iter()
			.filter_map(|entry| {
				let width = entry.metadata().get(raster_core::metadata::KEY_WIDTH)?.as_int()?;
				let height = entry.metadata().get(raster_core::metadata::KEY_HEIGHT)?.as_int()?;
				Some(width.max(height) as u32)
			})
			.max()
			.unwrap_or(0)
	}
}
