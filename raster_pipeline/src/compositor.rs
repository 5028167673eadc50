//! The recursive tile compositor: builds the pyramid depth-first,
//! drawing intersecting sources at the finest level and drawing composed
//! children onto their parent at every coarser level.

use crate::catalog::SourceCatalog;
use raster_core::progress::{ProgressTrait, get_progress_bar};
use raster_core::{ByteOrder, DataType, ImageRaster, Level, LevelSet, PixelFormat, Raster, ScalarRaster, Tile};
use raster_io::WriterPool;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The dataset-wide settings needed to allocate tile canvases and pick a
/// persistence suffix; everything geometric lives in the [`LevelSet`].
#[derive(Debug, Clone)]
pub struct CompositorConfig {
	pub pixel_format: PixelFormat,
	pub data_type: DataType,
	pub byte_order: ByteOrder,
	pub transparent_value: Option<f64>,
	pub format_suffix: String,
}

/// A snapshot of how much work a [`Compositor::run`] call actually did,
/// returned so the caller (producer driver) can log or assert on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositorStats {
	pub tiles_composed: u64,
	pub tiles_written: u64,
}

const BOUNDARY_EPSILON: f64 = 1e-9;

/// Builds the pyramid for one dataset. `run` is synchronous — it calls the
/// writer pool's fire-and-forget `install_tile_raster_later` but never awaits
/// the drain; the caller awaits `WriterPool::wait_for_install_tile_tasks`
/// separately afterwards.
pub struct Compositor {
	catalog: SourceCatalog,
	level_set: LevelSet,
	config: CompositorConfig,
	writer_pool: Arc<WriterPool>,
	stopped: Arc<AtomicBool>,
	composed: AtomicU64,
	written: AtomicU64,
	progress: StdMutex<Box<dyn ProgressTrait>>,
}

impl Compositor {
	#[must_use]
	pub fn new(catalog: SourceCatalog, level_set: LevelSet, config: CompositorConfig, writer_pool: Arc<WriterPool>) -> Self {
		let tile_count = tile_count(&level_set);
		let progress = get_progress_bar("compositing tiles", tile_count);
		Self {
			catalog,
			level_set,
			config,
			writer_pool,
			stopped: Arc::new(AtomicBool::new(false)),
			composed: AtomicU64::new(0),
			written: AtomicU64::new(0),
			progress: StdMutex::new(progress),
		}
	}

	/// A clone of the cooperative stop flag, so a caller can request
	/// cancellation from another thread while `run` is executing.
	#[must_use]
	pub fn stop_flag(&self) -> Arc<AtomicBool> {
		self.stopped.clone()
	}

	#[must_use]
	pub fn is_stopped(&self) -> bool {
		self.stopped.load(Ordering::SeqCst)
	}

	/// Runs the full depth-first, row-major traversal over top-level tiles,
	/// composing and scheduling every tile the pyramid needs.
	pub fn run(&self) -> CompositorStats {
		let Some(level0) = self.level_set.level(0) else {
			return self.stats();
		};
		let (first_row, last_row, first_col, last_col) = level_tile_range(level0, self.level_set.coverage(), self.level_set.tile_origin());

		for row in first_row..=last_row {
			if self.is_stopped() {
				break;
			}
			for col in first_col..=last_col {
				if self.is_stopped() {
					break;
				}
				let Ok(tile) = Tile::at(0, row, col, self.level_set.tile_origin(), level0.tile_delta_lat(), level0.tile_delta_lon()) else {
					continue;
				};
				if !tile.sector().intersects(&self.level_set.coverage()) {
					continue;
				}
				if let Some(raster) = self.create_tile_raster(0, tile) {
					self.schedule_write(tile, raster);
				}
			}
		}

		self.progress.lock().expect("progress lock poisoned").finish();
		self.stats()
	}

	#[must_use]
	pub fn stats(&self) -> CompositorStats {
		CompositorStats {
			tiles_composed: self.composed.load(Ordering::SeqCst),
			tiles_written: self.written.load(Ordering::SeqCst),
		}
	}

	/// The recursive core of the compositor.
	fn create_tile_raster(&self, level: u8, tile: Tile) -> Option<Raster> {
		if self.is_stopped() {
			return None;
		}
		let level_info = self.level_set.level(level)?;
		let finest_index = u8::try_from(self.level_set.depth().saturating_sub(1)).unwrap_or(u8::MAX);

		if level >= finest_index {
			return self.compose_leaf(tile, level_info);
		}

		// NW, NE, SE, SW: row increases with latitude since tile_origin anchors
		// the south pole, so the "north" children take the larger row index.
		let child_coords = [
			(tile.row() * 2 + 1, tile.col() * 2),     // NW
			(tile.row() * 2 + 1, tile.col() * 2 + 1), // NE
			(tile.row() * 2, tile.col() * 2 + 1),     // SE
			(tile.row() * 2, tile.col() * 2),         // SW
		];
		let Some(child_level) = self.level_set.level(level + 1) else {
			return self.compose_leaf(tile, level_info);
		};

		let mut child_rasters = Vec::with_capacity(4);
		for (row, col) in child_coords {
			if self.is_stopped() {
				break;
			}
			let Ok(child_tile) = Tile::at(level + 1, row, col, self.level_set.tile_origin(), child_level.tile_delta_lat(), child_level.tile_delta_lon()) else {
				continue;
			};
			if !child_tile.sector().intersects(&self.level_set.coverage()) {
				continue;
			}
			if let Some(raster) = self.create_tile_raster(level + 1, child_tile) {
				child_rasters.push((child_tile, raster));
			}
		}

		if child_rasters.is_empty() || level_info.is_empty() {
			for (child_tile, child_raster) in child_rasters {
				self.schedule_write(child_tile, child_raster);
			}
			return None;
		}

		let mut canvas = self.new_canvas(tile.sector(), level_info);
		for (_, child_raster) in &child_rasters {
			if let Err(err) = raster_image::draw_onto(child_raster, &mut canvas) {
				log::error!("failed to draw a child tile onto its parent: {err:#}");
			}
		}
		for (child_tile, child_raster) in child_rasters {
			self.schedule_write(child_tile, child_raster);
		}
		self.note_composed();
		Some(canvas)
	}

	fn compose_leaf(&self, tile: Tile, level_info: &Level) -> Option<Raster> {
		if level_info.is_empty() {
			return None;
		}
		let mut sources = self.catalog.intersecting(&tile.sector()).peekable();
		if sources.peek().is_none() {
			return None;
		}

		let mut canvas = self.new_canvas(tile.sector(), level_info);
		for source in self.catalog.intersecting(&tile.sector()) {
			if let Err(err) = source.draw_onto(&mut canvas) {
				log::error!("skipping source {:?} for tile {}/{}/{}: {err:#}", source.source(), tile.level(), tile.row(), tile.col());
			}
		}
		self.note_composed();
		Some(canvas)
	}

	fn new_canvas(&self, sector: raster_core::Sector, level_info: &Level) -> Raster {
		let width = level_info.tile_width() as usize;
		let height = level_info.tile_height() as usize;
		match self.config.pixel_format {
			PixelFormat::Image => Raster::Image(ImageRaster::new_empty(width, height, sector)),
			PixelFormat::Elevation => Raster::Scalar(ScalarRaster::new_empty(
				width,
				height,
				sector,
				self.config.data_type,
				self.config.byte_order,
				self.config.transparent_value,
			)),
		}
	}

	fn note_composed(&self) {
		let n = self.composed.fetch_add(1, Ordering::SeqCst) + 1;
		self.progress.lock().expect("progress lock poisoned").set_position(n);
	}

	fn schedule_write(&self, tile: Tile, raster: Raster) {
		self.writer_pool.install_tile_raster_later(tile, raster, self.config.format_suffix.clone());
		self.written.fetch_add(1, Ordering::SeqCst);
	}
}

/// Row/column bounds (inclusive) of the top-level tiles whose sector
/// overlaps `coverage`, at `level`'s resolution.
fn level_tile_range(level: &Level, coverage: raster_core::Sector, origin: raster_core::LatLon) -> (u32, u32, u32, u32) {
	let first_row = Tile::row_for(coverage.min_lat(), origin, level.tile_delta_lat()).max(0) as u32;
	let last_row = Tile::row_for(coverage.max_lat() - BOUNDARY_EPSILON, origin, level.tile_delta_lat()).max(0) as u32;
	let first_col = Tile::col_for(coverage.min_lon(), origin, level.tile_delta_lon()).max(0) as u32;
	let last_col = Tile::col_for(coverage.max_lon() - BOUNDARY_EPSILON, origin, level.tile_delta_lon()).max(0) as u32;
	(first_row, last_row.max(first_row), first_col, last_col.max(first_col))
}

/// Total tile count across every level: `Σ (lastRow−firstRow+1)(lastCol−firstCol+1)`.
fn tile_count(level_set: &LevelSet) -> u64 {
	level_set
		.levels()
		.iter()
		.map(|level| {
			let (first_row, last_row, first_col, last_col) = level_tile_range(level, level_set.coverage(), level_set.tile_origin());
			u64::from(last_row - first_row + 1) * u64::from(last_col - first_col + 1)
		})
		.sum()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::level_set::{LevelSetParams, build_level_set};
	use anyhow::Result;
	use raster_core::{MetadataBag, MetadataValue, Sector};
	use raster_io::{ProxyCache, Reader, Registry, SourceRef, Writer};
	use std::path::Path;
	use tempfile::tempdir;

	#[derive(Debug)]
	struct SolidColorReader {
		sector: Sector,
		rgba: [u8; 4],
	}
	impl Reader for SolidColorReader {
		fn suffixes(&self) -> &[&str] {
			&["raw"]
		}
		fn mime_types(&self) -> &[&str] {
			&[]
		}
		fn can_read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> bool {
			true
		}
		fn read_metadata(&self, _source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
			metadata.set("SECTOR", MetadataValue::Sector(self.sector));
			metadata.set("PIXEL_FORMAT", MetadataValue::PixelFormat(PixelFormat::Image));
			Ok(())
		}
		fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> Result<Vec<Raster>> {
			let mut raster = ImageRaster::new_empty(4, 4, self.sector);
			for y in 0..4 {
				for x in 0..4 {
					raster.set_pixel(x, y, self.rgba);
				}
			}
			Ok(vec![Raster::Image(raster)])
		}
		fn is_imagery_raster(&self) -> bool {
			true
		}
	}

	#[derive(Debug)]
	struct RawWriter;
	impl Writer for RawWriter {
		fn suffixes(&self) -> &[&str] {
			&["raw"]
		}
		fn mime_types(&self) -> &[&str] {
			&[]
		}
		fn can_write(&self, _raster: &Raster, suffix: &str, _destination: &Path) -> bool {
			suffix == "raw"
		}
		fn write(&self, _raster: &Raster, _suffix: &str, destination: &Path) -> Result<()> {
			std::fs::write(destination, b"tile")?;
			Ok(())
		}
	}

	fn proxy(sector: Sector, rgba: [u8; 4], n: u8) -> raster_io::CachedRasterProxy {
		let cache = ProxyCache::new(1 << 20);
		let reader = Arc::new(SolidColorReader { sector, rgba });
		raster_io::CachedRasterProxy::new(SourceRef::LocalPath(format!("/data/{n}.raw").into()), reader, cache).unwrap()
	}

	fn writer_pool(dir: &std::path::Path) -> Arc<WriterPool> {
		let mut registry = Registry::new();
		registry.register_writer(Arc::new(RawWriter));
		Arc::new(WriterPool::with_default_degree(Arc::new(registry), dir.to_path_buf()))
	}

	fn config() -> CompositorConfig {
		CompositorConfig {
			pixel_format: PixelFormat::Image,
			data_type: DataType::Float32,
			byte_order: ByteOrder::LittleEndian,
			transparent_value: None,
			format_suffix: "raw".to_string(),
		}
	}

	#[tokio::test]
	async fn single_tile_dataset_composes_and_writes_one_tile() {
		// one source, sector (0,10,0,10), below the large-dataset threshold.
		let sector = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let mut catalog = SourceCatalog::new();
		catalog.add(proxy(sector, [255, 0, 0, 255], 0)).unwrap();

		let params = LevelSetParams::new(sector, 4, 4);
		let level_set = build_level_set(&params).unwrap();
		assert_eq!(level_set.depth(), 1);

		let dir = tempdir().unwrap();
		let compositor = Compositor::new(catalog, level_set, config(), writer_pool(dir.path()));
		let (stats, compositor) = tokio::task::spawn_blocking(move || {
			let stats = compositor.run();
			(stats, compositor)
		})
		.await
		.unwrap();
		compositor.writer_pool.wait_for_install_tile_tasks().await;

		assert_eq!(stats.tiles_composed, 1);
		assert_eq!(stats.tiles_written, 1);
		let tile = Tile::new(0, 0, 0, sector);
		assert!(dir.path().join(tile.relative_path("raw")).exists());
	}

	#[tokio::test]
	async fn pyramid_schedules_every_child_and_its_parent() {
		let west = Sector::new(0.0, 10.0, 0.0, 5.0).unwrap();
		let east = Sector::new(0.0, 10.0, 5.0, 10.0).unwrap();
		let mut catalog = SourceCatalog::new();
		catalog.add(proxy(west, [255, 0, 0, 255], 0)).unwrap();
		catalog.add(proxy(east, [0, 255, 0, 255], 1)).unwrap();

		let mut params = LevelSetParams::new(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(), 4, 4);
		params.num_levels = Some(2);
		let level_set = build_level_set(&params).unwrap();
		assert_eq!(level_set.depth(), 2);

		let dir = tempdir().unwrap();
		let compositor = Compositor::new(catalog, level_set, config(), writer_pool(dir.path()));
		let (stats, compositor) = tokio::task::spawn_blocking(move || {
			let stats = compositor.run();
			(stats, compositor)
		})
		.await
		.unwrap();
		compositor.writer_pool.wait_for_install_tile_tasks().await;

		// two finest-level children plus the one parent they compose into.
		assert_eq!(stats.tiles_written, 3);
		assert!(stats.tiles_composed >= 1);
	}

	#[tokio::test]
	async fn stopping_before_run_produces_no_tiles() {
		let sector = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let mut catalog = SourceCatalog::new();
		catalog.add(proxy(sector, [1, 2, 3, 255], 0)).unwrap();

		let params = LevelSetParams::new(sector, 4, 4);
		let level_set = build_level_set(&params).unwrap();

		let dir = tempdir().unwrap();
		let compositor = Compositor::new(catalog, level_set, config(), writer_pool(dir.path()));
		compositor.stop_flag().store(true, Ordering::SeqCst);
		let (stats, compositor) = tokio::task::spawn_blocking(move || {
			let stats = compositor.run();
			(stats, compositor)
		})
		.await
		.unwrap();
		compositor.writer_pool.wait_for_install_tile_tasks().await;

		assert_eq!(stats.tiles_written, 0);
	}

	#[test]
	fn tile_range_covers_the_whole_coverage_at_level_zero() {
		let sector = Sector::new(0.0, 20.0, 0.0, 30.0).unwrap();
		let params = LevelSetParams::new(sector, 4, 4);
		let level_set = build_level_set(&params).unwrap();
		let (first_row, last_row, first_col, last_col) = level_tile_range(level_set.level(0).unwrap(), sector, level_set.tile_origin());
		assert_eq!((first_row, last_row, first_col, last_col), (0, 0, 0, 0));
	}
}
