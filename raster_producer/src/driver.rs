//! The producer driver: the lifecycle that ties every other crate
//! together into a runnable production.
//!
//! `Producer` exposes an imperative API —
//! `set_store_parameters`, `offer_data_source`/`offer_all_data_sources`,
//! `start_production`, `stop_production` — rather than collapsing it into a
//! single builder call, since the offer phase is meant to report per-source
//! failures without aborting the whole batch.

use crate::config::ProducerConfig;
use crate::descriptor::{CatalogSource, DatasetDescriptor, RasterServerCatalog, SectorXml, write_dataset_descriptor, write_raster_server_catalog};
use crate::formats::default_registry;
use anyhow::{Context, Result, bail};
use raster_core::{LatLon, RasterError, Sector};
use raster_io::{CachedRasterProxy, ProxyCache, Registry, SourceRef, WriterPool};
use raster_pipeline::{Compositor, CompositorConfig, CompositorStats, LevelSetParams, SourceCatalog, build_level_set};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default hard capacity for the shared decode cache: 256 MiB. Not a
/// recognized configuration key; sized generously since the cache's own
/// soft eviction threshold already bounds steady-state use.
const DEFAULT_CACHE_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

/// A per-source failure recorded by `offer_data_source`/`offer_all_data_sources`
/// without aborting the batch.
#[derive(Debug, Clone)]
pub struct SourceRejection {
	pub source: SourceRef,
	pub reason: String,
}

/// What `start_production` accomplished: tile counts from the compositor plus
/// the paths of the descriptors it installed.
#[derive(Debug, Clone)]
pub struct ProductionReport {
	pub stats: CompositorStats,
	pub dataset_descriptor_path: std::path::PathBuf,
	pub raster_server_catalog_path: Option<std::path::PathBuf>,
}

/// Ties the reader/writer registry, the source catalog, the level-set
/// policy, the compositor, and the writer pool into one lifecycle.
pub struct Producer {
	registry: Arc<Registry>,
	proxy_cache: Arc<ProxyCache>,
	config: Option<ProducerConfig>,
	catalog: SourceCatalog,
	catalog_sources: Vec<(SourceRef, Sector)>,
	stopped: Arc<AtomicBool>,
}

impl Producer {
	/// Builds a producer wired with the built-in PNG/BIL readers and writers.
	#[must_use]
	pub fn new() -> Self {
		Self::with_registry(Arc::new(default_registry()))
	}

	/// Builds a producer with a caller-supplied registry, for embedding
	/// additional readers/writers beyond the two built-ins.
	#[must_use]
	pub fn with_registry(registry: Arc<Registry>) -> Self {
		Self {
			registry,
			proxy_cache: ProxyCache::new(DEFAULT_CACHE_CAPACITY_BYTES),
			config: None,
			catalog: SourceCatalog::new(),
			catalog_sources: Vec::new(),
			stopped: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Validates and stores the placement/pyramid parameters for this run.
	///
	/// # Errors
	///
	/// Returns [`RasterError::InvalidArgument`] if `config` fails its own
	/// validation (required keys, raster-shape resolution).
	pub fn set_store_parameters(&mut self, mut config: ProducerConfig) -> Result<()> {
		config.validate()?;
		self.config = Some(config);
		Ok(())
	}

	/// Attempts to construct a cached proxy for `source`, registering it in
	/// the catalog on success. Returns `Err` describing the rejection reason
	/// rather than aborting; callers doing a batch offer should prefer
	/// [`Producer::offer_all_data_sources`].
	pub fn offer_data_source(&mut self, source: SourceRef, sector_override: Option<Sector>) -> Result<(), SourceRejection> {
		let reject = |reason: String| SourceRejection { source: source.clone(), reason };

		let metadata = raster_core::MetadataBag::new();
		let Some(reader) = self.registry.find_reader(&source, &metadata) else {
			return Err(reject(format!("no reader registered for {source:?}")));
		};

		let proxy_result = match sector_override {
			Some(sector) => CachedRasterProxy::with_sector(source.clone(), reader, self.proxy_cache.clone(), sector),
			None => CachedRasterProxy::new(source.clone(), reader, self.proxy_cache.clone()),
		};
		let mut proxy = proxy_result.map_err(|e| reject(format!("{e:#}")))?;

		if let Some(order) = self.config.as_ref().and_then(|c| bands_order_array(c.bands_order.as_deref())) {
			proxy = proxy.with_bands_order(order);
		}

		let sector = proxy.sector();
		self.catalog.add(proxy).map_err(|e| reject(format!("{e:#}")))?;
		self.catalog_sources.push((source, sector));
		Ok(())
	}

	/// Offers every source, collecting rejections instead of stopping at
	/// the first one.
	pub fn offer_all_data_sources(&mut self, sources: impl IntoIterator<Item = SourceRef>) -> Vec<SourceRejection> {
		sources.into_iter().filter_map(|source| self.offer_data_source(source, None).err()).collect()
	}

	/// Sets the monotonic stop flag the compositor polls at every loop
	/// boundary.
	pub fn stop_production(&self) {
		self.stopped.store(true, Ordering::SeqCst);
	}

	/// A clone of the cooperative stop flag, useful for wiring a signal
	/// handler or a UI "cancel" button before `start_production` runs.
	#[must_use]
	pub fn stop_flag(&self) -> Arc<AtomicBool> {
		self.stopped.clone()
	}

	/// Assembles the level set, runs the compositor, drains the writer
	/// pool, and installs the dataset (and optionally raster-server catalog)
	/// descriptors.
	///
	/// On any failure, the partially-written dataset directory is removed
	/// before the error is re-raised.
	///
	/// # Errors
	///
	/// Returns [`RasterError::InvalidArgument`] if `set_store_parameters` was
	/// never called or the catalog is empty, and propagates level-set
	/// construction or descriptor-write failures.
	pub async fn start_production(&mut self) -> Result<ProductionReport> {
		let Some(config) = self.config.clone() else {
			bail!(RasterError::InvalidArgument("set_store_parameters must be called before start_production".to_string()));
		};
		if self.catalog.is_empty() {
			bail!(RasterError::InvalidArgument("no data sources were offered".to_string()));
		}

		match self.run_production(&config).await {
			Ok(report) => Ok(report),
			Err(err) => {
				log::error!("production failed, rolling back {}: {err:#}", config.install_location().display());
				let _ = std::fs::remove_dir_all(config.install_location());
				Err(err)
			}
		}
	}

	async fn run_production(&mut self, config: &ProducerConfig) -> Result<ProductionReport> {
		let level_set_params = self.level_set_params(config)?;
		let level_set = build_level_set(&level_set_params)?;

		let writer_pool = Arc::new(WriterPool::with_default_degree(self.registry.clone(), config.install_location()));
		let compositor_config = CompositorConfig {
			pixel_format: config.raster.pixel_format,
			data_type: config.raster.data_type.unwrap_or(raster_core::DataType::Float32),
			byte_order: config.raster.byte_order.unwrap_or(raster_core::ByteOrder::LittleEndian),
			transparent_value: config.raster.missing_data_replacement,
			format_suffix: config.raster.format_suffix(),
		};

		let compositor = Compositor::new(self.catalog.clone(), level_set.clone(), compositor_config, writer_pool.clone());
		// the compositor owns its own stop flag; mirror ours into it so a
		// `stop_production` call made before `start_production` still takes
		// effect.
		if self.stopped.load(Ordering::SeqCst) {
			compositor.stop_flag().store(true, Ordering::SeqCst);
		}
		self.stopped = compositor.stop_flag();

		// The compositor is a synchronous, CPU-bound traversal that now blocks
		// on writer-pool backpressure; running it on the reactor thread would
		// starve the very writer tasks it is waiting on.
		let stats = tokio::task::spawn_blocking(move || compositor.run()).await.context("compositor task panicked")?;
		writer_pool.wait_for_install_tile_tasks().await;
		self.proxy_cache.clear();

		let descriptor = DatasetDescriptor::from_level_set(
			&config.dataset_name,
			config.display_name.as_deref().unwrap_or(&config.dataset_name),
			&level_set,
			config.raster.pixel_format,
			config.raster.data_type,
			config.raster.byte_order,
			&config.raster.format_suffix(),
			config.raster.missing_data_replacement,
			config.service_name.as_deref(),
		);
		write_dataset_descriptor(&config.descriptor_path(), &descriptor)?;

		let raster_server_catalog_path = if config.write_raster_server_catalog {
			let catalog = RasterServerCatalog {
				display_name: config.display_name.clone().unwrap_or_else(|| config.dataset_name.clone()),
				cache_name: config.data_cache_name.clone(),
				sources: self
					.catalog_sources
					.iter()
					.map(|(source, sector)| CatalogSource { path: source_path_string(source), sector: SectorXml::from_sector(*sector) })
					.collect(),
			};
			let path = config.raster_server_catalog_path();
			write_raster_server_catalog(&path, &catalog)?;
			Some(path)
		} else {
			None
		};

		Ok(ProductionReport { stats, dataset_descriptor_path: config.descriptor_path(), raster_server_catalog_path })
	}

	fn level_set_params(&self, config: &ProducerConfig) -> Result<LevelSetParams> {
		let coverage = match config.sector {
			Some((min_lat, max_lat, min_lon, max_lon)) => Sector::new(min_lat, max_lat, min_lon, max_lon)?,
			None => self.catalog.coverage(),
		};
		if coverage.is_empty() {
			bail!(RasterError::InvalidArgument("coverage sector has zero area".to_string()));
		}

		let tile_origin = match config.tile_origin {
			Some((lat, lon)) => Some(LatLon::new(lat, lon)?),
			None => None,
		};

		let pixel_convention = match config.raster.pixel_format {
			raster_core::PixelFormat::Image => raster_image::affine::PixelConvention::FiniteArea,
			raster_core::PixelFormat::Elevation => raster_image::affine::PixelConvention::PointSample,
		};

		Ok(LevelSetParams {
			coverage,
			tile_width: config.raster.tile_width,
			tile_height: config.raster.tile_height,
			tile_origin,
			level_zero_delta: config.level_zero_tile_delta,
			num_levels: config.num_levels,
			num_empty_levels: config.num_empty_levels,
			large_dataset_threshold: config.large_dataset_threshold,
			max_source_pixels: self.catalog.max_source_pixels(),
			smallest_source_pixel_size_deg: self.catalog.smallest_pixel_size_deg(),
			pixel_convention,
			max_level_limit: config.max_level_limit()?,
		})
	}
}

impl Default for Producer {
	fn default() -> Self {
		Self::new()
	}
}

fn source_path_string(source: &SourceRef) -> String {
	match source {
		SourceRef::LocalPath(p) => p.display().to_string(),
		SourceRef::Url(u) => u.clone(),
		SourceRef::Memory(_) => "<memory>".to_string(),
	}
}

/// Converts a `bandsOrder` config value into the fixed-size permutation
/// [`CachedRasterProxy::with_bands_order`] expects, ignoring it (rather than
/// failing the offer) if it isn't exactly 4 entries long.
fn bands_order_array(order: Option<&[usize]>) -> Option<[usize; 4]> {
	let order = order?;
	<[usize; 4]>::try_from(order).ok()
}
