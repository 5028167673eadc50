//! The cached raster proxy: wraps a source behind lazy, at-most-once
//! decoding, an LRU byte-budget cache, negative-entry memoization, and a
//! one-retry OOM recovery.

use crate::cache::{CacheEntry, RasterCache};
use crate::reader::Reader;
use crate::source_ref::SourceRef;
use anyhow::{Result, bail};
use parking_lot::Mutex;
use raster_core::{MetadataBag, MetadataValue, Raster, RasterError, Sector};
use raster_derive::context;
use std::collections::HashMap;
use std::sync::Arc;

/// The metadata key holding the source's declared coverage.
pub const KEY_SECTOR: &str = "SECTOR";
/// The metadata key holding the source's declared pixel format.
pub const KEY_PIXEL_FORMAT: &str = "PIXEL_FORMAT";

/// A decoded-raster cache shared by every proxy in a dataset, so that
/// sources referenced by more than one tile are decoded at most once and
/// evicted under one shared byte budget.
pub struct ProxyCache {
	inner: Mutex<RasterCache<SourceRef, Arc<Raster>>>,
	decode_locks: Mutex<HashMap<SourceRef, Arc<Mutex<()>>>>,
}

impl ProxyCache {
	#[must_use]
	pub fn new(hard_capacity_bytes: usize) -> Arc<Self> {
		Arc::new(Self {
			inner: Mutex::new(RasterCache::new(hard_capacity_bytes)),
			decode_locks: Mutex::new(HashMap::new()),
		})
	}

	fn decode_lock_for(&self, source: &SourceRef) -> Arc<Mutex<()>> {
		self.decode_locks.lock().entry(source.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
	}

	/// Drops every cached entry, disposing of each raster. Used after a
	/// production run completes and as the first half of OOM recovery.
	pub fn clear(&self) {
		self.inner.lock().clear(|_, _| {});
	}
}

/// A lazily-materialized raster backed by a reader and a shared
/// [`ProxyCache`].
#[derive(Clone)]
pub struct CachedRasterProxy {
	source: SourceRef,
	reader: Arc<dyn Reader>,
	metadata: MetadataBag,
	cache: Arc<ProxyCache>,
	bands_order: Option<[usize; 4]>,
	mipmap: Arc<Mutex<Option<Arc<raster_image::MipmapChain>>>>,
}

impl CachedRasterProxy {
	/// Constructs a proxy, eagerly reading metadata.
	///
	/// # Errors
	///
	/// Returns [`RasterError::InvalidArgument`] if the reader cannot supply
	/// a sector or pixel format for `source`.
	#[context("constructing cached raster proxy for {source:?}")]
	pub fn new(source: SourceRef, reader: Arc<dyn Reader>, cache: Arc<ProxyCache>) -> Result<Self> {
		let mut metadata = MetadataBag::new();
		reader.read_metadata(&source, &mut metadata)?;

		if metadata.get(KEY_SECTOR).and_then(MetadataValue::as_sector).is_none() {
			bail!(RasterError::InvalidArgument(format!("source {source:?} is missing a sector")));
		}
		if !metadata.contains(KEY_PIXEL_FORMAT) {
			bail!(RasterError::InvalidArgument(format!("source {source:?} is missing a pixel format")));
		}

		Ok(Self { source, reader, metadata, cache, bands_order: None, mipmap: Arc::new(Mutex::new(None)) })
	}

	/// Overrides the channel order applied to an `ImageRaster` source
	/// before it is cached and drawn, per the `bandsOrder` configuration
	/// key. `order[i]` names which decoded channel feeds
	/// destination channel `i`. No-op for scalar sources.
	#[must_use]
	pub fn with_bands_order(mut self, order: [usize; 4]) -> Self {
		self.bands_order = Some(order);
		self
	}

	/// Constructs a proxy the same way as [`CachedRasterProxy::new`], but
	/// overrides whatever sector the reader derives with `sector`. Used by
	/// `offerDataSource(source, params)` callers supplying an explicit
	/// sector for formats that carry no georeferencing of their own.
	///
	/// # Errors
	///
	/// Returns [`RasterError::InvalidArgument`] if the reader cannot supply
	/// a pixel format for `source`.
	#[context("constructing cached raster proxy for {source:?} with an explicit sector")]
	pub fn with_sector(source: SourceRef, reader: Arc<dyn Reader>, cache: Arc<ProxyCache>, sector: Sector) -> Result<Self> {
		let mut metadata = MetadataBag::new();
		reader.read_metadata(&source, &mut metadata)?;
		metadata.set(KEY_SECTOR, MetadataValue::Sector(sector));

		if !metadata.contains(KEY_PIXEL_FORMAT) {
			bail!(RasterError::InvalidArgument(format!("source {source:?} is missing a pixel format")));
		}

		Ok(Self { source, reader, metadata, cache, bands_order: None, mipmap: Arc::new(Mutex::new(None)) })
	}

	#[must_use]
	pub fn sector(&self) -> Sector {
		self.metadata.get(KEY_SECTOR).and_then(MetadataValue::as_sector).expect("validated at construction")
	}

	#[must_use]
	pub fn source(&self) -> &SourceRef {
		&self.source
	}

	/// The pixel format declared at construction.
	#[must_use]
	pub fn pixel_format(&self) -> raster_core::PixelFormat {
		match self.metadata.get(KEY_PIXEL_FORMAT) {
			Some(MetadataValue::PixelFormat(p)) => *p,
			_ => unreachable!("validated at construction"),
		}
	}

	/// The full metadata bag read from the source, for callers that need
	/// declared width/height or other ambient keys (e.g. level-set sizing).
	#[must_use]
	pub fn metadata(&self) -> &MetadataBag {
		&self.metadata
	}

	/// Materializes the underlying raster, decoding on first call and
	/// serving the cache afterwards. Concurrent calls for the same source
	/// serialize behind a per-source lock so the reader runs at most once.
	pub fn materialize(&self) -> Result<Arc<Raster>> {
		if let Some(entry) = self.cache.inner.lock().get(&self.source) {
			return match entry {
				CacheEntry::Hit(raster) => Ok(raster),
				CacheEntry::Negative => bail!(RasterError::DecodeError(format!("source {:?} previously failed to decode", self.source))),
			};
		}

		let lock = self.cache.decode_lock_for(&self.source);
		let _guard = lock.lock();

		// Another thread may have decoded this source while we waited for the lock.
		if let Some(entry) = self.cache.inner.lock().get(&self.source) {
			return match entry {
				CacheEntry::Hit(raster) => Ok(raster),
				CacheEntry::Negative => bail!(RasterError::DecodeError(format!("source {:?} previously failed to decode", self.source))),
			};
		}

		self.decode_with_oom_retry()
	}

	fn decode_with_oom_retry(&self) -> Result<Arc<Raster>> {
		match self.decode_once() {
			Ok(raster) => Ok(raster),
			Err(err) if is_resource_exhausted(&err) => {
				self.cache.clear();
				self.decode_once().map_err(|_| RasterError::ResourceExhausted(format!("source {:?} exhausted memory twice", self.source)).into())
			}
			Err(err) => Err(err),
		}
	}

	fn decode_once(&self) -> Result<Arc<Raster>> {
		match self.reader.read(&self.source, &self.metadata) {
			Ok(mut rasters) if !rasters.is_empty() => {
				let mut raster = rasters.remove(0);
				if let (Raster::Image(img), Some(order)) = (&raster, self.bands_order) {
					raster = Raster::Image(raster_image::canvas::remap_bands(img, order));
				}
				let raster = Arc::new(raster);
				let cost = raster.byte_cost();
				self.cache.inner.lock().insert(self.source.clone(), CacheEntry::Hit(raster.clone()), cost, |_, _| {});
				Ok(raster)
			}
			Ok(_) => {
				self.cache.inner.lock().insert(self.source.clone(), CacheEntry::Negative, 0, |_, _| {});
				bail!(RasterError::DecodeError(format!("reader returned no raster for {:?}", self.source)))
			}
			Err(err) => {
				if !is_resource_exhausted(&err) {
					self.cache.inner.lock().insert(self.source.clone(), CacheEntry::Negative, 0, |_, _| {});
				}
				Err(err)
			}
		}
	}

	/// Draws the materialized raster onto `dst`. Image sources are drawn
	/// through a lazily-built [`raster_image::MipmapChain`], so a large
	/// source contributing to many small tiles resamples from a
	/// downsampled copy rather than full resolution.
	pub fn draw_onto(&self, dst: &mut Raster) -> Result<()> {
		let raster = self.materialize()?;
		match (raster.as_ref(), dst) {
			(Raster::Image(src), Raster::Image(dst_img)) => {
				let chain = self.mipmap_chain(src);
				raster_image::draw_mipmap_onto(&chain, dst_img);
				Ok(())
			}
			_ => raster_image::draw_onto(&raster, dst),
		}
	}

	/// Returns the cached mipmap chain for this source's full-resolution
	/// image raster, building it on first use.
	fn mipmap_chain(&self, src: &raster_core::ImageRaster) -> Arc<raster_image::MipmapChain> {
		let mut guard = self.mipmap.lock();
		if let Some(chain) = guard.as_ref() {
			return chain.clone();
		}
		let max_levels = (src.width().max(src.height()) as f64).log2().floor() as usize + 1;
		let chain = Arc::new(raster_image::MipmapChain::build(src.clone(), max_levels));
		*guard = Some(chain.clone());
		chain
	}
}

fn is_resource_exhausted(err: &anyhow::Error) -> bool {
	matches!(err.downcast_ref::<RasterError>(), Some(RasterError::ResourceExhausted(_)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use raster_core::{ByteOrder, DataType, ImageRaster, PixelFormat};
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug)]
	struct CountingReader {
		decode_calls: AtomicU32,
		fail_times: u32,
		oom_times: u32,
	}

	impl Reader for CountingReader {
		fn suffixes(&self) -> &[&str] {
			&["tif"]
		}
		fn mime_types(&self) -> &[&str] {
			&[]
		}
		fn can_read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> bool {
			true
		}
		fn read_metadata(&self, _source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
			metadata.set(KEY_SECTOR, MetadataValue::Sector(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()));
			metadata.set(KEY_PIXEL_FORMAT, MetadataValue::PixelFormat(PixelFormat::Image));
			Ok(())
		}
		fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> Result<Vec<Raster>> {
			let call = self.decode_calls.fetch_add(1, Ordering::SeqCst);
			if call < self.oom_times {
				bail!(RasterError::ResourceExhausted("simulated oom".to_string()));
			}
			if call < self.oom_times + self.fail_times {
				bail!(RasterError::DecodeError("simulated failure".to_string()));
			}
			Ok(vec![Raster::Image(ImageRaster::new_empty(4, 4, Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()))])
		}
		fn is_imagery_raster(&self) -> bool {
			true
		}
	}

	#[derive(Debug)]
	struct NoSectorReader;
	impl Reader for NoSectorReader {
		fn suffixes(&self) -> &[&str] {
			&["raw"]
		}
		fn mime_types(&self) -> &[&str] {
			&[]
		}
		fn can_read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> bool {
			true
		}
		fn read_metadata(&self, _source: &SourceRef, _metadata: &mut MetadataBag) -> Result<()> {
			Ok(())
		}
		fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> Result<Vec<Raster>> {
			Ok(vec![])
		}
		fn is_imagery_raster(&self) -> bool {
			true
		}
	}

	fn source(n: u8) -> SourceRef {
		SourceRef::LocalPath(format!("/data/{n}.tif").into())
	}

	#[test]
	fn construction_rejects_missing_sector() {
		let cache = ProxyCache::new(1 << 20);
		let err = CachedRasterProxy::new(source(0), Arc::new(NoSectorReader), cache).unwrap_err();
		assert!(err.downcast_ref::<RasterError>().is_some());
	}

	#[test]
	fn materialize_decodes_once_and_caches() {
		let reader = Arc::new(CountingReader { decode_calls: AtomicU32::new(0), fail_times: 0, oom_times: 0 });
		let cache = ProxyCache::new(1 << 20);
		let proxy = CachedRasterProxy::new(source(0), reader.clone(), cache).unwrap();

		proxy.materialize().unwrap();
		proxy.materialize().unwrap();
		assert_eq!(reader.decode_calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn materialize_caches_negative_entry_without_retrying() {
		let reader = Arc::new(CountingReader { decode_calls: AtomicU32::new(0), fail_times: 5, oom_times: 0 });
		let cache = ProxyCache::new(1 << 20);
		let proxy = CachedRasterProxy::new(source(0), reader.clone(), cache).unwrap();

		assert!(proxy.materialize().is_err());
		assert!(proxy.materialize().is_err());
		// only the first call actually invoked the reader; the second served the negative entry
		assert_eq!(reader.decode_calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn materialize_retries_once_after_oom_then_succeeds() {
		let reader = Arc::new(CountingReader { decode_calls: AtomicU32::new(0), fail_times: 0, oom_times: 1 });
		let cache = ProxyCache::new(1 << 20);
		let proxy = CachedRasterProxy::new(source(0), reader.clone(), cache).unwrap();

		proxy.materialize().unwrap();
		assert_eq!(reader.decode_calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn materialize_is_fatal_after_second_oom() {
		let reader = Arc::new(CountingReader { decode_calls: AtomicU32::new(0), fail_times: 0, oom_times: 2 });
		let cache = ProxyCache::new(1 << 20);
		let proxy = CachedRasterProxy::new(source(0), reader.clone(), cache).unwrap();

		let err = proxy.materialize().unwrap_err();
		assert!(matches!(err.downcast_ref::<RasterError>(), Some(RasterError::ResourceExhausted(_))));
	}

	#[test]
	fn bands_order_permutes_channels_before_caching() {
		#[derive(Debug)]
		struct SolidReader;
		impl Reader for SolidReader {
			fn suffixes(&self) -> &[&str] {
				&["tif"]
			}
			fn mime_types(&self) -> &[&str] {
				&[]
			}
			fn can_read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> bool {
				true
			}
			fn read_metadata(&self, _source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
				metadata.set(KEY_SECTOR, MetadataValue::Sector(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()));
				metadata.set(KEY_PIXEL_FORMAT, MetadataValue::PixelFormat(PixelFormat::Image));
				Ok(())
			}
			fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> Result<Vec<Raster>> {
				let mut raster = ImageRaster::new_empty(1, 1, Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
				raster.set_pixel(0, 0, [10, 20, 30, 255]);
				Ok(vec![Raster::Image(raster)])
			}
			fn is_imagery_raster(&self) -> bool {
				true
			}
		}

		let cache = ProxyCache::new(1 << 20);
		let proxy = CachedRasterProxy::new(source(0), Arc::new(SolidReader), cache)
			.unwrap()
			.with_bands_order([2, 1, 0, 3]);

		let raster = proxy.materialize().unwrap();
		let Raster::Image(img) = raster.as_ref() else {
			panic!("expected an image raster");
		};
		assert_eq!(img.pixel(0, 0), [30, 20, 10, 255]);
	}

	#[test]
	fn draw_onto_materializes_and_draws() {
		let reader = Arc::new(CountingReader { decode_calls: AtomicU32::new(0), fail_times: 0, oom_times: 0 });
		let cache = ProxyCache::new(1 << 20);
		let proxy = CachedRasterProxy::new(source(0), reader, cache).unwrap();

		let mut dst = Raster::Image(ImageRaster::new_empty(4, 4, Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()));
		proxy.draw_onto(&mut dst).unwrap();
		let _ = DataType::Float32;
		let _ = ByteOrder::LittleEndian;
	}

	#[test]
	fn draw_onto_an_image_routes_through_a_lazily_built_mipmap_chain() {
		#[derive(Debug)]
		struct LargeSolidReader;
		impl Reader for LargeSolidReader {
			fn suffixes(&self) -> &[&str] {
				&["tif"]
			}
			fn mime_types(&self) -> &[&str] {
				&[]
			}
			fn can_read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> bool {
				true
			}
			fn read_metadata(&self, _source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
				metadata.set(KEY_SECTOR, MetadataValue::Sector(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()));
				metadata.set(KEY_PIXEL_FORMAT, MetadataValue::PixelFormat(PixelFormat::Image));
				Ok(())
			}
			fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> Result<Vec<Raster>> {
				let mut raster = ImageRaster::new_empty(256, 256, Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
				for y in 0..256 {
					for x in 0..256 {
						raster.set_pixel(x, y, [7, 8, 9, 255]);
					}
				}
				Ok(vec![Raster::Image(raster)])
			}
			fn is_imagery_raster(&self) -> bool {
				true
			}
		}

		let cache = ProxyCache::new(1 << 20);
		let proxy = CachedRasterProxy::new(source(0), Arc::new(LargeSolidReader), cache).unwrap();

		// a destination far coarser than the source should select a downsampled
		// mip level, but a uniformly colored source still draws the same color.
		let mut dst = Raster::Image(ImageRaster::new_empty(2, 2, Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()));
		proxy.draw_onto(&mut dst).unwrap();
		let Raster::Image(img) = dst else {
			panic!("expected an image raster");
		};
		assert_eq!(img.pixel(0, 0), [7, 8, 9, 255]);
		assert_eq!(img.pixel(1, 1), [7, 8, 9, 255]);

		// the chain is built once and reused on subsequent draws.
		let mut dst2 = Raster::Image(ImageRaster::new_empty(2, 2, Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()));
		proxy.draw_onto(&mut dst2).unwrap();
		assert!(proxy.mipmap.lock().is_some());
	}
}
