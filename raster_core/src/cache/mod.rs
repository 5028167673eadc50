//! Generic cache primitives shared across the pipeline. The size-bounded
//! raster cache used by the cached raster proxy lives in `raster_io`,
//! built on top of [`LimitedCache`]'s LRU idiom plus eviction callbacks.

mod limited_cache;

pub use limited_cache::LimitedCache;
