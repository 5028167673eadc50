//! Readers, writers, the format registry, the cached raster proxy, and the
//! bounded writer pool.

pub mod cache;
pub mod proxy;
pub mod reader;
pub mod registry;
pub mod source_ref;
pub mod writer;
pub mod writer_pool;

pub use cache::{CacheEntry, RasterCache};
pub use proxy::{CachedRasterProxy, ProxyCache};
pub use reader::Reader;
pub use registry::Registry;
pub use source_ref::SourceRef;
pub use writer::Writer;
pub use writer_pool::WriterPool;
