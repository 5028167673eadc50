//! Foundation types shared by every other crate in the pipeline: geo
//! primitives, the raster data model, the dynamic metadata bag, the
//! pyramid's geometry, the error taxonomy, and small ambient utilities
//! (a generic LRU cache, dual-mode progress reporting).

pub mod cache;
pub mod error;
pub use error::RasterError;
pub mod geo;
pub use geo::{Angle, LatLon, Sector};
pub mod level;
pub use level::{Level, LevelSet};
pub mod metadata;
pub use metadata::{MetadataBag, MetadataValue};
pub mod progress;
pub mod raster;
pub use raster::{ByteOrder, DataType, ImageRaster, PixelFormat, Raster, ScalarRaster};
pub mod tile;
pub use tile::Tile;
