//! Level-set construction, the recursive tile compositor, and the
//! on-demand mosaic server: the pieces of the pipeline that sit above
//! the raster model (`raster_core`), the resampler (`raster_image`), and the
//! cached proxy / writer pool (`raster_io`).

pub mod catalog;
pub mod compositor;
pub mod level_set;
pub mod mosaic;

pub use catalog::SourceCatalog;
pub use compositor::{Compositor, CompositorConfig, CompositorStats};
pub use level_set::{LevelSetParams, MaxLevelLimit, build_level_set, parse_max_level_limit};
pub use mosaic::{ComposeRasterRequest, compose_raster, get_raster_as_byte_buffer};
