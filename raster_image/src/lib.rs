//! The raster canvas and resampler: bilinear `drawOnTo` between
//! georeferenced rasters, `getSubRaster`, band remapping, and the mipmap
//! chain that bounds per-tile resampling cost.

pub mod affine;
pub mod canvas;
pub mod mipmap;
pub mod resample;

pub use canvas::{get_sub_image_raster, get_sub_scalar_raster, remap_bands};
pub use mipmap::MipmapChain;
pub use resample::{draw_image_onto, draw_mipmap_onto, draw_onto, draw_scalar_onto};
