//! `getSubRaster` and band remapping: the two raster-shaping operations
//! layered on top of [`crate::resample`].

use crate::resample::{draw_image_onto, draw_scalar_onto};
use raster_core::{ByteOrder, DataType, ImageRaster, Sector};

/// Produces a new `width × height` raster over `sector`, equivalent to
/// allocating an empty canvas and drawing `src` onto it.
#[must_use]
pub fn get_sub_image_raster(src: &ImageRaster, width: usize, height: usize, sector: Sector) -> ImageRaster {
	let mut dst = ImageRaster::new_empty(width, height, sector);
	draw_image_onto(src, &mut dst);
	dst
}

#[must_use]
pub fn get_sub_scalar_raster(
	src: &raster_core::ScalarRaster,
	width: usize,
	height: usize,
	sector: Sector,
	data_type: DataType,
	byte_order: ByteOrder,
) -> raster_core::ScalarRaster {
	let mut dst = raster_core::ScalarRaster::new_empty(width, height, sector, data_type, byte_order, src.transparent_value());
	draw_scalar_onto(src, &mut dst);
	dst
}

/// Permutes an `ImageRaster`'s channels before it is drawn, per a
/// `bandsOrder`-style configuration key. `order[i]` names which source
/// channel feeds destination channel `i`; e.g. `[2, 1, 0, 3]` swaps red and
/// blue.
#[must_use]
pub fn remap_bands(src: &ImageRaster, order: [usize; 4]) -> ImageRaster {
	let mut out = ImageRaster::new_empty(src.width(), src.height(), src.sector());
	for y in 0..src.height() {
		for x in 0..src.width() {
			let p = src.pixel(x, y);
			out.set_pixel(x, y, [p[order[0]], p[order[1]], p[order[2]], p[order[3]]]);
		}
	}
	out
}
