//! A precomputed chain of progressively downsampled copies of a raster,
//! used to bound per-tile resampling cost when one large source
//! contributes to many small tiles.

use crate::canvas::get_sub_image_raster;
use raster_core::{ImageRaster, Sector};

/// `chain[0]` is full resolution; `chain[i]` is half the linear resolution
/// of `chain[i-1]`.
#[derive(Debug, Clone)]
pub struct MipmapChain {
	chain: Vec<ImageRaster>,
}

impl MipmapChain {
	/// Builds a chain of at most `max_levels` entries (including the
	/// original), halving dimensions until either axis would drop below 1
	/// pixel.
	#[must_use]
	pub fn build(full_res: ImageRaster, max_levels: usize) -> Self {
		let mut chain = vec![full_res];
		while chain.len() < max_levels.max(1) {
			let prev = chain.last().unwrap();
			let (w, h) = (prev.width() / 2, prev.height() / 2);
			if w < 1 || h < 1 {
				break;
			}
			chain.push(get_sub_image_raster(prev, w, h, prev.sector()));
		}
		Self { chain }
	}

	#[must_use]
	pub fn levels(&self) -> usize {
		self.chain.len()
	}

	/// The scale factor driving level selection: how many source pixels
	/// (per destination pixel, on the coarser axis) a 1:1 draw would need
	/// to cover.
	#[must_use]
	pub fn scale_factor(src_w: usize, src_h: usize, src_sector: Sector, dst_w: usize, dst_h: usize, dst_sector: Sector) -> f64 {
		let sx = (src_w as f64 * dst_sector.delta_lon()) / (dst_w as f64 * src_sector.delta_lon());
		let sy = (src_h as f64 * dst_sector.delta_lat()) / (dst_h as f64 * src_sector.delta_lat());
		sx.max(sy)
	}

	/// Selects the coarsest chain index whose scale factor is still `>= 1`,
	/// i.e. `⌊log2(scale)⌋` clamped to `[0, levels - 1]`.
	#[must_use]
	pub fn select_level(&self, scale: f64) -> usize {
		if scale < 1.0 {
			return 0;
		}
		let level = scale.log2().floor() as i64;
		level.clamp(0, self.levels() as i64 - 1) as usize
	}

	/// The raster at `level`, clamped to the chain's bounds.
	#[must_use]
	pub fn at(&self, level: usize) -> &ImageRaster {
		&self.chain[level.min(self.chain.len() - 1)]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn sector() -> Sector {
		Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()
	}

	#[test]
	fn build_halves_dimensions_until_floor() {
		let chain = MipmapChain::build(ImageRaster::new_empty(16, 16, sector()), 8);
		assert_eq!(chain.levels(), 5); // 16, 8, 4, 2, 1
		assert_eq!(chain.at(0).width(), 16);
		assert_eq!(chain.at(4).width(), 1);
	}

	#[rstest]
	#[case(0.5, 0)]
	#[case(1.0, 0)]
	#[case(3.9, 1)]
	#[case(4.0, 2)]
	#[case(1000.0, 4)] // clamped to the chain's last level
	fn select_level_floors_log2_and_clamps(#[case] scale: f64, #[case] expected: usize) {
		let chain = MipmapChain::build(ImageRaster::new_empty(16, 16, sector()), 8);
		assert_eq!(chain.select_level(scale), expected);
	}

	#[test]
	fn scale_factor_is_one_for_matching_resolution_and_extent() {
		let scale = MipmapChain::scale_factor(100, 100, sector(), 100, 100, sector());
		assert!((scale - 1.0).abs() < 1e-9);
	}
}
