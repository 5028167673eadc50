//! The destination→source pixel affine and its precomputed interpolation
//! tables, shared by both raster kinds' `drawOnTo` implementations.

use raster_core::Sector;

/// Which cell convention a raster kind uses when it is mapped onto pixel
/// coordinates. Images treat a pixel as a finite area; scalar/elevation
/// rasters treat a pixel as a point sample at the cell center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelConvention {
	FiniteArea,
	PointSample,
}

/// `dst pixel -> src pixel`: `src = dst * scale + translate`, per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
	pub sx: f64,
	pub tx: f64,
	pub sy: f64,
	pub ty: f64,
}

impl Affine {
	/// Builds the affine mapping destination pixel coordinates to source
	/// pixel coordinates, under the given [`PixelConvention`].
	#[must_use]
	pub fn new(
		convention: PixelConvention,
		src_sector: Sector,
		src_w: usize,
		src_h: usize,
		dst_sector: Sector,
		dst_w: usize,
		dst_h: usize,
	) -> Self {
		let dst_dlon = dst_sector.delta_lon();
		let dst_dlat = dst_sector.delta_lat();

		let (sx, tx) = match convention {
			PixelConvention::FiniteArea => {
				let sx = (dst_w as f64 / src_w as f64) * (src_sector.delta_lon() / dst_dlon);
				let tx = dst_w as f64 * (src_sector.min_lon() - dst_sector.min_lon()) / dst_dlon;
				(sx, tx)
			}
			PixelConvention::PointSample => {
				let sx = ((dst_w as f64 - 1.0) / (src_w as f64 - 1.0)) * (src_sector.delta_lon() / dst_dlon);
				let tx = (dst_w as f64 - 1.0) * (src_sector.min_lon() - dst_sector.min_lon()) / dst_dlon;
				(sx, tx)
			}
		};
		// Latitude increases upward in geography but row index increases downward
		// in pixel space; the source image's row 0 corresponds to max_lat.
		let (sy, ty) = match convention {
			PixelConvention::FiniteArea => {
				let sy = (dst_h as f64 / src_h as f64) * (src_sector.delta_lat() / dst_dlat);
				let ty = dst_h as f64 * (dst_sector.max_lat() - src_sector.max_lat()) / dst_dlat;
				(sy, ty)
			}
			PixelConvention::PointSample => {
				let sy = ((dst_h as f64 - 1.0) / (src_h as f64 - 1.0)) * (src_sector.delta_lat() / dst_dlat);
				let ty = (dst_h as f64 - 1.0) * (dst_sector.max_lat() - src_sector.max_lat()) / dst_dlat;
				(sy, ty)
			}
		};

		Self { sx, tx, sy, ty }
	}

	#[must_use]
	pub fn src_x(&self, dst_x: f64) -> f64 {
		dst_x * self.sx + self.tx
	}

	#[must_use]
	pub fn src_y(&self, dst_y: f64) -> f64 {
		dst_y * self.sy + self.ty
	}
}

/// A single axis's interpolation table entry: the two straddling source
/// indices and the fractional weight towards the second (`ceil`) one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSample {
	pub floor: usize,
	pub ceil: usize,
	pub frac: f64,
}

/// Precomputes one [`AxisSample`] per destination index in `0..dst_len`,
/// mapping through `to_src` and clamping to `[0, src_len - 1]`.
#[must_use]
pub fn build_axis_table(dst_len: usize, src_len: usize, to_src: impl Fn(f64) -> f64) -> Vec<AxisSample> {
	(0..dst_len)
		.map(|i| {
			let s = to_src(i as f64).clamp(0.0, (src_len - 1) as f64);
			let floor = s.floor() as usize;
			let ceil = (floor + 1).min(src_len - 1);
			AxisSample { floor, ceil, frac: s - floor as f64 }
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn sector(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Sector {
		Sector::new(min_lat, max_lat, min_lon, max_lon).unwrap()
	}

	#[test]
	fn identity_mapping_when_sectors_and_sizes_match() {
		let s = sector(0.0, 10.0, 0.0, 10.0);
		let affine = Affine::new(PixelConvention::FiniteArea, s, 100, 100, s, 100, 100);
		assert!((affine.src_x(50.0) - 50.0).abs() < 1e-9);
		assert!((affine.src_y(50.0) - 50.0).abs() < 1e-9);
	}

	#[rstest]
	#[case(0, 0usize, 0usize, 0.0)]
	#[case(4, 4usize, 5usize, 0.5)]
	#[case(9, 9usize, 9usize, 0.0)]
	fn axis_table_clamps_and_interpolates(#[case] dst_i: usize, #[case] floor: usize, #[case] ceil: usize, #[case] frac: f64) {
		let table = build_axis_table(10, 10, |i| i + 0.5);
		let sample = table[dst_i];
		assert_eq!(sample.floor, floor);
		assert_eq!(sample.ceil, ceil);
		assert!((sample.frac - frac).abs() < 1e-9);
	}

	#[test]
	fn axis_table_never_exceeds_src_bounds() {
		let table = build_axis_table(4, 2, |i| i * 10.0);
		for sample in table {
			assert!(sample.floor < 2);
			assert!(sample.ceil < 2);
		}
	}
}
