//! Bilinear `drawOnTo`: resamples a source raster onto a destination
//! canvas, clipped to their sectors' intersection.

use crate::affine::{Affine, PixelConvention, build_axis_table};
use crate::mipmap::MipmapChain;
use raster_core::{ImageRaster, RasterError, ScalarRaster};

/// Resamples `src` into `dst` in place, using bilinear interpolation and
/// "source over" alpha blending. Disjoint sectors are a silent no-op.
pub fn draw_image_onto(src: &ImageRaster, dst: &mut ImageRaster) {
	let Some(clip) = src.sector().intersection(&dst.sector()) else {
		return;
	};
	if clip.is_empty() {
		return;
	}

	let affine = Affine::new(
		PixelConvention::FiniteArea,
		src.sector(),
		src.width(),
		src.height(),
		dst.sector(),
		dst.width(),
		dst.height(),
	);

	let (x0, x1) = dest_column_range(&dst.sector(), &clip, dst.width());
	let (y0, y1) = dest_row_range(&dst.sector(), &clip, dst.height());
	if x0 >= x1 || y0 >= y1 {
		return;
	}

	let col_table = build_axis_table(dst.width(), src.width(), |x| affine.src_x(x));
	let row_table = build_axis_table(dst.height(), src.height(), |y| affine.src_y(y));

	for dy in y0..y1 {
		let row = row_table[dy];
		for dx in x0..x1 {
			let col = col_table[dx];

			let p00 = src.pixel(col.floor, row.floor);
			let p10 = src.pixel(col.ceil, row.floor);
			let p01 = src.pixel(col.floor, row.ceil);
			let p11 = src.pixel(col.ceil, row.ceil);

			let sample = bilinear_rgba(p00, p10, p01, p11, col.frac, row.frac);
			let blended = source_over(dst.pixel(dx, dy), sample);
			dst.set_pixel(dx, dy, blended);
		}
	}
}

/// Draws `chain` onto `dst`, selecting the coarsest level whose scale
/// factor is still `>= 1` before resampling, so a single large source
/// contributing to many small tiles pays the bilinear resampling cost of
/// its downsampled copy rather than its full resolution.
pub fn draw_mipmap_onto(chain: &MipmapChain, dst: &mut ImageRaster) {
	let full = chain.at(0);
	let scale = MipmapChain::scale_factor(full.width(), full.height(), full.sector(), dst.width(), dst.height(), dst.sector());
	let level = chain.select_level(scale);
	draw_image_onto(chain.at(level), dst);
}

/// Resamples `src` into `dst` in place. Any of the four bilinear source
/// neighbors bit-equal to `src`'s transparent value leaves the
/// corresponding destination pixel untouched. Disjoint sectors are a
/// silent no-op.
pub fn draw_scalar_onto(src: &ScalarRaster, dst: &mut ScalarRaster) {
	let Some(clip) = src.sector().intersection(&dst.sector()) else {
		return;
	};
	if clip.is_empty() {
		return;
	}

	let affine = Affine::new(
		PixelConvention::PointSample,
		src.sector(),
		src.width(),
		src.height(),
		dst.sector(),
		dst.width(),
		dst.height(),
	);

	let (x0, x1) = dest_column_range(&dst.sector(), &clip, dst.width());
	let (y0, y1) = dest_row_range(&dst.sector(), &clip, dst.height());
	if x0 >= x1 || y0 >= y1 {
		return;
	}

	let col_table = build_axis_table(dst.width(), src.width(), |x| affine.src_x(x));
	let row_table = build_axis_table(dst.height(), src.height(), |y| affine.src_y(y));

	for dy in y0..y1 {
		let row = row_table[dy];
		for dx in x0..x1 {
			let col = col_table[dx];

			let s00 = src.sample(col.floor, row.floor);
			let s10 = src.sample(col.ceil, row.floor);
			let s01 = src.sample(col.floor, row.ceil);
			let s11 = src.sample(col.ceil, row.ceil);

			if [s00, s10, s01, s11].into_iter().any(|v| src.is_transparent(v)) {
				continue;
			}

			let value = bilinear_scalar(s00, s10, s01, s11, col.frac, row.frac);
			dst.set_sample(dx, dy, value);
		}
	}
}

/// Draws `src` onto `dst`, dispatching on the matching raster kind.
///
/// # Errors
///
/// Returns [`RasterError::InvalidArgument`] if `src` and `dst` are of
/// different kinds (image drawn onto scalar, or vice versa).
pub fn draw_onto(src: &raster_core::Raster, dst: &mut raster_core::Raster) -> anyhow::Result<()> {
	use raster_core::Raster::{Image, Scalar};
	match (src, dst) {
		(Image(s), Image(d)) => {
			draw_image_onto(s, d);
			Ok(())
		}
		(Scalar(s), Scalar(d)) => {
			draw_scalar_onto(s, d);
			Ok(())
		}
		_ => Err(RasterError::InvalidArgument("cannot draw an image raster onto a scalar canvas or vice versa".to_string()).into()),
	}
}

fn dest_column_range(dst_sector: &raster_core::Sector, clip: &raster_core::Sector, dst_w: usize) -> (usize, usize) {
	let frac0 = (clip.min_lon() - dst_sector.min_lon()) / dst_sector.delta_lon();
	let frac1 = (clip.max_lon() - dst_sector.min_lon()) / dst_sector.delta_lon();
	let x0 = (frac0 * dst_w as f64).floor().clamp(0.0, dst_w as f64) as usize;
	let x1 = (frac1 * dst_w as f64).ceil().clamp(0.0, dst_w as f64) as usize;
	(x0, x1)
}

fn dest_row_range(dst_sector: &raster_core::Sector, clip: &raster_core::Sector, dst_h: usize) -> (usize, usize) {
	// Row 0 is the northernmost row (max_lat), mirroring `Affine`'s y axis.
	let frac0 = (dst_sector.max_lat() - clip.max_lat()) / dst_sector.delta_lat();
	let frac1 = (dst_sector.max_lat() - clip.min_lat()) / dst_sector.delta_lat();
	let y0 = (frac0 * dst_h as f64).floor().clamp(0.0, dst_h as f64) as usize;
	let y1 = (frac1 * dst_h as f64).ceil().clamp(0.0, dst_h as f64) as usize;
	(y0, y1)
}

fn bilinear_scalar(s00: f64, s10: f64, s01: f64, s11: f64, fx: f64, fy: f64) -> f64 {
	let top = s00 + (s10 - s00) * fx;
	let bottom = s01 + (s11 - s01) * fx;
	top + (bottom - top) * fy
}

fn bilinear_rgba(p00: [u8; 4], p10: [u8; 4], p01: [u8; 4], p11: [u8; 4], fx: f64, fy: f64) -> [u8; 4] {
	let mut out = [0u8; 4];
	for c in 0..4 {
		let v = bilinear_scalar(f64::from(p00[c]), f64::from(p10[c]), f64::from(p01[c]), f64::from(p11[c]), fx, fy);
		out[c] = v.round().clamp(0.0, 255.0) as u8;
	}
	out
}

/// Porter-Duff "source over", both operands pre-multiplied RGBA.
fn source_over(bottom: [u8; 4], top: [u8; 4]) -> [u8; 4] {
	let top_a = f64::from(top[3]) / 255.0;
	let inv_a = 1.0 - top_a;
	let mut out = [0u8; 4];
	for c in 0..4 {
		out[c] = (f64::from(top[c]) + f64::from(bottom[c]) * inv_a).round().clamp(0.0, 255.0) as u8;
	}
	out
}
