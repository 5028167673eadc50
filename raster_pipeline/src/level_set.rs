//! Level-set construction policy: how many levels a dataset needs, how
//! `tileDelta` is chosen, the large-dataset threshold, the global-sphere
//! repair, and the max-level-limit cap.
//!
//! [`raster_core::level`] only describes the shape of a [`Level`]/[`LevelSet`];
//! everything here is policy that turns a catalog's coverage and source
//! resolution into a concrete pyramid.

use anyhow::{Result, bail};
use raster_core::{LatLon, Level, LevelSet, RasterError, Sector};
use raster_image::affine::PixelConvention;

/// The inputs `build_level_set` needs: pyramid geometry, with any field
/// left unset derived from the catalog.
#[derive(Debug, Clone)]
pub struct LevelSetParams {
	pub coverage: Sector,
	pub tile_width: u32,
	pub tile_height: u32,
	pub tile_origin: Option<LatLon>,
	pub level_zero_delta: Option<(f64, f64)>,
	pub num_levels: Option<u8>,
	pub num_empty_levels: u8,
	pub large_dataset_threshold: u32,
	pub max_source_pixels: u32,
	pub smallest_source_pixel_size_deg: Option<f64>,
	pub pixel_convention: PixelConvention,
	pub max_level_limit: Option<MaxLevelLimit>,
}

impl LevelSetParams {
	#[must_use]
	pub fn new(coverage: Sector, tile_width: u32, tile_height: u32) -> Self {
		Self {
			coverage,
			tile_width,
			tile_height,
			tile_origin: None,
			level_zero_delta: None,
			num_levels: None,
			num_empty_levels: 0,
			large_dataset_threshold: 3000,
			max_source_pixels: 0,
			smallest_source_pixel_size_deg: None,
			pixel_convention: PixelConvention::FiniteArea,
			max_level_limit: None,
		}
	}
}

/// A cap on pyramid depth, as either an absolute level count or a
/// percentage of the naturally computed depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxLevelLimit {
	Absolute(u8),
	Percent(f64),
}

/// Parses a `maxLevelLimit` configuration value: a bare integer, `"Auto"`
/// (= 50%), or `"{n}%"`.
///
/// Trying the bare-integer form first, before falling back to `"Auto"`/`%`,
/// is what gives the integer form precedence when a value is ambiguous
/// between representations.
///
/// # Errors
///
/// Returns [`RasterError::InvalidArgument`] if `s` matches none of the three
/// accepted forms.
pub fn parse_max_level_limit(s: &str) -> Result<MaxLevelLimit> {
	let trimmed = s.trim();
	if let Ok(n) = trimmed.parse::<u8>() {
		return Ok(MaxLevelLimit::Absolute(n));
	}
	if trimmed.eq_ignore_ascii_case("auto") {
		return Ok(MaxLevelLimit::Percent(50.0));
	}
	if let Some(pct) = trimmed.strip_suffix('%') {
		if let Ok(v) = pct.trim().parse::<f64>() {
			return Ok(MaxLevelLimit::Percent(v));
		}
	}
	bail!(RasterError::InvalidArgument(format!("maxLevelLimit {s:?} is neither an integer, \"Auto\", nor \"{{n}}%\"")));
}

/// Builds the pyramid's [`LevelSet`] from `params`.
///
/// # Errors
///
/// Returns [`RasterError::InvalidArgument`] if the coverage is empty, if
/// either tile dimension is zero, or if the large-dataset policy selects a
/// pyramid but no source pixel size was supplied.
pub fn build_level_set(params: &LevelSetParams) -> Result<LevelSet> {
	if params.coverage.is_empty() {
		bail!(RasterError::InvalidArgument("level set coverage must have non-zero area".to_string()));
	}
	if params.tile_width == 0 || params.tile_height == 0 {
		bail!(RasterError::InvalidArgument("tile dimensions must be >= 1".to_string()));
	}

	let (tile_origin, level_zero_delta) = resolve_origin_and_delta(params)?;

	let computed = if let Some(n) = params.num_levels {
		n.max(1)
	} else if params.max_source_pixels > params.large_dataset_threshold {
		pyramid_num_levels(level_zero_delta, params)?
	} else {
		1
	};

	let num_levels = apply_level_cap(computed, params.max_level_limit);

	let levels = (0..num_levels)
		.map(|k| {
			let divisor = 2f64.powi(i32::from(k));
			Level::new(k, params.tile_width, params.tile_height, level_zero_delta.0 / divisor, level_zero_delta.1 / divisor)
				.with_empty(k < params.num_empty_levels)
		})
		.collect();

	Ok(LevelSet::new(levels, params.coverage, tile_origin, level_zero_delta))
}

fn resolve_origin_and_delta(params: &LevelSetParams) -> Result<(LatLon, (f64, f64))> {
	let (mut delta_lat, mut delta_lon) = params.level_zero_delta.unwrap_or((params.coverage.delta_lat(), params.coverage.delta_lon()));
	let mut origin = match params.tile_origin {
		Some(o) => o,
		None => LatLon::new(params.coverage.min_lat(), params.coverage.min_lon())?,
	};

	if !divides_integrally(180.0, delta_lat) || !divides_integrally(360.0, delta_lon) {
		delta_lat = largest_integral_divisor(180.0, delta_lat);
		delta_lon = largest_integral_divisor(360.0, delta_lon);
		origin = LatLon::new(-90.0, -180.0)?;
	}

	Ok((origin, (delta_lat, delta_lon)))
}

const DIVISIBILITY_EPSILON: f64 = 1e-9;

fn divides_integrally(total: f64, delta: f64) -> bool {
	if delta <= 0.0 {
		return false;
	}
	let ratio = total / delta;
	(ratio - ratio.round()).abs() < DIVISIBILITY_EPSILON
}

/// The largest exact divisor of `total` that does not exceed `delta`.
fn largest_integral_divisor(total: f64, delta: f64) -> f64 {
	let n = (total / delta).ceil().max(1.0);
	total / n
}

fn pyramid_num_levels(level_zero_delta: (f64, f64), params: &LevelSetParams) -> Result<u8> {
	let Some(pixel_size) = params.smallest_source_pixel_size_deg else {
		bail!(RasterError::InvalidArgument(
			"large-dataset pyramid requires a smallest source pixel size".to_string()
		));
	};

	let (last_lat, last_lon) = match params.pixel_convention {
		PixelConvention::FiniteArea => (pixel_size * f64::from(params.tile_height), pixel_size * f64::from(params.tile_width)),
		PixelConvention::PointSample => (
			pixel_size * f64::from(params.tile_height.saturating_sub(1).max(1)),
			pixel_size * f64::from(params.tile_width.saturating_sub(1).max(1)),
		),
	};

	let levels_for = |zero: f64, last: f64| -> u8 {
		let ratio = zero / last;
		if !ratio.is_finite() || ratio <= 1.0 {
			1
		} else {
			(ratio.log2().ceil() + 1.0) as u8
		}
	};

	Ok(levels_for(level_zero_delta.0, last_lat).max(levels_for(level_zero_delta.1, last_lon)).max(1))
}

fn apply_level_cap(computed: u8, limit: Option<MaxLevelLimit>) -> u8 {
	match limit {
		None => computed,
		Some(MaxLevelLimit::Absolute(n)) => n.clamp(1, computed),
		Some(MaxLevelLimit::Percent(p)) => {
			let capped = ((f64::from(computed) * p / 100.0).round() as i64).clamp(1, i64::from(computed));
			capped as u8
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn sector(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Sector {
		Sector::new(min_lat, max_lat, min_lon, max_lon).unwrap()
	}

	#[test]
	fn single_tile_dataset_yields_one_level_matching_coverage() {
		// one source, sector (0,10,0,10), 100x100, below the large-dataset threshold.
		let params = LevelSetParams::new(sector(0.0, 10.0, 0.0, 10.0), 512, 512);
		let set = build_level_set(&params).unwrap();
		assert_eq!(set.depth(), 1);
		let level0 = set.level(0).unwrap();
		assert_eq!(level0.tile_delta_lat(), 10.0);
		assert_eq!(level0.tile_delta_lon(), 10.0);
		assert_eq!(set.tile_origin(), LatLon::new(0.0, 0.0).unwrap());
	}

	#[test]
	fn large_dataset_builds_a_pyramid_whose_finest_level_meets_the_target() {
		let mut params = LevelSetParams::new(sector(0.0, 30.0, 0.0, 30.0), 512, 512);
		params.max_source_pixels = 4000;
		params.smallest_source_pixel_size_deg = Some(0.01);
		let set = build_level_set(&params).unwrap();
		assert!(set.depth() > 1);
		let finest = set.finest().unwrap();
		let target = 0.01 * 512.0;
		assert!(finest.tile_delta_lat() <= target + 1e-9);
		assert!(finest.tile_delta_lon() <= target + 1e-9);
	}

	#[test]
	fn pyramid_requires_pixel_size() {
		let mut params = LevelSetParams::new(sector(0.0, 30.0, 0.0, 30.0), 512, 512);
		params.max_source_pixels = 4000;
		assert!(build_level_set(&params).is_err());
	}

	#[test]
	fn every_level_halves_the_previous_deltas_exactly() {
		let mut params = LevelSetParams::new(sector(0.0, 32.0, 0.0, 32.0), 256, 256);
		params.max_source_pixels = 4000;
		params.smallest_source_pixel_size_deg = Some(0.02);
		let set = build_level_set(&params).unwrap();
		for k in 1..set.depth() {
			let prev = set.level(k as u8 - 1).unwrap();
			let cur = set.level(k as u8).unwrap();
			assert_eq!(cur.tile_delta_lat(), prev.tile_delta_lat() / 2.0);
			assert_eq!(cur.tile_delta_lon(), prev.tile_delta_lon() / 2.0);
		}
	}

	#[test]
	fn non_dividing_level_zero_delta_is_repaired_to_the_global_grid() {
		let mut params = LevelSetParams::new(Sector::full_sphere(), 512, 512);
		params.level_zero_delta = Some((50.0, 50.0)); // doesn't divide 180 or 360
		let set = build_level_set(&params).unwrap();
		assert_eq!(set.tile_origin(), LatLon::new(-90.0, -180.0).unwrap());
		assert!(divides_integrally(180.0, set.level_zero_delta().0));
		assert!(divides_integrally(360.0, set.level_zero_delta().1));
		assert!(set.level_zero_delta().0 <= 50.0);
		assert!(set.level_zero_delta().1 <= 50.0);
	}

	#[test]
	fn cleanly_dividing_level_zero_delta_is_left_alone() {
		// full sphere split at the prime meridian, 36 degree tiles divide evenly.
		let mut params = LevelSetParams::new(Sector::full_sphere(), 512, 512);
		params.level_zero_delta = Some((36.0, 36.0));
		let set = build_level_set(&params).unwrap();
		assert_eq!(set.level_zero_delta(), (36.0, 36.0));
		assert_eq!(set.tile_origin(), LatLon::new(-90.0, -180.0).unwrap());
	}

	#[rstest]
	#[case("3", MaxLevelLimit::Absolute(3))]
	#[case("Auto", MaxLevelLimit::Percent(50.0))]
	#[case("auto", MaxLevelLimit::Percent(50.0))]
	#[case("25%", MaxLevelLimit::Percent(25.0))]
	fn parses_every_accepted_form(#[case] input: &str, #[case] expected: MaxLevelLimit) {
		assert_eq!(parse_max_level_limit(input).unwrap(), expected);
	}

	#[test]
	fn rejects_unrecognized_max_level_limit() {
		assert!(parse_max_level_limit("banana").is_err());
	}

	#[test]
	fn integer_form_is_tried_before_auto_or_percent() {
		// A literal "50" must resolve to Absolute(50), never to the 50%-Auto reading.
		assert_eq!(parse_max_level_limit("50").unwrap(), MaxLevelLimit::Absolute(50));
	}

	#[rstest]
	#[case(6, None, 6)]
	#[case(6, Some(MaxLevelLimit::Absolute(3)), 3)]
	#[case(6, Some(MaxLevelLimit::Absolute(20)), 6)]
	#[case(6, Some(MaxLevelLimit::Percent(50.0)), 3)]
	#[case(1, Some(MaxLevelLimit::Percent(10.0)), 1)]
	fn level_cap_treats_the_capped_level_as_deepest(#[case] computed: u8, #[case] limit: Option<MaxLevelLimit>, #[case] expected: u8) {
		assert_eq!(apply_level_cap(computed, limit), expected);
	}

	#[test]
	fn num_empty_levels_marks_the_coarsest_levels() {
		let mut params = LevelSetParams::new(sector(0.0, 32.0, 0.0, 32.0), 256, 256);
		params.max_source_pixels = 4000;
		params.smallest_source_pixel_size_deg = Some(0.02);
		params.num_empty_levels = 2;
		let set = build_level_set(&params).unwrap();
		assert!(set.level(0).unwrap().is_empty());
		assert!(set.level(1).unwrap().is_empty());
		assert!(!set.finest().unwrap().is_empty());
	}
}
