//! `Level`/`LevelSet`: the pyramid's geometry, independent of any
//! particular dataset's pixel content.
//!
//! Construction policy — how many levels a dataset needs, how
//! `tileDelta` is chosen, the large-dataset threshold and max-level-limit
//! repair — lives in `raster_pipeline::level_set`, which assembles these
//! plain data types; this module only describes their shape.

use crate::geo::{LatLon, Sector};

/// One level of the pyramid: its tile dimensions in pixels and the
/// geographic span (`tileDelta`) a single tile covers at this level.
///
/// `tile_delta` halves between successive levels (finer levels have
/// smaller `tile_delta`); level 0 is the coarsest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
	level_index: u8,
	tile_width: u32,
	tile_height: u32,
	tile_delta_lat: f64,
	tile_delta_lon: f64,
	/// Set when this level has no source coverage at all and is skipped
	/// during composition.
	empty: bool,
}

impl Level {
	#[must_use]
	pub fn new(level_index: u8, tile_width: u32, tile_height: u32, tile_delta_lat: f64, tile_delta_lon: f64) -> Self {
		Self { level_index, tile_width, tile_height, tile_delta_lat, tile_delta_lon, empty: false }
	}

	#[must_use]
	pub fn with_empty(mut self, empty: bool) -> Self {
		self.empty = empty;
		self
	}

	#[must_use]
	pub fn level_index(&self) -> u8 {
		self.level_index
	}

	#[must_use]
	pub fn tile_width(&self) -> u32 {
		self.tile_width
	}

	#[must_use]
	pub fn tile_height(&self) -> u32 {
		self.tile_height
	}

	#[must_use]
	pub fn tile_delta_lat(&self) -> f64 {
		self.tile_delta_lat
	}

	#[must_use]
	pub fn tile_delta_lon(&self) -> f64 {
		self.tile_delta_lon
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.empty
	}

	/// The level one step coarser than this one, halving tile resolution in
	/// degrees (doubling `tile_delta` on both axes).
	#[must_use]
	pub fn coarser(&self) -> Self {
		Self {
			level_index: self.level_index.saturating_sub(1),
			tile_width: self.tile_width,
			tile_height: self.tile_height,
			tile_delta_lat: self.tile_delta_lat * 2.0,
			tile_delta_lon: self.tile_delta_lon * 2.0,
			empty: false,
		}
	}
}

/// An ordered pyramid of [`Level`]s, anchored at `tile_origin` and bounded
/// by `coverage`.
///
/// `levels[0]` is the coarsest (level 0); `tile_delta` halves at each
/// successive index. `level_zero_delta` is kept alongside the vector
/// because it is the quantity the construction policy derives every other
/// level's delta from, and callers often need it directly rather than
/// re-deriving it from `levels[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
	levels: Vec<Level>,
	coverage: Sector,
	tile_origin: LatLon,
	level_zero_delta: (f64, f64),
}

impl LevelSet {
	#[must_use]
	pub fn new(levels: Vec<Level>, coverage: Sector, tile_origin: LatLon, level_zero_delta: (f64, f64)) -> Self {
		Self { levels, coverage, tile_origin, level_zero_delta }
	}

	#[must_use]
	pub fn levels(&self) -> &[Level] {
		&self.levels
	}

	#[must_use]
	pub fn coverage(&self) -> Sector {
		self.coverage
	}

	#[must_use]
	pub fn tile_origin(&self) -> LatLon {
		self.tile_origin
	}

	#[must_use]
	pub fn level_zero_delta(&self) -> (f64, f64) {
		self.level_zero_delta
	}

	/// The highest-resolution (last) level, if any level is present.
	#[must_use]
	pub fn finest(&self) -> Option<&Level> {
		self.levels.last()
	}

	/// The level at `index`, if present.
	#[must_use]
	pub fn level(&self, index: u8) -> Option<&Level> {
		self.levels.get(index as usize)
	}

	#[must_use]
	pub fn depth(&self) -> usize {
		self.levels.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn origin() -> LatLon {
		LatLon::new(-90.0, -180.0).unwrap()
	}

	#[test]
	fn coarser_halves_resolution_and_steps_index_down() {
		let l1 = Level::new(1, 256, 256, 0.5, 0.5);
		let l0 = l1.coarser();
		assert_eq!(l0.level_index(), 0);
		assert_eq!(l0.tile_delta_lat(), 1.0);
		assert_eq!(l0.tile_delta_lon(), 1.0);
	}

	#[rstest]
	#[case(0, true)]
	#[case(1, true)]
	#[case(2, false)]
	fn level_lookup_respects_bounds(#[case] index: u8, #[case] present: bool) {
		let set = LevelSet::new(
			vec![Level::new(0, 256, 256, 1.0, 1.0), Level::new(1, 256, 256, 0.5, 0.5)],
			Sector::full_sphere(),
			origin(),
			(1.0, 1.0),
		);
		assert_eq!(set.level(index).is_some(), present);
	}

	#[test]
	fn finest_is_last_level() {
		let set = LevelSet::new(
			vec![Level::new(0, 256, 256, 1.0, 1.0), Level::new(1, 256, 256, 0.5, 0.5)],
			Sector::full_sphere(),
			origin(),
			(1.0, 1.0),
		);
		assert_eq!(set.finest().unwrap().level_index(), 1);
		assert_eq!(set.depth(), 2);
	}

	#[test]
	fn empty_flag_is_carried_explicitly() {
		let level = Level::new(0, 256, 256, 1.0, 1.0).with_empty(true);
		assert!(level.is_empty());
	}
}
