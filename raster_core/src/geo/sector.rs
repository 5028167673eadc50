//! Axis-aligned latitude/longitude rectangle: the coverage unit used
//! throughout the pipeline (source extents, tile extents, level-set
//! coverage, mosaic requests).

use crate::error::RasterError;
use anyhow::{Result, bail};
use std::fmt;

/// An immutable axis-aligned rectangle in degrees of latitude/longitude.
///
/// Invariants: `min_lat <= max_lat`, `min_lon <= max_lon`, all four angles
/// finite and within the sphere's range. Equality and hashing are exact on
/// the four angles (bit-exact, like [`super::Angle`]).
#[derive(Clone, Copy, PartialEq)]
pub struct Sector {
	min_lat: f64,
	max_lat: f64,
	min_lon: f64,
	max_lon: f64,
}

impl Eq for Sector {}

impl std::hash::Hash for Sector {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.min_lat.to_bits().hash(state);
		self.max_lat.to_bits().hash(state);
		self.min_lon.to_bits().hash(state);
		self.max_lon.to_bits().hash(state);
	}
}

impl Sector {
	/// Creates a new `Sector`, validating ranges and ordering.
	pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
		Self::checked(min_lat, max_lat, min_lon, max_lon)
	}

	fn checked(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
		for (name, v) in [("min_lat", min_lat), ("max_lat", max_lat), ("min_lon", min_lon), ("max_lon", max_lon)] {
			if !v.is_finite() {
				bail!(RasterError::InvalidArgument(format!("sector.{name} = {v} is not finite")));
			}
		}
		if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
			bail!(RasterError::InvalidArgument(format!(
				"sector latitudes [{min_lat}, {max_lat}] outside [-90, 90]"
			)));
		}
		if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
			bail!(RasterError::InvalidArgument(format!(
				"sector longitudes [{min_lon}, {max_lon}] outside [-180, 180]"
			)));
		}
		if min_lat > max_lat {
			bail!(RasterError::InvalidArgument(format!("sector min_lat {min_lat} > max_lat {max_lat}")));
		}
		if min_lon > max_lon {
			bail!(RasterError::InvalidArgument(format!("sector min_lon {min_lon} > max_lon {max_lon}")));
		}
		Ok(Self { min_lat, max_lat, min_lon, max_lon })
	}

	/// The full sphere: `(-90°, 90°, -180°, 180°)`.
	#[must_use]
	pub fn full_sphere() -> Self {
		Self { min_lat: -90.0, max_lat: 90.0, min_lon: -180.0, max_lon: 180.0 }
	}

	/// A designated empty sector of zero area, sorting as "no coverage".
	#[must_use]
	pub fn empty() -> Self {
		Self { min_lat: 0.0, max_lat: 0.0, min_lon: 0.0, max_lon: 0.0 }
	}

	#[must_use]
	pub fn min_lat(&self) -> f64 {
		self.min_lat
	}

	#[must_use]
	pub fn max_lat(&self) -> f64 {
		self.max_lat
	}

	#[must_use]
	pub fn min_lon(&self) -> f64 {
		self.min_lon
	}

	#[must_use]
	pub fn max_lon(&self) -> f64 {
		self.max_lon
	}

	#[must_use]
	pub fn delta_lat(&self) -> f64 {
		self.max_lat - self.min_lat
	}

	#[must_use]
	pub fn delta_lon(&self) -> f64 {
		self.max_lon - self.min_lon
	}

	/// True iff this sector has zero area on either axis.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.delta_lat() <= 0.0 || self.delta_lon() <= 0.0
	}

	/// True iff this sector touches or crosses the ±180° meridian. Relevant
	/// only for global-coverage datasets; this implementation never produces
	/// wrap-around sectors (`min_lon <= max_lon` always holds), so this is a
	/// boundary test rather than a wraparound test.
	#[must_use]
	pub fn touches_antimeridian(&self) -> bool {
		self.min_lon <= -180.0 || self.max_lon >= 180.0
	}

	/// True iff both deltas of the intersection are strictly positive.
	/// Edge-only contact (touching, zero-area intersection) returns false.
	#[must_use]
	pub fn intersects(&self, other: &Sector) -> bool {
		let lat = self.max_lat.min(other.max_lat) - self.min_lat.max(other.min_lat);
		let lon = self.max_lon.min(other.max_lon) - self.min_lon.max(other.min_lon);
		lat > 0.0 && lon > 0.0
	}

	/// The coordinate-wise clamp of the two sectors, or `None` if they don't
	/// intersect (per [`Sector::intersects`]).
	#[must_use]
	pub fn intersection(&self, other: &Sector) -> Option<Sector> {
		if !self.intersects(other) {
			return None;
		}
		Some(Sector {
			min_lat: self.min_lat.max(other.min_lat),
			max_lat: self.max_lat.min(other.max_lat),
			min_lon: self.min_lon.max(other.min_lon),
			max_lon: self.max_lon.min(other.max_lon),
		})
	}

	/// The smallest enclosing `Sector` of `self` and `other`.
	#[must_use]
	pub fn union(&self, other: &Sector) -> Sector {
		Sector {
			min_lat: self.min_lat.min(other.min_lat),
			max_lat: self.max_lat.max(other.max_lat),
			min_lon: self.min_lon.min(other.min_lon),
			max_lon: self.max_lon.max(other.max_lon),
		}
	}

	/// `union(None, s) = s`; folds an optional accumulator with a new sector.
	#[must_use]
	pub fn union_opt(acc: Option<Sector>, s: &Sector) -> Sector {
		match acc {
			Some(a) => a.union(s),
			None => *s,
		}
	}

	/// Splits this sector into four quadrant children, ordered NW, NE, SE, SW.
	#[must_use]
	pub fn split_quadrants(&self) -> [Sector; 4] {
		let mid_lat = (self.min_lat + self.max_lat) / 2.0;
		let mid_lon = (self.min_lon + self.max_lon) / 2.0;
		[
			Sector { min_lat: mid_lat, max_lat: self.max_lat, min_lon: self.min_lon, max_lon: mid_lon }, // NW
			Sector { min_lat: mid_lat, max_lat: self.max_lat, min_lon: mid_lon, max_lon: self.max_lon }, // NE
			Sector { min_lat: self.min_lat, max_lat: mid_lat, min_lon: mid_lon, max_lon: self.max_lon }, // SE
			Sector { min_lat: self.min_lat, max_lat: mid_lat, min_lon: self.min_lon, max_lon: mid_lon }, // SW
		]
	}
}

impl fmt::Debug for Sector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Sector {{ min_lat: {}, max_lat: {}, min_lon: {}, max_lon: {} }}",
			self.min_lat, self.max_lat, self.min_lon, self.max_lon
		)
	}
}

impl TryFrom<[f64; 4]> for Sector {
	type Error = anyhow::Error;

	fn try_from(v: [f64; 4]) -> Result<Self> {
		Sector::new(v[0], v[1], v[2], v[3])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn rejects_inverted_and_out_of_range() {
		assert!(Sector::new(10.0, 0.0, 0.0, 10.0).is_err());
		assert!(Sector::new(0.0, 10.0, 10.0, 0.0).is_err());
		assert!(Sector::new(-91.0, 0.0, 0.0, 10.0).is_err());
		assert!(Sector::new(0.0, 0.0, 0.0, 181.0).is_err());
	}

	#[rstest]
	#[case((0.0, 10.0, 0.0, 10.0), (5.0, 15.0, 5.0, 15.0), true)]
	#[case((0.0, 10.0, 0.0, 10.0), (10.0, 20.0, 10.0, 20.0), false)] // edge-only touching
	#[case((0.0, 10.0, 0.0, 10.0), (20.0, 30.0, 20.0, 30.0), false)]
	fn intersects_matches_expectation(#[case] a: (f64, f64, f64, f64), #[case] b: (f64, f64, f64, f64), #[case] expected: bool) {
		let sa = Sector::new(a.0, a.1, a.2, a.3).unwrap();
		let sb = Sector::new(b.0, b.1, b.2, b.3).unwrap();
		assert_eq!(sa.intersects(&sb), expected);
	}

	#[test]
	fn intersection_is_coordinate_wise_clamp() {
		let a = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let b = Sector::new(5.0, 15.0, 5.0, 15.0).unwrap();
		let i = a.intersection(&b).unwrap();
		assert_eq!((i.min_lat(), i.max_lat(), i.min_lon(), i.max_lon()), (5.0, 10.0, 5.0, 10.0));
	}

	#[test]
	fn intersection_none_when_disjoint() {
		let a = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let b = Sector::new(20.0, 30.0, 20.0, 30.0).unwrap();
		assert!(a.intersection(&b).is_none());
	}

	#[test]
	fn union_is_smallest_enclosing_rectangle() {
		let a = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let b = Sector::new(5.0, 20.0, -5.0, 8.0).unwrap();
		let u = a.union(&b);
		assert_eq!((u.min_lat(), u.max_lat(), u.min_lon(), u.max_lon()), (0.0, 20.0, -5.0, 10.0));
	}

	#[test]
	fn union_opt_none_is_identity() {
		let s = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		assert_eq!(Sector::union_opt(None, &s), s);
	}

	#[test]
	fn deltas_are_exact() {
		let s = Sector::new(0.0, 10.0, -5.0, 15.0).unwrap();
		assert_eq!(s.delta_lat(), 10.0);
		assert_eq!(s.delta_lon(), 20.0);
	}

	#[test]
	fn empty_sector_has_zero_area() {
		assert!(Sector::empty().is_empty());
	}

	#[test]
	fn split_quadrants_are_contiguous_and_cover_parent() {
		let s = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let [nw, ne, se, sw] = s.split_quadrants();
		let recombined = nw.union(&ne).union(&se).union(&sw);
		assert_eq!(recombined, s);
	}

	#[test]
	fn touches_antimeridian_detects_global_edges() {
		assert!(Sector::full_sphere().touches_antimeridian());
		assert!(!Sector::new(0.0, 10.0, 0.0, 10.0).unwrap().touches_antimeridian());
	}

	#[test]
	fn equal_sectors_hash_equal() {
		use std::collections::hash_map::DefaultHasher;
		use std::hash::{Hash, Hasher};

		let a = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let b = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let c = Sector::new(0.0, 10.0, 0.0, 11.0).unwrap();
		assert_eq!(a, b);
		assert_ne!(a, c);

		let hash = |s: &Sector| {
			let mut hasher = DefaultHasher::new();
			s.hash(&mut hasher);
			hasher.finish()
		};
		assert_eq!(hash(&a), hash(&b));
		assert_ne!(hash(&a), hash(&c));
	}
}
