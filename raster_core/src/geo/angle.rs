//! Exact interval arithmetic over a single coordinate axis, in degrees.

use crate::error::RasterError;
use anyhow::{Result, bail};
use std::fmt;

/// A single latitude or longitude value, in degrees.
///
/// `Angle` only rejects non-finite values; range checking (`[-90°, 90°]` for
/// latitude, `[-180°, 180°]` for longitude) is the responsibility of the
/// types that embed it ([`super::LatLon`], [`super::Sector`]), since the
/// valid range depends on which axis the angle denotes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Angle(f64);

impl Angle {
	/// Creates an `Angle`, rejecting NaN and infinite values.
	pub fn new(degrees: f64) -> Result<Self> {
		if !degrees.is_finite() {
			bail!(RasterError::InvalidArgument(format!("angle {degrees} is not finite")));
		}
		Ok(Self(degrees))
	}

	/// The angle's value in degrees.
	#[must_use]
	pub fn degrees(self) -> f64 {
		self.0
	}

	/// The exact midpoint between two angles, used to split a tile into four children.
	#[must_use]
	pub fn mid_angle(a: Angle, b: Angle) -> Angle {
		Angle((a.0 + b.0) / 2.0)
	}
}

impl fmt::Display for Angle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Eq for Angle {}

#[allow(clippy::derive_ord_xor_partial_ord)]
impl Ord for Angle {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.0.partial_cmp(&other.0).expect("Angle is always finite")
	}
}

impl std::hash::Hash for Angle {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.0.to_bits().hash(state);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn rejects_nan_and_infinite() {
		assert!(Angle::new(f64::NAN).is_err());
		assert!(Angle::new(f64::INFINITY).is_err());
		assert!(Angle::new(f64::NEG_INFINITY).is_err());
	}

	#[rstest]
	#[case(0.0, 10.0, 5.0)]
	#[case(-10.0, 10.0, 0.0)]
	#[case(170.0, -170.0, 0.0)]
	fn mid_angle_is_exact_midpoint(#[case] a: f64, #[case] b: f64, #[case] expected: f64) {
		let mid = Angle::mid_angle(Angle::new(a).unwrap(), Angle::new(b).unwrap());
		assert_eq!(mid.degrees(), expected);
	}

	#[test]
	fn angles_compare_and_hash() {
		let a = Angle::new(1.0).unwrap();
		let b = Angle::new(1.0).unwrap();
		assert_eq!(a, b);
		assert!(Angle::new(2.0).unwrap() > a);
	}
}
