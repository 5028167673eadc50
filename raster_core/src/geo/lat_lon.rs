//! An immutable, validated (latitude, longitude) point in degrees.

use super::Angle;
use crate::error::RasterError;
use anyhow::{Result, bail};

/// A point on the sphere, expressed as degrees of latitude and longitude.
///
/// Used as the `tileOrigin` anchor from which row/column indices of a
/// [`super::LevelSet`] are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LatLon {
	lat: Angle,
	lon: Angle,
}

impl LatLon {
	/// Creates a `LatLon`, rejecting NaN, infinite, or out-of-range values.
	///
	/// Latitude must lie in `[-90°, 90°]`; longitude in `[-180°, 180°]`.
	pub fn new(lat: f64, lon: f64) -> Result<Self> {
		if !(-90.0..=90.0).contains(&lat) {
			bail!(RasterError::InvalidArgument(format!("latitude {lat} outside [-90, 90]")));
		}
		if !(-180.0..=180.0).contains(&lon) {
			bail!(RasterError::InvalidArgument(format!("longitude {lon} outside [-180, 180]")));
		}
		Ok(Self {
			lat: Angle::new(lat)?,
			lon: Angle::new(lon)?,
		})
	}

	#[must_use]
	pub fn lat(&self) -> f64 {
		self.lat.degrees()
	}

	#[must_use]
	pub fn lon(&self) -> f64 {
		self.lon.degrees()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_out_of_range() {
		assert!(LatLon::new(91.0, 0.0).is_err());
		assert!(LatLon::new(0.0, 181.0).is_err());
		assert!(LatLon::new(f64::NAN, 0.0).is_err());
	}

	#[test]
	fn accepts_boundary_values() {
		let p = LatLon::new(-90.0, -180.0).unwrap();
		assert_eq!(p.lat(), -90.0);
		assert_eq!(p.lon(), -180.0);

		let p = LatLon::new(90.0, 180.0).unwrap();
		assert_eq!(p.lat(), 90.0);
		assert_eq!(p.lon(), 180.0);
	}
}
