//! Geo primitives: exact interval arithmetic over the sphere in degrees,
//! used as the foundation for every other component.

mod angle;
mod lat_lon;
mod sector;

pub use angle::Angle;
pub use lat_lon::LatLon;
pub use sector::Sector;

/// `⌊(value − origin) / delta⌋` — the row (or column) index whose span
/// `[row·delta, (row+1)·delta)` contains `value`, measured from `origin`.
#[must_use]
pub fn compute_row(value: f64, origin: f64, delta: f64) -> i64 {
	((value - origin) / delta).floor() as i64
}

/// Alias of [`compute_row`] for the longitude axis; the formula is
/// identical, but kept as a distinct name to match the call sites that read
/// `compute_column(lon, origin.lon(), tile_delta_lon)`.
#[must_use]
pub fn compute_column(value: f64, origin: f64, delta: f64) -> i64 {
	compute_row(value, origin, delta)
}
