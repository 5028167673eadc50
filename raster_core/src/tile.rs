//! `Tile`: a (sector, level, row, column) descriptor — the unit of
//! persistence for the pyramid.

use crate::geo::{LatLon, Sector, compute_column, compute_row};
use std::path::PathBuf;

/// A single (level, row, column) tile and its geographic sector.
///
/// Tiles are ephemeral descriptors; a materialized tile raster lives only
/// from creation until writer-pool acceptance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
	level: u8,
	row: u32,
	col: u32,
	sector: Sector,
}

impl Tile {
	#[must_use]
	pub fn new(level: u8, row: u32, col: u32, sector: Sector) -> Self {
		Self { level, row, col, sector }
	}

	/// Constructs the `Tile` covering `(row, col)` at `level`, given the
	/// level's `tile_origin` and `tile_delta` (in degrees).
	pub fn at(level: u8, row: u32, col: u32, tile_origin: LatLon, tile_delta_lat: f64, tile_delta_lon: f64) -> anyhow::Result<Self> {
		let min_lat = tile_origin.lat() + f64::from(row) * tile_delta_lat;
		let min_lon = tile_origin.lon() + f64::from(col) * tile_delta_lon;
		let sector = Sector::new(min_lat, min_lat + tile_delta_lat, min_lon, min_lon + tile_delta_lon)?;
		Ok(Self { level, row, col, sector })
	}

	#[must_use]
	pub fn level(&self) -> u8 {
		self.level
	}

	#[must_use]
	pub fn row(&self) -> u32 {
		self.row
	}

	#[must_use]
	pub fn col(&self) -> u32 {
		self.col
	}

	#[must_use]
	pub fn sector(&self) -> Sector {
		self.sector
	}

	/// The row index a point at `lat` falls into, measured from `origin`.
	#[must_use]
	pub fn row_for(lat: f64, origin: LatLon, tile_delta_lat: f64) -> i64 {
		compute_row(lat, origin.lat(), tile_delta_lat)
	}

	/// The column index a point at `lon` falls into, measured from `origin`.
	#[must_use]
	pub fn col_for(lon: f64, origin: LatLon, tile_delta_lon: f64) -> i64 {
		compute_column(lon, origin.lon(), tile_delta_lon)
	}

	/// The deterministic persistence path for this tile, relative to the
	/// dataset root: `{level}/{row}/{row}_{col}.{suffix}`, row and column
	/// zero-padded to 8 ASCII digits.
	#[must_use]
	pub fn relative_path(&self, suffix: &str) -> PathBuf {
		PathBuf::from(self.level.to_string())
			.join(format!("{:08}", self.row))
			.join(format!("{:08}_{:08}.{}", self.row, self.col, suffix))
	}
}
