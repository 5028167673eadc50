//! The two XML documents a production run installs:
//!
//! - the dataset descriptor, `{dataCacheName}.xml`, describing the pyramid
//!   geometry and raster shape of one dataset;
//! - the raster-server catalog descriptor, `{dataCacheName}.RasterServer.xml`,
//!   listing `{path, sector}` per offered source plus display properties.

use anyhow::{Context, Result, bail};
use raster_core::{ByteOrder, DataType, LatLon, LevelSet, PixelFormat, RasterError, Sector};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A `LatLon` as it appears on the wire: degrees or radians, tagged by a
/// `unit` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonXml {
	#[serde(rename = "@unit", default = "default_unit")]
	pub unit: AngleUnit,
	#[serde(rename = "@lat")]
	pub lat: f64,
	#[serde(rename = "@lon")]
	pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
	Degrees,
	Radians,
}

fn default_unit() -> AngleUnit {
	AngleUnit::Degrees
}

impl LatLonXml {
	#[must_use]
	pub fn from_degrees(lat: f64, lon: f64) -> Self {
		Self { unit: AngleUnit::Degrees, lat, lon }
	}

	/// Converts to degrees regardless of the wire unit.
	#[must_use]
	pub fn to_degrees(self) -> (f64, f64) {
		match self.unit {
			AngleUnit::Degrees => (self.lat, self.lon),
			AngleUnit::Radians => (self.lat.to_degrees(), self.lon.to_degrees()),
		}
	}
}

/// A `Sector` as it appears on the wire: always two `LatLon` corners,
/// independently unit-tagged (one corner could be in degrees, the other in
/// radians, however unlikely — the unit lives on the `LatLon` element,
/// not the sector).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorXml {
	pub min: LatLonXml,
	pub max: LatLonXml,
}

impl SectorXml {
	#[must_use]
	pub fn from_sector(sector: Sector) -> Self {
		Self { min: LatLonXml::from_degrees(sector.min_lat(), sector.min_lon()), max: LatLonXml::from_degrees(sector.max_lat(), sector.max_lon()) }
	}

	/// Converts to a validated [`Sector`], normalizing both corners to degrees.
	///
	/// # Errors
	///
	/// Returns an error if the resulting corners do not form a valid sector
	/// (see [`Sector::new`]).
	pub fn to_sector(self) -> Result<Sector> {
		let (min_lat, min_lon) = self.min.to_degrees();
		let (max_lat, max_lon) = self.max.to_degrees();
		Sector::new(min_lat, max_lat, min_lon, max_lon)
	}
}

/// The dataset descriptor: `{fileStoreLocation}/{dataCacheName}.xml`.
/// Written after a successful production run once the pyramid is fully on
/// disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Dataset")]
pub struct DatasetDescriptor {
	#[serde(rename = "@name")]
	pub dataset_name: String,
	pub display_name: String,
	pub sector: SectorXml,
	pub num_levels: u8,
	pub level_zero_tile_delta: TileDeltaXml,
	pub tile_origin: LatLonXml,
	pub tile_width: u32,
	pub tile_height: u32,
	pub pixel_format: PixelFormat,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub data_type: Option<DataType>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub byte_order: Option<ByteOrder>,
	pub format_suffix: String,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub elevation_min: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub elevation_max: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub missing_data_signal: Option<f64>,
	/// Present (and network-backed) iff the dataset offers a `serviceName`;
	/// absent marks the dataset offline.
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub service_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileDeltaXml {
	#[serde(rename = "@lat")]
	pub lat: f64,
	#[serde(rename = "@lon")]
	pub lon: f64,
}

impl DatasetDescriptor {
	/// Builds a descriptor from a completed [`LevelSet`] and the dataset's
	/// raster shape.
	#[must_use]
	#[allow(clippy::too_many_arguments)]
	pub fn from_level_set(
		dataset_name: &str,
		display_name: &str,
		level_set: &LevelSet,
		pixel_format: PixelFormat,
		data_type: Option<DataType>,
		byte_order: Option<ByteOrder>,
		format_suffix: &str,
		missing_data_signal: Option<f64>,
		service_name: Option<&str>,
	) -> Self {
		let finest = level_set.finest();
		Self {
			dataset_name: dataset_name.to_string(),
			display_name: display_name.to_string(),
			sector: SectorXml::from_sector(level_set.coverage()),
			num_levels: u8::try_from(level_set.depth()).unwrap_or(u8::MAX),
			level_zero_tile_delta: TileDeltaXml { lat: level_set.level_zero_delta().0, lon: level_set.level_zero_delta().1 },
			tile_origin: LatLonXml::from_degrees(level_set.tile_origin().lat(), level_set.tile_origin().lon()),
			tile_width: finest.map_or(512, raster_core::Level::tile_width),
			tile_height: finest.map_or(512, raster_core::Level::tile_height),
			pixel_format,
			data_type,
			byte_order,
			format_suffix: format_suffix.to_string(),
			elevation_min: None,
			elevation_max: None,
			missing_data_signal,
			service_name: service_name.map(str::to_string),
		}
	}

	/// The tile origin as a validated [`LatLon`].
	///
	/// # Errors
	///
	/// Returns an error if the stored angles are out of range.
	pub fn tile_origin_lat_lon(&self) -> Result<LatLon> {
		let (lat, lon) = self.tile_origin.to_degrees();
		LatLon::new(lat, lon)
	}
}

/// One source entry in the raster-server catalog descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSource {
	pub path: String,
	pub sector: SectorXml,
}

/// The raster-server catalog descriptor:
/// `{fileStoreLocation}/{dataCacheName}.RasterServer.xml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "RasterServerConfigDocument")]
pub struct RasterServerCatalog {
	pub display_name: String,
	pub cache_name: String,
	#[serde(rename = "Source", default)]
	pub sources: Vec<CatalogSource>,
}

/// Writes `descriptor` as an XML document, preceded by the standard XML
/// declaration.
///
/// # Errors
///
/// Returns an error if serialization or the filesystem write fails.
pub fn write_dataset_descriptor(path: &Path, descriptor: &DatasetDescriptor) -> Result<()> {
	write_xml(path, descriptor)
}

/// Parses a dataset descriptor previously written by
/// [`write_dataset_descriptor`].
///
/// # Errors
///
/// Returns an error if `xml` does not parse as a [`DatasetDescriptor`].
pub fn read_dataset_descriptor(xml: &str) -> Result<DatasetDescriptor> {
	quick_xml::de::from_str(xml).map_err(|e| anyhow::anyhow!(RasterError::InvalidArgument(format!("invalid dataset descriptor: {e}"))))
}

/// Writes `catalog` as an XML document.
///
/// # Errors
///
/// Returns an error if serialization or the filesystem write fails.
pub fn write_raster_server_catalog(path: &Path, catalog: &RasterServerCatalog) -> Result<()> {
	write_xml(path, catalog)
}

/// Parses a raster-server catalog descriptor previously written by
/// [`write_raster_server_catalog`] (or hand-authored; parsing accepts
/// sector corners in either radians or degrees).
///
/// # Errors
///
/// Returns an error if `xml` does not parse as a [`RasterServerCatalog`].
pub fn parse_raster_server_catalog(xml: &str) -> Result<RasterServerCatalog> {
	quick_xml::de::from_str(xml).map_err(|e| anyhow::anyhow!(RasterError::InvalidArgument(format!("invalid raster-server catalog: {e}"))))
}

fn write_xml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
	let body = quick_xml::se::to_string(value).map_err(|e| anyhow::anyhow!(RasterError::IoError(format!("serializing {}: {e}", path.display()))))?;
	let document = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n");
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
	}
	std::fs::write(path, document).with_context(|| format!("writing {}", path.display()))?;
	Ok(())
}
