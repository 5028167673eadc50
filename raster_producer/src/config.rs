//! Typed configuration façade over the recognized configuration keys,
//! loaded from a TOML document.
//!
//! The source passes a dynamic key-value bag everywhere; here we expose two
//! small records instead — [`RasterConfig`] for the raster-shape properties
//! every dataset needs, and [`ProducerConfig`] for the placement and pyramid
//! inputs store setup consumes — plus an `extra` map for the long tail of
//! rarely-used keys.

use anyhow::Result;
use raster_core::{ByteOrder, DataType, PixelFormat, RasterError};
use raster_pipeline::MaxLevelLimit;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The raster-shape properties shared by every tile in a dataset: pixel
/// dimensions, kind, sample encoding, and the wire format. Write-once on
/// `tile_width`/`tile_height` is enforced by [`raster_core::MetadataBag`]
/// once these values reach it; here they are plain fields validated once at
/// load time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterConfig {
	#[serde(default = "default_tile_dimension")]
	pub tile_width: u32,
	#[serde(default = "default_tile_dimension")]
	pub tile_height: u32,
	pub pixel_format: PixelFormat,
	#[serde(default)]
	pub data_type: Option<DataType>,
	#[serde(default)]
	pub byte_order: Option<ByteOrder>,
	/// Written into empty tile pixels; also the scalar "missing-data signal"
	/// compared bit-exactly by [`raster_core::raster::ScalarRaster`].
	#[serde(default)]
	pub missing_data_replacement: Option<f64>,
	/// Wire MIME type for output tiles, e.g. `"image/png"`.
	#[serde(default)]
	pub image_format: Option<String>,
	/// Filesystem extension for output tiles; derived from `image_format`
	/// if absent, and vice versa.
	#[serde(default)]
	pub format_suffix: Option<String>,
}

fn default_tile_dimension() -> u32 {
	512
}

impl RasterConfig {
	/// Validates that a scalar dataset declares a `data_type`, and resolves
	/// `image_format`/`format_suffix` so exactly one of the pair being set
	/// derives the other.
	///
	/// # Errors
	///
	/// Returns [`RasterError::InvalidArgument`] if `pixel_format` is
	/// `Elevation` and no `data_type` was given, or if neither
	/// `image_format` nor `format_suffix` was given and no default applies.
	pub fn resolve(&mut self) -> Result<()> {
		if self.pixel_format == PixelFormat::Elevation && self.data_type.is_none() {
			anyhow::bail!(RasterError::InvalidArgument("dataType is required for ELEVATION datasets".to_string()));
		}
		match (&self.image_format, &self.format_suffix) {
			(Some(mime), None) => self.format_suffix = Some(suffix_for_mime(mime)?),
			(None, Some(suffix)) => self.image_format = Some(mime_for_suffix(suffix)?),
			(None, None) => {
				let (mime, suffix) = default_format(self.pixel_format);
				self.image_format = Some(mime.to_string());
				self.format_suffix = Some(suffix.to_string());
			}
			(Some(_), Some(_)) => {}
		}
		Ok(())
	}

	#[must_use]
	pub fn format_suffix(&self) -> String {
		self.format_suffix.clone().unwrap_or_else(|| default_format(self.pixel_format).1.to_string())
	}
}

fn default_format(pixel_format: PixelFormat) -> (&'static str, &'static str) {
	match pixel_format {
		PixelFormat::Image => ("image/png", "png"),
		PixelFormat::Elevation => ("application/octet-stream", "bil"),
	}
}

fn suffix_for_mime(mime: &str) -> Result<String> {
	Ok(match mime {
		"image/png" => "png",
		"image/jpeg" => "jpg",
		"application/octet-stream" => "bil",
		other => anyhow::bail!(RasterError::InvalidArgument(format!("imageFormat {other:?} has no known formatSuffix"))),
	}
	.to_string())
}

fn mime_for_suffix(suffix: &str) -> Result<String> {
	Ok(match suffix {
		"png" => "image/png",
		"jpg" | "jpeg" => "image/jpeg",
		"bil" => "application/octet-stream",
		other => anyhow::bail!(RasterError::InvalidArgument(format!("formatSuffix {other:?} has no known imageFormat"))),
	}
	.to_string())
}

/// The pyramid-geometry and placement inputs for one production run,
/// loaded from a TOML config file. Any field left unset is derived by
/// [`raster_pipeline::build_level_set`] or the producer driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerConfig {
	pub file_store_location: PathBuf,
	pub data_cache_name: String,
	pub dataset_name: String,
	#[serde(default)]
	pub display_name: Option<String>,
	/// Marks the dataset offline vs. network-backed in the dataset
	/// descriptor.
	#[serde(default)]
	pub service_name: Option<String>,

	#[serde(flatten)]
	pub raster: RasterConfig,

	/// `(min_lat, max_lat, min_lon, max_lon)` in degrees; derived from the
	/// offered sources' coverage union if omitted.
	#[serde(default)]
	pub sector: Option<(f64, f64, f64, f64)>,
	/// `(lat, lon)` in degrees.
	#[serde(default)]
	pub tile_origin: Option<(f64, f64)>,
	/// `(delta_lat, delta_lon)` in degrees.
	#[serde(default)]
	pub level_zero_tile_delta: Option<(f64, f64)>,
	#[serde(default)]
	pub num_levels: Option<u8>,
	#[serde(default)]
	pub num_empty_levels: u8,
	#[serde(default = "default_large_dataset_threshold")]
	pub large_dataset_threshold: u32,
	/// An integer, `"Auto"` (= 50%), or `"{n}%"`; an integer wins when both
	/// forms could apply.
	#[serde(default)]
	pub max_level_limit: Option<String>,
	/// Permutation applied to a source's channels before it is cached and
	/// drawn (see `CachedRasterProxy::with_bands_order`). Must have exactly
	/// 4 entries to take effect; ignored otherwise.
	#[serde(default)]
	pub bands_order: Option<Vec<usize>>,
	/// Writes `{dataCacheName}.RasterServer.xml` alongside the dataset
	/// descriptor after a successful run.
	#[serde(default)]
	pub write_raster_server_catalog: bool,

	/// Rarely-used keys that don't warrant a dedicated field.
	#[serde(flatten)]
	pub extra: BTreeMap<String, toml::Value>,
}

fn default_large_dataset_threshold() -> u32 {
	3000
}

impl ProducerConfig {
	/// Parses a TOML config document from `path`.
	///
	/// # Errors
	///
	/// Returns an error if `path` cannot be read or does not parse as a
	/// valid `ProducerConfig`.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!(RasterError::IoError(format!("reading config {}: {e}", path.display()))))?;
		Self::parse(&text)
	}

	/// Parses a TOML config document from its text.
	///
	/// # Errors
	///
	/// Returns an error if `text` does not parse as a valid `ProducerConfig`.
	pub fn parse(text: &str) -> Result<Self> {
		let mut config: Self = toml::from_str(text).map_err(|e| anyhow::anyhow!(RasterError::InvalidArgument(format!("invalid config: {e}"))))?;
		config.validate()?;
		Ok(config)
	}

	/// `setStoreParameters`'s validation: the three placement keys must be
	/// non-empty, and the raster-shape fields must resolve.
	///
	/// # Errors
	///
	/// Returns [`RasterError::InvalidArgument`] naming every missing or
	/// invalid field, concatenated into one reason string.
	pub fn validate(&mut self) -> Result<()> {
		let mut reasons = Vec::new();
		if self.file_store_location.as_os_str().is_empty() {
			reasons.push("fileStoreLocation is empty".to_string());
		}
		if self.data_cache_name.trim().is_empty() {
			reasons.push("dataCacheName is empty".to_string());
		}
		if self.dataset_name.trim().is_empty() {
			reasons.push("datasetName is empty".to_string());
		}
		if let Err(err) = self.raster.resolve() {
			reasons.push(err.to_string());
		}
		if !reasons.is_empty() {
			anyhow::bail!(RasterError::InvalidArgument(reasons.join("; ")));
		}
		Ok(())
	}

	/// Parses `max_level_limit`, if present. An integer wins over percent
	/// forms when a string is ambiguous — handled by
	/// [`raster_pipeline::parse_max_level_limit`] itself.
	///
	/// # Errors
	///
	/// Returns an error if `max_level_limit` is set but not a recognized form.
	pub fn max_level_limit(&self) -> Result<Option<MaxLevelLimit>> {
		self.max_level_limit.as_deref().map(raster_pipeline::parse_max_level_limit).transpose()
	}

	/// The dataset's root directory: `{fileStoreLocation}/{dataCacheName}`.
	#[must_use]
	pub fn install_location(&self) -> PathBuf {
		self.file_store_location.join(&self.data_cache_name)
	}

	/// The dataset descriptor's path: `{fileStoreLocation}/{dataCacheName}.xml`.
	#[must_use]
	pub fn descriptor_path(&self) -> PathBuf {
		self.file_store_location.join(format!("{}.xml", self.data_cache_name))
	}

	/// The raster-server catalog descriptor's path:
	/// `{fileStoreLocation}/{dataCacheName}.RasterServer.xml`.
	#[must_use]
	pub fn raster_server_catalog_path(&self) -> PathBuf {
		self.file_store_location.join(format!("{}.RasterServer.xml", self.data_cache_name))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn minimal_toml() -> String {
		r#"
		fileStoreLocation = "/tmp/store"
		dataCacheName = "world"
		datasetName = "World Imagery"
		pixelFormat = "IMAGE"
		"#
		.to_string()
	}

	#[test]
	fn loads_minimal_config_with_derived_defaults() {
		let config = ProducerConfig::parse(&minimal_toml()).unwrap();
		assert_eq!(config.raster.tile_width, 512);
		assert_eq!(config.raster.format_suffix(), "png");
		assert_eq!(config.raster.image_format.as_deref(), Some("image/png"));
		assert_eq!(config.large_dataset_threshold, 3000);
	}

	#[test]
	fn missing_required_keys_are_concatenated() {
		let err = ProducerConfig::parse(
			r#"
			fileStoreLocation = ""
			dataCacheName = ""
			datasetName = ""
			pixelFormat = "IMAGE"
			"#,
		)
		.unwrap_err();
		let message = err.to_string();
		assert!(message.contains("fileStoreLocation"));
		assert!(message.contains("dataCacheName"));
		assert!(message.contains("datasetName"));
	}

	#[test]
	fn elevation_dataset_requires_data_type() {
		let err = ProducerConfig::parse(
			r#"
			fileStoreLocation = "/tmp/store"
			dataCacheName = "dem"
			datasetName = "DEM"
			pixelFormat = "ELEVATION"
			"#,
		)
		.unwrap_err();
		assert!(err.to_string().contains("dataType"));
	}

	#[test]
	fn format_suffix_derives_from_image_format() {
		let mut config = ProducerConfig::parse(&minimal_toml()).unwrap();
		config.raster.image_format = Some("image/jpeg".to_string());
		config.raster.format_suffix = None;
		config.raster.resolve().unwrap();
		assert_eq!(config.raster.format_suffix.as_deref(), Some("jpg"));
	}

	#[test]
	fn max_level_limit_parses_percent_and_auto() {
		let mut config = ProducerConfig::parse(&minimal_toml()).unwrap();
		config.max_level_limit = Some("Auto".to_string());
		assert_eq!(config.max_level_limit().unwrap(), Some(MaxLevelLimit::Percent(50.0)));
		config.max_level_limit = Some("4".to_string());
		assert_eq!(config.max_level_limit().unwrap(), Some(MaxLevelLimit::Absolute(4)));
	}

	#[test]
	fn unknown_keys_land_in_the_extension_map() {
		let mut text = minimal_toml();
		text.push_str("someVendorSpecificKey = 42\n");
		let config = ProducerConfig::parse(&text).unwrap();
		assert_eq!(config.extra.get("someVendorSpecificKey").and_then(toml::Value::as_integer), Some(42));
	}
}
