//! The raster data model: a tagged union of two shapes, plus a small set of
//! operations shared by both.

use crate::geo::Sector;

/// Which of the two raster kinds a dataset or proxy deals in. A catalog is
/// homogeneous: every entry must report the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixelFormat {
	Image,
	Elevation,
}

/// The scalar sample width/encoding for a [`ScalarRaster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
	Int8,
	Int16,
	Int32,
	Float32,
}

impl DataType {
	#[must_use]
	pub fn bytes_per_sample(self) -> usize {
		match self {
			DataType::Int8 => 1,
			DataType::Int16 => 2,
			DataType::Int32 | DataType::Float32 => 4,
		}
	}
}

/// Byte order used when a [`ScalarRaster`] is serialized to or read from a
/// concrete source/sink format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ByteOrder {
	BigEndian,
	LittleEndian,
}

/// 8-bit-per-channel, pre-multiplied RGBA packed pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRaster {
	width: usize,
	height: usize,
	sector: Sector,
	/// `width * height * 4` bytes, row-major, pre-multiplied RGBA.
	data: Vec<u8>,
}

impl ImageRaster {
	/// Creates a new, fully transparent `ImageRaster`.
	///
	/// # Panics
	///
	/// Panics if `width` or `height` is zero.
	#[must_use]
	pub fn new_empty(width: usize, height: usize, sector: Sector) -> Self {
		assert!(width >= 1 && height >= 1, "raster dimensions must be >= 1");
		Self { width, height, sector, data: vec![0u8; width * height * 4] }
	}

	/// Wraps pre-existing pre-multiplied RGBA pixel data.
	///
	/// # Panics
	///
	/// Panics if `data.len() != width * height * 4`, or if `width`/`height` is zero.
	#[must_use]
	pub fn from_rgba(width: usize, height: usize, sector: Sector, data: Vec<u8>) -> Self {
		assert!(width >= 1 && height >= 1, "raster dimensions must be >= 1");
		assert_eq!(data.len(), width * height * 4, "RGBA buffer length mismatch");
		Self { width, height, sector, data }
	}

	#[must_use]
	pub fn width(&self) -> usize {
		self.width
	}

	#[must_use]
	pub fn height(&self) -> usize {
		self.height
	}

	#[must_use]
	pub fn sector(&self) -> Sector {
		self.sector
	}

	#[must_use]
	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn data_mut(&mut self) -> &mut [u8] {
		&mut self.data
	}

	/// Reads the pre-multiplied RGBA quadruple at (x, y).
	#[must_use]
	pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
		let i = (y * self.width + x) * 4;
		[self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
	}

	pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
		let i = (y * self.width + x) * 4;
		self.data[i..i + 4].copy_from_slice(&rgba);
	}

	/// Approximate decoded byte cost, used to charge the raster cache.
	#[must_use]
	pub fn byte_cost(&self) -> usize {
		self.data.len()
	}
}

/// A width × height grid of scalar samples (elevations or other
/// single-channel data), with an optional transparent/missing-data value.
///
/// Samples are kept internally as `f64` regardless of the declared
/// [`DataType`] so the resampler can do uniform bilinear arithmetic;
/// `data_type`/`byte_order` round-trip through readers/writers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRaster {
	width: usize,
	height: usize,
	sector: Sector,
	data_type: DataType,
	byte_order: ByteOrder,
	transparent_value: Option<f64>,
	samples: Vec<f64>,
}

impl ScalarRaster {
	/// Creates a new `ScalarRaster` filled with `transparent_value` (or `0.0`
	/// if none is set).
	///
	/// # Panics
	///
	/// Panics if `width` or `height` is zero.
	#[must_use]
	pub fn new_empty(
		width: usize,
		height: usize,
		sector: Sector,
		data_type: DataType,
		byte_order: ByteOrder,
		transparent_value: Option<f64>,
	) -> Self {
		assert!(width >= 1 && height >= 1, "raster dimensions must be >= 1");
		let fill = transparent_value.unwrap_or(0.0);
		Self {
			width,
			height,
			sector,
			data_type,
			byte_order,
			transparent_value,
			samples: vec![fill; width * height],
		}
	}

	/// Wraps pre-existing sample data.
	///
	/// # Panics
	///
	/// Panics if `samples.len() != width * height`, or if `width`/`height` is zero.
	#[must_use]
	pub fn from_samples(
		width: usize,
		height: usize,
		sector: Sector,
		data_type: DataType,
		byte_order: ByteOrder,
		transparent_value: Option<f64>,
		samples: Vec<f64>,
	) -> Self {
		assert!(width >= 1 && height >= 1, "raster dimensions must be >= 1");
		assert_eq!(samples.len(), width * height, "sample buffer length mismatch");
		Self { width, height, sector, data_type, byte_order, transparent_value, samples }
	}

	#[must_use]
	pub fn width(&self) -> usize {
		self.width
	}

	#[must_use]
	pub fn height(&self) -> usize {
		self.height
	}

	#[must_use]
	pub fn sector(&self) -> Sector {
		self.sector
	}

	#[must_use]
	pub fn data_type(&self) -> DataType {
		self.data_type
	}

	#[must_use]
	pub fn byte_order(&self) -> ByteOrder {
		self.byte_order
	}

	#[must_use]
	pub fn transparent_value(&self) -> Option<f64> {
		self.transparent_value
	}

	#[must_use]
	pub fn samples(&self) -> &[f64] {
		&self.samples
	}

	/// True if `value` is bit-for-bit equal to the transparent value, if any.
	#[must_use]
	pub fn is_transparent(&self, value: f64) -> bool {
		match self.transparent_value {
			Some(t) => t.to_bits() == value.to_bits(),
			None => false,
		}
	}

	#[must_use]
	pub fn sample(&self, x: usize, y: usize) -> f64 {
		self.samples[y * self.width + x]
	}

	pub fn set_sample(&mut self, x: usize, y: usize, value: f64) {
		self.samples[y * self.width + x] = value;
	}

	/// Approximate decoded byte cost, used to charge the raster cache.
	#[must_use]
	pub fn byte_cost(&self) -> usize {
		self.samples.len() * self.data_type.bytes_per_sample()
	}
}

/// A decoded raster: either an [`ImageRaster`] or a [`ScalarRaster`],
/// as a single tagged union rather than a class hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum Raster {
	Image(ImageRaster),
	Scalar(ScalarRaster),
}

impl Raster {
	#[must_use]
	pub fn sector(&self) -> Sector {
		match self {
			Raster::Image(r) => r.sector(),
			Raster::Scalar(r) => r.sector(),
		}
	}

	#[must_use]
	pub fn width(&self) -> usize {
		match self {
			Raster::Image(r) => r.width(),
			Raster::Scalar(r) => r.width(),
		}
	}

	#[must_use]
	pub fn height(&self) -> usize {
		match self {
			Raster::Image(r) => r.height(),
			Raster::Scalar(r) => r.height(),
		}
	}

	#[must_use]
	pub fn pixel_format(&self) -> PixelFormat {
		match self {
			Raster::Image(_) => PixelFormat::Image,
			Raster::Scalar(_) => PixelFormat::Elevation,
		}
	}

	#[must_use]
	pub fn byte_cost(&self) -> usize {
		match self {
			Raster::Image(r) => r.byte_cost(),
			Raster::Scalar(r) => r.byte_cost(),
		}
	}

	#[must_use]
	pub fn as_image(&self) -> Option<&ImageRaster> {
		match self {
			Raster::Image(r) => Some(r),
			Raster::Scalar(_) => None,
		}
	}

	#[must_use]
	pub fn as_scalar(&self) -> Option<&ScalarRaster> {
		match self {
			Raster::Scalar(r) => Some(r),
			Raster::Image(_) => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sector() -> Sector {
		Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()
	}

	#[test]
	fn image_raster_pixel_roundtrip() {
		let mut r = ImageRaster::new_empty(4, 4, sector());
		r.set_pixel(1, 2, [10, 20, 30, 255]);
		assert_eq!(r.pixel(1, 2), [10, 20, 30, 255]);
		assert_eq!(r.byte_cost(), 4 * 4 * 4);
	}

	#[test]
	fn scalar_raster_transparent_value_is_bit_exact() {
		let mut r = ScalarRaster::new_empty(2, 2, sector(), DataType::Int16, ByteOrder::LittleEndian, Some(-32768.0));
		assert!(r.is_transparent(-32768.0));
		assert!(!r.is_transparent(0.0));
		r.set_sample(0, 0, 42.0);
		assert_eq!(r.sample(0, 0), 42.0);
	}

	#[test]
	#[should_panic(expected = "dimensions")]
	fn rejects_zero_dimensions() {
		let _ = ImageRaster::new_empty(0, 4, sector());
	}

	#[test]
	fn raster_enum_delegates_to_variant() {
		let raster = Raster::Scalar(ScalarRaster::new_empty(2, 2, sector(), DataType::Float32, ByteOrder::BigEndian, None));
		assert_eq!(raster.pixel_format(), PixelFormat::Elevation);
		assert_eq!(raster.width(), 2);
	}
}
