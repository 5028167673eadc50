//! Built-in readers and writers: a PNG-backed `Reader`/`Writer`
//! pair for `ImageRaster`s, and a raw ESRI-BIL-style pair for
//! `ScalarRaster`s.
//!
//! Geospatial sources carry no georeferencing of their own in either
//! format, so both readers derive the sector from a companion sidecar file
//! (`{path}.hdr` for BIL, the ESRI world-file convention; `{path}.wld` for
//! PNG) rather than requiring a caller-supplied override at offer time.

use anyhow::{Context, Result, bail};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use raster_core::metadata::{KEY_HEIGHT, KEY_WIDTH};
use raster_core::{ByteOrder, DataType, ImageRaster, MetadataBag, MetadataValue, PixelFormat, Raster, RasterError, ScalarRaster, Sector};
use raster_io::{Reader, Registry, SourceRef, proxy};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A [`Registry`] pre-loaded with the two built-in format pairs, in priority
/// order PNG then BIL. Suffix-based dispatch makes the order immaterial for
/// these two formats, but a caller adding a third reader/writer should
/// register it after these if it should only be tried as a fallback.
#[must_use]
pub fn default_registry() -> Registry {
	let mut registry = Registry::new();
	registry.register_reader(Arc::new(PngFormat));
	registry.register_writer(Arc::new(PngFormat));
	registry.register_reader(Arc::new(BilFormat));
	registry.register_writer(Arc::new(BilFormat));
	registry
}

fn local_path(source: &SourceRef) -> Result<&Path> {
	match source {
		SourceRef::LocalPath(p) => Ok(p),
		other => bail!(RasterError::UnreadableSource(format!("{other:?} is not a local path"))),
	}
}

fn sidecar_path(path: &Path, extension: &str) -> PathBuf {
	let mut sidecar = path.to_path_buf();
	sidecar.set_extension(extension);
	sidecar
}

/// Reads and writes PNG-encoded tiles (`imageFormat` = `image/png`).
#[derive(Debug, Default)]
pub struct PngFormat;

impl Reader for PngFormat {
	fn suffixes(&self) -> &[&str] {
		&["png"]
	}

	fn mime_types(&self) -> &[&str] {
		&["image/png"]
	}

	fn can_read(&self, source: &SourceRef, _metadata: &MetadataBag) -> bool {
		source.suffix().as_deref() == Some("png")
	}

	fn read_metadata(&self, source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
		let path = local_path(source)?;
		let (width, height) = image::image_dimensions(path).with_context(|| format!("reading PNG dimensions from {}", path.display()))?;
		let sector = read_world_file(&sidecar_path(path, "wld"), width as usize, height as usize)?;

		metadata.set(KEY_WIDTH, MetadataValue::Int(i64::from(width)));
		metadata.set(KEY_HEIGHT, MetadataValue::Int(i64::from(height)));
		metadata.set(proxy::KEY_SECTOR, MetadataValue::Sector(sector));
		metadata.set(proxy::KEY_PIXEL_FORMAT, MetadataValue::PixelFormat(PixelFormat::Image));
		Ok(())
	}

	fn read(&self, source: &SourceRef, metadata: &MetadataBag) -> Result<Vec<Raster>> {
		let path = local_path(source)?;
		let image = image::open(path).with_context(|| format!("decoding PNG {}", path.display()))?.into_rgba8();
		let sector = metadata.get(proxy::KEY_SECTOR).and_then(MetadataValue::as_sector).expect("validated by read_metadata");

		let (width, height) = (image.width() as usize, image.height() as usize);
		let mut data = image.into_raw();
		premultiply(&mut data);
		Ok(vec![Raster::Image(ImageRaster::from_rgba(width, height, sector, data))])
	}

	fn is_imagery_raster(&self) -> bool {
		true
	}
}

impl raster_io::Writer for PngFormat {
	fn suffixes(&self) -> &[&str] {
		&["png"]
	}

	fn mime_types(&self) -> &[&str] {
		&["image/png"]
	}

	fn can_write(&self, raster: &Raster, suffix: &str, _destination: &Path) -> bool {
		suffix == "png" && raster.as_image().is_some()
	}

	fn write(&self, raster: &Raster, _suffix: &str, destination: &Path) -> Result<()> {
		let Some(image_raster) = raster.as_image() else {
			bail!(RasterError::InvalidArgument("PngFormat can only write ImageRaster tiles".to_string()));
		};
		let mut data = image_raster.data().to_vec();
		unpremultiply(&mut data);
		let buffer = image::RgbaImage::from_raw(image_raster.width() as u32, image_raster.height() as u32, data)
			.ok_or_else(|| RasterError::InvalidArgument("tile dimensions overflow a u32 image buffer".to_string()))?;
		buffer.save_with_format(destination, image::ImageFormat::Png).with_context(|| format!("writing PNG {}", destination.display()))?;
		write_world_file(&sidecar_path(destination, "wld"), image_raster.sector(), image_raster.width(), image_raster.height())
	}
}

fn premultiply(rgba: &mut [u8]) {
	for px in rgba.chunks_exact_mut(4) {
		let a = u16::from(px[3]);
		px[0] = ((u16::from(px[0]) * a) / 255) as u8;
		px[1] = ((u16::from(px[1]) * a) / 255) as u8;
		px[2] = ((u16::from(px[2]) * a) / 255) as u8;
	}
}

fn unpremultiply(rgba: &mut [u8]) {
	for px in rgba.chunks_exact_mut(4) {
		let a = px[3];
		if a == 0 {
			continue;
		}
		px[0] = ((u16::from(px[0]) * 255) / u16::from(a)).min(255) as u8;
		px[1] = ((u16::from(px[1]) * 255) / u16::from(a)).min(255) as u8;
		px[2] = ((u16::from(px[2]) * 255) / u16::from(a)).min(255) as u8;
	}
}

/// A minimal six-line ESRI world file: pixel size X, rotation (always 0
/// here), rotation (always 0), pixel size Y (negative, north-up), and the
/// center of the upper-left pixel's X/Y.
fn write_world_file(path: &Path, sector: Sector, width: usize, height: usize) -> Result<()> {
	let px_w = sector.delta_lon() / width as f64;
	let px_h = sector.delta_lat() / height as f64;
	let body = format!("{px_w}\n0.0\n0.0\n{neg_h}\n{ulx}\n{uly}\n", neg_h = -px_h, ulx = sector.min_lon() + px_w / 2.0, uly = sector.max_lat() - px_h / 2.0);
	std::fs::write(path, body).with_context(|| format!("writing world file {}", path.display()))
}

fn read_world_file(path: &Path, width: usize, height: usize) -> Result<Sector> {
	let text = std::fs::read_to_string(path).with_context(|| format!("reading world file {}", path.display()))?;
	let values: Vec<f64> = text
		.lines()
		.filter(|l| !l.trim().is_empty())
		.map(|l| l.trim().parse::<f64>().map_err(|e| anyhow::anyhow!(RasterError::UnreadableSource(format!("invalid world file line {l:?}: {e}")))))
		.collect::<Result<_>>()?;
	let [px_w, _rot1, _rot2, px_h, ulx, uly]: [f64; 6] = values.try_into().map_err(|_| RasterError::UnreadableSource(format!("world file {} must have 6 lines", path.display())))?;
	bail_if_degenerate(px_w, px_h, path)?;

	// world-file coordinates name pixel centers; the pixel grid's outer edge
	// is half a pixel further out on every side.
	let min_lon = ulx - px_w / 2.0;
	let max_lat = uly - px_h / 2.0; // px_h is negative for north-up grids
	let min_lat = max_lat + px_h * height as f64;
	let max_lon = min_lon + px_w * width as f64;
	Sector::new(min_lat, max_lat, min_lon, max_lon).map_err(Into::into)
}

fn bail_if_degenerate(px_w: f64, px_h: f64, path: &Path) -> Result<()> {
	if px_w <= 0.0 || px_h == 0.0 {
		bail!(RasterError::UnreadableSource(format!("world file {} has a non-positive pixel size", path.display())));
	}
	Ok(())
}

/// Reads and writes raw scalar samples with an ESRI-BIL-style `.hdr`
/// sidecar (`dataType`/`byteOrder`).
#[derive(Debug, Default)]
pub struct BilFormat;

#[derive(Debug, Clone, Copy)]
struct BilHeader {
	ncols: usize,
	nrows: usize,
	ulxmap: f64,
	ulymap: f64,
	xdim: f64,
	ydim: f64,
	nbits: u32,
	byte_order: ByteOrder,
	nodata: Option<f64>,
}

impl BilHeader {
	fn data_type(&self) -> Result<DataType> {
		Ok(match self.nbits {
			8 => DataType::Int8,
			16 => DataType::Int16,
			32 => DataType::Int32,
			other => bail!(RasterError::UnreadableSource(format!("unsupported BIL NBITS {other}"))),
		})
	}

	fn sector(&self) -> Result<Sector> {
		let min_lon = self.ulxmap;
		let max_lat = self.ulymap;
		let max_lon = min_lon + self.xdim * self.ncols as f64;
		let min_lat = max_lat - self.ydim * self.nrows as f64;
		Sector::new(min_lat, max_lat, min_lon, max_lon)
	}
}

fn parse_hdr(path: &Path) -> Result<BilHeader> {
	let text = std::fs::read_to_string(path).with_context(|| format!("reading BIL header {}", path.display()))?;
	let mut fields = std::collections::HashMap::new();
	for line in text.lines() {
		let mut parts = line.split_whitespace();
		if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
			fields.insert(key.to_ascii_uppercase(), value.to_string());
		}
	}
	let get = |key: &str| -> Result<String> { fields.get(key).cloned().ok_or_else(|| RasterError::UnreadableSource(format!("BIL header missing {key}")).into()) };
	let parse_f64 = |key: &str| -> Result<f64> { get(key)?.parse::<f64>().map_err(|e| RasterError::UnreadableSource(format!("BIL header {key} is not a number: {e}")).into()) };

	Ok(BilHeader {
		ncols: get("NCOLS")?.parse()?,
		nrows: get("NROWS")?.parse()?,
		ulxmap: parse_f64("ULXMAP")?,
		ulymap: parse_f64("ULYMAP")?,
		xdim: parse_f64("XDIM")?,
		ydim: parse_f64("YDIM")?,
		nbits: get("NBITS")?.parse()?,
		byte_order: if fields.get("BYTEORDER").map(String::as_str) == Some("M") { ByteOrder::BigEndian } else { ByteOrder::LittleEndian },
		nodata: fields.get("NODATA").and_then(|v| v.parse::<f64>().ok()),
	})
}

fn write_hdr(path: &Path, header: &BilHeader) -> Result<()> {
	let byte_order_flag = if header.byte_order == ByteOrder::BigEndian { "M" } else { "I" };
	let mut body = format!(
		"NCOLS {}\nNROWS {}\nNBITS {}\nBYTEORDER {}\nULXMAP {}\nULYMAP {}\nXDIM {}\nYDIM {}\n",
		header.ncols, header.nrows, header.nbits, byte_order_flag, header.ulxmap, header.ulymap, header.xdim, header.ydim
	);
	if let Some(nodata) = header.nodata {
		body.push_str(&format!("NODATA {nodata}\n"));
	}
	std::fs::write(path, body).with_context(|| format!("writing BIL header {}", path.display()))
}

impl Reader for BilFormat {
	fn suffixes(&self) -> &[&str] {
		&["bil"]
	}

	fn mime_types(&self) -> &[&str] {
		&["application/octet-stream"]
	}

	fn can_read(&self, source: &SourceRef, _metadata: &MetadataBag) -> bool {
		source.suffix().as_deref() == Some("bil")
	}

	fn read_metadata(&self, source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
		let path = local_path(source)?;
		let header = parse_hdr(&sidecar_path(path, "hdr"))?;

		metadata.set(KEY_WIDTH, MetadataValue::Int(header.ncols as i64));
		metadata.set(KEY_HEIGHT, MetadataValue::Int(header.nrows as i64));
		metadata.set(proxy::KEY_SECTOR, MetadataValue::Sector(header.sector()?));
		metadata.set(proxy::KEY_PIXEL_FORMAT, MetadataValue::PixelFormat(PixelFormat::Elevation));
		metadata.set("DATA_TYPE", MetadataValue::DataType(header.data_type()?));
		metadata.set("BYTE_ORDER", MetadataValue::ByteOrder(header.byte_order));
		if let Some(nodata) = header.nodata {
			metadata.set("TRANSPARENT_VALUE", MetadataValue::Float(nodata));
		}
		Ok(())
	}

	fn read(&self, source: &SourceRef, metadata: &MetadataBag) -> Result<Vec<Raster>> {
		let path = local_path(source)?;
		let header = parse_hdr(&sidecar_path(path, "hdr"))?;
		let sector = metadata.get(proxy::KEY_SECTOR).and_then(MetadataValue::as_sector).expect("validated by read_metadata");
		let bytes = std::fs::read(path).with_context(|| format!("reading BIL samples {}", path.display()))?;

		let samples = decode_samples(&bytes, header.data_type()?, header.byte_order)?;
		Ok(vec![Raster::Scalar(ScalarRaster::from_samples(header.ncols, header.nrows, sector, header.data_type()?, header.byte_order, header.nodata, samples))])
	}

	fn is_imagery_raster(&self) -> bool {
		false
	}
}

impl raster_io::Writer for BilFormat {
	fn suffixes(&self) -> &[&str] {
		&["bil"]
	}

	fn mime_types(&self) -> &[&str] {
		&["application/octet-stream"]
	}

	fn can_write(&self, raster: &Raster, suffix: &str, _destination: &Path) -> bool {
		suffix == "bil" && raster.as_scalar().is_some()
	}

	fn write(&self, raster: &Raster, _suffix: &str, destination: &Path) -> Result<()> {
		let Some(scalar) = raster.as_scalar() else {
			bail!(RasterError::InvalidArgument("BilFormat can only write ScalarRaster tiles".to_string()));
		};
		let bytes = encode_samples(scalar.samples(), scalar.data_type(), scalar.byte_order())?;
		std::fs::write(destination, bytes).with_context(|| format!("writing BIL samples {}", destination.display()))?;

		let sector = scalar.sector();
		let header = BilHeader {
			ncols: scalar.width(),
			nrows: scalar.height(),
			ulxmap: sector.min_lon(),
			ulymap: sector.max_lat(),
			xdim: sector.delta_lon() / scalar.width() as f64,
			ydim: sector.delta_lat() / scalar.height() as f64,
			nbits: u32::try_from(scalar.data_type().bytes_per_sample() * 8).unwrap_or(32),
			byte_order: scalar.byte_order(),
			nodata: scalar.transparent_value(),
		};
		write_hdr(&sidecar_path(destination, "hdr"), &header)
	}
}

fn decode_samples(bytes: &[u8], data_type: DataType, byte_order: ByteOrder) -> Result<Vec<f64>> {
	let mut cursor = Cursor::new(bytes);
	let count = bytes.len() / data_type.bytes_per_sample();
	let mut samples = Vec::with_capacity(count);
	for _ in 0..count {
		let value = match (data_type, byte_order) {
			(DataType::Int8, _) => f64::from(cursor.read_i8()?),
			(DataType::Int16, ByteOrder::BigEndian) => f64::from(cursor.read_i16::<BigEndian>()?),
			(DataType::Int16, ByteOrder::LittleEndian) => f64::from(cursor.read_i16::<LittleEndian>()?),
			(DataType::Int32, ByteOrder::BigEndian) => f64::from(cursor.read_i32::<BigEndian>()?),
			(DataType::Int32, ByteOrder::LittleEndian) => f64::from(cursor.read_i32::<LittleEndian>()?),
			(DataType::Float32, ByteOrder::BigEndian) => f64::from(cursor.read_f32::<BigEndian>()?),
			(DataType::Float32, ByteOrder::LittleEndian) => f64::from(cursor.read_f32::<LittleEndian>()?),
		};
		samples.push(value);
	}
	Ok(samples)
}

fn encode_samples(samples: &[f64], data_type: DataType, byte_order: ByteOrder) -> Result<Vec<u8>> {
	let mut out = Vec::with_capacity(samples.len() * data_type.bytes_per_sample());
	for &value in samples {
		match (data_type, byte_order) {
			(DataType::Int8, _) => out.write_i8(value as i8)?,
			(DataType::Int16, ByteOrder::BigEndian) => out.write_i16::<BigEndian>(value as i16)?,
			(DataType::Int16, ByteOrder::LittleEndian) => out.write_i16::<LittleEndian>(value as i16)?,
			(DataType::Int32, ByteOrder::BigEndian) => out.write_i32::<BigEndian>(value as i32)?,
			(DataType::Int32, ByteOrder::LittleEndian) => out.write_i32::<LittleEndian>(value as i32)?,
			(DataType::Float32, ByteOrder::BigEndian) => out.write_f32::<BigEndian>(value as f32)?,
			(DataType::Float32, ByteOrder::LittleEndian) => out.write_f32::<LittleEndian>(value as f32)?,
		}
	}
	Ok(out)
}
