//! The on-demand mosaic server: composes a raster covering an
//! arbitrary region of interest from a catalog of georeferenced sources,
//! independent of any pyramid.

use crate::catalog::SourceCatalog;
use anyhow::{Result, bail};
use raster_core::{ByteOrder, DataType, ImageRaster, PixelFormat, Raster, RasterError, ScalarRaster, Sector};

/// The parameters of an ad-hoc mosaic request.
#[derive(Debug, Clone)]
pub struct ComposeRasterRequest {
	pub width: usize,
	pub height: usize,
	pub sector: Sector,
	pub byte_order: ByteOrder,
	pub data_type: DataType,
	pub transparent_value: Option<f64>,
}

/// Draws every catalogued source whose sector intersects `request.sector`
/// onto a fresh raster of the catalog's pixel format.
///
/// # Errors
///
/// Returns [`RasterError::OutsideCoverage`] if no catalog entry intersects
/// the request, or [`RasterError::InvalidArgument`] if the catalog has no
/// entries at all (and therefore no declared pixel format).
pub fn compose_raster(catalog: &SourceCatalog, request: &ComposeRasterRequest) -> Result<Raster> {
	let Some(pixel_format) = catalog.pixel_format() else {
		bail!(RasterError::InvalidArgument("mosaic catalog is empty".to_string()));
	};

	let mut intersecting = catalog.intersecting(&request.sector).peekable();
	if intersecting.peek().is_none() {
		bail!(RasterError::OutsideCoverage);
	}

	let mut dest = match pixel_format {
		PixelFormat::Image => Raster::Image(ImageRaster::new_empty(request.width, request.height, request.sector)),
		PixelFormat::Elevation => Raster::Scalar(ScalarRaster::new_empty(
			request.width,
			request.height,
			request.sector,
			request.data_type,
			request.byte_order,
			request.transparent_value,
		)),
	};

	for source in catalog.intersecting(&request.sector) {
		source.draw_onto(&mut dest)?;
	}

	Ok(dest)
}

/// Runs [`compose_raster`] then encodes
/// the result for `mime_type`. Image MIME types are encoded via the `image`
/// crate (PNG/JPEG); anything else (including every scalar MIME type) falls
/// back to the raw, byte-order-respecting sample buffer a BIL-style consumer
/// expects.
///
/// # Errors
///
/// Propagates [`compose_raster`]'s errors, plus encoding failures from the
/// `image` crate.
pub fn get_raster_as_byte_buffer(catalog: &SourceCatalog, request: &ComposeRasterRequest, mime_type: &str) -> Result<Vec<u8>> {
	let raster = compose_raster(catalog, request)?;
	encode(&raster, mime_type)
}

fn encode(raster: &Raster, mime_type: &str) -> Result<Vec<u8>> {
	match raster {
		Raster::Image(image) => encode_image(image, mime_type),
		Raster::Scalar(scalar) => Ok(encode_scalar_raw(scalar)),
	}
}

fn encode_image(image: &ImageRaster, mime_type: &str) -> Result<Vec<u8>> {
	let format = match mime_type {
		"image/png" => image::ImageFormat::Png,
		"image/jpeg" => image::ImageFormat::Jpeg,
		_ => bail!(RasterError::InvalidArgument(format!("unsupported mosaic image MIME type {mime_type:?}"))),
	};

	let buffer = image::RgbaImage::from_raw(image.width() as u32, image.height() as u32, image.data().to_vec())
		.ok_or_else(|| RasterError::InvalidArgument("mosaic raster dimensions overflow a u32 image buffer".to_string()))?;

	let mut bytes = Vec::new();
	buffer.write_to(&mut std::io::Cursor::new(&mut bytes), format)?;
	Ok(bytes)
}

fn encode_scalar_raw(scalar: &ScalarRaster) -> Vec<u8> {
	let bytes_per_sample = scalar.data_type().bytes_per_sample();
	let mut out = Vec::with_capacity(scalar.samples().len() * bytes_per_sample);
	for &sample in scalar.samples() {
		append_sample(&mut out, sample, scalar.data_type(), scalar.byte_order());
	}
	out
}

fn append_sample(out: &mut Vec<u8>, value: f64, data_type: DataType, byte_order: ByteOrder) {
	match data_type {
		DataType::Int8 => out.push(value as i8 as u8),
		DataType::Int16 => {
			let v = value as i16;
			out.extend(if byte_order == ByteOrder::BigEndian { v.to_be_bytes() } else { v.to_le_bytes() });
		}
		DataType::Int32 => {
			let v = value as i32;
			out.extend(if byte_order == ByteOrder::BigEndian { v.to_be_bytes() } else { v.to_le_bytes() });
		}
		DataType::Float32 => {
			let v = value as f32;
			out.extend(if byte_order == ByteOrder::BigEndian { v.to_be_bytes() } else { v.to_le_bytes() });
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Result;
	use raster_core::MetadataBag;
	use raster_core::MetadataValue;
	use raster_io::{ProxyCache, Reader, SourceRef};
	use std::sync::Arc;

	#[derive(Debug)]
	struct SolidColorReader {
		sector: Sector,
		rgba: [u8; 4],
	}
	impl Reader for SolidColorReader {
		fn suffixes(&self) -> &[&str] {
			&["raw"]
		}
		fn mime_types(&self) -> &[&str] {
			&[]
		}
		fn can_read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> bool {
			true
		}
		fn read_metadata(&self, _source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
			metadata.set("SECTOR", MetadataValue::Sector(self.sector));
			metadata.set("PIXEL_FORMAT", MetadataValue::PixelFormat(PixelFormat::Image));
			Ok(())
		}
		fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> Result<Vec<Raster>> {
			let mut raster = ImageRaster::new_empty(4, 4, self.sector);
			for y in 0..4 {
				for x in 0..4 {
					raster.set_pixel(x, y, self.rgba);
				}
			}
			Ok(vec![Raster::Image(raster)])
		}
		fn is_imagery_raster(&self) -> bool {
			true
		}
	}

	fn catalog_with_one_source(sector: Sector) -> SourceCatalog {
		let mut catalog = SourceCatalog::new();
		let cache = ProxyCache::new(1 << 20);
		let reader = Arc::new(SolidColorReader { sector, rgba: [10, 20, 30, 255] });
		let proxy = raster_io::CachedRasterProxy::new(SourceRef::LocalPath("/data/a.raw".into()), reader, cache).unwrap();
		catalog.add(proxy).unwrap();
		catalog
	}

	fn request(sector: Sector) -> ComposeRasterRequest {
		ComposeRasterRequest { width: 4, height: 4, sector, byte_order: ByteOrder::LittleEndian, data_type: DataType::Float32, transparent_value: None }
	}

	#[test]
	fn outside_coverage_is_a_typed_error() {
		// catalog sector (0,10,0,10); request sector (20,30,20,30), no overlap.
		let catalog = catalog_with_one_source(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
		let req = request(Sector::new(20.0, 30.0, 20.0, 30.0).unwrap());
		let err = compose_raster(&catalog, &req).unwrap_err();
		assert!(matches!(err.downcast_ref::<RasterError>(), Some(RasterError::OutsideCoverage)));
	}

	#[test]
	fn intersecting_request_draws_the_source() {
		let sector = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let catalog = catalog_with_one_source(sector);
		let req = request(sector);
		let raster = compose_raster(&catalog, &req).unwrap();
		let image = raster.as_image().unwrap();
		assert_eq!(image.pixel(0, 0), [10, 20, 30, 255]);
	}

	#[test]
	fn empty_catalog_is_invalid_argument() {
		let catalog = SourceCatalog::new();
		let req = request(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
		let err = compose_raster(&catalog, &req).unwrap_err();
		assert!(matches!(err.downcast_ref::<RasterError>(), Some(RasterError::InvalidArgument(_))));
	}

	#[test]
	fn encodes_png_for_image_mosaics() {
		let sector = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let catalog = catalog_with_one_source(sector);
		let req = request(sector);
		let bytes = get_raster_as_byte_buffer(&catalog, &req, "image/png").unwrap();
		assert_eq!(&bytes[1..4], b"PNG");
	}

	#[test]
	fn scalar_mosaic_falls_back_to_raw_samples() {
		let mut catalog = SourceCatalog::new();
		let cache = ProxyCache::new(1 << 20);

		#[derive(Debug)]
		struct ScalarReader;
		impl Reader for ScalarReader {
			fn suffixes(&self) -> &[&str] {
				&["raw"]
			}
			fn mime_types(&self) -> &[&str] {
				&[]
			}
			fn can_read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> bool {
				true
			}
			fn read_metadata(&self, _source: &SourceRef, metadata: &mut MetadataBag) -> Result<()> {
				metadata.set("SECTOR", MetadataValue::Sector(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap()));
				metadata.set("PIXEL_FORMAT", MetadataValue::PixelFormat(PixelFormat::Elevation));
				Ok(())
			}
			fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> Result<Vec<Raster>> {
				Ok(vec![Raster::Scalar(ScalarRaster::new_empty(
					4,
					4,
					Sector::new(0.0, 10.0, 0.0, 10.0).unwrap(),
					DataType::Float32,
					ByteOrder::LittleEndian,
					None,
				))])
			}
			fn is_imagery_raster(&self) -> bool {
				false
			}
		}

		let proxy = raster_io::CachedRasterProxy::new(SourceRef::LocalPath("/data/s.raw".into()), Arc::new(ScalarReader), cache).unwrap();
		catalog.add(proxy).unwrap();

		let sector = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
		let req = request(sector);
		let bytes = get_raster_as_byte_buffer(&catalog, &req, "application/octet-stream").unwrap();
		assert_eq!(bytes.len(), 4 * 4 * 4);
	}
}
