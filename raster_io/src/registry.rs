//! The reader/writer registry: searches in a fixed priority order and
//! returns the first match.

use crate::reader::Reader;
use crate::source_ref::SourceRef;
use crate::writer::Writer;
use raster_core::{MetadataBag, Raster};
use std::path::Path;
use std::sync::Arc;

/// Holds readers and writers in registration order; `find_reader` /
/// `find_writer` return the first match, so registration order doubles as
/// priority order.
#[derive(Debug, Default, Clone)]
pub struct Registry {
	readers: Vec<Arc<dyn Reader>>,
	writers: Vec<Arc<dyn Writer>>,
}

impl Registry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register_reader(&mut self, reader: Arc<dyn Reader>) {
		self.readers.push(reader);
	}

	pub fn register_writer(&mut self, writer: Arc<dyn Writer>) {
		self.writers.push(writer);
	}

	/// Returns the first reader (in registration order) whose `can_read`
	/// accepts `source`, or `None` if no registered reader does.
	#[must_use]
	pub fn find_reader(&self, source: &SourceRef, metadata: &MetadataBag) -> Option<Arc<dyn Reader>> {
		self.readers.iter().find(|r| r.can_read(source, metadata)).cloned()
	}

	/// Returns the first writer (in registration order) whose `can_write`
	/// accepts `(raster, suffix, destination)`.
	#[must_use]
	pub fn find_writer(&self, raster: &Raster, suffix: &str, destination: &Path) -> Option<Arc<dyn Writer>> {
		self.writers.iter().find(|w| w.can_write(raster, suffix, destination)).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use raster_core::{ByteOrder, DataType, ImageRaster, PixelFormat, Sector};
	use std::sync::Mutex;

	#[derive(Debug)]
	struct StubReader {
		accepts: &'static str,
		calls: Mutex<u32>,
	}

	impl Reader for StubReader {
		fn suffixes(&self) -> &[&str] {
			&[self.accepts]
		}

		fn mime_types(&self) -> &[&str] {
			&[]
		}

		fn can_read(&self, source: &SourceRef, _metadata: &MetadataBag) -> bool {
			*self.calls.lock().unwrap() += 1;
			source.suffix().as_deref() == Some(self.accepts)
		}

		fn read_metadata(&self, _source: &SourceRef, _metadata: &mut MetadataBag) -> anyhow::Result<()> {
			Ok(())
		}

		fn read(&self, _source: &SourceRef, _metadata: &MetadataBag) -> anyhow::Result<Vec<Raster>> {
			Ok(vec![])
		}

		fn is_imagery_raster(&self) -> bool {
			true
		}
	}

	#[test]
	fn find_reader_returns_first_priority_match() {
		let mut registry = Registry::new();
		registry.register_reader(Arc::new(StubReader { accepts: "tif", calls: Mutex::new(0) }));
		registry.register_reader(Arc::new(StubReader { accepts: "bil", calls: Mutex::new(0) }));

		let source = SourceRef::LocalPath("/data/x.bil".into());
		let reader = registry.find_reader(&source, &MetadataBag::new());
		assert!(reader.is_some());
		assert_eq!(reader.unwrap().suffixes(), &["bil"]);
	}

	#[test]
	fn find_reader_none_when_no_match() {
		let mut registry = Registry::new();
		registry.register_reader(Arc::new(StubReader { accepts: "tif", calls: Mutex::new(0) }));
		let source = SourceRef::LocalPath("/data/x.xyz".into());
		assert!(registry.find_reader(&source, &MetadataBag::new()).is_none());
	}

	#[derive(Debug)]
	struct StubWriter;
	impl Writer for StubWriter {
		fn suffixes(&self) -> &[&str] {
			&["dds"]
		}
		fn mime_types(&self) -> &[&str] {
			&[]
		}
		fn can_write(&self, _raster: &Raster, suffix: &str, _destination: &std::path::Path) -> bool {
			suffix == "dds"
		}
		fn write(&self, _raster: &Raster, _suffix: &str, _destination: &std::path::Path) -> anyhow::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn find_writer_matches_by_suffix() {
		let mut registry = Registry::new();
		registry.register_writer(Arc::new(StubWriter));
		let raster = Raster::Image(ImageRaster::new_empty(1, 1, Sector::new(0.0, 1.0, 0.0, 1.0).unwrap()));
		assert!(registry.find_writer(&raster, "dds", Path::new("/tmp/out.dds")).is_some());
		assert!(registry.find_writer(&raster, "png", Path::new("/tmp/out.png")).is_none());
	}

	#[test]
	fn raster_carries_pixel_format_for_writer_dispatch() {
		let raster = Raster::Image(ImageRaster::new_empty(1, 1, Sector::new(0.0, 1.0, 0.0, 1.0).unwrap()));
		assert_eq!(raster.pixel_format(), PixelFormat::Image);
		let _ = DataType::Float32;
		let _ = ByteOrder::LittleEndian;
	}
}
