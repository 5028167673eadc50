//! `MetadataBag`: the dynamic key-value channel readers and writers
//! communicate through.
//!
//! Kept dynamically typed throughout, with one load-bearing invariant —
//! `WIDTH`/`HEIGHT` are write-once — enforced at the type level, and a typed
//! façade (`raster_producer::RasterConfig`) on top for the well-known keys
//! rather than re-deriving structs per caller.

use crate::geo::Sector;
use crate::raster::{ByteOrder, DataType, PixelFormat};
use std::collections::HashMap;

/// The well-known key under which raster width (in pixels) is stored.
pub const KEY_WIDTH: &str = "WIDTH";
/// The well-known key under which raster height (in pixels) is stored.
pub const KEY_HEIGHT: &str = "HEIGHT";

/// A tagged value stored in a [`MetadataBag`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
	Int(i64),
	Float(f64),
	Str(String),
	Sector(Sector),
	ByteOrder(ByteOrder),
	PixelFormat(PixelFormat),
	DataType(DataType),
}

impl MetadataValue {
	#[must_use]
	pub fn as_int(&self) -> Option<i64> {
		match self {
			MetadataValue::Int(v) => Some(*v),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_float(&self) -> Option<f64> {
		match self {
			MetadataValue::Float(v) => Some(*v),
			MetadataValue::Int(v) => Some(*v as f64),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			MetadataValue::Str(v) => Some(v),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_sector(&self) -> Option<Sector> {
		match self {
			MetadataValue::Sector(v) => Some(*v),
			_ => None,
		}
	}
}

/// An insertion-order-irrelevant mapping from string key to tagged value.
///
/// Once `WIDTH` or `HEIGHT` is set, further writes to that key are silently
/// ignored. All other keys are last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct MetadataBag {
	entries: HashMap<String, MetadataValue>,
}

impl MetadataBag {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `key` to `value`. If `key` is `WIDTH` or `HEIGHT` and already
	/// present, the write is silently ignored.
	pub fn set(&mut self, key: impl Into<String>, value: MetadataValue) {
		let key = key.into();
		if (key == KEY_WIDTH || key == KEY_HEIGHT) && self.entries.contains_key(&key) {
			return;
		}
		self.entries.insert(key, value);
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&MetadataValue> {
		self.entries.get(key)
	}

	#[must_use]
	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
		// WIDTH/HEIGHT removal re-opens the write-once guard deliberately;
		// this is only ever used to reset a bag between offers.
		self.entries.remove(key)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn width_and_height_are_write_once() {
		let mut bag = MetadataBag::new();
		bag.set(KEY_WIDTH, MetadataValue::Int(512));
		bag.set(KEY_WIDTH, MetadataValue::Int(1024));
		assert_eq!(bag.get(KEY_WIDTH).unwrap().as_int(), Some(512));
	}

	#[test]
	fn other_keys_are_last_writer_wins() {
		let mut bag = MetadataBag::new();
		bag.set("formatSuffix", MetadataValue::Str("dds".to_string()));
		bag.set("formatSuffix", MetadataValue::Str("bil".to_string()));
		assert_eq!(bag.get("formatSuffix").unwrap().as_str(), Some("bil"));
	}

	#[test]
	fn missing_key_is_none() {
		let bag = MetadataBag::new();
		assert!(bag.get("nope").is_none());
		assert!(!bag.contains("nope"));
	}
}
