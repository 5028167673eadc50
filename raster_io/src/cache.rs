//! The byte-cost-aware LRU cache backing the cached raster proxy.
//!
//! Unlike [`raster_core::LimitedCache`] (which assumes a fixed per-element
//! size and is used for small, uniformly-sized values), decoded rasters vary
//! wildly in byte cost, so this cache tracks a running total directly and
//! evicts by LRU order down to a soft threshold whenever the hard capacity
//! is exceeded.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// A cached decode result: either a materialized raster or a remembered
/// failure ("negative" entry), alongside its approximate byte cost.
#[derive(Clone)]
pub enum CacheEntry<V> {
	Hit(V),
	Negative,
}

/// An LRU cache keyed by `K`, storing [`CacheEntry<V>`] plus its byte cost,
/// bounded by a hard byte capacity with a soft eviction threshold.
pub struct RasterCache<K: Eq + Hash + Clone, V: Clone> {
	entries: LruCache<K, (CacheEntry<V>, usize)>,
	hard_capacity: usize,
	soft_threshold: usize,
	load: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> RasterCache<K, V> {
	/// `soft_threshold` defaults to 80% of `hard_capacity`.
	#[must_use]
	pub fn new(hard_capacity: usize) -> Self {
		Self {
			entries: LruCache::new(NonZeroUsize::new(usize::MAX).unwrap()),
			hard_capacity,
			soft_threshold: hard_capacity * 4 / 5,
			load: 0,
		}
	}

	#[must_use]
	pub fn get(&mut self, key: &K) -> Option<CacheEntry<V>> {
		self.entries.get(key).map(|(entry, _)| entry.clone())
	}

	/// Inserts `entry` at `byte_cost`, evicting LRU entries (invoking
	/// `on_evict` for each) until `load <= soft_threshold` whenever the
	/// insert pushed `load` past `hard_capacity`.
	pub fn insert(&mut self, key: K, entry: CacheEntry<V>, byte_cost: usize, mut on_evict: impl FnMut(K, CacheEntry<V>)) {
		if let Some((_, old_cost)) = self.entries.peek(&key) {
			self.load -= old_cost;
		}
		self.entries.put(key, (entry, byte_cost));
		self.load += byte_cost;

		if self.load > self.hard_capacity {
			while self.load > self.soft_threshold {
				let Some((k, (v, cost))) = self.entries.pop_lru() else {
					break;
				};
				self.load -= cost;
				on_evict(k, v);
			}
		}
	}

	/// Drops every entry, invoking `on_evict` for each, and resets the load.
	pub fn clear(&mut self, mut on_evict: impl FnMut(K, CacheEntry<V>)) {
		while let Some((k, (v, _))) = self.entries.pop_lru() {
			on_evict(k, v);
		}
		self.load = 0;
	}

	#[must_use]
	pub fn load(&self) -> usize {
		self.load
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
