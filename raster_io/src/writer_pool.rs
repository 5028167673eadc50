//! The bounded writer pool: persists tiles to the directory layout
//! described by [`raster_core::Tile::relative_path`], bounding the number
//! of concurrent writes and serializing directory creation.

use crate::registry::Registry;
use anyhow::{Context, Result, bail};
use raster_core::{Raster, RasterError, Tile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::{Condvar, Mutex as StdMutex};
use tokio::task::JoinHandle;

/// The default bound on concurrently in-flight tile writes.
pub const DEFAULT_DEGREE: usize = 2;

/// A blocking counting semaphore: `acquire` parks the calling OS thread
/// (not an async task) until a permit is free. The compositor thread is a
/// synchronous, CPU-bound caller, so the handoff to the writer pool must
/// actually block it rather than merely bound a queue depth.
struct BlockingSemaphore {
	available: StdMutex<usize>,
	condvar: Condvar,
}

impl BlockingSemaphore {
	fn new(permits: usize) -> Self {
		Self { available: StdMutex::new(permits.max(1)), condvar: Condvar::new() }
	}

	/// Blocks until a permit is available, then takes it. The permit is
	/// returned to the pool when the returned guard is dropped — i.e. when
	/// the write task that holds it finishes, success or failure, mirroring
	/// a `finally`-block release.
	fn acquire(self: &Arc<Self>) -> SemaphorePermit {
		let mut available = self.available.lock().expect("writer pool semaphore poisoned");
		while *available == 0 {
			available = self.condvar.wait(available).expect("writer pool semaphore poisoned");
		}
		*available -= 1;
		SemaphorePermit { semaphore: self.clone() }
	}
}

struct SemaphorePermit {
	semaphore: Arc<BlockingSemaphore>,
}

impl Drop for SemaphorePermit {
	fn drop(&mut self) {
		let mut available = self.semaphore.available.lock().expect("writer pool semaphore poisoned");
		*available += 1;
		self.semaphore.condvar.notify_one();
	}
}

/// Persists [`Raster`]s produced by the tile compositor to disk, bounding
/// in-flight writes to a fixed degree and serializing the directory-creation
/// race a naive `create_dir_all` per writer would hit.
pub struct WriterPool {
	registry: Arc<Registry>,
	root: PathBuf,
	semaphore: Arc<BlockingSemaphore>,
	mkdir_lock: Arc<StdMutex<()>>,
	tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl WriterPool {
	#[must_use]
	pub fn new(registry: Arc<Registry>, root: PathBuf, degree: usize) -> Self {
		Self {
			registry,
			root,
			semaphore: Arc::new(BlockingSemaphore::new(degree)),
			mkdir_lock: Arc::new(StdMutex::new(())),
			tasks: StdMutex::new(Vec::new()),
		}
	}

	#[must_use]
	pub fn with_default_degree(registry: Arc<Registry>, root: PathBuf) -> Self {
		Self::new(registry, root, DEFAULT_DEGREE)
	}

	/// Hands `raster` off to the writer pool for persistence at `tile`'s
	/// canonical path. Blocks the calling thread until a writer slot is
	/// free (the compositor cannot run more than `degree` tiles ahead of
	/// the writers), then schedules the write on a background task and
	/// returns. Errors are logged rather than propagated, since by the time
	/// a tile reaches the writer pool its source has already been resolved
	/// successfully and a write failure should not abort the overall run.
	pub fn install_tile_raster_later(&self, tile: Tile, raster: Raster, suffix: String) {
		let permit = self.semaphore.acquire();

		let registry = self.registry.clone();
		let mkdir_lock = self.mkdir_lock.clone();
		let path = self.root.join(tile.relative_path(&suffix));

		let handle = tokio::spawn(async move {
			let _permit = permit;
			let write_path = path.clone();
			let outcome = tokio::task::spawn_blocking(move || write_tile(&registry, &mkdir_lock, &raster, &suffix, &write_path)).await;
			match outcome {
				Ok(Ok(())) => {}
				Ok(Err(err)) => log::error!("failed to install tile at {}: {err:#}", path.display()),
				Err(join_err) => log::error!("writer task for {} panicked: {join_err}", path.display()),
			}
		});

		self.tasks.lock().expect("writer pool task list poisoned").push(handle);
	}

	/// Awaits every task spawned by [`WriterPool::install_tile_raster_later`]
	/// so far, draining the task list. Meant to be run once compositing
	/// finishes and again before the dataset descriptor is installed.
	pub async fn wait_for_install_tile_tasks(&self) {
		let handles: Vec<JoinHandle<()>> = std::mem::take(&mut self.tasks.lock().expect("writer pool task list poisoned"));
		for handle in handles {
			if let Err(join_err) = handle.await {
				log::error!("writer task panicked while waiting: {join_err}");
			}
		}
	}
}

fn write_tile(registry: &Registry, mkdir_lock: &StdMutex<()>, raster: &Raster, suffix: &str, path: &Path) -> Result<()> {
	let Some(parent) = path.parent() else {
		bail!(RasterError::InvalidArgument(format!("tile path {} has no parent directory", path.display())));
	};
	{
		let _guard = mkdir_lock.lock().expect("mkdir lock poisoned");
		std::fs::create_dir_all(parent).with_context(|| format!("creating tile directory {}", parent.display()))?;
	}

	let Some(writer) = registry.find_writer(raster, suffix, path) else {
		bail!(RasterError::InvalidArgument(format!("no writer registered for suffix {suffix:?}")));
	};
	writer.write(raster, suffix, path)
}
