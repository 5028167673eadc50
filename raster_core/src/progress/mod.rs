//! Dual-mode progress reporting: a real terminal bar under the `cli` feature,
//! a no-op drain otherwise (library embedding, tests).

#![allow(unused)]

#[cfg(all(feature = "cli", not(test)))]
mod progress_bar;

#[cfg(any(not(feature = "cli"), test))]
mod progress_dummy;

mod traits;
pub use traits::ProgressTrait;

/// Factory function creating a progress bar or a no-op drain depending on
/// the build configuration.
pub fn get_progress_bar(message: &str, max_value: u64) -> Box<dyn ProgressTrait> {
	#[cfg(all(feature = "cli", not(test)))]
	let mut progress = progress_bar::ProgressBar::new();
	#[cfg(any(not(feature = "cli"), test))]
	let mut progress = progress_dummy::ProgressDummy::new();
	progress.init(message, max_value);
	Box::new(progress)
}
