//! A no-op implementation of [`ProgressTrait`], used whenever the `cli`
//! feature is disabled (library embedding, tests, non-terminal contexts).

use super::ProgressTrait;

/// A progress indicator that discards every update.
pub struct ProgressDummy {}

impl ProgressTrait for ProgressDummy {
	fn new() -> Self {
		Self {}
	}

	fn init(&mut self, _message: &str, _max_value: u64) {}

	fn set_position(&mut self, _value: u64) {}

	fn inc(&mut self, _value: u64) {}

	fn finish(&mut self) {}

	fn remove(&mut self) {}
}
