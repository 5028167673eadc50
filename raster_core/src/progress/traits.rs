//! Common interface for progress indicators.

/// A progress indicator driven by the tile compositor.
pub trait ProgressTrait: Send + Sync {
	/// Creates a new instance of the progress indicator.
	fn new() -> Self
	where
		Self: Sized;

	/// Initializes the progress indicator with a message and the total tile count.
	fn init(&mut self, message: &str, max_value: u64);

	/// Sets the absolute position of the progress.
	fn set_position(&mut self, value: u64);

	/// Increases the position by `value`.
	fn inc(&mut self, value: u64);

	/// Marks the progress as finished.
	fn finish(&mut self);

	/// Removes the progress indicator from the terminal, if any.
	fn remove(&mut self);
}
