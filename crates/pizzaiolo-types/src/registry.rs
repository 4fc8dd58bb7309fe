//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable backend module exposes a `Registry` struct implementing this
/// trait, declaring the name it is configured under and its factory function.
pub trait ImplementationRegistry {
	/// The key used in configuration, e.g. `"memory"` for
	/// `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function.
	fn factory() -> Self::Factory;
}
