//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every pluggable backend module exposes a `Registry` struct implementing
/// this trait, tying the name used in configuration to its factory.
pub trait ImplementationRegistry {
	/// The name used in configuration files, e.g. "file" for
	/// `storage.implementations.file`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
