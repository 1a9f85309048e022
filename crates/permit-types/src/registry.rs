//! Registry trait for self-registering implementations.
//!
//! Pluggable backends (signers, cache storage) declare the name they are
//! referenced by in configuration together with their factory function.

/// Base trait for implementation registries.
///
/// Each implementation module must provide a Registry struct implementing this
/// trait, e.g. `"memory"` for `storage.implementations.memory` or `"local"` for
/// `account.implementations.local`.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
