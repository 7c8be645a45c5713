//! Registry trait for self-registering implementations.
//!
//! Wallet integrations and receipt sources are selected by name from the
//! configuration. Each implementation module exposes a `Registry` type that
//! ties that name to the factory building it.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Name under which the implementation appears in configuration, for example
	/// `local` for `[wallet.implementations.local]`.
	const NAME: &'static str;

	/// Factory function type of the owning module.
	type Factory;

	/// Returns the factory building this implementation from its TOML table.
	fn factory() -> Self::Factory;
}
