//! Common types module for the contract deployer.
//!
//! This module defines the data types shared by every deployer component:
//! the transaction request handed to a wallet, the identifier a wallet hands
//! back, receipt outcomes reported by the node, and the lifecycle status that
//! the status machine exposes to callers.

/// Transaction submission types exchanged with the wallet integration.
pub mod delivery;
/// Lifecycle events published by the status machine.
pub mod events;
/// Node client configuration types.
pub mod networks;
/// Receipt outcomes reported by the receipt watcher.
pub mod receipt;
/// Registry trait for named, configurable implementations.
pub mod registry;
/// Redacting string wrapper for key material.
pub mod secret_string;
/// The lifecycle status projected to callers.
pub mod status;
/// Formatting helpers.
pub mod utils;
/// Configuration validation types for implementation-specific TOML tables.
pub mod validation;

pub use delivery::*;
pub use events::*;
pub use networks::NetworkConfig;
pub use receipt::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use status::*;
pub use utils::{truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::*;
