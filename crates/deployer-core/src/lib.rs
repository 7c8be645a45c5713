//! Core of the contract deployer.
//!
//! This module owns the transaction status machine: the single authoritative
//! status of the tracked deployment, the identifier returned by the wallet,
//! the staleness checks applied to late outcomes and the cancellable reset
//! back to idle. It also provides the lifecycle event bus and the builder that
//! wires wallet, receipt and encoder implementations from configuration.

pub mod builder;
pub mod event_bus;
pub mod state;

pub use builder::{BuilderError, DeployerBuilder, DeployerFactories};
pub use event_bus::EventBus;
pub use state::{
	Disposition, LifecycleError, StatusSnapshot, TransactionStatusMachine, TriggerOutcome,
};
