//! Lifecycle state of the tracked deployment.

pub mod lifecycle;

pub use lifecycle::{
	Disposition, LifecycleError, StatusSnapshot, TransactionStatusMachine, TriggerOutcome,
};
