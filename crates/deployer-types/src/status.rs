//! Lifecycle status of the tracked transaction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The single authoritative status exposed by the status machine.
///
/// `Idle` is both the initial state and the state reached after the reset
/// delay following a terminal outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
	#[default]
	Idle,
	Pending,
	Success,
	Failed,
}

impl TransactionStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
	}

	/// Whether a new deployment may be triggered from this status.
	pub fn can_trigger(self) -> bool {
		self != TransactionStatus::Pending
	}

	/// Feedback label rendered next to the trigger. `Idle` shows nothing.
	pub fn label(self) -> Option<&'static str> {
		match self {
			TransactionStatus::Idle => None,
			TransactionStatus::Pending => Some("pending"),
			TransactionStatus::Success => Some("successful"),
			TransactionStatus::Failed => Some("failed"),
		}
	}
}

impl fmt::Display for TransactionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TransactionStatus::Idle => "idle",
			TransactionStatus::Pending => "pending",
			TransactionStatus::Success => "success",
			TransactionStatus::Failed => "failed",
		};
		f.write_str(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_labels() {
		assert_eq!(TransactionStatus::Idle.label(), None);
		assert_eq!(TransactionStatus::Pending.label(), Some("pending"));
		assert_eq!(TransactionStatus::Success.label(), Some("successful"));
		assert_eq!(TransactionStatus::Failed.label(), Some("failed"));
	}

	#[test]
	fn test_trigger_disabled_only_while_pending() {
		assert!(TransactionStatus::Idle.can_trigger());
		assert!(!TransactionStatus::Pending.can_trigger());
		assert!(TransactionStatus::Success.can_trigger());
		assert!(TransactionStatus::Failed.can_trigger());
	}
}
