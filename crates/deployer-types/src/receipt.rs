//! Receipt outcome types.
//!
//! A receipt outcome only ever moves forward: from `Confirming` to one of the
//! two terminal outcomes. Once terminal it stays put.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of asking the node about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ReceiptOutcome {
	/// Not mined yet, or not yet resolvable to an on-chain hash.
	Confirming,
	/// Mined and executed successfully.
	Confirmed,
	/// Mined and reverted, or reported failed by the resolver.
	Errored(String),
}

impl ReceiptOutcome {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, ReceiptOutcome::Confirming)
	}

	/// Combines a previously observed outcome with a newly polled one.
	///
	/// A terminal outcome is sticky, so a later poll can never move the
	/// observed outcome backwards.
	pub fn advance(self, next: ReceiptOutcome) -> ReceiptOutcome {
		if self.is_terminal() {
			self
		} else {
			next
		}
	}
}

impl fmt::Display for ReceiptOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ReceiptOutcome::Confirming => f.write_str("confirming"),
			ReceiptOutcome::Confirmed => f.write_str("confirmed"),
			ReceiptOutcome::Errored(reason) => write!(f, "errored ({})", reason),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_terminal_outcome_is_sticky() {
		let observed = ReceiptOutcome::Confirmed;
		assert_eq!(
			observed.advance(ReceiptOutcome::Confirming),
			ReceiptOutcome::Confirmed
		);

		let observed = ReceiptOutcome::Errored("reverted".into());
		assert_eq!(
			observed.advance(ReceiptOutcome::Confirmed),
			ReceiptOutcome::Errored("reverted".into())
		);

		let observed = ReceiptOutcome::Confirming;
		assert_eq!(
			observed.advance(ReceiptOutcome::Confirmed),
			ReceiptOutcome::Confirmed
		);
	}
}
