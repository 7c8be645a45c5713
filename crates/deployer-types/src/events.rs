//! Event types published by the status machine.
//!
//! Events flow through the lifecycle event bus so that observers (the API
//! surface, logs, tests) can follow a deployment without polling the status.

use crate::{ReceiptOutcome, RejectReason, TransactionIdentifier, TransactionStatus};
use serde::{Deserialize, Serialize};

/// Events emitted over one deployment lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
	/// The authoritative status changed.
	StatusChanged {
		from: TransactionStatus,
		to: TransactionStatus,
	},
	/// The wallet accepted the request and returned an identifier.
	TransactionSubmitted {
		transaction_id: TransactionIdentifier,
	},
	/// The submission did not produce an identifier.
	SubmissionRejected { reason: RejectReason },
	/// The receipt watcher reported a terminal outcome for the stored identifier.
	ReceiptResolved {
		transaction_id: TransactionIdentifier,
		outcome: ReceiptOutcome,
	},
	/// An outcome arrived for an identifier that is no longer tracked.
	StaleOutcomeDiscarded {
		transaction_id: TransactionIdentifier,
	},
}
