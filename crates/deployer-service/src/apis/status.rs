//! Status endpoint.

use axum::response::Json;
use deployer_core::TransactionStatusMachine;
use deployer_types::{TransactionIdentifier, TransactionStatus};
use serde::Serialize;

/// What a client renders: the feedback label next to the trigger and
/// whether the trigger is enabled.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
	pub status: TransactionStatus,
	pub label: Option<&'static str>,
	pub transaction_id: Option<TransactionIdentifier>,
	pub can_deploy: bool,
}

/// Handles GET /status.
pub fn get_status(machine: &TransactionStatusMachine) -> Json<StatusResponse> {
	let snapshot = machine.snapshot();
	Json(StatusResponse {
		status: snapshot.status,
		label: snapshot.label,
		transaction_id: snapshot.transaction_id,
		can_deploy: snapshot.can_trigger,
	})
}
