//! Trigger endpoint.
//!
//! `POST /api/deploy` starts a new deployment cycle. The request is refused
//! while a transaction is pending, mirroring the disabled trigger of the
//! status view.

use super::ErrorResponse;
use axum::{http::StatusCode, response::Json};
use deployer_core::{LifecycleError, TransactionStatusMachine, TriggerOutcome};
use serde::Serialize;

/// Body of an accepted deploy request.
#[derive(Debug, Serialize)]
pub struct DeployResponse {
	pub cycle: u64,
	pub status: String,
}

pub type DeployResult = Result<(StatusCode, Json<DeployResponse>), (StatusCode, Json<ErrorResponse>)>;

/// Handles POST /deploy.
pub fn trigger_deploy(machine: &TransactionStatusMachine) -> DeployResult {
	match machine.trigger() {
		Ok(TriggerOutcome::Started { cycle }) => Ok((
			StatusCode::ACCEPTED,
			Json(DeployResponse {
				cycle,
				status: machine.status().to_string(),
			}),
		)),
		Ok(TriggerOutcome::Ignored) => Err((
			StatusCode::CONFLICT,
			Json(ErrorResponse::new(
				"DEPLOYMENT_PENDING",
				"A deployment is already pending",
			)),
		)),
		Err(e @ LifecycleError::ShutDown) | Err(e @ LifecycleError::NoRuntime) => {
			tracing::warn!(error = %e, "Deploy request refused");
			Err((
				StatusCode::SERVICE_UNAVAILABLE,
				Json(ErrorResponse::new("SERVICE_UNAVAILABLE", e.to_string())),
			))
		},
	}
}
