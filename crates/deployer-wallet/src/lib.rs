//! Transaction submission for the contract deployer.
//!
//! This module defines the wallet boundary and the submitter that sits in
//! front of it. A wallet integration answers with a loosely structured
//! [`WalletResponse`]; the [`TransactionSubmitter`] turns every possible
//! answer, error or panic into a [`SubmissionResult`] so that nothing a wallet
//! does can leave the status machine without an outcome.

use async_trait::async_trait;
use deployer_types::{
	truncate_id, ConfigSchema, ImplementationRegistry, NetworkConfig, PayloadFormat, RejectReason,
	SubmissionResult, TransactionIdentifier, TransactionRequest, WalletResponse,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors a wallet integration can raise instead of answering.
#[derive(Debug, Error)]
pub enum WalletError {
	/// The wallet could not reach its network.
	#[error("Network error: {0}")]
	Network(String),
	/// The wallet is misconfigured.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Any other failure inside the integration.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Trait defining the wallet boundary.
///
/// One call is one user-facing prompt: the wallet signs and submits the
/// request, then reports what happened. Implementations should answer
/// rejections through [`WalletResponse::error`] and reserve `Err` for faults.
#[async_trait]
pub trait WalletInterface: Send + Sync {
	/// Returns the configuration schema for this wallet implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Asks the wallet to sign and submit `request`.
	async fn send_transaction(
		&self,
		request: &TransactionRequest,
		format: PayloadFormat,
	) -> Result<WalletResponse, WalletError>;
}

/// Type alias for wallet factory functions.
pub type WalletFactory =
	fn(&toml::Value, &NetworkConfig) -> Result<Box<dyn WalletInterface>, WalletError>;

/// Registry trait for wallet implementations.
pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// Get all registered wallet implementations.
pub fn get_all_implementations() -> Vec<(&'static str, WalletFactory)> {
	use implementations::evm::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Wallet error codes that mean required on-chain registration is missing.
const CONFIGURATION_CODES: &[&str] = &[
	"invalid_contract",
	"disallowed_operation",
	"permitted_amount_not_found",
	"invalid_app_id",
];

/// Maps a wallet error code to the reason reported to the status machine.
pub fn reject_reason(error_code: Option<&str>, details: &serde_json::Value) -> RejectReason {
	match error_code {
		Some("user_rejected") | Some("user_cancelled") => RejectReason::UserCancelled,
		Some(code) if CONFIGURATION_CODES.contains(&code) => {
			RejectReason::Configuration(code.to_string())
		},
		Some("network_error") | Some("transaction_failed") => {
			RejectReason::Network(details.to_string())
		},
		Some(code) => RejectReason::WalletValidation(code.to_string()),
		None => RejectReason::WalletValidation("unknown_error".to_string()),
	}
}

/// Submits requests through a wallet and normalizes the answer.
pub struct TransactionSubmitter {
	wallet: Box<dyn WalletInterface>,
}

impl TransactionSubmitter {
	pub fn new(wallet: Box<dyn WalletInterface>) -> Self {
		Self { wallet }
	}

	/// Sends `request` through the wallet. Never fails.
	///
	/// Callers must not overlap calls: each call prompts the user.
	pub async fn submit(
		&self,
		request: &TransactionRequest,
		format: PayloadFormat,
	) -> SubmissionResult {
		let call = AssertUnwindSafe(self.wallet.send_transaction(request, format)).catch_unwind();

		let response = match call.await {
			Ok(Ok(response)) => response,
			Ok(Err(WalletError::Network(detail))) => {
				tracing::warn!(error = %detail, "Wallet could not reach the network");
				return SubmissionResult::Rejected(RejectReason::Network(detail));
			},
			Ok(Err(e)) => {
				tracing::error!(error = %e, "Wallet integration failed");
				return SubmissionResult::Rejected(RejectReason::Internal(e.to_string()));
			},
			Err(_) => {
				tracing::error!("Wallet integration panicked during submission");
				return SubmissionResult::Rejected(RejectReason::Internal(
					"wallet panicked".to_string(),
				));
			},
		};

		self.normalize(response)
	}

	fn normalize(&self, response: WalletResponse) -> SubmissionResult {
		if !response.is_success() {
			let reason = reject_reason(response.error_code.as_deref(), &response.details);
			tracing::warn!(
				status = %response.status,
				reason = %reason,
				details = %response.details,
				"Wallet rejected transaction"
			);
			return SubmissionResult::Rejected(reason);
		}

		match response
			.transaction_id
			.map(TransactionIdentifier::new)
			.and_then(Result::ok)
		{
			Some(id) => {
				tracing::info!(transaction_id = %truncate_id(id.as_str()), "Transaction submitted");
				SubmissionResult::Submitted(id)
			},
			None => {
				tracing::error!("Wallet reported success without a transaction id");
				SubmissionResult::Rejected(RejectReason::Internal("malformed response".to_string()))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes};
	use deployer_types::{Schema, ValidationError};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	enum Answer {
		Respond(WalletResponse),
		NetworkDown,
		Broken,
		Panic,
	}

	struct FakeWallet {
		answer: Answer,
		calls: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl WalletInterface for FakeWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn send_transaction(
			&self,
			_request: &TransactionRequest,
			_format: PayloadFormat,
		) -> Result<WalletResponse, WalletError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			match &self.answer {
				Answer::Respond(response) => Ok(response.clone()),
				Answer::NetworkDown => Err(WalletError::Network("offline".into())),
				Answer::Broken => Err(WalletError::Implementation("bridge closed".into())),
				Answer::Panic => panic!("wallet bridge crashed"),
			}
		}
	}

	fn request() -> TransactionRequest {
		TransactionRequest::new(
			Address::ZERO,
			"deploy",
			serde_json::json!([]),
			Bytes::from_static(&[0x01]),
			480,
		)
	}

	async fn submit(answer: Answer) -> (SubmissionResult, usize) {
		let calls = Arc::new(AtomicUsize::new(0));
		let submitter = TransactionSubmitter::new(Box::new(FakeWallet {
			answer,
			calls: calls.clone(),
		}));
		let result = submitter.submit(&request(), PayloadFormat::Raw).await;
		(result, calls.load(Ordering::SeqCst))
	}

	fn rejected_with(code: &str) -> Answer {
		Answer::Respond(WalletResponse::error(
			code,
			serde_json::json!({ "debug": code }),
		))
	}

	#[tokio::test]
	async fn test_success_yields_identifier() {
		let (result, calls) = submit(Answer::Respond(WalletResponse::success("tx_abc"))).await;
		assert_eq!(
			result,
			SubmissionResult::Submitted(TransactionIdentifier::new("tx_abc").unwrap())
		);
		assert_eq!(calls, 1);
	}

	#[tokio::test]
	async fn test_success_without_id_is_malformed() {
		let mut response = WalletResponse::success("ignored");
		response.transaction_id = None;
		let (result, _) = submit(Answer::Respond(response)).await;
		assert_eq!(
			result,
			SubmissionResult::Rejected(RejectReason::Internal("malformed response".into()))
		);

		let (result, _) = submit(Answer::Respond(WalletResponse::success(""))).await;
		assert!(!result.is_submitted());
	}

	#[tokio::test]
	async fn test_error_codes_are_mapped() {
		let (result, _) = submit(rejected_with("user_rejected")).await;
		assert_eq!(result, SubmissionResult::Rejected(RejectReason::UserCancelled));

		let (result, _) = submit(rejected_with("invalid_contract")).await;
		assert_eq!(
			result,
			SubmissionResult::Rejected(RejectReason::Configuration("invalid_contract".into()))
		);

		let (result, _) = submit(rejected_with("simulation_failed")).await;
		assert_eq!(
			result,
			SubmissionResult::Rejected(RejectReason::WalletValidation(
				"simulation_failed".into()
			))
		);

		let (result, _) = submit(rejected_with("network_error")).await;
		assert!(matches!(
			result,
			SubmissionResult::Rejected(RejectReason::Network(_))
		));
	}

	#[tokio::test]
	async fn test_wallet_errors_are_caught() {
		let (result, _) = submit(Answer::NetworkDown).await;
		assert_eq!(
			result,
			SubmissionResult::Rejected(RejectReason::Network("offline".into()))
		);

		let (result, _) = submit(Answer::Broken).await;
		assert!(matches!(
			result,
			SubmissionResult::Rejected(RejectReason::Internal(_))
		));
	}

	#[tokio::test]
	async fn test_wallet_panic_is_caught() {
		let (result, calls) = submit(Answer::Panic).await;
		assert_eq!(
			result,
			SubmissionResult::Rejected(RejectReason::Internal("wallet panicked".into()))
		);
		assert_eq!(calls, 1);
	}

	#[test]
	fn test_registry_lists_local_wallet() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["local"]);
	}
}
