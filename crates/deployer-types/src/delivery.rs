//! Transaction submission types for the deployer.
//!
//! This module defines what is handed to a wallet integration (the request),
//! what the wallet answers (the raw response), and the normalized result the
//! status machine consumes.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single transaction handed to the wallet integration.
///
/// Requests are built fresh for every submission attempt and cannot be
/// mutated once built. The value is always zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
	to: Address,
	function: String,
	abi: serde_json::Value,
	data: Bytes,
	value: U256,
	chain_id: u64,
}

impl TransactionRequest {
	/// Creates a request calling `function` on `to` with already encoded call data.
	///
	/// `abi` is the ABI description of the called contract, forwarded so that
	/// wallets able to render the call can do so.
	pub fn new(
		to: Address,
		function: impl Into<String>,
		abi: serde_json::Value,
		data: Bytes,
		chain_id: u64,
	) -> Self {
		Self {
			to,
			function: function.into(),
			abi,
			data,
			value: U256::ZERO,
			chain_id,
		}
	}

	pub fn to(&self) -> Address {
		self.to
	}

	pub fn function(&self) -> &str {
		&self.function
	}

	pub fn abi(&self) -> &serde_json::Value {
		&self.abi
	}

	pub fn data(&self) -> &Bytes {
		&self.data
	}

	pub fn value(&self) -> U256 {
		self.value
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}
}

/// Errors raised when building a [`TransactionIdentifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
	#[error("Transaction identifier cannot be empty")]
	Empty,
}

/// Opaque token returned by a wallet after a successful submission.
///
/// An identifier is never empty. "No active transaction" is modelled as the
/// absence of an identifier, so a receipt lookup can never be addressed with
/// an empty key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionIdentifier(String);

impl TransactionIdentifier {
	pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(IdentifierError::Empty);
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TransactionIdentifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for TransactionIdentifier {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl TryFrom<String> for TransactionIdentifier {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<TransactionIdentifier> for String {
	fn from(id: TransactionIdentifier) -> Self {
		id.0
	}
}

impl AsRef<str> for TransactionIdentifier {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Execution mode flag forwarded to the wallet with each request.
///
/// `Raw` sends the call data exactly as encoded; `Formatted` lets the wallet
/// reformat the payload (for example to normalize argument encodings).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
	#[default]
	Raw,
	Formatted,
}

/// Raw answer of a wallet integration.
///
/// A `status` of `"success"` carries the transaction id. Any other status is a
/// rejection, described by `error_code` and the diagnostic `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletResponse {
	pub status: String,
	#[serde(default)]
	pub transaction_id: Option<String>,
	#[serde(default)]
	pub error_code: Option<String>,
	#[serde(default)]
	pub details: serde_json::Value,
}

impl WalletResponse {
	/// Status tag of an accepted submission.
	pub const SUCCESS: &'static str = "success";

	pub fn success(transaction_id: impl Into<String>) -> Self {
		Self {
			status: Self::SUCCESS.to_string(),
			transaction_id: Some(transaction_id.into()),
			error_code: None,
			details: serde_json::Value::Null,
		}
	}

	pub fn error(error_code: impl Into<String>, details: serde_json::Value) -> Self {
		Self {
			status: "error".to_string(),
			transaction_id: None,
			error_code: Some(error_code.into()),
			details,
		}
	}

	pub fn is_success(&self) -> bool {
		self.status == Self::SUCCESS
	}
}

/// Why a submission did not produce a transaction identifier.
///
/// Every variant leads to the same user-visible failure; the distinction is
/// kept for logs and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
	/// The user dismissed the wallet prompt.
	UserCancelled,
	/// The wallet refused the request after validating it.
	WalletValidation(String),
	/// The wallet could not reach its network.
	Network(String),
	/// Required on-chain registration (contract entrypoint, permit token) is missing.
	Configuration(String),
	/// The request could not be encoded; the wallet was never prompted.
	Encoding(String),
	/// Unexpected fault inside a collaborator.
	Internal(String),
}

impl RejectReason {
	/// Stable reason code used in logs and API payloads.
	pub fn code(&self) -> &'static str {
		match self {
			RejectReason::UserCancelled => "user_cancelled",
			RejectReason::WalletValidation(_) => "wallet_validation",
			RejectReason::Network(_) => "network",
			RejectReason::Configuration(_) => "configuration",
			RejectReason::Encoding(_) => "encoding",
			RejectReason::Internal(_) => "internal",
		}
	}
}

impl fmt::Display for RejectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RejectReason::UserCancelled => f.write_str("user_cancelled"),
			RejectReason::WalletValidation(detail)
			| RejectReason::Network(detail)
			| RejectReason::Configuration(detail)
			| RejectReason::Encoding(detail)
			| RejectReason::Internal(detail) => write!(f, "{}: {}", self.code(), detail),
		}
	}
}

/// Normalized outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionResult {
	Submitted(TransactionIdentifier),
	Rejected(RejectReason),
}

impl SubmissionResult {
	pub fn is_submitted(&self) -> bool {
		matches!(self, SubmissionResult::Submitted(_))
	}
}
