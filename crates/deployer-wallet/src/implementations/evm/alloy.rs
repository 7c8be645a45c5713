//! Local-key wallet backed by an Alloy provider.
//!
//! Signs requests with a private key held in configuration and submits them
//! over HTTP. There is no user prompt to decline, so node rejections come back
//! as `transaction_failed` responses and transport failures as network errors.

use crate::{WalletError, WalletInterface};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::U256;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest as AlloyTransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use deployer_types::{
	truncate_id, with_0x_prefix, ConfigSchema, Field, FieldType, NetworkConfig, PayloadFormat,
	Schema, SecretString, TransactionRequest, ValidationError, WalletResponse,
};
use std::sync::Arc;

/// Wallet signing with a local private key.
pub struct LocalWallet {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	chain_id: u64,
}

impl LocalWallet {
	/// Creates a wallet for `network` signing with `signer`.
	pub fn new(network: &NetworkConfig, signer: PrivateKeySigner) -> Result<Self, WalletError> {
		let url = network.rpc_url.parse().map_err(|e| {
			WalletError::Configuration(format!("Invalid RPC URL {}: {}", network.rpc_url, e))
		})?;

		let wallet = EthereumWallet::from(signer.with_chain_id(Some(network.chain_id)));
		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Self {
			provider: Arc::new(provider),
			chain_id: network.chain_id,
		})
	}
}

/// Configuration schema for the local wallet.
pub struct LocalWalletSchema;

impl LocalWalletSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		LocalWalletSchema.validate(config)
	}
}

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let hex = key.strip_prefix("0x").unwrap_or(key);
					if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
						return Err("private_key must be 32 bytes of hex".to_string());
					}
					Ok(())
				}),
			],
			vec![],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl WalletInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn send_transaction(
		&self,
		request: &TransactionRequest,
		format: PayloadFormat,
	) -> Result<WalletResponse, WalletError> {
		if request.chain_id() != self.chain_id {
			return Ok(WalletResponse::error(
				"invalid_chain",
				serde_json::json!({
					"expected": self.chain_id,
					"actual": request.chain_id(),
				}),
			));
		}

		// The call data is signed as encoded in both formats.
		tracing::debug!(
			function = %request.function(),
			format = ?format,
			"Signing transaction with local key"
		);

		let tx = AlloyTransactionRequest::default()
			.with_to(request.to())
			.with_input(request.data().clone())
			.with_value(U256::ZERO)
			.with_chain_id(request.chain_id());

		match self.provider.send_transaction(tx).await {
			Ok(pending) => {
				let hash = with_0x_prefix(&pending.tx_hash().to_string());
				tracing::info!(
					tx_hash = %truncate_id(&hash),
					chain_id = self.chain_id,
					"Submitted transaction"
				);
				Ok(WalletResponse::success(hash))
			},
			Err(e) => match e.as_error_resp() {
				Some(payload) => Ok(WalletResponse::error(
					"transaction_failed",
					serde_json::to_value(payload).unwrap_or_default(),
				)),
				None => Err(WalletError::Network(format!(
					"Failed to send transaction: {}",
					e
				))),
			},
		}
	}
}

/// Factory function to create a local wallet from configuration.
///
/// # Parameters
/// - `config`: TOML table containing `private_key` (required)
/// - `network`: chain id and RPC URL of the target network
pub fn create_local_wallet(
	config: &toml::Value,
	network: &NetworkConfig,
) -> Result<Box<dyn WalletInterface>, WalletError> {
	LocalWalletSchema::validate_config(config)
		.map_err(|e| WalletError::Configuration(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| WalletError::Configuration("private_key is required".to_string()))?;

	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse()
			.map_err(|_| WalletError::Configuration("Invalid private key format".to_string()))
	})?;

	Ok(Box::new(LocalWallet::new(network, signer)?))
}

/// Registry for the local wallet implementation.
pub struct Registry;

impl deployer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::WalletFactory;

	fn factory() -> Self::Factory {
		create_local_wallet
	}
}

impl crate::WalletRegistry for Registry {}
