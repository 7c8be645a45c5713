//! Receipt source reading transaction receipts from a JSON-RPC node.
//!
//! Wallets that relay transactions hand out their own identifiers rather than
//! on-chain hashes. Such identifiers are first mapped to a hash through the
//! resolver endpoint, queried with the application id; identifiers that
//! already are 32-byte hashes go straight to the node.

use crate::{ReceiptError, ReceiptInterface};
use alloy_primitives::B256;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_transport_http::Http;
use async_trait::async_trait;
use deployer_types::{
	truncate_id, ConfigSchema, Field, FieldType, NetworkConfig, ReceiptOutcome, Schema,
	TransactionIdentifier, ValidationError,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

/// Answer of the identifier resolver.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedTransaction {
	#[serde(default)]
	transaction_hash: Option<String>,
	transaction_status: String,
}

/// Receipt source backed by an Alloy HTTP provider.
pub struct RpcReceiptSource {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	client: reqwest::Client,
	resolver_url: Option<String>,
	app_id: String,
}

impl RpcReceiptSource {
	pub fn new(
		network: &NetworkConfig,
		app_id: impl Into<String>,
		resolver_url: Option<String>,
	) -> Result<Self, ReceiptError> {
		let url = network.rpc_url.parse().map_err(|e| {
			ReceiptError::Configuration(format!("Invalid RPC URL {}: {}", network.rpc_url, e))
		})?;
		let provider = ProviderBuilder::new().on_http(url);

		Ok(Self {
			provider: Arc::new(provider),
			client: reqwest::Client::new(),
			resolver_url: resolver_url.map(|url| url.trim_end_matches('/').to_string()),
			app_id: app_id.into(),
		})
	}

	/// Maps `identifier` to an on-chain hash, or to an outcome when the
	/// resolver already knows how the transaction ended.
	async fn resolve(
		&self,
		identifier: &TransactionIdentifier,
	) -> Result<Result<B256, ReceiptOutcome>, ReceiptError> {
		if let Some(hash) = parse_hash(identifier.as_str()) {
			return Ok(Ok(hash));
		}

		let resolver_url = self
			.resolver_url
			.as_deref()
			.ok_or_else(|| ReceiptError::Unresolvable(identifier.to_string()))?;

		let resolved: ResolvedTransaction = self
			.client
			.get(format!("{}/{}", resolver_url, identifier))
			.query(&[("app_id", self.app_id.as_str()), ("type", "transaction")])
			.send()
			.await
			.and_then(|response| response.error_for_status())
			.map_err(|e| ReceiptError::Network(format!("Resolver request failed: {}", e)))?
			.json()
			.await
			.map_err(|e| ReceiptError::Network(format!("Invalid resolver response: {}", e)))?;

		Ok(resolution_outcome(resolved))
	}
}

fn parse_hash(value: &str) -> Option<B256> {
	if value.len() != 66 || !value.starts_with("0x") {
		return None;
	}
	B256::from_str(value).ok()
}

fn resolution_outcome(resolved: ResolvedTransaction) -> Result<B256, ReceiptOutcome> {
	if resolved.transaction_status == "failed" {
		return Err(ReceiptOutcome::Errored(resolved.transaction_status));
	}
	resolved
		.transaction_hash
		.as_deref()
		.and_then(parse_hash)
		.ok_or(ReceiptOutcome::Confirming)
}

/// Configuration schema for the RPC receipt source.
pub struct RpcReceiptSchema;

impl RpcReceiptSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		RpcReceiptSchema.validate(config)
	}
}

impl ConfigSchema for RpcReceiptSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("resolver_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("resolver_url must be an http(s) URL".to_string()),
					}
				}),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl ReceiptInterface for RpcReceiptSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RpcReceiptSchema)
	}

	async fn status_of(
		&self,
		identifier: &TransactionIdentifier,
	) -> Result<ReceiptOutcome, ReceiptError> {
		let hash = match self.resolve(identifier).await? {
			Ok(hash) => hash,
			Err(outcome) => return Ok(outcome),
		};

		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| ReceiptError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(match receipt {
			None => ReceiptOutcome::Confirming,
			Some(receipt) if receipt.status() => {
				tracing::info!(
					transaction_id = %truncate_id(identifier.as_str()),
					block_number = receipt.block_number.unwrap_or_default(),
					"Transaction confirmed"
				);
				ReceiptOutcome::Confirmed
			},
			Some(_) => ReceiptOutcome::Errored("reverted".to_string()),
		})
	}
}

/// Factory function to create an RPC receipt source from configuration.
///
/// # Parameters
/// - `config`: TOML table with an optional `resolver_url`
/// - `network`: chain id and RPC URL of the node
/// - `app_id`: application id sent with resolver queries
pub fn create_rpc_receipt(
	config: &toml::Value,
	network: &NetworkConfig,
	app_id: &str,
) -> Result<Box<dyn ReceiptInterface>, ReceiptError> {
	RpcReceiptSchema::validate_config(config)
		.map_err(|e| ReceiptError::Configuration(format!("Invalid configuration: {}", e)))?;

	let resolver_url = config
		.get("resolver_url")
		.and_then(|v| v.as_str())
		.map(String::from);

	Ok(Box::new(RpcReceiptSource::new(network, app_id, resolver_url)?))
}

/// Registry for the RPC receipt implementation.
pub struct Registry;

impl deployer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "rpc";
	type Factory = crate::ReceiptFactory;

	fn factory() -> Self::Factory {
		create_rpc_receipt
	}
}

impl crate::ReceiptRegistry for Registry {}
