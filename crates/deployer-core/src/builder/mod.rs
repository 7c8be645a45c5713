//! Builder assembling a status machine from configuration.
//!
//! Wallet and receipt implementations are created through factory functions
//! looked up by the names used in the configuration. Only the primary
//! implementation of each component is kept.

use crate::state::{LifecycleError, TransactionStatusMachine};
use deployer_config::{Config, ImplementationsConfig};
use deployer_encoder::{FactoryDeployBuilder, RequestBuilder};
use deployer_receipt::{ReceiptError, ReceiptInterface, ReceiptWatcher};
use deployer_types::NetworkConfig;
use deployer_wallet::{TransactionSubmitter, WalletError, WalletInterface};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building the status machine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
	#[error(transparent)]
	Lifecycle(#[from] LifecycleError),
}

/// Factory functions for each pluggable component, keyed by implementation name.
pub struct DeployerFactories<WF, RF> {
	pub wallet_factories: HashMap<String, WF>,
	pub receipt_factories: HashMap<String, RF>,
}

/// Builds a [`TransactionStatusMachine`] from a validated configuration.
pub struct DeployerBuilder {
	config: Config,
	request_builder: Option<Arc<dyn RequestBuilder>>,
}

impl DeployerBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			request_builder: None,
		}
	}

	/// Uses `builder` instead of the factory deploy described by `[deploy]`.
	pub fn with_request_builder(mut self, builder: Arc<dyn RequestBuilder>) -> Self {
		self.request_builder = Some(builder);
		self
	}

	pub fn build<WF, RF>(
		self,
		factories: DeployerFactories<WF, RF>,
	) -> Result<TransactionStatusMachine, BuilderError>
	where
		WF: Fn(&toml::Value, &NetworkConfig) -> Result<Box<dyn WalletInterface>, WalletError>,
		RF: Fn(&toml::Value, &NetworkConfig, &str) -> Result<Box<dyn ReceiptInterface>, ReceiptError>,
	{
		let network = &self.config.network;

		let wallet: Box<dyn WalletInterface> = create_primary(
			"wallet",
			&self.config.wallet,
			&factories.wallet_factories,
			|factory, config| factory(config, network).map_err(|e| e.to_string()),
		)?;

		let app_id = self.config.app.id.as_str();
		let receipt: Box<dyn ReceiptInterface> = create_primary(
			"receipt",
			&self.config.receipt,
			&factories.receipt_factories,
			|factory, config| factory(config, network, app_id).map_err(|e| e.to_string()),
		)?;

		let request_builder = match self.request_builder {
			Some(builder) => builder,
			None => Arc::new(
				FactoryDeployBuilder::from_config(&self.config.deploy, network.chain_id)
					.map_err(|e| BuilderError::Config(format!("Invalid deploy artifacts: {}", e)))?,
			),
		};

		let lifecycle = &self.config.lifecycle;
		let watcher = ReceiptWatcher::new(
			Arc::from(receipt),
			Duration::from_millis(lifecycle.poll_interval_ms),
			Duration::from_secs(lifecycle.watch_timeout_seconds),
		);

		tracing::info!(
			app_id = %self.config.app.id,
			chain_id = network.chain_id,
			reset_delay_ms = lifecycle.reset_delay_ms,
			"Status machine ready"
		);

		Ok(TransactionStatusMachine::new(
			request_builder,
			TransactionSubmitter::new(wallet),
			watcher,
			Duration::from_millis(lifecycle.reset_delay_ms),
		)?)
	}
}

/// Creates the primary implementation of `component`.
///
/// Every configured implementation with a known factory is created, so that a
/// broken secondary table still fails the build.
fn create_primary<F, T>(
	component: &str,
	config: &ImplementationsConfig,
	factories: &HashMap<String, F>,
	create: impl Fn(&F, &toml::Value) -> Result<T, String>,
) -> Result<T, BuilderError> {
	let mut implementations = HashMap::new();
	for (name, table) in &config.implementations {
		let Some(factory) = factories.get(name) else {
			continue;
		};
		match create(factory, table) {
			Ok(implementation) => {
				let is_primary = &config.primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				implementations.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	implementations.remove(&config.primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"primary {} implementation '{}' is not available",
			component, config.primary
		))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes};
	use async_trait::async_trait;
	use deployer_encoder::EncodingError;
	use deployer_types::{
		ConfigSchema, PayloadFormat, ReceiptOutcome, Schema, TransactionIdentifier,
		TransactionRequest, TransactionStatus, ValidationError, WalletResponse,
	};
	use deployer_receipt::ReceiptFactory;
	use deployer_wallet::WalletFactory;

	const CONFIG: &str = r#"
[app]
id = "app_staging_0123"

[network]
chain_id = 480
rpc_url = "http://localhost:8545"

[lifecycle]
reset_delay_ms = 1500

[deploy]
factory_address = "0x423e6C871E2c23bBB8f3cB0D1E04813743d878C7"
factory_abi = "abi/Factory.json"
factory_args = ["0x0000000000000000000000000000000000000000000000000000000000000000"]
contract_abi = "abi/Contract.json"
contract_bytecode = "abi/ContractBytecode.json"
constructor_args = ["Hello!"]

[wallet]
primary = "fake"
[wallet.implementations.fake]

[receipt]
primary = "fake"
[receipt.implementations.fake]
"#;

	const FACTORY_ABI: &str = r#"[{"type":"function","name":"deploy","stateMutability":"nonpayable",
		"inputs":[{"name":"code","type":"bytes"},{"name":"salt","type":"bytes32"}],
		"outputs":[{"name":"","type":"address"}]}]"#;
	const CONTRACT_ABI: &str =
		r#"[{"type":"constructor","stateMutability":"nonpayable","inputs":[{"name":"greeting","type":"string"}]}]"#;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	struct ApprovingWallet;

	#[async_trait]
	impl WalletInterface for ApprovingWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn send_transaction(
			&self,
			request: &TransactionRequest,
			_format: PayloadFormat,
		) -> Result<WalletResponse, WalletError> {
			assert_eq!(request.function(), "deploy");
			Ok(WalletResponse::success("tx_built"))
		}
	}

	/// Answers with an identifier naming the called function, its data and
	/// the payload format.
	struct EchoWallet;

	#[async_trait]
	impl WalletInterface for EchoWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn send_transaction(
			&self,
			request: &TransactionRequest,
			format: PayloadFormat,
		) -> Result<WalletResponse, WalletError> {
			Ok(WalletResponse::success(format!(
				"{}:{}:{:?}",
				request.function(),
				alloy_primitives::hex::encode(request.data()),
				format
			)))
		}
	}

	struct GreetBuilder;

	impl RequestBuilder for GreetBuilder {
		fn build(&self) -> Result<TransactionRequest, EncodingError> {
			Ok(TransactionRequest::new(
				Address::ZERO,
				"greet",
				serde_json::json!([]),
				Bytes::from_static(&[0xcf, 0xae, 0x32, 0x17]),
				480,
			))
		}

		fn payload_format(&self) -> PayloadFormat {
			PayloadFormat::Formatted
		}
	}

	struct ConfirmedReceipts;

	#[async_trait]
	impl ReceiptInterface for ConfirmedReceipts {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn status_of(
			&self,
			_identifier: &TransactionIdentifier,
		) -> Result<ReceiptOutcome, ReceiptError> {
			Ok(ReceiptOutcome::Confirmed)
		}
	}

	fn factories() -> DeployerFactories<WalletFactory, ReceiptFactory> {
		let wallet: WalletFactory = |_, _| Ok(Box::new(ApprovingWallet));
		let receipt: ReceiptFactory = |_, _, _| Ok(Box::new(ConfirmedReceipts));
		DeployerFactories {
			wallet_factories: HashMap::from([("fake".to_string(), wallet)]),
			receipt_factories: HashMap::from([("fake".to_string(), receipt)]),
		}
	}

	async fn load_config(dir: &tempfile::TempDir) -> Config {
		let abi_dir = dir.path().join("abi");
		std::fs::create_dir_all(&abi_dir).unwrap();
		std::fs::write(abi_dir.join("Factory.json"), FACTORY_ABI).unwrap();
		std::fs::write(abi_dir.join("Contract.json"), CONTRACT_ABI).unwrap();
		std::fs::write(abi_dir.join("ContractBytecode.json"), r#"{"object":"0x6080604052"}"#)
			.unwrap();
		let path = dir.path().join("deployer.toml");
		std::fs::write(&path, CONFIG).unwrap();
		Config::from_file(&path).await.unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn test_build_and_deploy() {
		let dir = tempfile::tempdir().unwrap();
		let config = load_config(&dir).await;

		let machine = DeployerBuilder::new(config).build(factories()).unwrap();
		let mut events = machine.subscribe();
		machine.trigger().unwrap();

		loop {
			if let deployer_types::LifecycleEvent::StatusChanged { to, .. } =
				events.recv().await.unwrap()
			{
				if to == TransactionStatus::Success {
					break;
				}
			}
		}
		assert_eq!(
			machine.transaction_id().map(|id| id.to_string()),
			Some("tx_built".to_string())
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_injected_request_builder_drives_the_machine() {
		let dir = tempfile::tempdir().unwrap();
		let config = load_config(&dir).await;
		let mut factories = factories();
		let echo: WalletFactory = |_, _| Ok(Box::new(EchoWallet));
		factories.wallet_factories.insert("fake".to_string(), echo);

		let machine = DeployerBuilder::new(config)
			.with_request_builder(Arc::new(GreetBuilder))
			.build(factories)
			.unwrap();
		let mut events = machine.subscribe();
		machine.trigger().unwrap();

		loop {
			if let deployer_types::LifecycleEvent::StatusChanged { to, .. } =
				events.recv().await.unwrap()
			{
				if to == TransactionStatus::Success {
					break;
				}
			}
		}
		assert_eq!(
			machine.transaction_id().map(|id| id.to_string()),
			Some("greet:cfae3217:Formatted".to_string())
		);
	}

	#[tokio::test]
	async fn test_unknown_primary_is_missing() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = load_config(&dir).await;
		config.wallet.primary = "ledger".to_string();

		let err = DeployerBuilder::new(config).build(factories()).unwrap_err();
		assert!(matches!(err, BuilderError::MissingComponent(_)));
	}

	#[tokio::test]
	async fn test_failing_factory_fails_build() {
		let dir = tempfile::tempdir().unwrap();
		let config = load_config(&dir).await;
		let mut factories = factories();
		let broken: WalletFactory = |_, _| Err(WalletError::Configuration("bad key".into()));
		factories.wallet_factories.insert("fake".to_string(), broken);

		let err = DeployerBuilder::new(config).build(factories).unwrap_err();
		assert!(err.to_string().contains("bad key"));
	}
}
