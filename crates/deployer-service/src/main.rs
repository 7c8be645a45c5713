//! Main entry point for the deployer service.
//!
//! Loads the configuration, wires the wallet and receipt implementations into
//! a status machine and serves the trigger and status endpoints until
//! interrupted.

use clap::Parser;
use deployer_config::Config;
use deployer_core::{DeployerBuilder, DeployerFactories, TransactionStatusMachine};
use deployer_receipt::ReceiptFactory;
use deployer_wallet::WalletFactory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the deployer service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/deployer.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started deployer");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.app.id);

	let api_config = config.api.clone().filter(|api| api.enabled);
	let machine = Arc::new(build_machine(config)?);

	match api_config {
		Some(api_config) => {
			tokio::select! {
				result = server::start_server(api_config, Arc::clone(&machine)) => {
					tracing::info!("API server finished");
					machine.shutdown();
					result?;
				}
				result = tokio::signal::ctrl_c() => {
					tracing::info!("Received interrupt");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, waiting for interrupt");
			tokio::signal::ctrl_c().await?;
		},
	}

	machine.shutdown();
	tracing::info!("Stopped deployer");
	Ok(())
}

/// Builds the status machine with every known implementation available.
fn build_machine(config: Config) -> Result<TransactionStatusMachine, Box<dyn std::error::Error + Send + Sync>> {
	Ok(DeployerBuilder::new(config).build(build_factories())?)
}

/// Collects the factories each implementation crate registers.
fn build_factories() -> DeployerFactories<WalletFactory, ReceiptFactory> {
	let wallet_factories: HashMap<String, WalletFactory> = deployer_wallet::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect();
	let receipt_factories: HashMap<String, ReceiptFactory> =
		deployer_receipt::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();

	tracing::debug!(
		wallets = ?wallet_factories.keys().collect::<Vec<_>>(),
		receipts = ?receipt_factories.keys().collect::<Vec<_>>(),
		"Registered implementations"
	);

	DeployerFactories {
		wallet_factories,
		receipt_factories,
	}
}
