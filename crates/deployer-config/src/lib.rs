//! Configuration module for the contract deployer.
//!
//! Configuration is read from TOML. Values may reference environment variables
//! with `${VAR}` or `${VAR:-default}`, and a file may pull in other files with
//! `include = ["wallet.toml", ...]` as long as every top-level section is
//! defined only once. The whole configuration is validated at load time so a
//! missing application id fails at startup rather than at the first deploy.

mod loader;

use alloy_primitives::Address;
use deployer_types::{NetworkConfig, PayloadFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The default rendering dumps the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level deployer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Application identity injected at startup.
	pub app: AppConfig,
	/// Node client used for receipts.
	pub network: NetworkConfig,
	/// Timings of the status machine and the receipt watcher.
	#[serde(default)]
	pub lifecycle: LifecycleConfig,
	/// What gets deployed and through which factory.
	pub deploy: DeployConfig,
	/// Wallet integrations; `primary` selects the active one.
	pub wallet: ImplementationsConfig,
	/// Receipt sources; `primary` selects the active one.
	pub receipt: ImplementationsConfig,
	/// HTTP surface exposing the trigger and the status.
	pub api: Option<ApiConfig>,
}

/// Application identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	/// Application id issued by the wallet platform, e.g. `app_0123abcd`.
	pub id: String,
}

/// Timings of the deployment lifecycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
	/// Delay after a terminal status before returning to idle.
	#[serde(default = "default_reset_delay_ms")]
	pub reset_delay_ms: u64,
	/// Interval between two receipt polls.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Upper bound on how long one transaction is watched.
	#[serde(default = "default_watch_timeout_seconds")]
	pub watch_timeout_seconds: u64,
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			reset_delay_ms: default_reset_delay_ms(),
			poll_interval_ms: default_poll_interval_ms(),
			watch_timeout_seconds: default_watch_timeout_seconds(),
		}
	}
}

fn default_reset_delay_ms() -> u64 {
	3000
}

fn default_poll_interval_ms() -> u64 {
	2000
}

fn default_watch_timeout_seconds() -> u64 {
	600
}

/// Deployment through a deterministic deploy factory.
///
/// The contract artifacts and constructor arguments produce the init code,
/// which is passed as the first argument of `factory_function`, followed by
/// `factory_args` (typically the salt).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeployConfig {
	pub factory_address: String,
	pub factory_abi: PathBuf,
	#[serde(default = "default_factory_function")]
	pub factory_function: String,
	#[serde(default)]
	pub factory_args: Vec<String>,
	pub contract_abi: PathBuf,
	pub contract_bytecode: PathBuf,
	#[serde(default)]
	pub constructor_args: Vec<String>,
	#[serde(default)]
	pub payload_format: PayloadFormat,
}

fn default_factory_function() -> String {
	"deploy".to_string()
}

impl DeployConfig {
	/// Makes relative artifact paths relative to `base_dir`.
	fn resolve_paths(&mut self, base_dir: &Path) {
		for path in [
			&mut self.factory_abi,
			&mut self.contract_abi,
			&mut self.contract_bytecode,
		] {
			if path.is_relative() {
				*path = base_dir.join(&*path);
			}
		}
	}
}

/// Named implementations with one selected as primary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImplementationsConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

impl ImplementationsConfig {
	/// Returns the configuration table of the primary implementation.
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}

	fn validate(&self, section: &str) -> Result<(), ConfigError> {
		if self.primary.is_empty() {
			return Err(ConfigError::Validation(format!(
				"{} primary implementation cannot be empty",
				section
			)));
		}
		if !self.implementations.contains_key(&self.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary {} '{}' not found in implementations",
				section, self.primary
			)));
		}
		Ok(())
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:-default}` references.
///
/// Input is capped at 1MB before the regex runs.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures<'_>| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads and validates the configuration at `path`, following includes.
	///
	/// Relative artifact paths in `[deploy]` are resolved against the
	/// directory containing `path`.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;

		let mut loader = ConfigLoader::new(base_dir);
		let mut config = loader.load_config(file_name).await?;
		config.deploy.resolve_paths(base_dir);

		tracing::debug!(app_id = %config.app.id, chain_id = config.network.chain_id, "Loaded configuration");
		Ok(config)
	}

	/// Checks every section. Called for any configuration parsed from text.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.app.id.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Application id (app.id) is required".into(),
			));
		}
		if !self.app.id.starts_with("app_") {
			return Err(ConfigError::Validation(format!(
				"Application id '{}' must start with 'app_'",
				self.app.id
			)));
		}

		if self.network.chain_id == 0 {
			return Err(ConfigError::Validation(
				"network.chain_id must be greater than 0".into(),
			));
		}
		if !(self.network.rpc_url.starts_with("http://")
			|| self.network.rpc_url.starts_with("https://"))
		{
			return Err(ConfigError::Validation(format!(
				"network.rpc_url must be an http(s) URL, got '{}'",
				self.network.rpc_url
			)));
		}

		if self.lifecycle.reset_delay_ms == 0 {
			return Err(ConfigError::Validation(
				"lifecycle.reset_delay_ms must be greater than 0".into(),
			));
		}
		if self.lifecycle.poll_interval_ms < 100 {
			return Err(ConfigError::Validation(
				"lifecycle.poll_interval_ms must be at least 100".into(),
			));
		}
		if self.lifecycle.watch_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"lifecycle.watch_timeout_seconds must be greater than 0".into(),
			));
		}

		Address::from_str(&self.deploy.factory_address).map_err(|e| {
			ConfigError::Validation(format!(
				"Invalid deploy.factory_address '{}': {}",
				self.deploy.factory_address, e
			))
		})?;
		if self.deploy.factory_function.is_empty() {
			return Err(ConfigError::Validation(
				"deploy.factory_function cannot be empty".into(),
			));
		}

		self.wallet.validate("wallet")?;
		self.receipt.validate("receipt")?;

		Ok(())
	}
}

impl Config {
	/// Builds a configuration from a table whose environment references are
	/// already resolved.
	pub(crate) fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
		let config: Config = toml::Value::Table(table).try_into()?;
		config.validate()?;
		Ok(config)
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		Self::from_table(toml::from_str(&resolved)?)
	}
}
