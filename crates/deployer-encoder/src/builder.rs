//! Request builders.
//!
//! The status machine does not know what it deploys. It asks a
//! [`RequestBuilder`] for a fresh request on every trigger; different deploy
//! flows are different builders driving the same machine.

use crate::artifact::{self, AbiArtifact};
use crate::{coerce_args, encode_deploy_data, encode_function_call, EncodingError};
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes};
use deployer_config::DeployConfig;
use deployer_types::{PayloadFormat, TransactionRequest};
use std::str::FromStr;

/// Capability producing the transaction to submit.
pub trait RequestBuilder: Send + Sync {
	/// Builds a new request. Must not touch the network.
	fn build(&self) -> Result<TransactionRequest, EncodingError>;

	/// Execution mode forwarded to the wallet with the request.
	fn payload_format(&self) -> PayloadFormat {
		PayloadFormat::Raw
	}
}

/// Deploys a contract through a deterministic deploy factory.
///
/// The request calls `factory.<function>(initCode, factory_args...)` where
/// `initCode` is the contract bytecode followed by its encoded constructor
/// arguments.
#[derive(Debug, Clone)]
pub struct FactoryDeployBuilder {
	factory: Address,
	factory_abi: AbiArtifact,
	function: String,
	factory_args: Vec<String>,
	contract_abi: AbiArtifact,
	bytecode: Bytes,
	constructor_args: Vec<String>,
	chain_id: u64,
	payload_format: PayloadFormat,
}

impl FactoryDeployBuilder {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		factory: Address,
		factory_abi: AbiArtifact,
		function: impl Into<String>,
		factory_args: Vec<String>,
		contract_abi: AbiArtifact,
		bytecode: Bytes,
		constructor_args: Vec<String>,
		chain_id: u64,
	) -> Self {
		Self {
			factory,
			factory_abi,
			function: function.into(),
			factory_args,
			contract_abi,
			bytecode,
			constructor_args,
			chain_id,
			payload_format: PayloadFormat::Raw,
		}
	}

	pub fn with_payload_format(mut self, payload_format: PayloadFormat) -> Self {
		self.payload_format = payload_format;
		self
	}

	/// Loads the artifacts referenced by the `[deploy]` section.
	///
	/// Arguments are only checked against the ABI when a request is built.
	pub fn from_config(deploy: &DeployConfig, chain_id: u64) -> Result<Self, EncodingError> {
		let factory = Address::from_str(&deploy.factory_address).map_err(|e| {
			EncodingError::Artifact(format!(
				"invalid factory address {}: {}",
				deploy.factory_address, e
			))
		})?;

		let builder = Self::new(
			factory,
			artifact::load_abi(&deploy.factory_abi)?,
			deploy.factory_function.clone(),
			deploy.factory_args.clone(),
			artifact::load_abi(&deploy.contract_abi)?,
			artifact::load_bytecode(&deploy.contract_bytecode)?,
			deploy.constructor_args.clone(),
			chain_id,
		)
		.with_payload_format(deploy.payload_format);

		tracing::debug!(
			factory = %builder.factory,
			function = %builder.function,
			bytecode_len = builder.bytecode.len(),
			"Loaded deploy artifacts"
		);
		Ok(builder)
	}

	fn init_code(&self) -> Result<Bytes, EncodingError> {
		let inputs = self
			.contract_abi
			.abi
			.constructor()
			.map(|c| c.inputs.as_slice())
			.unwrap_or_default();
		let args = coerce_args("constructor", inputs, &self.constructor_args)?;
		encode_deploy_data(&self.contract_abi.abi, &self.bytecode, &args)
	}

	fn factory_call_args(&self, init_code: Bytes) -> Result<Vec<DynSolValue>, EncodingError> {
		let overloads = self
			.factory_abi
			.abi
			.function(&self.function)
			.ok_or_else(|| EncodingError::FunctionNotFound(self.function.clone()))?;
		let expected = self.factory_args.len() + 1;
		let function = overloads
			.iter()
			.find(|f| f.inputs.len() == expected)
			.ok_or_else(|| EncodingError::ArityMismatch {
				context: self.function.clone(),
				expected: overloads.first().map(|f| f.inputs.len()).unwrap_or_default(),
				actual: expected,
			})?;

		if function.inputs[0].ty != "bytes" {
			return Err(EncodingError::InvalidAbi(format!(
				"first parameter of {} must be bytes, found {}",
				self.function, function.inputs[0].ty
			)));
		}

		let mut args = Vec::with_capacity(expected);
		args.push(DynSolValue::Bytes(init_code.to_vec()));
		args.extend(coerce_args(
			&self.function,
			&function.inputs[1..],
			&self.factory_args,
		)?);
		Ok(args)
	}
}

impl RequestBuilder for FactoryDeployBuilder {
	fn build(&self) -> Result<TransactionRequest, EncodingError> {
		let init_code = self.init_code()?;
		let args = self.factory_call_args(init_code)?;
		let data = encode_function_call(&self.factory_abi.abi, &self.function, &args)?;

		Ok(TransactionRequest::new(
			self.factory,
			self.function.clone(),
			self.factory_abi.json.clone(),
			data,
			self.chain_id,
		))
	}

	fn payload_format(&self) -> PayloadFormat {
		self.payload_format
	}
}
