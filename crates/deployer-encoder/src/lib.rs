//! Submission encoding for the contract deployer.
//!
//! Turns contract artifacts (ABI and bytecode) plus constructor arguments into
//! deterministic initialization code, wraps that code into a factory call, and
//! exposes the result as a [`RequestBuilder`] the status machine can invoke for
//! each submission attempt. Everything here is pure: the same inputs always
//! produce the same bytes and no network is touched.

use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{JsonAbi, Param};
use alloy_primitives::{hex, Bytes};
use deployer_types::without_0x_prefix;
use thiserror::Error;

pub mod artifact;
pub mod builder;

pub use builder::{FactoryDeployBuilder, RequestBuilder};

/// Errors that can occur while encoding a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
	#[error("Bytecode is empty")]
	EmptyBytecode,
	#[error("Malformed bytecode: {0}")]
	MalformedBytecode(String),
	#[error("Invalid ABI: {0}")]
	InvalidAbi(String),
	#[error("Function '{0}' not found in ABI")]
	FunctionNotFound(String),
	#[error("{context} expects {expected} arguments, got {actual}")]
	ArityMismatch {
		context: String,
		expected: usize,
		actual: usize,
	},
	#[error("Invalid argument {index} for {context} (expected {ty}): {message}")]
	InvalidArgument {
		context: String,
		index: usize,
		ty: String,
		message: String,
	},
	#[error("ABI encoding failed: {0}")]
	Abi(String),
	#[error("Artifact error: {0}")]
	Artifact(String),
}

/// Decodes hex bytecode, with or without the 0x prefix.
///
/// Unlinked library placeholders (`__$...$__`) make the bytecode malformed.
pub fn parse_bytecode(hex_str: &str) -> Result<Bytes, EncodingError> {
	let trimmed = without_0x_prefix(hex_str.trim());
	if trimmed.is_empty() {
		return Err(EncodingError::EmptyBytecode);
	}
	if trimmed.contains("__") {
		return Err(EncodingError::MalformedBytecode(
			"bytecode contains unlinked library placeholders".to_string(),
		));
	}
	let bytes = hex::decode(trimmed).map_err(|e| EncodingError::MalformedBytecode(e.to_string()))?;
	Ok(Bytes::from(bytes))
}

/// Coerces string arguments against ABI parameters, in order.
pub fn coerce_args(
	context: &str,
	params: &[Param],
	args: &[String],
) -> Result<Vec<DynSolValue>, EncodingError> {
	if params.len() != args.len() {
		return Err(EncodingError::ArityMismatch {
			context: context.to_string(),
			expected: params.len(),
			actual: args.len(),
		});
	}

	params
		.iter()
		.zip(args)
		.enumerate()
		.map(|(index, (param, arg))| {
			let ty: DynSolType = param.resolve().map_err(|e| {
				EncodingError::InvalidAbi(format!("cannot resolve parameter {}: {}", param.ty, e))
			})?;
			ty.coerce_str(arg)
				.map_err(|e| EncodingError::InvalidArgument {
					context: context.to_string(),
					index,
					ty: param.ty.clone(),
					message: e.to_string(),
				})
		})
		.collect()
}

/// Builds the initialization code of a contract: its bytecode followed by the
/// ABI-encoded constructor arguments.
///
/// A contract without a declared constructor takes no arguments.
pub fn encode_deploy_data(
	abi: &JsonAbi,
	bytecode: &[u8],
	args: &[DynSolValue],
) -> Result<Bytes, EncodingError> {
	if bytecode.is_empty() {
		return Err(EncodingError::EmptyBytecode);
	}

	let encoded_args = match abi.constructor() {
		Some(constructor) => {
			if constructor.inputs.len() != args.len() {
				return Err(EncodingError::ArityMismatch {
					context: "constructor".to_string(),
					expected: constructor.inputs.len(),
					actual: args.len(),
				});
			}
			constructor
				.abi_encode_input(args)
				.map_err(|e| EncodingError::Abi(e.to_string()))?
		},
		None if args.is_empty() => Vec::new(),
		None => {
			return Err(EncodingError::ArityMismatch {
				context: "constructor".to_string(),
				expected: 0,
				actual: args.len(),
			})
		},
	};

	let mut init_code = Vec::with_capacity(bytecode.len() + encoded_args.len());
	init_code.extend_from_slice(bytecode);
	init_code.extend_from_slice(&encoded_args);
	Ok(Bytes::from(init_code))
}

/// Encodes a call to `function`, selector included.
///
/// Overloads are disambiguated by argument count.
pub fn encode_function_call(
	abi: &JsonAbi,
	function: &str,
	args: &[DynSolValue],
) -> Result<Bytes, EncodingError> {
	let overloads = abi
		.function(function)
		.ok_or_else(|| EncodingError::FunctionNotFound(function.to_string()))?;
	let func = overloads
		.iter()
		.find(|f| f.inputs.len() == args.len())
		.ok_or_else(|| EncodingError::ArityMismatch {
			context: function.to_string(),
			expected: overloads.first().map(|f| f.inputs.len()).unwrap_or_default(),
			actual: args.len(),
		})?;

	func.abi_encode_input(args)
		.map(Bytes::from)
		.map_err(|e| EncodingError::Abi(e.to_string()))
}
