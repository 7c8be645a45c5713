//! Loading of compiled contract artifacts.
//!
//! ABI files may hold a bare JSON array or a compiler artifact object with an
//! `abi` key. Bytecode files may hold raw hex, a JSON string, or an object
//! exposing the hex under `object`, `bytecode` or `bytecode.object`.

use crate::{parse_bytecode, EncodingError};
use alloy_json_abi::JsonAbi;
use alloy_primitives::Bytes;
use std::path::Path;

/// A parsed ABI together with its JSON form.
///
/// The JSON form is forwarded to wallets alongside encoded calls.
#[derive(Debug, Clone)]
pub struct AbiArtifact {
	pub abi: JsonAbi,
	pub json: serde_json::Value,
}

/// Parses an ABI from JSON text.
pub fn parse_abi(content: &str) -> Result<AbiArtifact, EncodingError> {
	let value: serde_json::Value = serde_json::from_str(content)
		.map_err(|e| EncodingError::Artifact(format!("ABI is not valid JSON: {}", e)))?;

	let json = match value {
		serde_json::Value::Array(_) => value,
		serde_json::Value::Object(mut object) => object
			.remove("abi")
			.ok_or_else(|| EncodingError::Artifact("artifact object has no 'abi' key".into()))?,
		other => {
			return Err(EncodingError::Artifact(format!(
				"expected ABI array or artifact object, got {}",
				other
			)))
		},
	};

	let abi: JsonAbi =
		serde_json::from_value(json.clone()).map_err(|e| EncodingError::InvalidAbi(e.to_string()))?;
	Ok(AbiArtifact { abi, json })
}

/// Parses contract bytecode from artifact text.
pub fn parse_bytecode_artifact(content: &str) -> Result<Bytes, EncodingError> {
	let trimmed = content.trim();
	if !(trimmed.starts_with('{') || trimmed.starts_with('"')) {
		return parse_bytecode(trimmed);
	}

	let value: serde_json::Value = serde_json::from_str(trimmed)
		.map_err(|e| EncodingError::Artifact(format!("bytecode is not valid JSON: {}", e)))?;

	let hex_str = value
		.as_str()
		.or_else(|| value.get("object").and_then(|v| v.as_str()))
		.or_else(|| value.get("bytecode").and_then(|v| v.as_str()))
		.or_else(|| {
			value
				.get("bytecode")
				.and_then(|v| v.get("object"))
				.and_then(|v| v.as_str())
		})
		.ok_or_else(|| EncodingError::Artifact("no bytecode found in artifact".into()))?;

	parse_bytecode(hex_str)
}

pub fn load_abi(path: &Path) -> Result<AbiArtifact, EncodingError> {
	parse_abi(&read(path)?)
}

pub fn load_bytecode(path: &Path) -> Result<Bytes, EncodingError> {
	parse_bytecode_artifact(&read(path)?)
}

fn read(path: &Path) -> Result<String, EncodingError> {
	std::fs::read_to_string(path)
		.map_err(|e| EncodingError::Artifact(format!("cannot read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::{BYTECODE, CONTRACT_ABI};

	#[test]
	fn test_abi_forms() {
		let bare = parse_abi(CONTRACT_ABI).unwrap();
		assert!(bare.abi.constructor().is_some());

		let wrapped = parse_abi(&format!("{{\"abi\": {}}}", CONTRACT_ABI)).unwrap();
		assert_eq!(wrapped.json, bare.json);

		assert!(parse_abi("{\"bytecode\": \"0x00\"}").is_err());
		assert!(parse_abi("42").is_err());
	}

	#[test]
	fn test_bytecode_forms() {
		let expected = parse_bytecode(BYTECODE).unwrap();

		assert_eq!(parse_bytecode_artifact(BYTECODE).unwrap(), expected);
		assert_eq!(
			parse_bytecode_artifact(&format!("\"{}\"", BYTECODE)).unwrap(),
			expected
		);
		assert_eq!(
			parse_bytecode_artifact(&format!("{{\"object\": \"{}\"}}", BYTECODE)).unwrap(),
			expected
		);
		assert_eq!(
			parse_bytecode_artifact(&format!("{{\"bytecode\": {{\"object\": \"{}\"}}}}", BYTECODE))
				.unwrap(),
			expected
		);
		assert_eq!(
			parse_bytecode_artifact("{\"object\": \"0x\"}"),
			Err(EncodingError::EmptyBytecode)
		);
	}

	#[test]
	fn test_load_from_disk() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("TestContractBytecode.json");
		std::fs::write(&path, format!("{{\"object\": \"{}\"}}", BYTECODE)).unwrap();

		assert_eq!(load_bytecode(&path).unwrap(), parse_bytecode(BYTECODE).unwrap());
		assert!(matches!(
			load_abi(&dir.path().join("missing.json")),
			Err(EncodingError::Artifact(_))
		));
	}
}
