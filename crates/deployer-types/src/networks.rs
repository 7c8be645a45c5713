//! Node client configuration.
//!
//! The deployer talks to exactly one chain: the one its wallet submits to and
//! whose node is polled for receipts.

use serde::{Deserialize, Serialize};

/// Configuration of the remote node client.
///
/// # Fields
///
/// * `chain_id` - The chain the transactions are submitted to
/// * `rpc_url` - HTTP(S) JSON-RPC endpoint used to read receipts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub chain_id: u64,
	pub rpc_url: String,
}
