//! Network configuration types for multi-chain permit signing.
//!
//! This module defines per-chain settings: the RPC endpoint used for
//! read-only probing, optional overrides of the Permit2 and Multicall3
//! deployments, and whether EIP-2612 is disabled chain-wide.

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Configuration for a single blockchain network.
///
/// # Fields
///
/// * `rpc_url` - The HTTP(S) RPC endpoint for read-only calls
/// * `permit2_address` - Permit2 deployment, when it differs from the canonical one
/// * `multicall_address` - Multicall3 deployment, when it differs from the canonical one
/// * `eip2612_disabled` - Treat every token on this chain as lacking EIP-2612
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub rpc_url: String,
	#[serde(default)]
	pub permit2_address: Option<Address>,
	#[serde(default)]
	pub multicall_address: Option<Address>,
	#[serde(default)]
	pub eip2612_disabled: bool,
}

/// Networks configuration mapping chain IDs to their configurations.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Helper function to deserialize network configurations from TOML.
///
/// TOML tables cannot have numeric keys, so chain IDs arrive as strings and
/// are parsed into `u64` here.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();

	for (key, value) in string_map {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}

	Ok(result)
}
