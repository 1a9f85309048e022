//! Permit2 deployments by chain.
//!
//! Most chains host Permit2 at the canonical CREATE2 address; chains with a
//! different deployment are listed explicitly, and a network's
//! `permit2_address` setting overrides both.

use alloy_primitives::{address, Address};
use once_cell::sync::Lazy;
use permit_types::NetworkConfig;
use std::collections::HashMap;

/// Canonical Permit2 deployment address.
pub const PERMIT2_CANONICAL: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// Global protocol registry instance
pub static PROTOCOL_REGISTRY: Lazy<ProtocolRegistry> = Lazy::new(ProtocolRegistry::default);

/// Registry of known Permit2 deployments.
#[derive(Debug, Clone)]
pub struct ProtocolRegistry {
	permit2_deployments: HashMap<u64, Address>,
}

impl Default for ProtocolRegistry {
	fn default() -> Self {
		let mut registry = Self {
			permit2_deployments: HashMap::new(),
		};

		for chain_id in [
			1,     // Ethereum
			10,    // Optimism
			56,    // BNB Smart Chain
			100,   // Gnosis
			137,   // Polygon
			8453,  // Base
			42161, // Arbitrum One
			43114, // Avalanche C-Chain
			59144, // Linea
			534352, // Scroll
			31337, // Local Anvil
		] {
			registry.add_permit2_deployment(chain_id, PERMIT2_CANONICAL);
		}
		// zkSync Era deploys through its own CREATE2 scheme.
		registry.add_permit2_deployment(
			324,
			address!("0x0000000000225e31D15943971F47aD3022F714Fa"),
		);

		registry
	}
}

impl ProtocolRegistry {
	/// Registers the Permit2 deployment of `chain_id`, replacing any earlier one.
	pub fn add_permit2_deployment(&mut self, chain_id: u64, permit2: Address) {
		self.permit2_deployments.insert(chain_id, permit2);
	}

	/// Known Permit2 deployment of `chain_id`, ignoring configuration.
	pub fn get_permit2_address(&self, chain_id: u64) -> Option<Address> {
		self.permit2_deployments.get(&chain_id).copied()
	}

	/// Permit2 address for a chain, preferring the network's configured override.
	pub fn resolve_permit2(&self, chain_id: u64, network: Option<&NetworkConfig>) -> Option<Address> {
		network
			.and_then(|network| network.permit2_address)
			.or_else(|| self.get_permit2_address(chain_id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_permit2_availability() {
		assert_eq!(PROTOCOL_REGISTRY.get_permit2_address(1), Some(PERMIT2_CANONICAL));
		assert_ne!(PROTOCOL_REGISTRY.get_permit2_address(324), Some(PERMIT2_CANONICAL));
		assert_eq!(PROTOCOL_REGISTRY.get_permit2_address(999_999), None);
	}

	#[test]
	fn test_config_override_wins() {
		let custom = Address::repeat_byte(0x42);
		let network = NetworkConfig {
			rpc_url: "http://localhost:8545".to_string(),
			permit2_address: Some(custom),
			multicall_address: None,
			eip2612_disabled: false,
		};
		assert_eq!(PROTOCOL_REGISTRY.resolve_permit2(1, Some(&network)), Some(custom));
		assert_eq!(
			PROTOCOL_REGISTRY.resolve_permit2(999_999, Some(&network)),
			Some(custom)
		);
		assert_eq!(PROTOCOL_REGISTRY.resolve_permit2(999_999, None), None);
	}
}
