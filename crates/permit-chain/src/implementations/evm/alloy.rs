//! Alloy-backed [`ChainReader`] using Multicall3 `aggregate3`.
//!
//! One HTTP provider is created per configured network. Every batch is sent
//! as a single `eth_call` to Multicall3 with `allowFailure = true` on each
//! inner call, so one reverting probe does not hide the others.

use crate::{CallOutcome, ChainError, ChainReader, ReadCall};
use alloy_primitives::{address, Address};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use permit_types::NetworksConfig;
use std::collections::HashMap;

/// Multicall3 deployment shared by most EVM chains.
pub const MULTICALL3_ADDRESS: Address = address!("0xcA11bde05977b3631167028862bE2a173976CA11");

sol! {
	interface IMulticall3 {
		struct Call3 {
			address target;
			bool allowFailure;
			bytes callData;
		}

		struct Result {
			bool success;
			bytes returnData;
		}

		function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
	}
}

struct ChainEndpoint {
	provider: DynProvider,
	multicall: Address,
}

/// Multi-chain reader over alloy HTTP providers.
pub struct AlloyReader {
	endpoints: HashMap<u64, ChainEndpoint>,
}

impl AlloyReader {
	/// Creates one provider per network in `networks`.
	pub fn new(networks: &NetworksConfig) -> Result<Self, ChainError> {
		let mut endpoints = HashMap::new();

		for (chain_id, network) in networks {
			let url = network.rpc_url.parse().map_err(|e| {
				ChainError::Network(format!("Invalid RPC URL for network {}: {}", chain_id, e))
			})?;
			let provider = ProviderBuilder::new().connect_http(url).erased();
			let multicall = network.multicall_address.unwrap_or(MULTICALL3_ADDRESS);

			tracing::debug!(chain_id, multicall = %multicall, "Configured chain reader");
			endpoints.insert(*chain_id, ChainEndpoint { provider, multicall });
		}

		Ok(Self { endpoints })
	}

	fn endpoint(&self, chain_id: u64) -> Result<&ChainEndpoint, ChainError> {
		self.endpoints
			.get(&chain_id)
			.ok_or(ChainError::NoProviderAvailable(chain_id))
	}
}

/// Encodes `calls` as an `aggregate3` invocation.
fn encode_aggregate(calls: Vec<ReadCall>) -> Vec<u8> {
	let calls = calls
		.into_iter()
		.map(|call| IMulticall3::Call3 {
			target: call.target,
			allowFailure: true,
			callData: call.call_data,
		})
		.collect();
	IMulticall3::aggregate3Call { calls }.abi_encode()
}

/// Decodes an `aggregate3` response, checking it covers `expected` calls.
fn decode_aggregate(data: &[u8], expected: usize) -> Result<Vec<CallOutcome>, ChainError> {
	let results = IMulticall3::aggregate3Call::abi_decode_returns(data)
		.map_err(|e| ChainError::Decode(format!("Invalid aggregate3 response: {}", e)))?;
	if results.len() != expected {
		return Err(ChainError::Decode(format!(
			"aggregate3 returned {} results for {} calls",
			results.len(),
			expected
		)));
	}
	Ok(results
		.into_iter()
		.map(|result| CallOutcome {
			success: result.success,
			return_data: result.returnData,
		})
		.collect())
}

#[async_trait]
impl ChainReader for AlloyReader {
	async fn multicall(
		&self,
		chain_id: u64,
		calls: Vec<ReadCall>,
	) -> Result<Vec<CallOutcome>, ChainError> {
		if calls.is_empty() {
			return Ok(Vec::new());
		}

		let endpoint = self.endpoint(chain_id)?;
		let expected = calls.len();
		let request = TransactionRequest::default()
			.to(endpoint.multicall)
			.input(encode_aggregate(calls).into());

		let response = endpoint
			.provider
			.call(request)
			.await
			.map_err(|e| ChainError::Network(format!("aggregate3 call failed: {}", e)))?;

		tracing::trace!(chain_id, calls = expected, "Multicall completed");
		decode_aggregate(&response, expected)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::Bytes;
	use alloy_sol_types::SolValue;
	use permit_types::NetworkConfig;

	#[test]
	fn test_aggregate_round_trip() {
		let calls = vec![
			ReadCall::new(Address::repeat_byte(1), vec![0x01, 0x02]),
			ReadCall::new(Address::repeat_byte(2), vec![0x03]),
		];
		let encoded = encode_aggregate(calls);
		let decoded = IMulticall3::aggregate3Call::abi_decode(&encoded).unwrap();
		assert_eq!(decoded.calls.len(), 2);
		assert!(decoded.calls.iter().all(|call| call.allowFailure));

		let results = vec![
			IMulticall3::Result {
				success: true,
				returnData: Bytes::from(vec![0xaa]),
			},
			IMulticall3::Result {
				success: false,
				returnData: Bytes::new(),
			},
		];
		let response = (results,).abi_encode_params();
		let outcomes = decode_aggregate(&response, 2).unwrap();
		assert_eq!(outcomes[0].data(), Some(&[0xaa][..]));
		assert_eq!(outcomes[1].data(), None);
		assert!(decode_aggregate(&response, 3).is_err());
	}

	#[tokio::test]
	async fn test_unknown_chain_and_empty_batch() {
		let mut networks = NetworksConfig::new();
		networks.insert(
			1,
			NetworkConfig {
				rpc_url: "http://localhost:8545".to_string(),
				permit2_address: None,
				multicall_address: None,
				eip2612_disabled: false,
			},
		);
		let reader = AlloyReader::new(&networks).unwrap();

		assert!(reader.multicall(1, Vec::new()).await.unwrap().is_empty());
		assert!(matches!(
			reader
				.multicall(5, vec![ReadCall::new(Address::ZERO, Vec::<u8>::new())])
				.await,
			Err(ChainError::NoProviderAvailable(5))
		));
	}

	#[test]
	fn test_invalid_rpc_url_rejected() {
		let mut networks = NetworksConfig::new();
		networks.insert(
			1,
			NetworkConfig {
				rpc_url: "not a url".to_string(),
				permit2_address: None,
				multicall_address: None,
				eip2612_disabled: false,
			},
		);
		assert!(AlloyReader::new(&networks).is_err());
	}
}
