//! Read-only chain access for the permit signature engine.
//!
//! The engine never sends transactions. Everything it needs from chain state
//! (EIP-2612 probes, Permit2 allowances and nonce bitmaps) is fetched through
//! [`ChainReader::multicall`], which batches several `eth_call`s into one
//! round trip and reports each call's success individually.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur while reading chain state.
#[derive(Debug, Error)]
pub enum ChainError {
	/// No reader is configured for the chain.
	#[error("No provider configured for chain {0}")]
	NoProviderAvailable(u64),
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The aggregate response could not be decoded.
	#[error("Decode error: {0}")]
	Decode(String),
}

/// One read-only call inside a multicall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
	pub target: Address,
	pub call_data: Bytes,
}

impl ReadCall {
	/// A call of `call_data` on `target`.
	pub fn new(target: Address, call_data: impl Into<Bytes>) -> Self {
		Self {
			target,
			call_data: call_data.into(),
		}
	}
}

/// Result of one call inside a multicall.
///
/// A call to an address without code succeeds with empty `return_data`;
/// callers decoding a value must treat that as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallOutcome {
	pub success: bool,
	pub return_data: Bytes,
}

impl CallOutcome {
	/// A successful call returning `return_data`.
	pub fn ok(return_data: impl Into<Bytes>) -> Self {
		Self {
			success: true,
			return_data: return_data.into(),
		}
	}

	/// A reverted call.
	pub fn failed() -> Self {
		Self::default()
	}

	/// Returned data when the call succeeded and produced output.
	pub fn data(&self) -> Option<&[u8]> {
		(self.success && !self.return_data.is_empty()).then_some(&self.return_data[..])
	}
}

/// Batched read-only access to chain state.
#[async_trait]
pub trait ChainReader: Send + Sync {
	/// Executes `calls` on `chain_id`, returning one outcome per call in order.
	///
	/// Individual call failures are reported in the outcome; `Err` means the
	/// whole batch could not be executed.
	async fn multicall(
		&self,
		chain_id: u64,
		calls: Vec<ReadCall>,
	) -> Result<Vec<CallOutcome>, ChainError>;
}
