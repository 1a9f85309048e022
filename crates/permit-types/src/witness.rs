//! Witness payloads bound into Permit2 signature-transfer permits.
//!
//! A witness ties a Permit2 signature to an application-level intent. The
//! EIP-712 sub-type named in the outer `witness` field must be the one whose
//! values are embedded in the message; [`WitnessData`] keeps the name, the
//! field list and the values together so they cannot drift apart.

use crate::eip712::Eip712Field;
use crate::permit::{GaslessTxType, PermitIntent};
use alloy_primitives::{Address, B256};
use serde_json::json;
use thiserror::Error;

pub const TRANSFER_WITNESS_TYPE_NAME: &str = "DZapTransferWitness";
pub const SWAP_WITNESS_TYPE_NAME: &str = "DZapSwapWitness";
pub const BRIDGE_WITNESS_TYPE_NAME: &str = "DZapBridgeWitness";

/// Errors raised while assembling witness data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WitnessError {
	#[error("Missing {field} for {tx_type} gasless intent")]
	MissingField {
		field: &'static str,
		tx_type: GaslessTxType,
	},
}

/// Witness struct embedded in a Permit2 witness-transfer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessData {
	/// Plain transfer bound to the spender.
	Transfer { owner: Address, recipient: Address },
	/// Gasless swap.
	GaslessSwap {
		tx_id: B256,
		user: Address,
		executor_fees_hash: B256,
		swap_data_hash: B256,
	},
	/// Gasless bridge or swap-bridge.
	GaslessBridge {
		tx_id: B256,
		user: Address,
		executor_fees_hash: B256,
		swap_data_hash: B256,
		adapter_data_hash: B256,
	},
}

impl WitnessData {
	/// Selects the witness matching `intent` for a permit signed by `owner`
	/// in favour of `spender`.
	pub fn for_intent(intent: &PermitIntent, owner: Address, spender: Address) -> Self {
		match *intent {
			PermitIntent::Standard => WitnessData::Transfer {
				owner,
				recipient: spender,
			},
			PermitIntent::GaslessSwap {
				tx_id,
				executor_fees_hash,
				swap_data_hash,
			} => WitnessData::GaslessSwap {
				tx_id,
				user: owner,
				executor_fees_hash,
				swap_data_hash,
			},
			PermitIntent::GaslessBridge {
				tx_id,
				executor_fees_hash,
				swap_data_hash,
				adapter_data_hash,
			}
			| PermitIntent::GaslessSwapBridge {
				tx_id,
				executor_fees_hash,
				swap_data_hash,
				adapter_data_hash,
			} => WitnessData::GaslessBridge {
				tx_id,
				user: owner,
				executor_fees_hash,
				swap_data_hash,
				adapter_data_hash,
			},
		}
	}

	/// EIP-712 struct name of the witness.
	pub fn type_name(&self) -> &'static str {
		match self {
			WitnessData::Transfer { .. } => TRANSFER_WITNESS_TYPE_NAME,
			WitnessData::GaslessSwap { .. } => SWAP_WITNESS_TYPE_NAME,
			WitnessData::GaslessBridge { .. } => BRIDGE_WITNESS_TYPE_NAME,
		}
	}

	/// EIP-712 field list of the witness struct.
	pub fn fields(&self) -> Vec<Eip712Field> {
		match self {
			WitnessData::Transfer { .. } => vec![
				Eip712Field::new("owner", "address"),
				Eip712Field::new("recipient", "address"),
			],
			WitnessData::GaslessSwap { .. } => vec![
				Eip712Field::new("txId", "bytes32"),
				Eip712Field::new("user", "address"),
				Eip712Field::new("executorFeesHash", "bytes32"),
				Eip712Field::new("swapDataHash", "bytes32"),
			],
			WitnessData::GaslessBridge { .. } => vec![
				Eip712Field::new("txId", "bytes32"),
				Eip712Field::new("user", "address"),
				Eip712Field::new("executorFeesHash", "bytes32"),
				Eip712Field::new("swapDataHash", "bytes32"),
				Eip712Field::new("adapterDataHash", "bytes32"),
			],
		}
	}

	/// Message values of the witness, keyed like [`Self::fields`].
	pub fn message(&self) -> serde_json::Value {
		match self {
			WitnessData::Transfer { owner, recipient } => json!({
				"owner": owner.to_checksum(None),
				"recipient": recipient.to_checksum(None),
			}),
			WitnessData::GaslessSwap {
				tx_id,
				user,
				executor_fees_hash,
				swap_data_hash,
			} => json!({
				"txId": tx_id.to_string(),
				"user": user.to_checksum(None),
				"executorFeesHash": executor_fees_hash.to_string(),
				"swapDataHash": swap_data_hash.to_string(),
			}),
			WitnessData::GaslessBridge {
				tx_id,
				user,
				executor_fees_hash,
				swap_data_hash,
				adapter_data_hash,
			} => json!({
				"txId": tx_id.to_string(),
				"user": user.to_checksum(None),
				"executorFeesHash": executor_fees_hash.to_string(),
				"swapDataHash": swap_data_hash.to_string(),
				"adapterDataHash": adapter_data_hash.to_string(),
			}),
		}
	}
}
