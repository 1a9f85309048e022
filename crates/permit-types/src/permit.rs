//! Permit modes, router profiles and token inputs.
//!
//! These types describe *what* the caller asks the engine to authorize: the
//! tokens and amounts, the router contract generation and service that will
//! consume the permit, and the authorization mechanism (explicit or automatic).

use crate::witness::WitnessError;
use alloy_primitives::{address, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel address used by routers for the chain's native currency.
pub const NATIVE_TOKEN_ADDRESS: Address = address!("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Returns true when the address denotes the native currency rather than an ERC-20.
///
/// Both the `0xEeee…` sentinel and the zero address are treated as native.
pub fn is_native_token(address: &Address) -> bool {
	*address == NATIVE_TOKEN_ADDRESS || *address == Address::ZERO
}

/// Authorization mechanism used for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PermitMode {
	/// Plain ERC-20 approve, no signature.
	Default,
	/// Token-native EIP-2612 `permit`.
	#[serde(rename = "EIP2612Permit")]
	Eip2612Permit,
	/// Permit2 allowance-style permit.
	PermitSingle,
	/// Permit2 single-token signature transfer with witness.
	PermitWitnessTransferFrom,
	/// Permit2 multi-token signature transfer with witness.
	PermitBatchWitnessTransferFrom,
	/// Let the engine decide per token.
	#[default]
	AutoPermit,
}

impl PermitMode {
	/// Whether the mode is served by the Permit2 registry.
	pub fn is_permit2(&self) -> bool {
		matches!(
			self,
			PermitMode::PermitSingle
				| PermitMode::PermitWitnessTransferFrom
				| PermitMode::PermitBatchWitnessTransferFrom
		)
	}

	/// Whether a signature in this mode carries a witness struct.
	pub fn embeds_witness(&self) -> bool {
		matches!(
			self,
			PermitMode::PermitWitnessTransferFrom | PermitMode::PermitBatchWitnessTransferFrom
		)
	}
}

impl fmt::Display for PermitMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			PermitMode::Default => "Default",
			PermitMode::Eip2612Permit => "EIP2612Permit",
			PermitMode::PermitSingle => "PermitSingle",
			PermitMode::PermitWitnessTransferFrom => "PermitWitnessTransferFrom",
			PermitMode::PermitBatchWitnessTransferFrom => "PermitBatchWitnessTransferFrom",
			PermitMode::AutoPermit => "AutoPermit",
		};
		f.write_str(name)
	}
}

impl FromStr for PermitMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"Default" | "default" => Ok(PermitMode::Default),
			"EIP2612Permit" | "eip2612" => Ok(PermitMode::Eip2612Permit),
			"PermitSingle" | "permit-single" => Ok(PermitMode::PermitSingle),
			"PermitWitnessTransferFrom" | "witness" => Ok(PermitMode::PermitWitnessTransferFrom),
			"PermitBatchWitnessTransferFrom" | "batch" => {
				Ok(PermitMode::PermitBatchWitnessTransferFrom)
			},
			"AutoPermit" | "auto" => Ok(PermitMode::AutoPermit),
			other => Err(format!("Unknown permit mode: {}", other)),
		}
	}
}

/// Router contract generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractVersion {
	V1,
	V2,
}

impl FromStr for ContractVersion {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"v1" => Ok(ContractVersion::V1),
			"v2" => Ok(ContractVersion::V2),
			other => Err(format!("Unknown contract version: {}", other)),
		}
	}
}

/// Service consuming the permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
	Swap,
	Bridge,
	Zap,
}

impl FromStr for Service {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"swap" => Ok(Service::Swap),
			"bridge" => Ok(Service::Bridge),
			"zap" => Ok(Service::Zap),
			other => Err(format!("Unknown service: {}", other)),
		}
	}
}

/// The `(contractVersion, service)` pair that decides which permit shapes a
/// router can parse and how their payloads are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouterProfile {
	pub version: ContractVersion,
	pub service: Service,
}

impl RouterProfile {
	/// Profile of a `version` router serving `service`.
	pub fn new(version: ContractVersion, service: Service) -> Self {
		Self { version, service }
	}

	/// Legacy v1 trade routers: only allowance-style Permit2 and the split
	/// EIP-2612 layout.
	pub fn is_legacy_trade(&self) -> bool {
		self.version == ContractVersion::V1 && self.service != Service::Zap
	}

	/// Routers able to consume Permit2 signature-transfer payloads.
	pub fn supports_permit2_witness(&self) -> bool {
		self.version == ContractVersion::V2 || self.service == Service::Zap
	}
}

/// Override EIP-712 domain for tokens whose permit domain is nonstandard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip2612DomainOverride {
	pub name: String,
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub chain_id: Option<u64>,
	#[serde(default)]
	pub verifying_contract: Option<Address>,
	#[serde(default)]
	pub salt: Option<B256>,
}

/// Caller-declared EIP-2612 capability for a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitHint {
	pub supports_eip2612: bool,
	#[serde(default)]
	pub domain: Option<Eip2612DomainOverride>,
}

/// A token to authorize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPermitInput {
	pub address: Address,
	pub amount: U256,
	/// Position of the token in the batch.
	#[serde(default)]
	pub index: usize,
	#[serde(default)]
	pub permit_hint: Option<PermitHint>,
}

impl TokenPermitInput {
	/// Creates an input without a permit hint.
	///
	/// # Arguments
	///
	/// * `address` - Token contract, or a native sentinel
	/// * `amount` - Amount the router may pull
	/// * `index` - Caller's identifier for the entry, echoed in results
	pub fn new(address: Address, amount: U256, index: usize) -> Self {
		Self {
			address,
			amount,
			index,
			permit_hint: None,
		}
	}

	/// Attaches a capability hint, which skips probing.
	pub fn with_hint(mut self, hint: PermitHint) -> Self {
		self.permit_hint = Some(hint);
		self
	}

	/// Builds indexed inputs from `(address, amount)` pairs in batch order.
	pub fn indexed(tokens: impl IntoIterator<Item = (Address, U256)>) -> Vec<Self> {
		tokens
			.into_iter()
			.enumerate()
			.map(|(index, (address, amount))| Self::new(address, amount, index))
			.collect()
	}

	/// Whether the address is a native-currency sentinel.
	pub fn is_native(&self) -> bool {
		is_native_token(&self.address)
	}
}

/// Legs present in a gasless transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GaslessTxType {
	Swap,
	Bridge,
	SwapBridge,
}

impl fmt::Display for GaslessTxType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GaslessTxType::Swap => f.write_str("swap"),
			GaslessTxType::Bridge => f.write_str("bridge"),
			GaslessTxType::SwapBridge => f.write_str("swapBridge"),
		}
	}
}

impl FromStr for GaslessTxType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"swap" => Ok(GaslessTxType::Swap),
			"bridge" => Ok(GaslessTxType::Bridge),
			"swapBridge" | "swap-bridge" => Ok(GaslessTxType::SwapBridge),
			other => Err(format!("Unknown gasless transaction type: {}", other)),
		}
	}
}

/// What a signature authorizes beyond the token movement itself.
///
/// Each gasless variant carries every hash its verifier message or its
/// Permit2 witness needs, so an incomplete combination cannot be constructed.
/// A bridge-only intent still carries `swap_data_hash`: its witness struct
/// has the field even though its verifier message does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PermitIntent {
	Standard,
	#[serde(rename_all = "camelCase")]
	GaslessSwap {
		tx_id: B256,
		executor_fees_hash: B256,
		swap_data_hash: B256,
	},
	#[serde(rename_all = "camelCase")]
	GaslessBridge {
		tx_id: B256,
		executor_fees_hash: B256,
		swap_data_hash: B256,
		adapter_data_hash: B256,
	},
	#[serde(rename_all = "camelCase")]
	GaslessSwapBridge {
		tx_id: B256,
		executor_fees_hash: B256,
		swap_data_hash: B256,
		adapter_data_hash: B256,
	},
}

impl PermitIntent {
	/// Builds a gasless intent from loosely typed caller parameters.
	///
	/// # Arguments
	///
	/// * `tx_type` - Legs present in the transaction
	/// * `tx_id` - Identifier of the gasless transaction
	/// * `executor_fees_hash` - Hash of the executor fee data
	/// * `swap_data_hash` - Hash of the swap leg data, required by every type
	/// * `adapter_data_hash` - Hash of the bridge adapter data, required by
	///   bridge and swap-bridge
	///
	/// # Returns
	///
	/// The intent, or [`WitnessError::MissingField`] naming the first absent
	/// hash.
	pub fn gasless(
		tx_type: GaslessTxType,
		tx_id: B256,
		executor_fees_hash: B256,
		swap_data_hash: Option<B256>,
		adapter_data_hash: Option<B256>,
	) -> Result<Self, WitnessError> {
		let require = |value: Option<B256>, field: &'static str| {
			value.ok_or(WitnessError::MissingField { field, tx_type })
		};
		Ok(match tx_type {
			GaslessTxType::Swap => PermitIntent::GaslessSwap {
				tx_id,
				executor_fees_hash,
				swap_data_hash: require(swap_data_hash, "swapDataHash")?,
			},
			GaslessTxType::Bridge => {
				let adapter_data_hash = require(adapter_data_hash, "adapterDataHash")?;
				PermitIntent::GaslessBridge {
					tx_id,
					executor_fees_hash,
					swap_data_hash: require(swap_data_hash, "swapDataHash")?,
					adapter_data_hash,
				}
			},
			GaslessTxType::SwapBridge => PermitIntent::GaslessSwapBridge {
				tx_id,
				executor_fees_hash,
				swap_data_hash: require(swap_data_hash, "swapDataHash")?,
				adapter_data_hash: require(adapter_data_hash, "adapterDataHash")?,
			},
		})
	}

	/// Whether the intent needs a gasless authorization.
	pub fn is_gasless(&self) -> bool {
		!matches!(self, PermitIntent::Standard)
	}
}
