//! EIP-712 typed-data container shared by the builder and the signers.
//!
//! [`PermitTypedData`] keeps the four pieces a wallet needs (domain, struct
//! types, primary type and message) in an inspectable form and converts to
//! alloy's dynamic [`TypedData`] for hashing and signing.

use alloy_dyn_abi::TypedData;
use alloy_primitives::B256;
use alloy_sol_types::Eip712Domain;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

pub const NAME_PERMIT2: &str = "Permit2";
pub const NAME_GASLESS_VERIFIER: &str = "DZapVerifier";
pub const VERSION_GASLESS_VERIFIER: &str = "1";

pub const PERMIT_TYPE_NAME: &str = "Permit";
pub const PERMIT_DETAILS_TYPE_NAME: &str = "PermitDetails";
pub const PERMIT_SINGLE_TYPE_NAME: &str = "PermitSingle";
pub const TOKEN_PERMISSIONS_TYPE_NAME: &str = "TokenPermissions";
pub const PERMIT_WITNESS_TYPE_NAME: &str = "PermitWitnessTransferFrom";
pub const PERMIT_BATCH_WITNESS_TYPE_NAME: &str = "PermitBatchWitnessTransferFrom";

/// Errors converting a [`PermitTypedData`] into hashable typed data.
#[derive(Debug, Error)]
pub enum TypedDataError {
	#[error("Malformed typed data: {0}")]
	Malformed(String),
	#[error("Failed to hash typed data: {0}")]
	Hash(String),
}

/// One `{name, type}` entry of an EIP-712 struct definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Field {
	pub name: String,
	#[serde(rename = "type")]
	pub ty: String,
}

impl Eip712Field {
	/// Creates a member declaration.
	///
	/// # Arguments
	///
	/// * `name` - Member name as it appears in the message
	/// * `ty` - Solidity type, or the name of another struct in the same types map
	pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			ty: ty.into(),
		}
	}
}

/// EIP-712 struct definitions keyed by struct name, excluding `EIP712Domain`.
pub type Eip712Types = BTreeMap<String, Vec<Eip712Field>>;

/// Fully assembled EIP-712 payload ready for a signer.
#[derive(Debug, Clone, PartialEq)]
pub struct PermitTypedData {
	pub domain: Eip712Domain,
	pub types: Eip712Types,
	pub primary_type: String,
	pub message: serde_json::Value,
}

impl PermitTypedData {
	/// Converts into alloy's dynamic typed data, adding the `EIP712Domain`
	/// definition implied by the populated domain fields.
	pub fn to_typed_data(&self) -> Result<TypedData, TypedDataError> {
		let mut types = serde_json::to_value(&self.types)
			.map_err(|e| TypedDataError::Malformed(e.to_string()))?;
		if let Some(map) = types.as_object_mut() {
			map.insert(
				"EIP712Domain".to_string(),
				serde_json::to_value(domain_fields(&self.domain))
					.map_err(|e| TypedDataError::Malformed(e.to_string()))?,
			);
		}
		let domain = serde_json::to_value(&self.domain)
			.map_err(|e| TypedDataError::Malformed(e.to_string()))?;

		serde_json::from_value(json!({
			"types": types,
			"primaryType": self.primary_type,
			"domain": domain,
			"message": self.message,
		}))
		.map_err(|e| TypedDataError::Malformed(e.to_string()))
	}

	/// EIP-712 signing hash: `keccak256(0x1901 || domainSeparator || structHash)`.
	pub fn signing_hash(&self) -> Result<B256, TypedDataError> {
		self.to_typed_data()?
			.eip712_signing_hash()
			.map_err(|e| TypedDataError::Hash(e.to_string()))
	}
}

/// `EIP712Domain` field list for the populated fields of `domain`, in
/// canonical order.
pub fn domain_fields(domain: &Eip712Domain) -> Vec<Eip712Field> {
	let mut fields = Vec::with_capacity(5);
	if domain.name.is_some() {
		fields.push(Eip712Field::new("name", "string"));
	}
	if domain.version.is_some() {
		fields.push(Eip712Field::new("version", "string"));
	}
	if domain.chain_id.is_some() {
		fields.push(Eip712Field::new("chainId", "uint256"));
	}
	if domain.verifying_contract.is_some() {
		fields.push(Eip712Field::new("verifyingContract", "address"));
	}
	if domain.salt.is_some() {
		fields.push(Eip712Field::new("salt", "bytes32"));
	}
	fields
}

/// Finds the struct that no other struct references, which is how legacy
/// signers determine the primary type when none is given.
pub fn infer_primary_type(types: &Eip712Types) -> Option<String> {
	let referenced: Vec<&str> = types
		.values()
		.flatten()
		.map(|field| field.ty.trim_end_matches("[]"))
		.collect();
	let mut roots = types
		.keys()
		.filter(|name| !referenced.contains(&name.as_str()));
	let root = roots.next()?;
	if roots.next().is_some() {
		return None;
	}
	Some(root.clone())
}
