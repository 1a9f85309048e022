//! EIP-712 payload assembly.
//!
//! Every builder produces a self-contained [`PermitTypedData`] for exactly
//! one schema. Numeric values go into the message as decimal strings and
//! addresses in checksummed form, which is what browser wallets expect.

use crate::PermitError;
use alloy_primitives::{aliases::U48, Address, Signature, B256, U160, U256};
use alloy_sol_types::Eip712Domain;
use permit_types::{
	eip712::{
		NAME_GASLESS_VERIFIER, NAME_PERMIT2, PERMIT_BATCH_WITNESS_TYPE_NAME,
		PERMIT_DETAILS_TYPE_NAME, PERMIT_SINGLE_TYPE_NAME, PERMIT_TYPE_NAME,
		PERMIT_WITNESS_TYPE_NAME, TOKEN_PERMISSIONS_TYPE_NAME, VERSION_GASLESS_VERIFIER,
	},
	Eip2612DomainOverride, Eip712Field, Eip712Types, PermitIntent, PermitTypedData, WitnessData,
};
use serde_json::json;

pub const GASLESS_SWAP_TYPE_NAME: &str = "SignedGasLessSwapData";
pub const GASLESS_BRIDGE_TYPE_NAME: &str = "SignedGasLessBridgeData";
pub const GASLESS_SWAP_BRIDGE_TYPE_NAME: &str = "SignedGasLessSwapBridgeData";

fn permit2_domain(chain_id: u64, permit2: Address) -> Eip712Domain {
	Eip712Domain::new(
		Some(NAME_PERMIT2.into()),
		None,
		Some(U256::from(chain_id)),
		Some(permit2),
		None,
	)
}

fn token_permissions_fields() -> Vec<Eip712Field> {
	vec![
		Eip712Field::new("token", "address"),
		Eip712Field::new("amount", "uint256"),
	]
}

fn signature_transfer_fields(permitted: &str, witness: &WitnessData) -> Vec<Eip712Field> {
	vec![
		Eip712Field::new("permitted", permitted),
		Eip712Field::new("spender", "address"),
		Eip712Field::new("nonce", "uint256"),
		Eip712Field::new("deadline", "uint256"),
		Eip712Field::new("witness", witness.type_name()),
	]
}

fn checked_u160(amount: U256) -> Result<U160, PermitError> {
	if amount > U256::from(U160::MAX) {
		return Err(PermitError::Encoding(format!(
			"Amount {} exceeds uint160",
			amount
		)));
	}
	Ok(U160::from(amount))
}

fn checked_u48(value: U256, field: &str) -> Result<U48, PermitError> {
	if value > U256::from(U48::MAX) {
		return Err(PermitError::Encoding(format!(
			"Permit2 {} {} exceeds uint48",
			field, value
		)));
	}
	Ok(U48::from(value))
}

/// Parameters of a token-native EIP-2612 permit.
#[derive(Debug, Clone)]
pub struct Eip2612Params<'a> {
	pub chain_id: u64,
	pub token: Address,
	pub name: Option<&'a str>,
	pub version: &'a str,
	pub owner: Address,
	pub spender: Address,
	pub value: U256,
	pub nonce: U256,
	pub deadline: u64,
	pub domain_override: Option<&'a Eip2612DomainOverride>,
}

/// EIP-2612 `Permit` on the token's own domain, or the caller's override.
pub fn eip2612_permit(params: &Eip2612Params<'_>) -> Result<PermitTypedData, PermitError> {
	let domain = match params.domain_override {
		Some(custom) => Eip712Domain::new(
			Some(custom.name.clone().into()),
			Some(params.version.to_string().into()),
			Some(U256::from(custom.chain_id.unwrap_or(params.chain_id))),
			Some(custom.verifying_contract.unwrap_or(params.token)),
			custom.salt,
		),
		None => {
			let name = params.name.ok_or_else(|| {
				PermitError::Encoding(format!("Token {} has no permit domain name", params.token))
			})?;
			Eip712Domain::new(
				Some(name.to_string().into()),
				Some(params.version.to_string().into()),
				Some(U256::from(params.chain_id)),
				Some(params.token),
				None,
			)
		},
	};

	let mut types = Eip712Types::new();
	types.insert(
		PERMIT_TYPE_NAME.to_string(),
		vec![
			Eip712Field::new("owner", "address"),
			Eip712Field::new("spender", "address"),
			Eip712Field::new("value", "uint256"),
			Eip712Field::new("nonce", "uint256"),
			Eip712Field::new("deadline", "uint256"),
		],
	);

	Ok(PermitTypedData {
		domain,
		types,
		primary_type: PERMIT_TYPE_NAME.to_string(),
		message: json!({
			"owner": params.owner.to_checksum(None),
			"spender": params.spender.to_checksum(None),
			"value": params.value.to_string(),
			"nonce": params.nonce.to_string(),
			"deadline": params.deadline.to_string(),
		}),
	})
}

/// Permit2 allowance-style `PermitSingle`.
#[allow(clippy::too_many_arguments)]
pub fn permit_single(
	chain_id: u64,
	permit2: Address,
	token: Address,
	amount: U256,
	expiration: u64,
	nonce: U256,
	spender: Address,
	sig_deadline: u64,
) -> Result<PermitTypedData, PermitError> {
	let amount = checked_u160(amount)?;
	let expiration = checked_u48(U256::from(expiration), "expiration")?;
	let nonce = checked_u48(nonce, "nonce")?;

	let mut types = Eip712Types::new();
	types.insert(
		PERMIT_DETAILS_TYPE_NAME.to_string(),
		vec![
			Eip712Field::new("token", "address"),
			Eip712Field::new("amount", "uint160"),
			Eip712Field::new("expiration", "uint48"),
			Eip712Field::new("nonce", "uint48"),
		],
	);
	types.insert(
		PERMIT_SINGLE_TYPE_NAME.to_string(),
		vec![
			Eip712Field::new("details", PERMIT_DETAILS_TYPE_NAME),
			Eip712Field::new("spender", "address"),
			Eip712Field::new("sigDeadline", "uint256"),
		],
	);

	Ok(PermitTypedData {
		domain: permit2_domain(chain_id, permit2),
		types,
		primary_type: PERMIT_SINGLE_TYPE_NAME.to_string(),
		message: json!({
			"details": {
				"token": token.to_checksum(None),
				"amount": amount.to_string(),
				"expiration": expiration.to_string(),
				"nonce": nonce.to_string(),
			},
			"spender": spender.to_checksum(None),
			"sigDeadline": sig_deadline.to_string(),
		}),
	})
}

/// Permit2 single-token `PermitWitnessTransferFrom`.
#[allow(clippy::too_many_arguments)]
pub fn permit_witness_transfer(
	chain_id: u64,
	permit2: Address,
	token: Address,
	amount: U256,
	spender: Address,
	nonce: U256,
	deadline: u64,
	witness: &WitnessData,
) -> PermitTypedData {
	let mut types = Eip712Types::new();
	types.insert(TOKEN_PERMISSIONS_TYPE_NAME.to_string(), token_permissions_fields());
	types.insert(
		PERMIT_WITNESS_TYPE_NAME.to_string(),
		signature_transfer_fields(TOKEN_PERMISSIONS_TYPE_NAME, witness),
	);
	types.insert(witness.type_name().to_string(), witness.fields());

	PermitTypedData {
		domain: permit2_domain(chain_id, permit2),
		types,
		primary_type: PERMIT_WITNESS_TYPE_NAME.to_string(),
		message: json!({
			"permitted": {
				"token": token.to_checksum(None),
				"amount": amount.to_string(),
			},
			"spender": spender.to_checksum(None),
			"nonce": nonce.to_string(),
			"deadline": deadline.to_string(),
			"witness": witness.message(),
		}),
	}
}

/// Permit2 multi-token `PermitBatchWitnessTransferFrom`.
pub fn permit_batch_witness_transfer(
	chain_id: u64,
	permit2: Address,
	tokens: &[(Address, U256)],
	spender: Address,
	nonce: U256,
	deadline: u64,
	witness: &WitnessData,
) -> PermitTypedData {
	let permitted_type = format!("{}[]", TOKEN_PERMISSIONS_TYPE_NAME);
	let mut types = Eip712Types::new();
	types.insert(TOKEN_PERMISSIONS_TYPE_NAME.to_string(), token_permissions_fields());
	types.insert(
		PERMIT_BATCH_WITNESS_TYPE_NAME.to_string(),
		signature_transfer_fields(&permitted_type, witness),
	);
	types.insert(witness.type_name().to_string(), witness.fields());

	let permitted: Vec<serde_json::Value> = tokens
		.iter()
		.map(|(token, amount)| {
			json!({
				"token": token.to_checksum(None),
				"amount": amount.to_string(),
			})
		})
		.collect();

	PermitTypedData {
		domain: permit2_domain(chain_id, permit2),
		types,
		primary_type: PERMIT_BATCH_WITNESS_TYPE_NAME.to_string(),
		message: json!({
			"permitted": permitted,
			"spender": spender.to_checksum(None),
			"nonce": nonce.to_string(),
			"deadline": deadline.to_string(),
			"witness": witness.message(),
		}),
	}
}

/// Gasless verifier authorization for permits that do not carry the intent.
///
/// The verifier contract is the spender and the domain always carries the
/// verifier's `salt`.
pub fn gasless_intent(
	chain_id: u64,
	spender: Address,
	salt: B256,
	intent: &PermitIntent,
	user: Address,
	deadline: u64,
) -> Result<PermitTypedData, PermitError> {
	let (primary_type, tx_id, executor_fees_hash, swap_data_hash, adapter_data_hash) =
		match *intent {
			PermitIntent::GaslessSwap {
				tx_id,
				executor_fees_hash,
				swap_data_hash,
			} => (
				GASLESS_SWAP_TYPE_NAME,
				tx_id,
				executor_fees_hash,
				Some(swap_data_hash),
				None,
			),
			PermitIntent::GaslessBridge {
				tx_id,
				executor_fees_hash,
				adapter_data_hash,
				..
			} => (
				GASLESS_BRIDGE_TYPE_NAME,
				tx_id,
				executor_fees_hash,
				None,
				Some(adapter_data_hash),
			),
			PermitIntent::GaslessSwapBridge {
				tx_id,
				executor_fees_hash,
				swap_data_hash,
				adapter_data_hash,
			} => (
				GASLESS_SWAP_BRIDGE_TYPE_NAME,
				tx_id,
				executor_fees_hash,
				Some(swap_data_hash),
				Some(adapter_data_hash),
			),
			PermitIntent::Standard => {
				return Err(PermitError::Encoding(
					"A standard intent has no gasless authorization".to_string(),
				))
			},
		};

	let mut fields = vec![
		Eip712Field::new("txId", "bytes32"),
		Eip712Field::new("user", "address"),
		Eip712Field::new("deadline", "uint256"),
		Eip712Field::new("executorFeesHash", "bytes32"),
	];
	let mut message = serde_json::Map::new();
	message.insert("txId".to_string(), json!(tx_id.to_string()));
	message.insert("user".to_string(), json!(user.to_checksum(None)));
	message.insert("deadline".to_string(), json!(deadline.to_string()));
	message.insert(
		"executorFeesHash".to_string(),
		json!(executor_fees_hash.to_string()),
	);
	if let Some(hash) = swap_data_hash {
		fields.push(Eip712Field::new("swapDataHash", "bytes32"));
		message.insert("swapDataHash".to_string(), json!(hash.to_string()));
	}
	if let Some(hash) = adapter_data_hash {
		fields.push(Eip712Field::new("adapterDataHash", "bytes32"));
		message.insert("adapterDataHash".to_string(), json!(hash.to_string()));
	}

	let mut types = Eip712Types::new();
	types.insert(primary_type.to_string(), fields);

	Ok(PermitTypedData {
		domain: Eip712Domain::new(
			Some(NAME_GASLESS_VERIFIER.into()),
			Some(VERSION_GASLESS_VERIFIER.into()),
			Some(U256::from(chain_id)),
			Some(spender),
			Some(salt),
		),
		types,
		primary_type: primary_type.to_string(),
		message: serde_json::Value::Object(message),
	})
}

/// Address that produced `signature` over `typed_data`.
pub fn recover_signer(
	typed_data: &PermitTypedData,
	signature: &Signature,
) -> Result<Address, PermitError> {
	let hash = typed_data.signing_hash()?;
	signature
		.recover_address_from_prehash(&hash)
		.map_err(|e| PermitError::Encoding(format!("Signature recovery failed: {}", e)))
}
