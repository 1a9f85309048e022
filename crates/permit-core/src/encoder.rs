//! Router payload encoding.
//!
//! Every payload is `abi.encode(uint8 mode, bytes inner)`. The mode byte and
//! the inner layout depend on the permit mode and on whether the router is a
//! legacy trade router.

use crate::PermitError;
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, Signature, B256, U256};
use permit_types::{PermitMode, RouterProfile};

/// Discriminator byte the router dispatches on.
pub fn mode_byte(mode: PermitMode, profile: &RouterProfile) -> Result<u8, PermitError> {
	let legacy = profile.is_legacy_trade();
	match mode {
		PermitMode::Default => Ok(0),
		PermitMode::Eip2612Permit => Ok(1),
		PermitMode::PermitSingle if legacy => Ok(2),
		PermitMode::PermitSingle => Ok(3),
		PermitMode::PermitWitnessTransferFrom if !legacy => Ok(2),
		PermitMode::PermitBatchWitnessTransferFrom if !legacy => Ok(4),
		other => Err(PermitError::UnsupportedPermitType {
			mode: other,
			reason: format!(
				"no payload encoding for {:?} {:?} routers",
				profile.version, profile.service
			),
		}),
	}
}

fn uint(value: U256, bits: usize) -> DynSolValue {
	DynSolValue::Uint(value, bits)
}

fn signature_bytes(signature: &Signature) -> DynSolValue {
	DynSolValue::Bytes(signature.as_bytes().to_vec())
}

/// Wraps `inner` with the mode byte for `mode`.
///
/// # Returns
///
/// `abi.encode(uint8 mode, bytes inner)`, or
/// [`PermitError::UnsupportedPermitType`] when `profile` has no byte for `mode`.
pub fn wrap(mode: PermitMode, profile: &RouterProfile, inner: Vec<u8>) -> Result<Bytes, PermitError> {
	let byte = mode_byte(mode, profile)?;
	Ok(Bytes::from(
		DynSolValue::Tuple(vec![uint(U256::from(byte), 8), DynSolValue::Bytes(inner)])
			.abi_encode_params(),
	))
}

/// Payload for tokens that need no signature.
pub fn placeholder() -> Bytes {
	Bytes::from(
		DynSolValue::Tuple(vec![uint(U256::ZERO, 8), DynSolValue::Bytes(Vec::new())])
			.abi_encode_params(),
	)
}

/// EIP-2612 inner payload.
///
/// Legacy trade routers call `permit` with every argument; others take the
/// owner, spender and amount from the surrounding call.
pub fn eip2612(
	profile: &RouterProfile,
	owner: Address,
	spender: Address,
	amount: U256,
	deadline: u64,
	signature: &Signature,
) -> Vec<u8> {
	let v = uint(U256::from(27u8 + u8::from(signature.v())), 8);
	let r = DynSolValue::FixedBytes(B256::from(signature.r().to_be_bytes::<32>()), 32);
	let s = DynSolValue::FixedBytes(B256::from(signature.s().to_be_bytes::<32>()), 32);
	let deadline = uint(U256::from(deadline), 256);

	let values = if profile.is_legacy_trade() {
		vec![
			DynSolValue::Address(owner),
			DynSolValue::Address(spender),
			uint(amount, 256),
			deadline,
			v,
			r,
			s,
		]
	} else {
		vec![deadline, v, r, s]
	};
	DynSolValue::Tuple(values).abi_encode_params()
}

/// Permit2 `PermitSingle` inner payload; legacy trade routers also take the amount.
pub fn permit_single(
	profile: &RouterProfile,
	amount: U256,
	nonce: U256,
	expiration: u64,
	sig_deadline: u64,
	signature: &Signature,
) -> Vec<u8> {
	let mut values = Vec::with_capacity(5);
	if profile.is_legacy_trade() {
		values.push(uint(amount, 160));
	}
	values.extend([
		uint(nonce, 48),
		uint(U256::from(expiration), 48),
		uint(U256::from(sig_deadline), 256),
		signature_bytes(signature),
	]);
	DynSolValue::Tuple(values).abi_encode_params()
}

/// Permit2 single witness-transfer inner payload.
pub fn witness_transfer(nonce: U256, deadline: u64, signature: &Signature) -> Vec<u8> {
	DynSolValue::Tuple(vec![
		uint(nonce, 256),
		uint(U256::from(deadline), 256),
		signature_bytes(signature),
	])
	.abi_encode_params()
}

/// Permit2 batch witness-transfer inner payload.
pub fn batch_witness_transfer(
	tokens: &[(Address, U256)],
	nonce: U256,
	deadline: u64,
	signature: &Signature,
) -> Vec<u8> {
	let permitted = tokens
		.iter()
		.map(|(token, amount)| {
			DynSolValue::Tuple(vec![DynSolValue::Address(*token), uint(*amount, 256)])
		})
		.collect();
	DynSolValue::Tuple(vec![
		DynSolValue::Tuple(vec![
			DynSolValue::Array(permitted),
			uint(nonce, 256),
			uint(U256::from(deadline), 256),
		]),
		signature_bytes(signature),
	])
	.abi_encode_params()
}
