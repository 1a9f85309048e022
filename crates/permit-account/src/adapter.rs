//! Adapters from host signer shapes to [`TypedDataSigner`].

use crate::{AccountError, LegacyTypedDataSigner, TypedDataSigner, WalletClient, WalletSignRequest};
use alloy_primitives::{Address, Bytes, Signature};
use async_trait::async_trait;
use permit_types::{eip712::infer_primary_type, truncate_id, PermitTypedData, TypedDataError};
use std::sync::Arc;

/// Parses the raw `r || s || v` bytes returned by a host signer.
fn parse_signature(raw: &Bytes) -> Result<Signature, AccountError> {
	if raw.len() != 65 {
		return Err(AccountError::SigningFailed(format!(
			"Expected a 65-byte signature, got {} bytes",
			raw.len()
		)));
	}
	let signature = Signature::from_raw(raw)
		.map_err(|e| AccountError::SigningFailed(format!("Malformed signature: {}", e)))?;
	tracing::trace!(signature = %truncate_id(&raw.to_string()), "Host signature received");
	Ok(signature)
}

/// Drives a legacy signer, which derives the primary type from `types`.
pub struct LegacySignerAdapter {
	inner: Arc<dyn LegacyTypedDataSigner>,
}

impl LegacySignerAdapter {
	pub fn new(inner: Arc<dyn LegacyTypedDataSigner>) -> Self {
		Self { inner }
	}
}

#[async_trait]
impl TypedDataSigner for LegacySignerAdapter {
	async fn address(&self) -> Result<Address, AccountError> {
		self.inner.address().await
	}

	async fn sign_typed_data(
		&self,
		typed_data: &PermitTypedData,
	) -> Result<Signature, AccountError> {
		// The legacy shape cannot name the primary type, so it must be the
		// unique root of `types`.
		match infer_primary_type(&typed_data.types) {
			Some(inferred) if inferred == typed_data.primary_type => {},
			inferred => {
				return Err(TypedDataError::Malformed(format!(
					"Primary type {} is not the unique root of the types (found {:?})",
					typed_data.primary_type, inferred
				))
				.into())
			},
		}

		let raw = self
			.inner
			.sign_typed_data(&typed_data.domain, &typed_data.types, &typed_data.message)
			.await?;
		parse_signature(&raw)
	}
}

/// Drives a wallet client on behalf of a fixed account.
pub struct WalletClientAdapter {
	client: Arc<dyn WalletClient>,
	account: Address,
}

impl WalletClientAdapter {
	/// Adapter signing as `account` through `client`.
	pub fn new(client: Arc<dyn WalletClient>, account: Address) -> Self {
		Self { client, account }
	}
}

#[async_trait]
impl TypedDataSigner for WalletClientAdapter {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.account)
	}

	async fn sign_typed_data(
		&self,
		typed_data: &PermitTypedData,
	) -> Result<Signature, AccountError> {
		let request = WalletSignRequest {
			account: self.account,
			domain: typed_data.domain.clone(),
			types: typed_data.types.clone(),
			primary_type: typed_data.primary_type.clone(),
			message: typed_data.message.clone(),
		};
		let raw = self.client.sign_typed_data(request).await?;
		parse_signature(&raw)
	}
}
