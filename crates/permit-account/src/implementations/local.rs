//! Local private-key account.
//!
//! Signs with an in-process key and can present itself to the engine in
//! either host signer shape, selected by the `style` configuration key.

use crate::{
	AccountError, AccountFactory, AccountInterface, AccountRegistry, HostSigner,
	LegacyTypedDataSigner, WalletClient, WalletSignRequest,
};
use alloy_primitives::{Address, Bytes};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::Eip712Domain;
use async_trait::async_trait;
use permit_types::{
	eip712::infer_primary_type, with_0x_prefix, without_0x_prefix, ConfigSchema, Eip712Types, Field, FieldType,
	ImplementationRegistry, PermitTypedData, Schema, SecretString, TypedDataError,
	ValidationError,
};
use std::str::FromStr;
use std::sync::Arc;

/// Host shape a local wallet presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignerStyle {
	#[default]
	Legacy,
	Wallet,
}

impl FromStr for SignerStyle {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"legacy" => Ok(SignerStyle::Legacy),
			"wallet" => Ok(SignerStyle::Wallet),
			other => Err(format!("Unknown signer style '{}'", other)),
		}
	}
}

/// Local wallet backed by alloy's [`PrivateKeySigner`].
#[derive(Debug, Clone)]
pub struct LocalWallet {
	signer: PrivateKeySigner,
	style: SignerStyle,
}

impl LocalWallet {
	/// Creates a wallet from a hex-encoded private key.
	///
	/// # Arguments
	///
	/// * `private_key` - 32-byte key as hex, with or without a `0x`/`0X` prefix
	/// * `style` - Host signer shape the wallet presents
	pub fn new(private_key: &SecretString, style: SignerStyle) -> Result<Self, AccountError> {
		let signer = private_key.with_exposed(|key| {
			with_0x_prefix(without_0x_prefix(key))
				.parse::<PrivateKeySigner>()
				.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))
		})?;
		Ok(Self { signer, style })
	}

	/// Address derived from the key.
	pub fn address(&self) -> Address {
		self.signer.address()
	}

	async fn sign(&self, typed_data: &PermitTypedData) -> Result<Bytes, AccountError> {
		let payload = typed_data.to_typed_data()?;
		let signature = self
			.signer
			.sign_dynamic_typed_data(&payload)
			.await
			.map_err(|e| AccountError::SigningFailed(format!("Failed to sign typed data: {}", e)))?;
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}
}

#[async_trait]
impl LegacyTypedDataSigner for LocalWallet {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_typed_data(
		&self,
		domain: &Eip712Domain,
		types: &Eip712Types,
		message: &serde_json::Value,
	) -> Result<Bytes, AccountError> {
		let primary_type = infer_primary_type(types).ok_or_else(|| {
			TypedDataError::Malformed("Cannot infer the primary type".to_string())
		})?;
		self.sign(&PermitTypedData {
			domain: domain.clone(),
			types: types.clone(),
			primary_type,
			message: message.clone(),
		})
		.await
	}
}

#[async_trait]
impl WalletClient for LocalWallet {
	async fn sign_typed_data(&self, request: WalletSignRequest) -> Result<Bytes, AccountError> {
		if request.account != self.signer.address() {
			return Err(AccountError::SigningFailed(format!(
				"Account {} is not managed by this wallet",
				request.account
			)));
		}
		self.sign(&PermitTypedData {
			domain: request.domain,
			types: request.types,
			primary_type: request.primary_type,
			message: request.message,
		})
		.await
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("private_key", FieldType::String).with_validator(|value| {
				let key = value.as_str().unwrap_or_default();
				let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);
				if key_without_prefix.len() != 64 {
					return Err("Private key must be 64 hex characters (32 bytes)".to_string());
				}
				if hex::decode(key_without_prefix).is_err() {
					return Err("Private key must be valid hexadecimal".to_string());
				}
				Ok(())
			})],
			vec![Field::new("style", FieldType::String).with_validator(|value| {
				value
					.as_str()
					.unwrap_or_default()
					.parse::<SignerStyle>()
					.map(|_| ())
			})],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn host_signer(&self) -> HostSigner {
		let wallet = Arc::new(self.clone());
		match self.style {
			SignerStyle::Legacy => HostSigner::Legacy(wallet),
			SignerStyle::Wallet => HostSigner::Wallet {
				account: wallet.address(),
				client: wallet,
			},
		}
	}
}

/// Factory function to create a local account from configuration.
///
/// Configuration parameters:
/// - `private_key`: 32-byte hex key (required)
/// - `style`: `"legacy"` (default) or `"wallet"`
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;
	let style = config
		.get("style")
		.and_then(|v| v.as_str())
		.map(SignerStyle::from_str)
		.transpose()
		.map_err(AccountError::Implementation)?
		.unwrap_or_default();

	let wallet = LocalWallet::new(&private_key, style)?;
	tracing::info!(address = %wallet.address(), ?style, "Loaded local signer");
	Ok(Box::new(wallet))
}

/// Registry for the local account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
