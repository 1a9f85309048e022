//! Account management module for the permit signature engine.
//!
//! Hosts hand the engine one of two signer shapes: a legacy message signer
//! that takes `domain/types/message` and infers the primary type, or a
//! wallet client that needs the signing account and an explicit primary type.
//! [`HostSigner`] names the shape; [`HostSigner::into_signer`] resolves it once
//! into a [`TypedDataSigner`], the only signing capability the engine uses.

use alloy_primitives::{Address, Bytes, Signature};
use alloy_sol_types::Eip712Domain;
use async_trait::async_trait;
use permit_types::{ConfigSchema, Eip712Types, ImplementationRegistry, PermitTypedData, TypedDataError};
use std::sync::Arc;
use thiserror::Error;

mod adapter;

pub use adapter::{LegacySignerAdapter, WalletClientAdapter};

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The user declined the signature request.
	#[error("User rejected the signature request")]
	UserRejected,
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// The typed data could not be turned into a signable payload.
	#[error("Invalid typed data: {0}")]
	TypedData(#[from] TypedDataError),
	/// Error that occurs when interacting with the account implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Request handed to a wallet client.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSignRequest {
	pub account: Address,
	pub domain: Eip712Domain,
	pub types: Eip712Types,
	pub primary_type: String,
	pub message: serde_json::Value,
}

/// Host signer that accepts `domain/types/message` and infers the primary type.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LegacyTypedDataSigner: Send + Sync {
	/// Address of the account that signs.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs the payload, returning the raw 65-byte `r || s || v` signature.
	async fn sign_typed_data(
		&self,
		domain: &Eip712Domain,
		types: &Eip712Types,
		message: &serde_json::Value,
	) -> Result<Bytes, AccountError>;
}

/// Host wallet client that signs on behalf of an explicit account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletClient: Send + Sync {
	/// Signs the request, returning the raw 65-byte `r || s || v` signature.
	async fn sign_typed_data(&self, request: WalletSignRequest) -> Result<Bytes, AccountError>;
}

/// The signer shape supplied by the host.
#[derive(Clone)]
pub enum HostSigner {
	Legacy(Arc<dyn LegacyTypedDataSigner>),
	Wallet {
		client: Arc<dyn WalletClient>,
		account: Address,
	},
}

impl HostSigner {
	/// Resolves the host shape into the engine's signing capability.
	pub fn into_signer(self) -> Arc<dyn TypedDataSigner> {
		match self {
			HostSigner::Legacy(signer) => Arc::new(LegacySignerAdapter::new(signer)),
			HostSigner::Wallet { client, account } => {
				Arc::new(WalletClientAdapter::new(client, account))
			},
		}
	}
}

impl std::fmt::Debug for HostSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			HostSigner::Legacy(_) => f.write_str("HostSigner::Legacy"),
			HostSigner::Wallet { account, .. } => {
				write!(f, "HostSigner::Wallet({})", account)
			},
		}
	}
}

/// Single signing capability the engine depends on.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
	/// Address whose tokens are being authorized.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs EIP-712 typed data.
	async fn sign_typed_data(&self, typed_data: &PermitTypedData)
		-> Result<Signature, AccountError>;
}

/// Trait for configured account implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this account implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address of the configured account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// The account exposed in the host signer shape it was configured with.
	fn host_signer(&self) -> HostSigner;
}

/// Type alias for account factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that manages the configured account.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	/// Creates a new AccountService with the specified implementation.
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// Builds the service from the implementation named `name`.
	pub fn from_config(name: &str, config: &toml::Value) -> Result<Self, AccountError> {
		let factory = get_all_implementations()
			.into_iter()
			.find_map(|(registered, factory)| (registered == name).then_some(factory))
			.ok_or_else(|| {
				AccountError::Implementation(format!("Unknown account implementation '{}'", name))
			})?;
		Ok(Self::new(factory(config)?))
	}

	/// Address of the configured account.
	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// The account in its configured host shape.
	pub fn host_signer(&self) -> HostSigner {
		self.implementation.host_signer()
	}

	/// The account as the engine's signing capability.
	pub fn signer(&self) -> Arc<dyn TypedDataSigner> {
		self.implementation.host_signer().into_signer()
	}
}
