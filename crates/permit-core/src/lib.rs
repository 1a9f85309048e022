//! Permit and approval signature engine.
//!
//! Given a set of tokens, a router profile and a host signer, the engine
//! decides per token (or per batch) whether to authorize via EIP-2612,
//! Permit2 allowance permits or Permit2 signature transfers, resolves nonces
//! from chain state, builds the EIP-712 payload, obtains the signature and
//! encodes the router-ready `permit` bytes.

use permit_account::AccountError;
use permit_chain::ChainError;
use permit_types::{
	PermitMode, PermitStatus, StatusCode, StatusReport, TypedDataError, WitnessError,
};
use thiserror::Error;

pub mod builder;
pub mod capability;
pub mod contracts;
pub mod encoder;
pub mod engine;
pub mod nonce;
pub mod registry;
pub mod strategy;
pub mod typed_data;

#[cfg(test)]
mod test_utils;

pub use builder::{BuilderError, EngineBuilder};
pub use capability::{CapabilityProber, TokenPermitInfo};
pub use engine::{GaslessParams, PermitEngine, PermitObserver, SignRequest};
pub use nonce::{NonceChain, NonceSequencer};
pub use registry::{ProtocolRegistry, PERMIT2_CANONICAL, PROTOCOL_REGISTRY};

/// Errors that can occur while producing permits.
///
/// Configuration and programming errors are returned as `Err` by the engine;
/// every other variant becomes a failed [`permit_types::PermitResponse`]
/// through [`PermitError::status_code`].
#[derive(Debug, Error)]
pub enum PermitError {
	/// The chain has no network configuration.
	#[error("No network configured for chain {0}")]
	UnknownChain(u64),
	/// Neither the configuration nor the registry knows a Permit2 deployment.
	#[error("No Permit2 deployment known for chain {0}")]
	Permit2NotDeployed(u64),
	/// The assembled typed data is not valid EIP-712.
	#[error("Invalid typed data: {0}")]
	TypedData(#[from] TypedDataError),
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
	/// The user declined to sign.
	#[error("User rejected the signature request")]
	UserRejected,
	/// The signer failed or returned an unusable signature.
	#[error("Signing failed: {0}")]
	Signing(String),
	/// A chained signature-transfer nonce was requested before the first one.
	#[error("No nonce resolved before token at index {index}")]
	NonceNotFound { index: usize },
	/// Permit2 nonce state could not be read or is exhausted.
	#[error("Nonce resolution failed: {0}")]
	NonceResolution(String),
	/// A batched chain read failed as a whole.
	#[error("Chain read failed: {0}")]
	Chain(#[from] ChainError),
	/// Gasless parameters are incomplete.
	#[error("Invalid witness data: {0}")]
	InvalidWitness(#[from] WitnessError),
	/// The mode cannot be used for this token or router.
	#[error("Unsupported permit type {mode}: {reason}")]
	UnsupportedPermitType { mode: PermitMode, reason: String },
	/// A value does not fit its ABI or EIP-712 type.
	#[error("Encoding failed: {0}")]
	Encoding(String),
	/// A progress callback asked to stop.
	#[error("Progress callback aborted with {0:?}")]
	Callback(StatusReport),
}

impl From<AccountError> for PermitError {
	fn from(err: AccountError) -> Self {
		match err {
			AccountError::UserRejected => PermitError::UserRejected,
			AccountError::TypedData(e) => PermitError::TypedData(e),
			other => PermitError::Signing(other.to_string()),
		}
	}
}

impl PermitError {
	/// Whether the error stems from configuration or caller misuse rather
	/// than from chain state or the signer.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			PermitError::UnknownChain(_)
				| PermitError::Permit2NotDeployed(_)
				| PermitError::TypedData(_)
				| PermitError::Config(_)
		)
	}

	/// Public `(status, code)` pair reported for this error.
	pub fn status_code(&self) -> StatusReport {
		let code = match self {
			PermitError::UserRejected => {
				return StatusReport::new(PermitStatus::Rejected, StatusCode::UserRejectedRequest)
			},
			PermitError::Callback(report) => return *report,
			PermitError::NonceNotFound { .. } | PermitError::NonceResolution(_) => {
				StatusCode::NonceNotFound
			},
			PermitError::Chain(_) => StatusCode::ChainReadFailed,
			PermitError::InvalidWitness(_) => StatusCode::InvalidWitnessData,
			PermitError::UnsupportedPermitType { .. } => StatusCode::UnsupportedPermitType,
			PermitError::Signing(_) => StatusCode::SignatureFailed,
			PermitError::UnknownChain(_)
			| PermitError::Permit2NotDeployed(_)
			| PermitError::TypedData(_)
			| PermitError::Config(_)
			| PermitError::Encoding(_) => StatusCode::Unknown,
		};
		StatusReport::new(PermitStatus::Error, code)
	}
}
