//! Signing results and progress events.
//!
//! Every engine call produces a fresh [`PermitResponse`]; nothing here is
//! persisted. Failures are reported as a `(status, code)` pair and never
//! carry permit data.

use crate::permit::PermitMode;
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a signing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermitStatus {
	Success,
	Rejected,
	Error,
}

/// Machine-readable reason attached to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
	Success,
	UserRejectedRequest,
	NonceNotFound,
	InvalidWitnessData,
	UnsupportedPermitType,
	ChainReadFailed,
	SignatureFailed,
	CallbackFailed,
	Unknown,
}

impl fmt::Display for StatusCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// A `(status, code)` pair, also returned by progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
	pub status: PermitStatus,
	pub code: StatusCode,
}

impl StatusReport {
	/// The report of a completed call.
	pub fn success() -> Self {
		Self {
			status: PermitStatus::Success,
			code: StatusCode::Success,
		}
	}

	pub fn new(status: PermitStatus, code: StatusCode) -> Self {
		Self { status, code }
	}

	pub fn is_success(&self) -> bool {
		self.status == PermitStatus::Success
	}
}

/// Outcome of one signing step (a single token or a whole batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitResult {
	pub status: PermitStatus,
	pub code: StatusCode,
	/// Encoded `(modeByte, innerBytes)` payload; absent only on failure.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub permit_data: Option<Bytes>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub nonce: Option<U256>,
	pub mode: PermitMode,
}

impl PermitResult {
	/// A signed (or placeholder) permit.
	///
	/// # Arguments
	///
	/// * `mode` - Mechanism the payload encodes
	/// * `permit_data` - Encoded payload for the router
	/// * `nonce` - Nonce consumed by the signature, 0 for placeholders
	pub fn success(mode: PermitMode, permit_data: Bytes, nonce: U256) -> Self {
		Self {
			status: PermitStatus::Success,
			code: StatusCode::Success,
			permit_data: Some(permit_data),
			nonce: Some(nonce),
			mode,
		}
	}

	/// A failed permit carrying no data.
	pub fn failure(mode: PermitMode, report: StatusReport) -> Self {
		Self {
			status: report.status,
			code: report.code,
			permit_data: None,
			nonce: None,
			mode,
		}
	}
}

/// Signed permit for one input token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPermit {
	pub index: usize,
	pub token: Address,
	/// Amount authorized by the signature (the leg total for one-to-many).
	pub amount: U256,
	pub result: PermitResult,
}

/// Signed permit covering several tokens at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPermit {
	pub tokens: Vec<(Address, U256)>,
	pub result: PermitResult,
}

/// Aggregate response of a signing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitResponse {
	pub status: PermitStatus,
	pub code: StatusCode,
	/// Effective mode of the call: the batch mode, or the requested mode
	/// when tokens were signed one by one.
	pub mode: PermitMode,
	pub permits: Vec<TokenPermit>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub batch: Option<BatchPermit>,
	/// Gasless verifier signature, present when the permits do not embed
	/// the gasless witness themselves.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub intent_signature: Option<Bytes>,
}

impl PermitResponse {
	/// A successful response with nothing signed yet.
	pub fn empty(mode: PermitMode) -> Self {
		Self {
			status: PermitStatus::Success,
			code: StatusCode::Success,
			mode,
			permits: Vec::new(),
			batch: None,
			intent_signature: None,
		}
	}

	/// Failed call; permits collected so far are discarded.
	pub fn failure(mode: PermitMode, report: StatusReport) -> Self {
		Self {
			status: report.status,
			code: report.code,
			mode,
			permits: Vec::new(),
			batch: None,
			intent_signature: None,
		}
	}

	pub fn is_success(&self) -> bool {
		self.status == PermitStatus::Success
	}

	/// Permit for the token at `index`, if it was signed individually.
	pub fn permit_for(&self, index: usize) -> Option<&TokenPermit> {
		self.permits.iter().find(|permit| permit.index == index)
	}
}

/// Progress event emitted after a single token is signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSigned {
	pub index: usize,
	pub src_token: Address,
	pub amount: U256,
	pub permit_data: Bytes,
	pub nonce: U256,
	pub mode: PermitMode,
}

/// Progress event emitted after a batch is signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSigned {
	pub tokens: Vec<(Address, U256)>,
	pub batch_permit_data: Bytes,
	pub nonce: U256,
	pub mode: PermitMode,
}
