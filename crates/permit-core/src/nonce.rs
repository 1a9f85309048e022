//! Nonce resolution for each permit kind.
//!
//! Allowance-style permits reuse Permit2's per-`(owner, token, spender)`
//! nonce. Signature-transfer permits draw from Permit2's unordered nonce
//! bitmap: the first witness-signed token takes the lowest unused bit and
//! later ones in the same call are offset from it by position, tracked by
//! [`NonceChain`].

use crate::contracts::IPermit2;
use crate::PermitError;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use permit_chain::{ChainReader, ReadCall};
use std::sync::Arc;

/// Nonces packed into one bitmap word.
const BITS_PER_WORD: u64 = 256;

/// Reads Permit2 nonce state.
pub struct NonceSequencer {
	reader: Arc<dyn ChainReader>,
	max_words: u64,
	page_size: u64,
}

impl NonceSequencer {
	/// Creates a sequencer over `reader`.
	///
	/// # Arguments
	///
	/// * `reader` - Chain access used for Permit2 reads
	/// * `max_words` - Bitmap words scanned before giving up (at least 1)
	/// * `page_size` - Bitmap words read per multicall (at least 1)
	pub fn new(reader: Arc<dyn ChainReader>, max_words: u64, page_size: u64) -> Self {
		Self {
			reader,
			max_words: max_words.max(1),
			page_size: page_size.max(1),
		}
	}

	/// Current allowance nonce of `owner` for `token` and `spender`.
	pub async fn allowance_nonce(
		&self,
		chain_id: u64,
		permit2: Address,
		owner: Address,
		token: Address,
		spender: Address,
	) -> Result<U256, PermitError> {
		let call = IPermit2::allowanceCall {
			user: owner,
			token,
			spender,
		};
		let outcomes = self
			.reader
			.multicall(chain_id, vec![ReadCall::new(permit2, call.abi_encode())])
			.await?;
		let allowance = outcomes
			.first()
			.and_then(|outcome| outcome.data())
			.and_then(|data| IPermit2::allowanceCall::abi_decode_returns(data).ok())
			.ok_or_else(|| {
				PermitError::NonceResolution(format!(
					"Permit2 allowance read failed for token {}",
					token
				))
			})?;

		let nonce = U256::from(allowance.nonce);
		tracing::debug!(chain_id, token = %token, %nonce, "Resolved Permit2 allowance nonce");
		Ok(nonce)
	}

	/// Lowest unused unordered nonce of `owner`.
	///
	/// Words are read `page_size` at a time until a word with a clear bit is
	/// found or `max_words` words have been scanned.
	///
	/// # Arguments
	///
	/// * `chain_id` - Chain to read from
	/// * `permit2` - Permit2 deployment on that chain
	/// * `owner` - Account whose bitmap is scanned
	///
	/// # Returns
	///
	/// `word * 256 + bit` of the first clear bit, or
	/// [`PermitError::NonceResolution`] when every scanned word is full.
	pub async fn next_unordered_nonce(
		&self,
		chain_id: u64,
		permit2: Address,
		owner: Address,
	) -> Result<U256, PermitError> {
		let mut word = 0u64;
		while word < self.max_words {
			let end = (word + self.page_size).min(self.max_words);
			let calls = (word..end)
				.map(|position| {
					let call = IPermit2::nonceBitmapCall {
						owner,
						wordPos: U256::from(position),
					};
					ReadCall::new(permit2, call.abi_encode())
				})
				.collect();
			let outcomes = self.reader.multicall(chain_id, calls).await?;

			for (position, outcome) in (word..end).zip(outcomes.iter()) {
				let bitmap = outcome
					.data()
					.and_then(|data| IPermit2::nonceBitmapCall::abi_decode_returns(data).ok())
					.ok_or_else(|| {
						PermitError::NonceResolution(format!(
							"Permit2 nonceBitmap read failed at word {}",
							position
						))
					})?;
				if bitmap != U256::MAX {
					let bit = bitmap.trailing_ones() as u64;
					let nonce = U256::from(position) * U256::from(BITS_PER_WORD) + U256::from(bit);
					tracing::debug!(chain_id, owner = %owner, word = position, bit, "Found unused Permit2 nonce");
					return Ok(nonce);
				}
			}
			word = end;
		}

		Err(PermitError::NonceResolution(format!(
			"No unused Permit2 nonce in the first {} bitmap words",
			self.max_words
		)))
	}
}

/// Consecutive signature-transfer nonces within one signing call.
///
/// The first witness-signed token reads a fresh nonce from the bitmap and
/// anchors the chain at its position; a later token at `position` takes the
/// anchor nonce plus its distance from the anchor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonceChain {
	first: Option<(usize, U256)>,
}

impl NonceChain {
	/// An empty chain with no anchor.
	pub fn new() -> Self {
		Self::default()
	}

	/// Anchors the chain at `position` with the nonce read for that token.
	pub fn record_first(&mut self, position: usize, nonce: U256) {
		self.first = Some((position, nonce));
	}

	/// Nonce of the anchoring token, once recorded.
	pub fn first(&self) -> Option<U256> {
		self.first.map(|(_, nonce)| nonce)
	}

	/// Nonce of the token at `position`.
	///
	/// # Errors
	///
	/// Returns [`PermitError::NonceNotFound`] when no token has anchored the
	/// chain yet or `position` does not come after the anchor.
	pub fn derive(&self, position: usize) -> Result<U256, PermitError> {
		match self.first {
			Some((anchor, nonce)) if position > anchor => {
				Ok(nonce + U256::from(position - anchor))
			},
			_ => Err(PermitError::NonceNotFound { index: position }),
		}
	}
}
