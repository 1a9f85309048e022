//! Choice between batch and per-token signing, and of each token's mechanism.

use alloy_primitives::{Address, U256};
use permit_types::{PermitMode, RouterProfile, TokenPermitInput};

/// How a signing call is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningPlan {
	/// Nothing to sign.
	Empty,
	/// One Permit2 batch signature over every ERC-20 in the set.
	Batch,
	/// Tokens signed one at a time. With `one_to_many`, the first leg is
	/// signed for the shared token's total and later legs get the approve
	/// placeholder.
	PerToken { one_to_many: bool },
}

/// How a single token in a per-token plan is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStrategy {
	/// Fixed approve payload, never signed.
	Placeholder,
	/// EIP-2612 was requested explicitly; lack of support is an error.
	Eip2612,
	/// EIP-2612 if the token supports it, otherwise the Permit2 `fallback`.
	PreferEip2612 { fallback: PermitMode },
	/// A Permit2 mode.
	Permit2(PermitMode),
}

/// A set where one source token funds several legs: more than one entry and
/// the first two share an address.
pub fn is_one_to_many(tokens: &[TokenPermitInput]) -> bool {
	match tokens {
		[first, second, ..] => first.address == second.address,
		_ => false,
	}
}

/// ERC-20 entries of a batch in input order.
pub fn batch_tokens(tokens: &[TokenPermitInput]) -> Vec<(Address, U256)> {
	tokens
		.iter()
		.filter(|token| !token.is_native())
		.map(|token| (token.address, token.amount))
		.collect()
}

/// Total of every leg sharing the first token's address.
pub fn one_to_many_amount(tokens: &[TokenPermitInput]) -> U256 {
	let Some(first) = tokens.first() else {
		return U256::ZERO;
	};
	tokens
		.iter()
		.filter(|token| token.address == first.address)
		.fold(U256::ZERO, |total, token| total.saturating_add(token.amount))
}

/// Decides between batch and per-token signing.
///
/// # Arguments
///
/// * `tokens` - The token set in input order
/// * `mode` - Mode requested by the caller
/// * `profile` - Router the permits are for
/// * `allow_batch` - Whether batch signatures are enabled
///
/// # Returns
///
/// The signing plan. Only `AutoPermit` collapses a one-to-many set into its
/// first leg; explicit modes sign every leg with its own amount.
pub fn select_plan(
	tokens: &[TokenPermitInput],
	mode: PermitMode,
	profile: &RouterProfile,
	allow_batch: bool,
) -> SigningPlan {
	if tokens.is_empty() {
		return SigningPlan::Empty;
	}
	let one_to_many = is_one_to_many(tokens);
	let erc20_count = tokens.iter().filter(|token| !token.is_native()).count();

	let wants_batch = match mode {
		PermitMode::PermitBatchWitnessTransferFrom => true,
		PermitMode::AutoPermit => tokens.len() > 1 && !one_to_many,
		_ => false,
	};
	if wants_batch && allow_batch && profile.supports_permit2_witness() && erc20_count > 1 {
		return SigningPlan::Batch;
	}
	SigningPlan::PerToken {
		one_to_many: one_to_many && mode == PermitMode::AutoPermit,
	}
}

/// Permit2 mode a router can consume in place of `requested`.
///
/// Legacy trade routers only parse allowance-style permits.
fn permit2_mode(requested: PermitMode, profile: &RouterProfile) -> PermitMode {
	let mode = match requested {
		PermitMode::PermitSingle => PermitMode::PermitSingle,
		_ => PermitMode::PermitWitnessTransferFrom,
	};
	if mode.embeds_witness() && profile.is_legacy_trade() {
		if requested != PermitMode::AutoPermit {
			tracing::debug!(
				requested = %requested,
				"Router accepts only allowance permits, using PermitSingle"
			);
		}
		return PermitMode::PermitSingle;
	}
	mode
}

/// Mechanism for the token at `position` of a per-token plan.
///
/// `one_to_many` is the flag of the plan from [`select_plan`].
pub fn token_strategy(
	token: &TokenPermitInput,
	position: usize,
	requested: PermitMode,
	profile: &RouterProfile,
	one_to_many: bool,
) -> TokenStrategy {
	if token.is_native() || (one_to_many && position > 0) {
		return TokenStrategy::Placeholder;
	}
	match requested {
		PermitMode::Default => TokenStrategy::Placeholder,
		PermitMode::Eip2612Permit => TokenStrategy::Eip2612,
		PermitMode::AutoPermit => TokenStrategy::PreferEip2612 {
			fallback: permit2_mode(requested, profile),
		},
		PermitMode::PermitSingle
		| PermitMode::PermitWitnessTransferFrom
		| PermitMode::PermitBatchWitnessTransferFrom => {
			TokenStrategy::Permit2(permit2_mode(requested, profile))
		},
	}
}
