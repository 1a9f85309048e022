//! EIP-2612 capability probing.
//!
//! Support is decided by whether `DOMAIN_SEPARATOR()` answers. The boolean is
//! cached per `(chain, token)` in the storage service for a fixed TTL, so a
//! full probe that follows a light one only reads the values it still needs.

use crate::contracts::IERC20Permit;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use permit_chain::{CallOutcome, ChainReader, ReadCall};
use permit_storage::StorageService;
use permit_types::{NetworksConfig, PermitHint};
use std::sync::Arc;
use std::time::Duration;

/// Storage namespace of the capability cache.
const CAPABILITY_NAMESPACE: &str = "eip2612";

/// Version assumed for tokens that do not expose `version()`.
pub const DEFAULT_PERMIT_VERSION: &str = "1";

/// What the full probe learned about a supporting token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPermitInfo {
	/// Token `name()`; absent only when the caller's domain override names the domain.
	pub name: Option<String>,
	pub version: String,
	/// Current `nonces(owner)`.
	pub nonce: U256,
}

/// Probes and caches EIP-2612 support.
pub struct CapabilityProber {
	reader: Arc<dyn ChainReader>,
	cache: Arc<StorageService>,
	networks: NetworksConfig,
	ttl: Duration,
}

fn cache_key(chain_id: u64, token: &Address) -> String {
	format!("{}:{:#x}", chain_id, token)
}

fn decode<C: SolCall>(outcome: Option<&CallOutcome>) -> Option<C::Return> {
	outcome
		.and_then(CallOutcome::data)
		.and_then(|data| C::abi_decode_returns(data).ok())
}

impl CapabilityProber {
	/// Creates a prober.
	///
	/// # Arguments
	///
	/// * `reader` - Chain access used for probe calls
	/// * `cache` - Storage holding answered probes
	/// * `networks` - Chain settings, including `eip2612_disabled`
	/// * `ttl` - Lifetime of a cached answer
	pub fn new(
		reader: Arc<dyn ChainReader>,
		cache: Arc<StorageService>,
		networks: NetworksConfig,
		ttl: Duration,
	) -> Self {
		Self {
			reader,
			cache,
			networks,
			ttl,
		}
	}

	fn chain_disabled(&self, chain_id: u64) -> bool {
		self.networks
			.get(&chain_id)
			.is_some_and(|network| network.eip2612_disabled)
	}

	async fn cached(&self, chain_id: u64, token: &Address) -> Option<bool> {
		match self
			.cache
			.retrieve_optional::<bool>(CAPABILITY_NAMESPACE, &cache_key(chain_id, token))
			.await
		{
			Ok(value) => value,
			Err(e) => {
				tracing::warn!(chain_id, token = %token, error = %e, "Capability cache read failed");
				None
			},
		}
	}

	async fn remember(&self, chain_id: u64, token: &Address, supported: bool) {
		if let Err(e) = self
			.cache
			.store_with_ttl(
				CAPABILITY_NAMESPACE,
				&cache_key(chain_id, token),
				&supported,
				Some(self.ttl),
			)
			.await
		{
			tracing::warn!(chain_id, token = %token, error = %e, "Capability cache write failed");
		}
	}

	/// Light probe: whether `token` supports EIP-2612 on `chain_id`.
	///
	/// Failed probes degrade to `false`; only answered probes are cached.
	pub async fn supports_eip2612(
		&self,
		chain_id: u64,
		token: Address,
		hint: Option<&PermitHint>,
	) -> bool {
		if let Some(hint) = hint {
			return hint.supports_eip2612;
		}
		if self.chain_disabled(chain_id) {
			return false;
		}
		if let Some(supported) = self.cached(chain_id, &token).await {
			tracing::trace!(chain_id, token = %token, supported, "Capability cache hit");
			return supported;
		}

		let calls = vec![ReadCall::new(
			token,
			IERC20Permit::DOMAIN_SEPARATORCall {}.abi_encode(),
		)];
		match self.reader.multicall(chain_id, calls).await {
			Ok(outcomes) => {
				let supported =
					decode::<IERC20Permit::DOMAIN_SEPARATORCall>(outcomes.first()).is_some();
				tracing::debug!(chain_id, token = %token, supported, "Probed EIP-2612 support");
				self.remember(chain_id, &token, supported).await;
				supported
			},
			Err(e) => {
				tracing::warn!(chain_id, token = %token, error = %e, "EIP-2612 probe failed, treating as unsupported");
				false
			},
		}
	}

	/// Full probe: support plus the domain name, version and the owner's nonce.
	///
	/// # Arguments
	///
	/// * `chain_id` - Chain the token lives on
	/// * `token` - Token contract
	/// * `owner` - Account whose `nonces` entry is read
	/// * `hint` - Caller's capability hint, possibly with a domain override
	///
	/// # Returns
	///
	/// `None` when the token cannot be permitted with EIP-2612.
	pub async fn probe_permit(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
		hint: Option<&PermitHint>,
	) -> Option<TokenPermitInfo> {
		let known = match hint {
			Some(hint) => Some(hint.supports_eip2612),
			None if self.chain_disabled(chain_id) => Some(false),
			None => self.cached(chain_id, &token).await,
		};
		if known == Some(false) {
			return None;
		}
		let override_domain = hint.and_then(|hint| hint.domain.as_ref());

		let mut calls = Vec::with_capacity(4);
		if known.is_none() {
			calls.push(ReadCall::new(
				token,
				IERC20Permit::DOMAIN_SEPARATORCall {}.abi_encode(),
			));
		}
		calls.push(ReadCall::new(
			token,
			IERC20Permit::noncesCall { owner }.abi_encode(),
		));
		calls.push(ReadCall::new(token, IERC20Permit::nameCall {}.abi_encode()));
		calls.push(ReadCall::new(
			token,
			IERC20Permit::versionCall {}.abi_encode(),
		));

		let outcomes = match self.reader.multicall(chain_id, calls).await {
			Ok(outcomes) => outcomes,
			Err(e) => {
				tracing::warn!(chain_id, token = %token, error = %e, "EIP-2612 probe failed, treating as unsupported");
				return None;
			},
		};

		let mut outcomes = outcomes.iter();
		if known.is_none()
			&& decode::<IERC20Permit::DOMAIN_SEPARATORCall>(outcomes.next()).is_none()
		{
			tracing::debug!(chain_id, token = %token, "Token has no DOMAIN_SEPARATOR");
			self.remember(chain_id, &token, false).await;
			return None;
		}
		let nonce = decode::<IERC20Permit::noncesCall>(outcomes.next());
		let name = decode::<IERC20Permit::nameCall>(outcomes.next());
		let version = decode::<IERC20Permit::versionCall>(outcomes.next());

		let Some(nonce) = nonce else {
			tracing::debug!(chain_id, token = %token, "Token has no nonces(owner)");
			if known.is_none() {
				self.remember(chain_id, &token, false).await;
			}
			return None;
		};
		if name.is_none() && override_domain.is_none() {
			tracing::debug!(chain_id, token = %token, "Token has no name()");
			if known.is_none() {
				self.remember(chain_id, &token, false).await;
			}
			return None;
		}

		if known.is_none() {
			self.remember(chain_id, &token, true).await;
		}
		let version = override_domain
			.and_then(|domain| domain.version.clone())
			.or(version)
			.unwrap_or_else(|| DEFAULT_PERMIT_VERSION.to_string());
		tracing::debug!(chain_id, token = %token, %nonce, %version, "Resolved EIP-2612 permit info");
		Some(TokenPermitInfo {
			name,
			version,
			nonce,
		})
	}

	/// Drops expired capability entries.
	pub async fn prune(&self) -> usize {
		self.cache.cleanup_expired().await.unwrap_or_else(|e| {
			tracing::warn!(error = %e, "Capability cache cleanup failed");
			0
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{FakeChain, OWNER};
	use permit_storage::implementations::memory::MemoryStorage;
	use permit_types::{Eip2612DomainOverride, ManualClock, NetworkConfig};

	const TOKEN: Address = Address::repeat_byte(0x10);

	fn prober(chain: Arc<FakeChain>, clock: Arc<ManualClock>) -> CapabilityProber {
		let mut networks = NetworksConfig::new();
		networks.insert(
			1,
			NetworkConfig {
				rpc_url: "http://localhost:8545".to_string(),
				permit2_address: None,
				multicall_address: None,
				eip2612_disabled: false,
			},
		);
		networks.insert(
			56,
			NetworkConfig {
				rpc_url: "http://localhost:8546".to_string(),
				permit2_address: None,
				multicall_address: None,
				eip2612_disabled: true,
			},
		);
		let cache = StorageService::new(Box::new(MemoryStorage::with_clock(clock)));
		CapabilityProber::new(chain, Arc::new(cache), networks, Duration::from_secs(60))
	}

	#[tokio::test]
	async fn test_hint_and_disabled_chain_skip_rpc() {
		let chain = Arc::new(FakeChain::new());
		let prober = prober(chain.clone(), Arc::new(ManualClock::new(0)));

		let hint = PermitHint {
			supports_eip2612: true,
			domain: None,
		};
		assert!(prober.supports_eip2612(1, TOKEN, Some(&hint)).await);
		assert!(!prober.supports_eip2612(56, TOKEN, None).await);
		assert!(prober.probe_permit(56, TOKEN, OWNER, None).await.is_none());
		assert_eq!(chain.call_count(), 0);
	}

	#[tokio::test]
	async fn test_light_probe_is_cached_until_ttl() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(TOKEN, "USD Coin", Some("2"), U256::from(4));
		let clock = Arc::new(ManualClock::new(0));
		let prober = prober(chain.clone(), clock.clone());

		assert!(prober.supports_eip2612(1, TOKEN, None).await);
		assert!(prober.supports_eip2612(1, TOKEN, None).await);
		assert_eq!(chain.call_count(), 1);

		clock.advance(61);
		assert!(prober.supports_eip2612(1, TOKEN, None).await);
		assert_eq!(chain.call_count(), 2);
	}

	#[tokio::test]
	async fn test_full_probe_after_light_skips_domain_separator() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(TOKEN, "USD Coin", Some("2"), U256::from(4));
		let prober = prober(chain.clone(), Arc::new(ManualClock::new(0)));

		assert!(prober.supports_eip2612(1, TOKEN, None).await);
		let info = prober.probe_permit(1, TOKEN, OWNER, None).await.unwrap();
		assert_eq!(info.name.as_deref(), Some("USD Coin"));
		assert_eq!(info.version, "2");
		assert_eq!(info.nonce, U256::from(4));
		// Second batch reads nonces, name and version only.
		assert_eq!(chain.batch_sizes(), vec![1, 3]);
	}

	#[tokio::test]
	async fn test_cached_false_returns_without_rpc() {
		let chain = Arc::new(FakeChain::new());
		let prober = prober(chain.clone(), Arc::new(ManualClock::new(0)));

		assert!(!prober.supports_eip2612(1, TOKEN, None).await);
		assert!(prober.probe_permit(1, TOKEN, OWNER, None).await.is_none());
		assert_eq!(chain.call_count(), 1);
	}

	#[tokio::test]
	async fn test_missing_version_defaults_to_one() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(TOKEN, "Dai", None, U256::ZERO);
		let prober = prober(chain.clone(), Arc::new(ManualClock::new(0)));

		let info = prober.probe_permit(1, TOKEN, OWNER, None).await.unwrap();
		assert_eq!(info.version, DEFAULT_PERMIT_VERSION);
		assert_eq!(chain.batch_sizes(), vec![4]);
		// Support was cached by the full probe.
		assert!(prober.supports_eip2612(1, TOKEN, None).await);
		assert_eq!(chain.call_count(), 1);
	}

	#[tokio::test]
	async fn test_transport_failure_is_not_cached() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(TOKEN, "USD Coin", Some("2"), U256::ZERO);
		chain.fail_next_batches(1);
		let prober = prober(chain.clone(), Arc::new(ManualClock::new(0)));

		assert!(!prober.supports_eip2612(1, TOKEN, None).await);
		assert!(prober.supports_eip2612(1, TOKEN, None).await);
	}

	#[tokio::test]
	async fn test_override_domain_supplies_version() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(TOKEN, "Bridged USDC", Some("1"), U256::from(9));
		let prober = prober(chain.clone(), Arc::new(ManualClock::new(0)));

		let hint = PermitHint {
			supports_eip2612: true,
			domain: Some(Eip2612DomainOverride {
				name: "USD Coin".to_string(),
				version: Some("2".to_string()),
				chain_id: None,
				verifying_contract: None,
				salt: None,
			}),
		};
		let info = prober
			.probe_permit(1, TOKEN, OWNER, Some(&hint))
			.await
			.unwrap();
		assert_eq!(info.version, "2");
		assert_eq!(info.nonce, U256::from(9));
	}

	#[tokio::test]
	async fn test_prune_drops_expired_entries() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(TOKEN, "USD Coin", Some("2"), U256::ZERO);
		let clock = Arc::new(ManualClock::new(0));
		let prober = prober(chain.clone(), clock.clone());

		assert!(prober.supports_eip2612(1, TOKEN, None).await);
		assert_eq!(prober.prune().await, 0);
		clock.advance(61);
		assert_eq!(prober.prune().await, 1);
	}
}
