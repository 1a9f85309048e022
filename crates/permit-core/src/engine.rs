//! Signing orchestration.
//!
//! A call is planned once (batch or per token), then executed sequentially:
//! each token's nonce may depend on the previous one, and the host signer is
//! asked for one signature at a time. The first failure aborts the call and
//! discards everything signed so far.

use crate::capability::{CapabilityProber, TokenPermitInfo};
use crate::nonce::{NonceChain, NonceSequencer};
use crate::registry::PROTOCOL_REGISTRY;
use crate::strategy::{
	batch_tokens, one_to_many_amount, select_plan, token_strategy, SigningPlan, TokenStrategy,
};
use crate::{encoder, typed_data, PermitError};
use alloy_primitives::{Address, Bytes, Signature, B256, U256};
use async_trait::async_trait;
use permit_account::{HostSigner, TypedDataSigner};
use permit_chain::ChainReader;
use permit_config::EngineConfig;
use permit_storage::StorageService;
use permit_types::{
	BatchPermit, BatchSigned, Clock, GaslessTxType, NetworksConfig, PermitIntent, PermitMode,
	PermitResponse, PermitResult, PermitTypedData, RouterProfile, StatusReport, SystemClock,
	TokenPermit, TokenPermitInput, TokenSigned, WitnessData,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Tokens to authorize and the router that will consume the permits.
#[derive(Debug, Clone)]
pub struct SignRequest {
	pub tokens: Vec<TokenPermitInput>,
	pub chain_id: u64,
	/// Router contract the permits are granted to.
	pub spender: Address,
	pub profile: RouterProfile,
	pub mode: PermitMode,
	/// Unix timestamp after which the signatures expire; defaults to now
	/// plus the configured signature window.
	pub deadline: Option<u64>,
}

/// Gasless transaction parameters as supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaslessParams {
	pub tx_type: GaslessTxType,
	pub tx_id: B256,
	pub executor_fees_hash: B256,
	pub swap_data_hash: Option<B256>,
	pub adapter_data_hash: Option<B256>,
}

/// Progress callbacks invoked after each signature.
///
/// Returning a non-success report stops the call; the report becomes the
/// call's result.
#[async_trait]
pub trait PermitObserver: Send + Sync {
	async fn on_token_signed(&self, _event: &TokenSigned) -> StatusReport {
		StatusReport::success()
	}

	async fn on_batch_signed(&self, _event: &BatchSigned) -> StatusReport {
		StatusReport::success()
	}
}

/// Per-call state shared by the signing steps.
struct SigningContext<'a> {
	request: &'a SignRequest,
	intent: &'a PermitIntent,
	signer: &'a dyn TypedDataSigner,
	observer: Option<&'a dyn PermitObserver>,
	owner: Address,
	deadline: u64,
}

/// Mechanism a token ends up signed with.
enum Resolved {
	Eip2612(TokenPermitInfo),
	Permit2(PermitMode),
}

/// The permit signature engine.
pub struct PermitEngine {
	settings: EngineConfig,
	networks: NetworksConfig,
	prober: CapabilityProber,
	nonces: NonceSequencer,
	clock: Arc<dyn Clock>,
}

impl PermitEngine {
	/// Creates an engine reading chain state through `reader`.
	///
	/// # Arguments
	///
	/// * `settings` - Deadlines, cache TTL, batching and nonce scan limits
	/// * `networks` - Chains the engine may sign for
	/// * `reader` - Batched read-only access to those chains
	/// * `cache` - Backend of the EIP-2612 capability cache
	pub fn new(
		settings: EngineConfig,
		networks: NetworksConfig,
		reader: Arc<dyn ChainReader>,
		cache: Arc<StorageService>,
	) -> Self {
		let prober = CapabilityProber::new(
			reader.clone(),
			cache,
			networks.clone(),
			Duration::from_secs(settings.capability_cache_ttl_seconds),
		);
		let nonces = NonceSequencer::new(
			reader,
			settings.max_nonce_words,
			settings.nonce_scan_page_size,
		);
		Self {
			settings,
			networks,
			prober,
			nonces,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the clock used for default deadlines and Permit2 expirations.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// The capability prober, for callers probing tokens ahead of signing.
	pub fn prober(&self) -> &CapabilityProber {
		&self.prober
	}

	/// Engine settings in effect.
	pub fn settings(&self) -> &EngineConfig {
		&self.settings
	}

	/// Signs permits for `request.tokens`.
	///
	/// Runtime failures (rejection, chain reads, unsupported tokens) are
	/// reported in the response; `Err` is reserved for configuration errors.
	#[instrument(skip_all, fields(chain_id = request.chain_id, mode = %request.mode, tokens = request.tokens.len()))]
	pub async fn sign(
		&self,
		request: &SignRequest,
		signer: HostSigner,
		observer: Option<&dyn PermitObserver>,
	) -> Result<PermitResponse, PermitError> {
		self.run(request, &PermitIntent::Standard, signer, observer)
			.await
	}

	/// Signs permits bound to a gasless intent.
	///
	/// The intent is embedded as the Permit2 witness when the chosen mechanism
	/// carries one; otherwise a separate verifier signature is returned in
	/// `intent_signature`.
	#[instrument(skip_all, fields(chain_id = request.chain_id, mode = %request.mode, tx_type = %gasless.tx_type))]
	pub async fn sign_gasless_intent(
		&self,
		request: &SignRequest,
		signer: HostSigner,
		gasless: &GaslessParams,
		observer: Option<&dyn PermitObserver>,
	) -> Result<PermitResponse, PermitError> {
		self.gasless_salt()?;
		let intent = match PermitIntent::gasless(
			gasless.tx_type,
			gasless.tx_id,
			gasless.executor_fees_hash,
			gasless.swap_data_hash,
			gasless.adapter_data_hash,
		) {
			Ok(intent) => intent,
			Err(e) => {
				tracing::warn!(error = %e, "Rejecting gasless request");
				return Ok(PermitResponse::failure(
					request.mode,
					PermitError::from(e).status_code(),
				));
			},
		};
		self.run(request, &intent, signer, observer).await
	}

	async fn run(
		&self,
		request: &SignRequest,
		intent: &PermitIntent,
		signer: HostSigner,
		observer: Option<&dyn PermitObserver>,
	) -> Result<PermitResponse, PermitError> {
		match self.execute(request, intent, signer, observer).await {
			Ok(response) => Ok(response),
			Err(e) if e.is_configuration() => Err(e),
			Err(e) => {
				let report = e.status_code();
				tracing::warn!(error = %e, status = ?report.status, code = %report.code, "Permit signing failed");
				Ok(PermitResponse::failure(request.mode, report))
			},
		}
	}

	async fn execute(
		&self,
		request: &SignRequest,
		intent: &PermitIntent,
		signer: HostSigner,
		observer: Option<&dyn PermitObserver>,
	) -> Result<PermitResponse, PermitError> {
		let plan = select_plan(
			&request.tokens,
			request.mode,
			&request.profile,
			self.settings.allow_batch,
		);
		if plan == SigningPlan::Empty {
			tracing::debug!("No tokens to sign");
			return Ok(PermitResponse::empty(request.mode));
		}
		if !self.networks.contains_key(&request.chain_id) {
			return Err(PermitError::UnknownChain(request.chain_id));
		}

		let signer = signer.into_signer();
		let owner = signer.address().await?;
		let deadline = request.deadline.unwrap_or_else(|| {
			self.clock
				.now()
				.saturating_add(self.settings.signature_deadline_seconds)
		});
		let ctx = SigningContext {
			request,
			intent,
			signer: signer.as_ref(),
			observer,
			owner,
			deadline,
		};
		tracing::debug!(?plan, owner = %owner, deadline, "Planned permit signing");

		let mut response = match plan {
			SigningPlan::Empty => PermitResponse::empty(request.mode),
			SigningPlan::Batch => self.sign_batch(&ctx).await?,
			SigningPlan::PerToken { one_to_many } => {
				self.sign_per_token(&ctx, one_to_many).await?
			},
		};

		if intent.is_gasless() && !embeds_witness(&response) {
			let typed = typed_data::gasless_intent(
				request.chain_id,
				request.spender,
				self.gasless_salt()?,
				intent,
				owner,
				deadline,
			)?;
			let signature = self.sign_typed(&ctx, &typed).await?;
			response.intent_signature = Some(Bytes::from(signature.as_bytes().to_vec()));
			tracing::info!(primary_type = %typed.primary_type, "Signed gasless intent");
		}

		Ok(response)
	}

	/// Salt of the gasless verifier domain; gasless signing needs one configured.
	fn gasless_salt(&self) -> Result<B256, PermitError> {
		self.settings.gasless_salt.ok_or_else(|| {
			PermitError::Config("engine.gasless_salt is required for gasless signing".to_string())
		})
	}

	fn permit2(&self, chain_id: u64) -> Result<Address, PermitError> {
		PROTOCOL_REGISTRY
			.resolve_permit2(chain_id, self.networks.get(&chain_id))
			.ok_or(PermitError::Permit2NotDeployed(chain_id))
	}

	/// Asks the signer for a signature and checks it recovers to the owner.
	async fn sign_typed(
		&self,
		ctx: &SigningContext<'_>,
		typed: &PermitTypedData,
	) -> Result<Signature, PermitError> {
		let signature = ctx.signer.sign_typed_data(typed).await?;
		let recovered = typed_data::recover_signer(typed, &signature)?;
		if recovered != ctx.owner {
			return Err(PermitError::Signing(format!(
				"Signature recovers to {} instead of {}",
				recovered, ctx.owner
			)));
		}
		Ok(signature)
	}

	async fn sign_batch(&self, ctx: &SigningContext<'_>) -> Result<PermitResponse, PermitError> {
		let request = ctx.request;
		let mode = PermitMode::PermitBatchWitnessTransferFrom;
		let tokens = batch_tokens(&request.tokens);
		let permit2 = self.permit2(request.chain_id)?;

		let nonce = self
			.nonces
			.next_unordered_nonce(request.chain_id, permit2, ctx.owner)
			.await?;
		let witness = WitnessData::for_intent(ctx.intent, ctx.owner, request.spender);
		let typed = typed_data::permit_batch_witness_transfer(
			request.chain_id,
			permit2,
			&tokens,
			request.spender,
			nonce,
			ctx.deadline,
			&witness,
		);
		let signature = self.sign_typed(ctx, &typed).await?;
		let permit_data = encoder::wrap(
			mode,
			&request.profile,
			encoder::batch_witness_transfer(&tokens, nonce, ctx.deadline, &signature),
		)?;
		tracing::info!(tokens = tokens.len(), %nonce, "Signed batch permit");

		if let Some(observer) = ctx.observer {
			let report = observer
				.on_batch_signed(&BatchSigned {
					tokens: tokens.clone(),
					batch_permit_data: permit_data.clone(),
					nonce,
					mode,
				})
				.await;
			if !report.is_success() {
				return Err(PermitError::Callback(report));
			}
		}

		let mut response = PermitResponse::empty(mode);
		response.permits = request
			.tokens
			.iter()
			.filter(|token| token.is_native())
			.map(|token| placeholder_permit(token, token.amount))
			.collect();
		response.batch = Some(BatchPermit {
			tokens,
			result: PermitResult::success(mode, permit_data, nonce),
		});
		Ok(response)
	}

	async fn sign_per_token(
		&self,
		ctx: &SigningContext<'_>,
		one_to_many: bool,
	) -> Result<PermitResponse, PermitError> {
		let request = ctx.request;
		let mut chain = NonceChain::new();
		let mut permits = Vec::with_capacity(request.tokens.len());

		for (position, token) in request.tokens.iter().enumerate() {
			let amount = if one_to_many && position == 0 {
				one_to_many_amount(&request.tokens)
			} else {
				token.amount
			};
			let strategy = token_strategy(
				token,
				position,
				request.mode,
				&request.profile,
				one_to_many,
			);

			let permit = match self.resolve(ctx, token, strategy).await? {
				None => {
					tracing::debug!(index = token.index, token = %token.address, "Using approve placeholder");
					placeholder_permit(token, amount)
				},
				Some(resolved) => {
					self.sign_token(ctx, position, token, amount, resolved, &mut chain)
						.await?
				},
			};
			permits.push(permit);
		}

		let mut response = PermitResponse::empty(request.mode);
		response.permits = permits;
		Ok(response)
	}

	async fn resolve(
		&self,
		ctx: &SigningContext<'_>,
		token: &TokenPermitInput,
		strategy: TokenStrategy,
	) -> Result<Option<Resolved>, PermitError> {
		let chain_id = ctx.request.chain_id;
		let hint = token.permit_hint.as_ref();
		match strategy {
			TokenStrategy::Placeholder => Ok(None),
			TokenStrategy::Permit2(mode) => Ok(Some(Resolved::Permit2(mode))),
			TokenStrategy::Eip2612 => self
				.prober
				.probe_permit(chain_id, token.address, ctx.owner, hint)
				.await
				.map(|info| Some(Resolved::Eip2612(info)))
				.ok_or_else(|| PermitError::UnsupportedPermitType {
					mode: PermitMode::Eip2612Permit,
					reason: format!("token {} does not support EIP-2612", token.address),
				}),
			TokenStrategy::PreferEip2612 { fallback } => {
				match self
					.prober
					.probe_permit(chain_id, token.address, ctx.owner, hint)
					.await
				{
					Some(info) => Ok(Some(Resolved::Eip2612(info))),
					None => {
						tracing::debug!(index = token.index, token = %token.address, fallback = %fallback, "No EIP-2612 support, using Permit2");
						Ok(Some(Resolved::Permit2(fallback)))
					},
				}
			},
		}
	}

	async fn sign_token(
		&self,
		ctx: &SigningContext<'_>,
		position: usize,
		token: &TokenPermitInput,
		amount: U256,
		resolved: Resolved,
		chain: &mut NonceChain,
	) -> Result<TokenPermit, PermitError> {
		let request = ctx.request;
		let chain_id = request.chain_id;
		let profile = &request.profile;

		let (mode, nonce, inner) = match resolved {
			Resolved::Eip2612(info) => {
				let typed = typed_data::eip2612_permit(&typed_data::Eip2612Params {
					chain_id,
					token: token.address,
					name: info.name.as_deref(),
					version: &info.version,
					owner: ctx.owner,
					spender: request.spender,
					value: amount,
					nonce: info.nonce,
					deadline: ctx.deadline,
					domain_override: token
						.permit_hint
						.as_ref()
						.and_then(|hint| hint.domain.as_ref()),
				})?;
				let signature = self.sign_typed(ctx, &typed).await?;
				let inner = encoder::eip2612(
					profile,
					ctx.owner,
					request.spender,
					amount,
					ctx.deadline,
					&signature,
				);
				(PermitMode::Eip2612Permit, info.nonce, inner)
			},
			Resolved::Permit2(PermitMode::PermitSingle) => {
				let permit2 = self.permit2(chain_id)?;
				let nonce = self
					.nonces
					.allowance_nonce(chain_id, permit2, ctx.owner, token.address, request.spender)
					.await?;
				let expiration = self
					.clock
					.now()
					.saturating_add(self.settings.permit2_expiration_seconds);
				let typed = typed_data::permit_single(
					chain_id,
					permit2,
					token.address,
					amount,
					expiration,
					nonce,
					request.spender,
					ctx.deadline,
				)?;
				let signature = self.sign_typed(ctx, &typed).await?;
				let inner = encoder::permit_single(
					profile,
					amount,
					nonce,
					expiration,
					ctx.deadline,
					&signature,
				);
				(PermitMode::PermitSingle, nonce, inner)
			},
			Resolved::Permit2(PermitMode::PermitWitnessTransferFrom) => {
				let permit2 = self.permit2(chain_id)?;
				let nonce = match chain.first() {
					Some(_) => chain.derive(position)?,
					None => {
						let nonce = self
							.nonces
							.next_unordered_nonce(chain_id, permit2, ctx.owner)
							.await?;
						chain.record_first(position, nonce);
						nonce
					},
				};
				let witness = WitnessData::for_intent(ctx.intent, ctx.owner, request.spender);
				let typed = typed_data::permit_witness_transfer(
					chain_id,
					permit2,
					token.address,
					amount,
					request.spender,
					nonce,
					ctx.deadline,
					&witness,
				);
				let signature = self.sign_typed(ctx, &typed).await?;
				let inner = encoder::witness_transfer(nonce, ctx.deadline, &signature);
				(PermitMode::PermitWitnessTransferFrom, nonce, inner)
			},
			Resolved::Permit2(other) => {
				return Err(PermitError::UnsupportedPermitType {
					mode: other,
					reason: "not a single-token Permit2 mode".to_string(),
				})
			},
		};

		let permit_data = encoder::wrap(mode, profile, inner)?;
		tracing::info!(
			chain_id,
			index = token.index,
			token = %token.address,
			mode = %mode,
			%nonce,
			"Signed token permit"
		);

		if let Some(observer) = ctx.observer {
			let report = observer
				.on_token_signed(&TokenSigned {
					index: token.index,
					src_token: token.address,
					amount,
					permit_data: permit_data.clone(),
					nonce,
					mode,
				})
				.await;
			if !report.is_success() {
				return Err(PermitError::Callback(report));
			}
		}

		Ok(TokenPermit {
			index: token.index,
			token: token.address,
			amount,
			result: PermitResult::success(mode, permit_data, nonce),
		})
	}
}

fn placeholder_permit(token: &TokenPermitInput, amount: U256) -> TokenPermit {
	TokenPermit {
		index: token.index,
		token: token.address,
		amount,
		result: PermitResult::success(PermitMode::Default, encoder::placeholder(), U256::ZERO),
	}
}

/// Whether some signature in `response` already carries the intent witness.
fn embeds_witness(response: &PermitResponse) -> bool {
	response
		.batch
		.iter()
		.map(|batch| batch.result.mode)
		.chain(response.permits.iter().map(|permit| permit.result.mode))
		.any(|mode| mode.embeds_witness())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{split_payload, FakeChain, RecordingObserver, RecordingSigner, OWNER, PERMIT2};
	use alloy_primitives::{address, keccak256};
	use permit_account::implementations::local::{LocalWallet, SignerStyle};
	use permit_account::AccountInterface;
	use permit_storage::implementations::memory::MemoryStorage;
	use permit_types::{
		ContractVersion, ManualClock, NetworkConfig, PermitStatus, SecretString, Service,
		StatusCode, NATIVE_TOKEN_ADDRESS,
	};

	const NOW: u64 = 1_700_000_000;
	const ROUTER: Address = address!("0x3333333333333333333333333333333333333333");
	const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
	const WETH: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
	const DAI: Address = address!("0x6B175474E89094C44Da98b954EedeAC495271d0F");
	const GASLESS_SALT: B256 = B256::repeat_byte(0x5a);

	fn engine(chain: Arc<FakeChain>) -> PermitEngine {
		engine_with(
			chain,
			EngineConfig {
				gasless_salt: Some(GASLESS_SALT),
				..EngineConfig::default()
			},
		)
	}

	fn engine_with(chain: Arc<FakeChain>, settings: EngineConfig) -> PermitEngine {
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
		let clock = Arc::new(ManualClock::new(NOW));
		let cache = StorageService::new(Box::new(MemoryStorage::with_clock(clock.clone())));
		PermitEngine::new(settings, networks, chain, Arc::new(cache)).with_clock(clock)
	}

	fn request(
		tokens: Vec<(Address, u64)>,
		mode: PermitMode,
		version: ContractVersion,
		service: Service,
	) -> SignRequest {
		SignRequest {
			tokens: TokenPermitInput::indexed(
				tokens
					.into_iter()
					.map(|(token, amount)| (token, U256::from(amount))),
			),
			chain_id: 1,
			spender: ROUTER,
			profile: RouterProfile::new(version, service),
			mode,
			deadline: None,
		}
	}

	fn nonce_of(response: &PermitResponse, index: usize) -> U256 {
		response.permit_for(index).unwrap().result.nonce.unwrap()
	}

	fn payload_of(response: &PermitResponse, index: usize) -> (u8, Vec<u8>) {
		split_payload(response.permit_for(index).unwrap().result.permit_data.as_ref().unwrap())
	}

	#[tokio::test]
	async fn test_empty_token_set_succeeds_without_signing() {
		let engine = engine(Arc::new(FakeChain::new()));
		let signer = Arc::new(RecordingSigner::new());
		let request = request(vec![], PermitMode::AutoPermit, ContractVersion::V2, Service::Swap);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert!(response.permits.is_empty());
		assert!(response.batch.is_none());
		assert_eq!(signer.calls(), 0);
	}

	#[tokio::test]
	async fn test_usdc_eip2612_scenario() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(USDC, "USD Coin", Some("2"), U256::ZERO);
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(USDC, 1_000_000)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert!(response.batch.is_none());
		let permit = response.permit_for(0).unwrap();
		assert_eq!(permit.result.mode, PermitMode::Eip2612Permit);
		assert_eq!(permit.result.nonce, Some(U256::ZERO));
		assert_eq!(signer.primary_types(), vec!["Permit".to_string()]);

		let (mode, inner) = payload_of(&response, 0);
		assert_eq!(mode, 1);
		assert_eq!(inner.len(), 4 * 32);
		let deadline = NOW + engine.settings().signature_deadline_seconds;
		assert_eq!(U256::from_be_slice(&inner[..32]), U256::from(deadline));

		let v = inner[63];
		let signature = Signature::new(
			U256::from_be_slice(&inner[64..96]),
			U256::from_be_slice(&inner[96..128]),
			v == 28,
		);
		let typed = typed_data::eip2612_permit(&typed_data::Eip2612Params {
			chain_id: 1,
			token: USDC,
			name: Some("USD Coin"),
			version: "2",
			owner: OWNER,
			spender: ROUTER,
			value: U256::from(1_000_000),
			nonce: U256::ZERO,
			deadline,
			domain_override: None,
		})
		.unwrap();
		assert_eq!(typed_data::recover_signer(&typed, &signature).unwrap(), OWNER);
	}

	#[tokio::test]
	async fn test_single_token_without_eip2612_uses_witness_transfer() {
		let chain = Arc::new(FakeChain::new());
		chain.set_bitmap_word(0, U256::from(1));
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 10)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Bridge,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.batch.is_none());
		assert_eq!(
			response.permit_for(0).unwrap().result.mode,
			PermitMode::PermitWitnessTransferFrom
		);
		assert_eq!(nonce_of(&response, 0), U256::from(1));
		assert_eq!(payload_of(&response, 0).0, 2);
		assert_eq!(signer.primary_types(), vec!["PermitWitnessTransferFrom".to_string()]);
	}

	#[tokio::test]
	async fn test_one_to_many_signs_first_leg_for_total() {
		let chain = Arc::new(FakeChain::new());
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 5), (WETH, 7)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.batch.is_none());
		assert_eq!(signer.calls(), 1);

		let first = response.permit_for(0).unwrap();
		assert_eq!(first.amount, U256::from(12));
		assert_eq!(first.result.mode, PermitMode::PermitWitnessTransferFrom);

		let second = response.permit_for(1).unwrap();
		assert_eq!(second.result.mode, PermitMode::Default);
		assert_eq!(second.result.nonce, Some(U256::ZERO));
		assert_eq!(second.result.permit_data, Some(encoder::placeholder()));
	}

	#[tokio::test]
	async fn test_witness_nonces_are_consecutive() {
		let chain = Arc::new(FakeChain::new());
		chain.set_bitmap_word(0, U256::from(0b111u64));
		let engine = engine(chain.clone());
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 1), (DAI, 2), (USDC, 3)],
			PermitMode::PermitWitnessTransferFrom,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer), None)
			.await
			.unwrap();
		assert_eq!(nonce_of(&response, 0), U256::from(3));
		assert_eq!(nonce_of(&response, 1), U256::from(4));
		assert_eq!(nonce_of(&response, 2), U256::from(5));
		// Only the first token scans the bitmap.
		assert_eq!(chain.call_count(), 1);
	}

	#[tokio::test]
	async fn test_native_first_leg_does_not_block_witness_nonce() {
		let chain = Arc::new(FakeChain::new());
		chain.set_bitmap_word(0, U256::from(1));
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(NATIVE_TOKEN_ADDRESS, 1), (WETH, 7)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert_eq!(
			response.permit_for(0).unwrap().result.mode,
			PermitMode::Default
		);
		let weth = response.permit_for(1).unwrap();
		assert_eq!(weth.result.mode, PermitMode::PermitWitnessTransferFrom);
		assert_eq!(weth.result.nonce, Some(U256::from(1)));
		assert_eq!(signer.calls(), 1);
	}

	#[tokio::test]
	async fn test_eip2612_first_leg_then_chained_witness_nonces() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(USDC, "USD Coin", Some("2"), U256::from(6));
		chain.set_bitmap_word(0, U256::from(0b11u64));
		let engine = engine_with(
			chain,
			EngineConfig {
				allow_batch: false,
				..EngineConfig::default()
			},
		);
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(USDC, 1), (WETH, 2), (DAI, 3)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert_eq!(
			response.permit_for(0).unwrap().result.mode,
			PermitMode::Eip2612Permit
		);
		assert_eq!(nonce_of(&response, 0), U256::from(6));
		assert_eq!(nonce_of(&response, 1), U256::from(2));
		assert_eq!(nonce_of(&response, 2), U256::from(3));
	}

	#[tokio::test]
	async fn test_witness_nonce_ignores_caller_index() {
		let engine = engine(Arc::new(FakeChain::new()));
		let mut request = request(
			vec![(WETH, 1)],
			PermitMode::PermitWitnessTransferFrom,
			ContractVersion::V2,
			Service::Swap,
		);
		request.tokens[0].index = 3;

		let response = engine
			.sign(&request, HostSigner::Legacy(Arc::new(RecordingSigner::new())), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert_eq!(nonce_of(&response, 3), U256::ZERO);
	}

	#[tokio::test]
	async fn test_explicit_witness_signs_every_one_to_many_leg() {
		let chain = Arc::new(FakeChain::new());
		chain.set_bitmap_word(0, U256::from(0b11u64));
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 5), (WETH, 7)],
			PermitMode::PermitWitnessTransferFrom,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert_eq!(signer.calls(), 2);
		for (index, amount, nonce) in [(0, 5u64, 2u64), (1, 7, 3)] {
			let permit = response.permit_for(index).unwrap();
			assert_eq!(permit.result.mode, PermitMode::PermitWitnessTransferFrom);
			assert_eq!(permit.amount, U256::from(amount));
			assert_eq!(permit.result.nonce, Some(U256::from(nonce)));
		}
	}

	#[tokio::test]
	async fn test_legacy_router_auto_uses_permit_single() {
		let chain = Arc::new(FakeChain::new());
		chain.set_allowance_nonce(WETH, 4);
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 1), (DAI, 2)],
			PermitMode::AutoPermit,
			ContractVersion::V1,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.batch.is_none());
		for index in 0..2 {
			let permit = response.permit_for(index).unwrap();
			assert_eq!(permit.result.mode, PermitMode::PermitSingle);
			let (mode, inner) = payload_of(&response, index);
			assert_eq!(mode, 2);
			// Legacy layout leads with the allowance amount.
			assert_eq!(U256::from_be_slice(&inner[..32]), permit.amount);
		}
		assert_eq!(nonce_of(&response, 0), U256::from(4));
		assert_eq!(nonce_of(&response, 1), U256::ZERO);
		assert_eq!(signer.primary_types(), vec!["PermitSingle".to_string(); 2]);
	}

	#[tokio::test]
	async fn test_native_tokens_never_reach_the_signer() {
		let engine = engine(Arc::new(FakeChain::new()));
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(NATIVE_TOKEN_ADDRESS, 1), (Address::ZERO, 2)],
			PermitMode::Eip2612Permit,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert_eq!(signer.calls(), 0);
		for permit in &response.permits {
			assert_eq!(permit.result.permit_data, Some(encoder::placeholder()));
			assert_eq!(permit.result.nonce, Some(U256::ZERO));
		}
	}

	#[tokio::test]
	async fn test_batch_path_signs_once_and_notifies() {
		let chain = Arc::new(FakeChain::new());
		chain.set_bitmap_word(0, U256::MAX);
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::new());
		let observer = RecordingObserver::new(StatusReport::success());
		let request = request(
			vec![(WETH, 1), (NATIVE_TOKEN_ADDRESS, 5), (DAI, 2)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), Some(&observer))
			.await
			.unwrap();
		assert_eq!(response.mode, PermitMode::PermitBatchWitnessTransferFrom);
		let batch = response.batch.as_ref().unwrap();
		assert_eq!(
			batch.tokens,
			vec![(WETH, U256::from(1)), (DAI, U256::from(2))]
		);
		assert_eq!(batch.result.nonce, Some(U256::from(256)));
		assert_eq!(split_payload(batch.result.permit_data.as_ref().unwrap()).0, 4);
		assert_eq!(response.permits.len(), 1);
		assert_eq!(response.permits[0].token, NATIVE_TOKEN_ADDRESS);

		assert_eq!(signer.primary_types(), vec!["PermitBatchWitnessTransferFrom".to_string()]);
		assert_eq!(observer.batch_events(), 1);
		assert_eq!(observer.token_events(), 0);
	}

	#[tokio::test]
	async fn test_user_rejection_aborts_without_data() {
		let chain = Arc::new(FakeChain::new());
		chain.add_permit_token(USDC, "USD Coin", Some("2"), U256::ZERO);
		let engine = engine(chain);
		let signer = Arc::new(RecordingSigner::rejecting());
		let request = request(
			vec![(USDC, 1), (WETH, 2)],
			PermitMode::AutoPermit,
			ContractVersion::V1,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), None)
			.await
			.unwrap();
		assert_eq!(response.status, PermitStatus::Rejected);
		assert_eq!(response.code, StatusCode::UserRejectedRequest);
		assert!(response.permits.is_empty());
		assert!(response.batch.is_none());
		assert_eq!(signer.calls(), 1);
	}

	#[tokio::test]
	async fn test_callback_failure_aborts() {
		let engine = engine(Arc::new(FakeChain::new()));
		let signer = Arc::new(RecordingSigner::new());
		let abort = StatusReport::new(PermitStatus::Error, StatusCode::CallbackFailed);
		let observer = RecordingObserver::new(abort);
		let request = request(
			vec![(WETH, 1), (DAI, 2)],
			PermitMode::PermitWitnessTransferFrom,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(signer.clone()), Some(&observer))
			.await
			.unwrap();
		assert_eq!(response.code, StatusCode::CallbackFailed);
		assert!(response.permits.is_empty());
		assert_eq!(signer.calls(), 1);
		assert_eq!(observer.token_events(), 1);
	}

	#[tokio::test]
	async fn test_explicit_eip2612_on_unsupported_token() {
		let engine = engine(Arc::new(FakeChain::new()));
		let request = request(
			vec![(WETH, 1)],
			PermitMode::Eip2612Permit,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign(&request, HostSigner::Legacy(Arc::new(RecordingSigner::new())), None)
			.await
			.unwrap();
		assert_eq!(response.code, StatusCode::UnsupportedPermitType);
	}

	#[tokio::test]
	async fn test_unknown_chain_is_an_error() {
		let engine = engine(Arc::new(FakeChain::new()));
		let mut request = request(
			vec![(WETH, 1)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Swap,
		);
		request.chain_id = 5;

		let result = engine
			.sign(&request, HostSigner::Legacy(Arc::new(RecordingSigner::new())), None)
			.await;
		assert!(matches!(result, Err(PermitError::UnknownChain(5))));
	}

	#[tokio::test]
	async fn test_wallet_client_signer() {
		let wallet = LocalWallet::new(&SecretString::from(crate::test_utils::OWNER_KEY), SignerStyle::Wallet)
			.unwrap();
		let engine = engine(Arc::new(FakeChain::new()));
		let request = request(
			vec![(WETH, 1)],
			PermitMode::PermitSingle,
			ContractVersion::V2,
			Service::Zap,
		);

		let response = engine
			.sign(&request, wallet.host_signer(), None)
			.await
			.unwrap();
		assert!(response.is_success());
		assert_eq!(payload_of(&response, 0).0, 3);
	}

	fn gasless(tx_type: GaslessTxType) -> GaslessParams {
		GaslessParams {
			tx_type,
			tx_id: B256::repeat_byte(1),
			executor_fees_hash: B256::repeat_byte(2),
			swap_data_hash: Some(keccak256([7u8])),
			adapter_data_hash: None,
		}
	}

	#[tokio::test]
	async fn test_gasless_witness_is_embedded() {
		let engine = engine(Arc::new(FakeChain::new()));
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 1)],
			PermitMode::PermitWitnessTransferFrom,
			ContractVersion::V2,
			Service::Swap,
		);

		let response = engine
			.sign_gasless_intent(
				&request,
				HostSigner::Legacy(signer.clone()),
				&gasless(GaslessTxType::Swap),
				None,
			)
			.await
			.unwrap();
		assert!(response.is_success());
		assert!(response.intent_signature.is_none());
		assert_eq!(signer.calls(), 1);
		assert!(signer.witness_types().contains(&"DZapSwapWitness".to_string()));
	}

	#[tokio::test]
	async fn test_gasless_intent_signed_separately_for_permit_single() {
		let engine = engine(Arc::new(FakeChain::new()));
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 1)],
			PermitMode::AutoPermit,
			ContractVersion::V1,
			Service::Swap,
		);

		let response = engine
			.sign_gasless_intent(
				&request,
				HostSigner::Legacy(signer.clone()),
				&gasless(GaslessTxType::Swap),
				None,
			)
			.await
			.unwrap();
		assert!(response.is_success());
		assert_eq!(
			signer.primary_types(),
			vec![
				"PermitSingle".to_string(),
				typed_data::GASLESS_SWAP_TYPE_NAME.to_string()
			]
		);

		let raw = response.intent_signature.unwrap();
		let signature = Signature::from_raw(&raw).unwrap();
		let intent = PermitIntent::GaslessSwap {
			tx_id: B256::repeat_byte(1),
			executor_fees_hash: B256::repeat_byte(2),
			swap_data_hash: keccak256([7u8]),
		};
		let deadline = NOW + engine.settings().signature_deadline_seconds;
		let typed =
			typed_data::gasless_intent(1, ROUTER, GASLESS_SALT, &intent, OWNER, deadline).unwrap();
		assert_eq!(typed_data::recover_signer(&typed, &signature).unwrap(), OWNER);

		let verifier_domain = &signer.domains()[1];
		assert!(verifier_domain.salt.is_some());
		assert_eq!(verifier_domain.salt, Some(GASLESS_SALT));
	}

	#[tokio::test]
	async fn test_gasless_signing_requires_salt() {
		let engine = engine_with(Arc::new(FakeChain::new()), EngineConfig::default());
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 1)],
			PermitMode::AutoPermit,
			ContractVersion::V1,
			Service::Swap,
		);

		let result = engine
			.sign_gasless_intent(
				&request,
				HostSigner::Legacy(signer.clone()),
				&gasless(GaslessTxType::Swap),
				None,
			)
			.await;
		assert!(matches!(result, Err(PermitError::Config(_))));
		assert_eq!(signer.calls(), 0);
	}

	#[tokio::test]
	async fn test_incomplete_gasless_parameters() {
		let engine = engine(Arc::new(FakeChain::new()));
		let signer = Arc::new(RecordingSigner::new());
		let request = request(
			vec![(WETH, 1)],
			PermitMode::AutoPermit,
			ContractVersion::V2,
			Service::Bridge,
		);

		let response = engine
			.sign_gasless_intent(
				&request,
				HostSigner::Legacy(signer.clone()),
				&gasless(GaslessTxType::Bridge),
				None,
			)
			.await
			.unwrap();
		assert_eq!(response.code, StatusCode::InvalidWitnessData);
		assert_eq!(signer.calls(), 0);
	}

	#[tokio::test]
	async fn test_explicit_deadline_and_permit2_override() {
		let chain = Arc::new(FakeChain::new());
		let engine = engine(chain);
		let mut request = request(
			vec![(WETH, 1)],
			PermitMode::PermitWitnessTransferFrom,
			ContractVersion::V2,
			Service::Swap,
		);
		request.deadline = Some(NOW + 60);

		let response = engine
			.sign(&request, HostSigner::Legacy(Arc::new(RecordingSigner::new())), None)
			.await
			.unwrap();
		let (_, inner) = payload_of(&response, 0);
		assert_eq!(U256::from_be_slice(&inner[32..64]), U256::from(NOW + 60));
		assert_eq!(engine.permit2(1).unwrap(), PERMIT2);
	}
}
