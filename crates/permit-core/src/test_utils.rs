//! In-memory chain used by the engine tests.

use crate::contracts::{IERC20Permit, IPermit2};
use crate::engine::PermitObserver;
use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{address, keccak256, Address, Bytes, U256};
use alloy_sol_types::{Eip712Domain, SolCall, SolValue};
use async_trait::async_trait;
use permit_account::implementations::local::{LocalWallet, SignerStyle};
use permit_account::{AccountError, LegacyTypedDataSigner};
use permit_chain::{CallOutcome, ChainError, ChainReader, ReadCall};
use permit_types::eip712::infer_primary_type;
use permit_types::{BatchSigned, Eip712Types, SecretString, StatusReport, TokenSigned};
use std::collections::HashMap;
use std::sync::Mutex;

/// Anvil's first development key and its address.
pub const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OWNER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const PERMIT2: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

#[derive(Clone)]
struct PermitToken {
	name: String,
	version: Option<String>,
	nonce: U256,
}

#[derive(Default)]
struct State {
	permit_tokens: HashMap<Address, PermitToken>,
	allowance_nonces: HashMap<Address, u64>,
	bitmap: HashMap<u64, U256>,
	batch_sizes: Vec<usize>,
	failing_batches: usize,
}

/// Scriptable [`ChainReader`] answering ERC-20 permit and Permit2 reads.
#[derive(Default)]
pub struct FakeChain {
	state: Mutex<State>,
}

impl FakeChain {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_permit_token(&self, token: Address, name: &str, version: Option<&str>, nonce: U256) {
		self.state.lock().unwrap().permit_tokens.insert(
			token,
			PermitToken {
				name: name.to_string(),
				version: version.map(str::to_string),
				nonce,
			},
		);
	}

	pub fn set_allowance_nonce(&self, token: Address, nonce: u64) {
		self.state.lock().unwrap().allowance_nonces.insert(token, nonce);
	}

	pub fn set_bitmap_word(&self, word: u64, bitmap: U256) {
		self.state.lock().unwrap().bitmap.insert(word, bitmap);
	}

	pub fn fail_next_batches(&self, count: usize) {
		self.state.lock().unwrap().failing_batches = count;
	}

	/// Number of multicalls executed.
	pub fn call_count(&self) -> usize {
		self.state.lock().unwrap().batch_sizes.len()
	}

	/// Size of each executed multicall, in order.
	pub fn batch_sizes(&self) -> Vec<usize> {
		self.state.lock().unwrap().batch_sizes.clone()
	}

	fn answer(state: &State, call: &ReadCall) -> CallOutcome {
		let data = &call.call_data[..];
		let token = state.permit_tokens.get(&call.target);
		if data.len() < 4 {
			return CallOutcome::failed();
		}
		let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];

		match selector {
			IERC20Permit::DOMAIN_SEPARATORCall::SELECTOR => match token {
				Some(token) => CallOutcome::ok(keccak256(token.name.as_bytes()).abi_encode()),
				None => CallOutcome::failed(),
			},
			IERC20Permit::noncesCall::SELECTOR => match token {
				Some(token) => CallOutcome::ok(token.nonce.abi_encode()),
				None => CallOutcome::failed(),
			},
			IERC20Permit::nameCall::SELECTOR => match token {
				Some(token) => CallOutcome::ok(token.name.abi_encode()),
				None => CallOutcome::failed(),
			},
			IERC20Permit::versionCall::SELECTOR => match token.and_then(|t| t.version.as_ref()) {
				Some(version) => CallOutcome::ok(version.abi_encode()),
				None => CallOutcome::failed(),
			},
			IPermit2::allowanceCall::SELECTOR => match IPermit2::allowanceCall::abi_decode(data) {
				Ok(call) => {
					let nonce = state.allowance_nonces.get(&call.token).copied().unwrap_or(0);
					CallOutcome::ok((U256::ZERO, U256::ZERO, U256::from(nonce)).abi_encode_params())
				},
				Err(_) => CallOutcome::failed(),
			},
			IPermit2::nonceBitmapCall::SELECTOR => match IPermit2::nonceBitmapCall::abi_decode(data) {
				Ok(call) => {
					let word = call.wordPos.to::<u64>();
					let bitmap = state.bitmap.get(&word).copied().unwrap_or(U256::ZERO);
					CallOutcome::ok(bitmap.abi_encode())
				},
				Err(_) => CallOutcome::failed(),
			},
			_ => CallOutcome::failed(),
		}
	}
}

#[async_trait]
impl ChainReader for FakeChain {
	async fn multicall(
		&self,
		_chain_id: u64,
		calls: Vec<ReadCall>,
	) -> Result<Vec<CallOutcome>, ChainError> {
		let mut state = self.state.lock().unwrap();
		if state.failing_batches > 0 {
			state.failing_batches -= 1;
			return Err(ChainError::Network("connection refused".to_string()));
		}
		state.batch_sizes.push(calls.len());
		Ok(calls.iter().map(|call| Self::answer(&state, call)).collect())
	}
}

/// Splits a router payload into its mode byte and inner bytes.
pub fn split_payload(payload: &[u8]) -> (u8, Vec<u8>) {
	let outer = DynSolType::Tuple(vec![DynSolType::Uint(8), DynSolType::Bytes])
		.abi_decode_params(payload)
		.unwrap();
	match outer {
		DynSolValue::Tuple(values) => match values.as_slice() {
			[DynSolValue::Uint(mode, 8), DynSolValue::Bytes(inner)] => {
				(mode.to::<u8>(), inner.clone())
			},
			other => panic!("unexpected payload {:?}", other),
		},
		other => panic!("unexpected payload {:?}", other),
	}
}

/// Legacy-shaped signer over the Anvil key that records each request.
pub struct RecordingSigner {
	wallet: LocalWallet,
	reject: bool,
	primary_types: Mutex<Vec<String>>,
	type_names: Mutex<Vec<String>>,
	domains: Mutex<Vec<Eip712Domain>>,
}

impl RecordingSigner {
	pub fn new() -> Self {
		Self {
			wallet: LocalWallet::new(&SecretString::from(OWNER_KEY), SignerStyle::Legacy).unwrap(),
			reject: false,
			primary_types: Mutex::new(Vec::new()),
			type_names: Mutex::new(Vec::new()),
			domains: Mutex::new(Vec::new()),
		}
	}

	/// A signer whose user declines every request.
	pub fn rejecting() -> Self {
		Self {
			reject: true,
			..Self::new()
		}
	}

	/// Number of signature requests received.
	pub fn calls(&self) -> usize {
		self.primary_types.lock().unwrap().len()
	}

	/// Primary type of each request, in order.
	pub fn primary_types(&self) -> Vec<String> {
		self.primary_types.lock().unwrap().clone()
	}

	/// Every struct name seen across all requests.
	pub fn witness_types(&self) -> Vec<String> {
		self.type_names.lock().unwrap().clone()
	}

	/// Domain of each request, in order.
	pub fn domains(&self) -> Vec<Eip712Domain> {
		self.domains.lock().unwrap().clone()
	}
}

#[async_trait]
impl LegacyTypedDataSigner for RecordingSigner {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.wallet.address())
	}

	async fn sign_typed_data(
		&self,
		domain: &Eip712Domain,
		types: &Eip712Types,
		message: &serde_json::Value,
	) -> Result<Bytes, AccountError> {
		self.primary_types
			.lock()
			.unwrap()
			.push(infer_primary_type(types).unwrap_or_default());
		self.type_names
			.lock()
			.unwrap()
			.extend(types.keys().cloned());
		self.domains.lock().unwrap().push(domain.clone());
		if self.reject {
			return Err(AccountError::UserRejected);
		}
		LegacyTypedDataSigner::sign_typed_data(&self.wallet, domain, types, message).await
	}
}

/// Observer that counts events and answers every one with a fixed report.
pub struct RecordingObserver {
	respond: StatusReport,
	tokens: Mutex<Vec<TokenSigned>>,
	batches: Mutex<Vec<BatchSigned>>,
}

impl RecordingObserver {
	pub fn new(respond: StatusReport) -> Self {
		Self {
			respond,
			tokens: Mutex::new(Vec::new()),
			batches: Mutex::new(Vec::new()),
		}
	}

	pub fn token_events(&self) -> usize {
		self.tokens.lock().unwrap().len()
	}

	pub fn batch_events(&self) -> usize {
		self.batches.lock().unwrap().len()
	}
}

#[async_trait]
impl PermitObserver for RecordingObserver {
	async fn on_token_signed(&self, event: &TokenSigned) -> StatusReport {
		self.tokens.lock().unwrap().push(event.clone());
		self.respond
	}

	async fn on_batch_signed(&self, event: &BatchSigned) -> StatusReport {
		self.batches.lock().unwrap().push(event.clone());
		self.respond
	}
}
