//! Command-line entry point for the permit signature engine.
//!
//! Signs permits for a JSON token list with the configured account and
//! prints the resulting response as JSON on stdout. Logs go to stderr.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use clap::Parser;
use permit_config::Config;
use permit_core::{EngineBuilder, GaslessParams, PermitObserver, SignRequest};
use permit_types::{
	BatchSigned, ContractVersion, GaslessTxType, PermitMode, RouterProfile, Service,
	StatusReport, TokenPermitInput, TokenSigned,
};
use std::path::PathBuf;

/// Command-line arguments for the permit signer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Chain the tokens live on
	#[arg(long)]
	chain_id: u64,

	/// Router contract receiving the permits
	#[arg(long)]
	spender: Address,

	/// Router contract generation (v1, v2)
	#[arg(long, default_value = "v2")]
	contract_version: ContractVersion,

	/// Router service (swap, bridge, zap)
	#[arg(long, default_value = "swap")]
	service: Service,

	/// Permit mode (auto, eip2612, permit-single, witness, batch, default)
	#[arg(long, default_value = "auto")]
	mode: PermitMode,

	/// Signature deadline as a unix timestamp
	#[arg(long)]
	deadline: Option<u64>,

	/// JSON array of `{"address", "amount", "permitHint"?}` objects
	#[arg(long)]
	tokens: String,

	/// Gasless transaction type (swap, bridge, swapBridge); enables gasless signing
	#[arg(long, requires_all = ["tx_id", "executor_fees_hash"])]
	tx_type: Option<GaslessTxType>,

	/// Gasless transaction id
	#[arg(long)]
	tx_id: Option<B256>,

	/// Hash of the executor fee data
	#[arg(long)]
	executor_fees_hash: Option<B256>,

	/// Hash of the swap leg data; bridge intents need it for the Permit2 witness
	#[arg(long)]
	swap_data_hash: Option<B256>,

	/// Hash of the bridge adapter data
	#[arg(long)]
	adapter_data_hash: Option<B256>,
}

impl Args {
	fn gasless(&self) -> Option<GaslessParams> {
		Some(GaslessParams {
			tx_type: self.tx_type?,
			tx_id: self.tx_id?,
			executor_fees_hash: self.executor_fees_hash?,
			swap_data_hash: self.swap_data_hash,
			adapter_data_hash: self.adapter_data_hash,
		})
	}
}

/// Parses the token list, numbering entries by position.
fn parse_tokens(json: &str) -> Result<Vec<TokenPermitInput>, serde_json::Error> {
	let mut tokens: Vec<TokenPermitInput> = serde_json::from_str(json)?;
	for (index, token) in tokens.iter_mut().enumerate() {
		token.index = index;
	}
	Ok(tokens)
}

/// Logs each signature as it is produced.
struct LoggingObserver;

#[async_trait]
impl PermitObserver for LoggingObserver {
	async fn on_token_signed(&self, event: &TokenSigned) -> StatusReport {
		tracing::info!(
			index = event.index,
			token = %event.src_token,
			amount = %event.amount,
			mode = %event.mode,
			"Token permit ready"
		);
		StatusReport::success()
	}

	async fn on_batch_signed(&self, event: &BatchSigned) -> StatusReport {
		tracing::info!(tokens = event.tokens.len(), mode = %event.mode, "Batch permit ready");
		StatusReport::success()
	}
}

/// Main entry point for the permit signer.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the engine and the configured account
/// 5. Signs the requested tokens and prints the response
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!(networks = config.networks.len(), "Loaded configuration");

	let builder = EngineBuilder::new(config);
	let engine = builder.build()?;
	let account = builder.build_account()?;

	let request = SignRequest {
		tokens: parse_tokens(&args.tokens)?,
		chain_id: args.chain_id,
		spender: args.spender,
		profile: RouterProfile::new(args.contract_version, args.service),
		mode: args.mode,
		deadline: args.deadline,
	};

	let observer = LoggingObserver;
	let response = match args.gasless() {
		Some(gasless) => {
			engine
				.sign_gasless_intent(&request, account.host_signer(), &gasless, Some(&observer))
				.await?
		},
		None => {
			engine
				.sign(&request, account.host_signer(), Some(&observer))
				.await?
		},
	};

	tracing::info!(status = ?response.status, code = %response.code, "Finished signing");
	println!("{}", serde_json::to_string_pretty(&response)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;

	#[test]
	fn test_parse_tokens_assigns_positions() {
		let tokens = parse_tokens(
			r#"[
				{"address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "amount": "1000000", "index": 7},
				{"address": "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE", "amount": "5",
				 "permitHint": {"supportsEip2612": false}}
			]"#,
		)
		.unwrap();
		assert_eq!(tokens.len(), 2);
		assert_eq!(tokens[0].index, 0);
		assert_eq!(tokens[0].amount, U256::from(1_000_000));
		assert_eq!(tokens[1].index, 1);
		assert!(tokens[1].is_native());
		assert!(tokens[1].permit_hint.is_some());
		assert!(parse_tokens("{}").is_err());
	}

	#[test]
	fn test_args_parsing() {
		let args = Args::try_parse_from([
			"permit-signer",
			"--chain-id",
			"1",
			"--spender",
			"0x3333333333333333333333333333333333333333",
			"--contract-version",
			"v1",
			"--mode",
			"permit-single",
			"--tokens",
			"[]",
		])
		.unwrap();
		assert_eq!(args.contract_version, ContractVersion::V1);
		assert_eq!(args.service, Service::Swap);
		assert_eq!(args.mode, PermitMode::PermitSingle);
		assert!(args.gasless().is_none());
	}

	#[test]
	fn test_gasless_args_require_ids() {
		let missing = Args::try_parse_from([
			"permit-signer",
			"--chain-id",
			"1",
			"--spender",
			"0x3333333333333333333333333333333333333333",
			"--tokens",
			"[]",
			"--tx-type",
			"swap",
		]);
		assert!(missing.is_err());

		let tx_id = format!("{}", B256::repeat_byte(1));
		let args = Args::try_parse_from([
			"permit-signer",
			"--chain-id",
			"1",
			"--spender",
			"0x3333333333333333333333333333333333333333",
			"--tokens",
			"[]",
			"--tx-type",
			"swap",
			"--tx-id",
			tx_id.as_str(),
			"--executor-fees-hash",
			tx_id.as_str(),
		])
		.unwrap();
		let gasless = args.gasless().unwrap();
		assert_eq!(gasless.tx_type, GaslessTxType::Swap);
		assert!(gasless.swap_data_hash.is_none());
	}

	#[tokio::test]
	async fn test_config_file_builds_engine() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		tokio::fs::write(
			&path,
			r#"
[networks.1]
rpc_url = "http://localhost:8545"

[account]
primary = "local"

[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
style = "wallet"

[storage]
primary = "memory"

[storage.implementations.memory]
"#,
		)
		.await
		.unwrap();

		let config = Config::from_file(&path.to_string_lossy()).await.unwrap();
		let builder = EngineBuilder::new(config);
		assert!(builder.build().is_ok());
		assert!(builder.build_account().is_ok());
	}
}
