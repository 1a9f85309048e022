//! Configuration module for the permit signature engine.
//!
//! This module provides structures and utilities for managing engine
//! configuration. It supports loading configuration from TOML files with
//! environment variable expansion and validates the result before use.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["networks.toml"]` to include other config files
//! - Each top-level section must be unique across all files

mod loader;

use alloy_primitives::B256;
use permit_types::{networks::deserialize_networks, NetworksConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration of the engine and its collaborators.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Signing behaviour.
	#[serde(default)]
	pub engine: EngineConfig,
	/// Per-chain RPC endpoints and deployment overrides.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Signer selection.
	pub account: AccountConfig,
	/// Capability cache backend.
	pub storage: StorageConfig,
}

/// Engine behaviour knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Validity window of a signature when the caller gives no deadline.
	#[serde(default = "default_signature_deadline_seconds")]
	pub signature_deadline_seconds: u64,
	/// Lifetime of a Permit2 allowance granted through `PermitSingle`.
	#[serde(default = "default_permit2_expiration_seconds")]
	pub permit2_expiration_seconds: u64,
	/// How long a probed EIP-2612 capability stays cached.
	#[serde(default = "default_capability_cache_ttl_seconds")]
	pub capability_cache_ttl_seconds: u64,
	/// Whether multi-token sets may be signed as one batch.
	#[serde(default = "default_allow_batch")]
	pub allow_batch: bool,
	/// Upper bound on Permit2 nonce bitmap words scanned for a free nonce.
	#[serde(default = "default_max_nonce_words")]
	pub max_nonce_words: u64,
	/// Bitmap words read per multicall during the nonce scan.
	#[serde(default = "default_nonce_scan_page_size")]
	pub nonce_scan_page_size: u64,
	/// Salt of the gasless verifier domain. Gasless signing is refused while unset.
	#[serde(default)]
	pub gasless_salt: Option<B256>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			signature_deadline_seconds: default_signature_deadline_seconds(),
			permit2_expiration_seconds: default_permit2_expiration_seconds(),
			capability_cache_ttl_seconds: default_capability_cache_ttl_seconds(),
			allow_batch: default_allow_batch(),
			max_nonce_words: default_max_nonce_words(),
			nonce_scan_page_size: default_nonce_scan_page_size(),
			gasless_salt: None,
		}
	}
}

fn default_signature_deadline_seconds() -> u64 {
	1800
}

fn default_permit2_expiration_seconds() -> u64 {
	30 * 24 * 60 * 60
}

fn default_capability_cache_ttl_seconds() -> u64 {
	3600
}

fn default_allow_batch() -> bool {
	true
}

fn default_max_nonce_words() -> u64 {
	1024
}

fn default_nonce_scan_page_size() -> u64 {
	8
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable
/// `VAR_NAME`. Supports default values with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have an rpc_url",
					chain_id
				)));
			}
		}

		let engine = &self.engine;
		if engine.signature_deadline_seconds == 0 {
			return Err(ConfigError::Validation(
				"signature_deadline_seconds must be greater than 0".into(),
			));
		}
		if engine.permit2_expiration_seconds == 0 {
			return Err(ConfigError::Validation(
				"permit2_expiration_seconds must be greater than 0".into(),
			));
		}
		// Permit2 stores the allowance expiration as uint48.
		if engine.permit2_expiration_seconds >= 1 << 40 {
			return Err(ConfigError::Validation(
				"permit2_expiration_seconds is out of range".into(),
			));
		}
		if engine.max_nonce_words == 0 {
			return Err(ConfigError::Validation(
				"max_nonce_words must be at least 1".into(),
			));
		}
		if engine.nonce_scan_page_size == 0 || engine.nonce_scan_page_size > engine.max_nonce_words
		{
			return Err(ConfigError::Validation(format!(
				"nonce_scan_page_size must be between 1 and max_nonce_words ({})",
				engine.max_nonce_words
			)));
		}

		validate_primary("account", &self.account.primary, &self.account.implementations)?;
		validate_primary("storage", &self.storage.primary, &self.storage.implementations)?;

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
