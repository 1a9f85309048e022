//! Construction of a [`PermitEngine`] and its signer from configuration.

use crate::PermitEngine;
use permit_account::AccountService;
use permit_chain::implementations::evm::alloy::AlloyReader;
use permit_chain::ChainReader;
use permit_config::Config;
use permit_storage::{create_backend, StorageService};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Builds the engine's collaborators from a validated [`Config`].
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	/// Creates a builder over a loaded configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine reading chain state through per-network alloy providers.
	pub fn build(&self) -> Result<PermitEngine, BuilderError> {
		let reader = AlloyReader::new(&self.config.networks).map_err(|e| {
			tracing::error!(component = "chain", error = %e, "Failed to create chain reader");
			BuilderError::Config(format!("Failed to create chain reader: {}", e))
		})?;
		self.build_with_reader(Arc::new(reader))
	}

	/// Builds the engine on top of an existing chain reader.
	pub fn build_with_reader(
		&self,
		reader: Arc<dyn ChainReader>,
	) -> Result<PermitEngine, BuilderError> {
		let storage = &self.config.storage;
		let storage_config = storage.implementations.get(&storage.primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary storage '{}' has no configuration",
				storage.primary
			))
		})?;
		let backend = create_backend(&storage.primary, storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %storage.primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				storage.primary, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %storage.primary, "Loaded");

		Ok(PermitEngine::new(
			self.config.engine.clone(),
			self.config.networks.clone(),
			reader,
			Arc::new(StorageService::new(backend)),
		))
	}

	/// Builds the configured primary account.
	pub fn build_account(&self) -> Result<AccountService, BuilderError> {
		let account = &self.config.account;
		let account_config = account.implementations.get(&account.primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary account '{}' has no configuration",
				account.primary
			))
		})?;
		let service = AccountService::from_config(&account.primary, account_config).map_err(|e| {
			tracing::error!(
				component = "account",
				implementation = %account.primary,
				error = %e,
				"Failed to create account implementation"
			);
			BuilderError::Config(format!(
				"Failed to create account implementation '{}': {}",
				account.primary, e
			))
		})?;
		tracing::info!(component = "account", implementation = %account.primary, "Loaded");
		Ok(service)
	}
}
