//! Common types module for the permit signature engine.
//!
//! This module defines the core data types shared by every engine component:
//! permit modes and router profiles, token inputs, results, witness payloads,
//! EIP-712 typed-data containers and the configuration validation framework.

/// EIP-712 typed-data containers and permit type strings.
pub mod eip712;
/// Network configuration types.
pub mod networks;
/// Permit modes, router profiles, token inputs and intents.
pub mod permit;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Per-token, batch and aggregate signing results.
pub mod result;
/// Zeroizing string for key material.
pub mod secret_string;
/// Utility functions for formatting and time.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;
/// Witness payloads bound into Permit2 and gasless-intent signatures.
pub mod witness;

pub use eip712::{Eip712Field, Eip712Types, PermitTypedData, TypedDataError};
pub use networks::{NetworkConfig, NetworksConfig};
pub use permit::*;
pub use registry::ImplementationRegistry;
pub use result::*;
pub use secret_string::SecretString;
pub use utils::{
	current_timestamp, truncate_id, with_0x_prefix, without_0x_prefix, Clock, ManualClock,
	SystemClock,
};
pub use validation::*;
pub use witness::{WitnessData, WitnessError};
