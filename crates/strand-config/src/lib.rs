// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Strand chat service.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides.
//!
//! # Usage
//!
//! ```no_run
//! use strand_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod loader;
pub mod model;
pub mod validation;

use strand_core::StrandError;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    AnthropicConfig, LimitsConfig, ServerConfig, SessionEntry, StorageConfig, StrandConfig,
    StreamConfig,
};

/// Load configuration from the XDG hierarchy and validate it.
///
/// This is the high-level entry point: load config from TOML files plus env
/// vars via Figment, then run post-deserialization validation.
pub fn load_and_validate() -> Result<StrandConfig, StrandError> {
    let config = loader::load_config().map_err(|e| StrandError::Config(e.to_string()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<StrandConfig, StrandError> {
    let config = loader::load_config_from_str(toml_content)
        .map_err(|e| StrandError::Config(e.to_string()))?;
    validation::validate_config(&config)?;
    Ok(config)
}
