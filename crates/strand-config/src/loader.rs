// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./strand.toml` > `~/.config/strand/strand.toml`
//! > `/etc/strand/strand.toml` with environment variable overrides via the
//! `STRAND_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::StrandConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/strand/strand.toml` (system-wide)
/// 3. `~/.config/strand/strand.toml` (user XDG config)
/// 4. `./strand.toml` (local directory)
/// 5. `STRAND_*` environment variables
pub fn load_config() -> Result<StrandConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrandConfig::default()))
        .merge(Toml::file("/etc/strand/strand.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("strand/strand.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("strand.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<StrandConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrandConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StrandConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrandConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `STRAND_STORAGE_DATABASE_PATH` must map
/// to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("STRAND_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("stream_", "stream.", 1);
        mapped.into()
    })
}
