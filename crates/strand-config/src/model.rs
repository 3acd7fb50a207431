// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Strand chat service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Strand configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrandConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Anthropic API settings for the token producer.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Per-tier daily message entitlements.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Streaming and resumption settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Bearer-token session identities (stand-in for the external session
    /// layer). Empty means the gateway rejects every request (fail-closed).
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3456
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("strand").join("strand.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "strand.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires the `ANTHROPIC_API_KEY` env var.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used when a turn's `selectedChatModel` is unrecognized.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Per-tier daily message entitlements (user-role messages per 24 hours).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "default_guest_limit")]
    pub guest: u32,

    #[serde(default = "default_regular_limit")]
    pub regular: u32,

    #[serde(default = "default_premium_limit")]
    pub premium: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            guest: default_guest_limit(),
            regular: default_regular_limit(),
            premium: default_premium_limit(),
        }
    }
}

fn default_guest_limit() -> u32 {
    20
}

fn default_regular_limit() -> u32 {
    100
}

fn default_premium_limit() -> u32 {
    500
}

/// Streaming and resumption configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Enable the in-process resumable transport. When false, client
    /// disconnects cancel generation and resumption always returns empty.
    #[serde(default = "default_resumable")]
    pub resumable: bool,

    /// Staleness window for replaying the last assistant message, seconds.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,

    /// Wall-clock ceiling for one whole turn, seconds.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Maximum history messages loaded into the model prompt.
    #[serde(default = "default_max_history")]
    pub max_history: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resumable: default_resumable(),
            staleness_secs: default_staleness_secs(),
            turn_timeout_secs: default_turn_timeout_secs(),
            max_history: default_max_history(),
        }
    }
}

fn default_resumable() -> bool {
    true
}

fn default_staleness_secs() -> u64 {
    15
}

fn default_turn_timeout_secs() -> u64 {
    60
}

fn default_max_history() -> u32 {
    32
}

/// One bearer-token identity the gateway accepts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionEntry {
    /// Bearer token presented in the Authorization header.
    pub token: String,

    /// Stable user identifier the token resolves to.
    pub user_id: String,

    /// Account tier: guest, regular or premium.
    #[serde(default = "default_tier")]
    pub tier: String,
}

fn default_tier() -> String {
    "regular".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = StrandConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3456);
        assert_eq!(config.server.log_level, "info");
        assert!(config.storage.wal_mode);
        assert_eq!(config.limits.guest, 20);
        assert_eq!(config.limits.regular, 100);
        assert_eq!(config.stream.staleness_secs, 15);
        assert_eq!(config.stream.turn_timeout_secs, 60);
        assert!(config.stream.resumable);
        assert!(config.sessions.is_empty());
    }

    #[test]
    fn session_entry_tier_defaults_to_regular() {
        let entry: SessionEntry =
            toml::from_str("token = \"tok-1\"\nuser_id = \"user-1\"\n").unwrap();
        assert_eq!(entry.tier, "regular");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<StrandConfig, _> =
            toml::from_str("[server]\nhost = \"0.0.0.0\"\nbogus_key = 1\n");
        assert!(result.is_err());
    }
}
