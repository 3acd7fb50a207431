// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation with actionable error messages.
//!
//! Figment catches type and structure errors; this pass catches values that
//! are well-typed but unusable (empty tokens, unknown tiers, zero windows).

use strand_core::StrandError;

use crate::model::StrandConfig;

const KNOWN_TIERS: [&str; 3] = ["guest", "regular", "premium"];

/// Validate a deserialized config, collecting every problem before failing.
pub fn validate_config(config: &StrandConfig) -> Result<(), StrandError> {
    let mut problems = Vec::new();

    if config.server.host.is_empty() {
        problems.push("server.host must not be empty".to_string());
    }

    match config.server.log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => problems.push(format!(
            "server.log_level '{other}' is not one of trace|debug|info|warn|error"
        )),
    }

    if config.storage.database_path.is_empty() {
        problems.push("storage.database_path must not be empty".to_string());
    }

    if config.anthropic.max_tokens == 0 {
        problems.push("anthropic.max_tokens must be at least 1".to_string());
    }

    if config.stream.turn_timeout_secs == 0 {
        problems.push("stream.turn_timeout_secs must be at least 1".to_string());
    }

    if config.stream.max_history == 0 {
        problems.push("stream.max_history must be at least 1".to_string());
    }

    for (idx, session) in config.sessions.iter().enumerate() {
        if session.token.is_empty() {
            problems.push(format!("sessions[{idx}].token must not be empty"));
        }
        if session.user_id.is_empty() {
            problems.push(format!("sessions[{idx}].user_id must not be empty"));
        }
        if !KNOWN_TIERS.contains(&session.tier.as_str()) {
            problems.push(format!(
                "sessions[{idx}].tier '{}' is not one of guest|regular|premium",
                session.tier
            ));
        }
    }

    // Duplicate tokens would make identity resolution ambiguous.
    let mut tokens: Vec<&str> = config.sessions.iter().map(|s| s.token.as_str()).collect();
    tokens.sort_unstable();
    tokens.dedup();
    if tokens.len() != config.sessions.len() {
        problems.push("sessions contains duplicate tokens".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(StrandError::Config(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionEntry;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&StrandConfig::default()).is_ok());
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let mut config = StrandConfig::default();
        config.sessions.push(SessionEntry {
            token: "tok-1".into(),
            user_id: "user-1".into(),
            tier: "platinum".into(),
        });
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("platinum"), "got: {err}");
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let mut config = StrandConfig::default();
        for user in ["alice", "bob"] {
            config.sessions.push(SessionEntry {
                token: "same-token".into(),
                user_id: user.into(),
                tier: "regular".into(),
            });
        }
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate tokens"), "got: {err}");
    }

    #[test]
    fn multiple_problems_are_collected() {
        let mut config = StrandConfig::default();
        config.server.log_level = "loud".into();
        config.stream.turn_timeout_secs = 0;
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("log_level"), "got: {err}");
        assert!(err.contains("turn_timeout_secs"), "got: {err}");
    }
}
