// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the gateway.
//!
//! Session issuance is an external concern; the gateway only maps static
//! bearer tokens from config to caller identities. No token, an unknown
//! token, or an empty registry all reject the request (fail-closed).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use strand_config::{LimitsConfig, SessionEntry};
use strand_core::ErrorSurface;
use strum::{Display, EnumString};
use tracing::warn;

use crate::error::ApiError;

/// Account tier, governing the daily message quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    Guest,
    Regular,
    Premium,
}

impl Tier {
    /// Messages per trailing 24 hours for this tier.
    pub fn daily_limit(&self, limits: &LimitsConfig) -> u32 {
        match self {
            Tier::Guest => limits.guest,
            Tier::Regular => limits.regular,
            Tier::Premium => limits.premium,
        }
    }
}

/// Resolved caller identity, attached to the request as an extension.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub tier: Tier,
}

/// Token -> caller registry built from config `[[sessions]]` entries.
#[derive(Clone, Default)]
pub struct AuthRegistry {
    tokens: Arc<HashMap<String, Caller>>,
}

impl AuthRegistry {
    /// Builds the registry. Entries with an unrecognized tier were already
    /// rejected by config validation; a stray one here is skipped loudly.
    pub fn from_sessions(sessions: &[SessionEntry]) -> Self {
        let mut tokens = HashMap::new();
        for entry in sessions {
            let Ok(tier) = Tier::from_str(&entry.tier) else {
                warn!(user_id = %entry.user_id, tier = %entry.tier, "skipping session with unknown tier");
                continue;
            };
            tokens.insert(
                entry.token.clone(),
                Caller {
                    user_id: entry.user_id.clone(),
                    tier,
                },
            );
        }
        Self {
            tokens: Arc::new(tokens),
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&Caller> {
        self.tokens.get(token)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for AuthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRegistry")
            .field("tokens", &format!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

/// Middleware that resolves `Authorization: Bearer <token>` to a [`Caller`]
/// and stores it in request extensions. Rejects everything else.
pub async fn auth_middleware(
    State(registry): State<AuthRegistry>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if registry.is_empty() {
        tracing::error!("no sessions configured -- rejecting request");
        return Err(ApiError::unauthorized(
            ErrorSurface::Api,
            "No valid session.",
        ));
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let caller = token
        .and_then(|t| registry.resolve(t))
        .cloned()
        .ok_or_else(|| ApiError::unauthorized(ErrorSurface::Api, "No valid session."))?;

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
