// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Strand chat service.

use strum::{Display, EnumString};
use thiserror::Error;

/// Error category surfaced to HTTP clients.
///
/// Categories map 1:1 to response status codes. Everything a caller can
/// observe on a non-2xx response is one of these five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimit,
}

impl ErrorCategory {
    /// HTTP status code for this category.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCategory::BadRequest => 400,
            ErrorCategory::Unauthorized => 401,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::RateLimit => 429,
        }
    }
}

/// Subsystem that produced an error, the second half of the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorSurface {
    Api,
    Chat,
    Database,
    Stream,
}

/// The primary error type used across all Strand crates.
#[derive(Debug, Error)]
pub enum StrandError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream model provider errors (API failure, token limits, overload).
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Typed client-facing error carrying the `category:surface` wire code.
    #[error("{}:{}: {cause}", category, surface)]
    Api {
        category: ErrorCategory,
        surface: ErrorSurface,
        cause: String,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StrandError {
    /// Build a client-facing error.
    pub fn api(
        category: ErrorCategory,
        surface: ErrorSurface,
        cause: impl Into<String>,
    ) -> Self {
        StrandError::Api {
            category,
            surface,
            cause: cause.into(),
        }
    }

    pub fn bad_request(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::api(ErrorCategory::BadRequest, surface, cause)
    }

    pub fn unauthorized(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::api(ErrorCategory::Unauthorized, surface, cause)
    }

    pub fn forbidden(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::api(ErrorCategory::Forbidden, surface, cause)
    }

    pub fn not_found(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::api(ErrorCategory::NotFound, surface, cause)
    }

    pub fn rate_limited(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::api(ErrorCategory::RateLimit, surface, cause)
    }
}
