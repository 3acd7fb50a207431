// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-facing error responses.
//!
//! Every non-2xx response carries the same body shape:
//! `{ "code": "<category>:<surface>", "cause": "<human readable>" }`.
//! The status code is implied by the category, so clients can branch on
//! either without cross-checking.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use strand_core::{ErrorCategory, ErrorSurface, StrandError};
use tracing::error;

/// Wire body for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub cause: String,
}

/// An error ready to leave the process as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub category: ErrorCategory,
    pub surface: ErrorSurface,
    pub cause: String,
}

impl ApiError {
    pub fn new(
        category: ErrorCategory,
        surface: ErrorSurface,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            category,
            surface,
            cause: cause.into(),
        }
    }

    pub fn bad_request(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::new(ErrorCategory::BadRequest, surface, cause)
    }

    pub fn unauthorized(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unauthorized, surface, cause)
    }

    pub fn forbidden(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Forbidden, surface, cause)
    }

    pub fn not_found(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, surface, cause)
    }

    pub fn rate_limited(surface: ErrorSurface, cause: impl Into<String>) -> Self {
        Self::new(ErrorCategory::RateLimit, surface, cause)
    }

    /// Wire code, e.g. `forbidden:chat`.
    pub fn code(&self) -> String {
        format!("{}:{}", self.category, self.surface)
    }
}

impl From<StrandError> for ApiError {
    fn from(err: StrandError) -> Self {
        match err {
            StrandError::Api {
                category,
                surface,
                cause,
            } => Self::new(category, surface, cause),
            StrandError::Storage { source } => {
                // Query failures are never detailed to clients.
                error!(error = %source, "database error while handling request");
                Self::bad_request(
                    ErrorSurface::Database,
                    "An error occurred while executing a database query.",
                )
            }
            other => {
                error!(error = %other, "unexpected error while handling request");
                Self::bad_request(ErrorSurface::Api, "Something went wrong. Please try again.")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.category.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: self.code(),
            cause: self.cause,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_joins_category_and_surface() {
        let err = ApiError::forbidden(ErrorSurface::Chat, "not yours");
        assert_eq!(err.code(), "forbidden:chat");

        let err = ApiError::rate_limited(ErrorSurface::Chat, "limit reached");
        assert_eq!(err.code(), "rate_limit:chat");
    }

    #[test]
    fn storage_error_maps_to_generic_database_cause() {
        let source: Box<dyn std::error::Error + Send + Sync> =
            "UNIQUE constraint failed: messages.id".into();
        let api: ApiError = StrandError::Storage { source }.into();
        assert_eq!(api.code(), "bad_request:database");
        // Internal detail must not leak.
        assert!(!api.cause.contains("UNIQUE"));
    }

    #[test]
    fn typed_api_error_passes_through() {
        let api: ApiError = StrandError::not_found(ErrorSurface::Chat, "no such chat").into();
        assert_eq!(api.code(), "not_found:chat");
        assert_eq!(api.cause, "no such chat");
    }
}
