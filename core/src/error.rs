//! Error types for the WordPress API client.
//!
//! # Design
//! Variants follow the failure taxonomy of the content layer: configuration
//! (`MissingBaseUrl`, `InvalidBaseUrl`), transport (`Transport`, `NotFound`,
//! `HttpError`) and shape (`UnexpectedContentType`, `DeserializationError`).
//! Partial-data failures never surface here; the normalizer absorbs them.
//! Every variant that follows a request carries the URL so logs point at the
//! offending call.

use thiserror::Error;

/// Number of body characters kept in diagnostics.
pub const SNIPPET_LEN: usize = 120;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No API base URL was configured.
    #[error("WordPress API base URL is not set; configure it with your site base, e.g. https://example.com")]
    MissingBaseUrl,

    #[error("invalid WordPress API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The host could not complete the round-trip at all.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server returned 404.
    #[error("resource not found: {url}")]
    NotFound { url: String },

    /// The server returned a non-2xx status other than 404.
    #[error("WordPress API error {status} for {url}: {body}")]
    HttpError { url: String, status: u16, body: String },

    #[error("expected JSON but received '{content_type}'. URL: {url}. Body starts with: {snippet}")]
    UnexpectedContentType {
        url: String,
        content_type: String,
        snippet: String,
    },

    /// The body was JSON but not the expected shape.
    #[error("could not decode response from {url}: {message}")]
    DeserializationError { url: String, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ApiError::MissingBaseUrl | ApiError::InvalidBaseUrl { .. })
    }
}

/// First `SNIPPET_LEN` characters of `body`, cut on a char boundary.
pub fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}
