//! Connection settings for the upstream CMS.

use url::Url;

use crate::error::ApiError;

/// REST namespace appended to the configured base URL.
pub const API_NAMESPACE: &str = "/wp-json/wp/v2";

/// How the image cache-busting key is applied to resolved URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBust {
    /// Always apply the key, replacing an existing `v` query pair.
    #[default]
    Merge,
    /// Leave URLs that already carry a query string untouched.
    SkipWhenQueryPresent,
}

/// Validated CMS configuration. Constructing one is the only way to obtain a
/// `WpClient`, so a missing base URL fails before any request is built.
#[derive(Debug, Clone)]
pub struct CmsConfig {
    base: Url,
    base_str: String,
    cache_bust: CacheBust,
}

impl CmsConfig {
    pub fn new(api_base: &str) -> Result<Self, ApiError> {
        let trimmed = api_base.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ApiError::MissingBaseUrl);
        }
        let base = Url::parse(trimmed).map_err(|e| ApiError::InvalidBaseUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme '{}'", base.scheme()),
            });
        }
        Ok(Self {
            base,
            base_str: trimmed.to_string(),
            cache_bust: CacheBust::default(),
        })
    }

    pub fn with_cache_bust(mut self, policy: CacheBust) -> Self {
        self.cache_bust = policy;
        self
    }

    pub fn cache_bust(&self) -> CacheBust {
        self.cache_bust
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_str
    }

    pub fn api_root(&self) -> String {
        format!("{}{API_NAMESPACE}", self.base_str)
    }

    /// Resolve a possibly relative media URL against the CMS host.
    /// Returns `None` when the input cannot form a valid URL.
    pub fn absolutize(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(_) => None,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base.join(raw).ok(),
            Err(_) => None,
        }
    }
}
