//! Command-line and environment configuration.

use clap::{Parser, ValueEnum};
use wp_core::{ApiError, CacheBust, CmsConfig};

use crate::cache::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBustArg {
    /// Always apply the cache-busting key
    Merge,
    /// Leave image URLs that already have a query string unchanged
    SkipWhenQueryPresent,
}

impl From<CacheBustArg> for CacheBust {
    fn from(arg: CacheBustArg) -> Self {
        match arg {
            CacheBustArg::Merge => CacheBust::Merge,
            CacheBustArg::SkipWhenQueryPresent => CacheBust::SkipWhenQueryPresent,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "wp-site")]
#[command(version)]
#[command(about = "Serve normalized WordPress content for a server-rendered blog", long_about = None)]
pub struct SiteConfig {
    /// WordPress site base, e.g. https://example.com
    #[arg(long, env = "WP_API_BASE")]
    pub api_base: Option<String>,

    /// Public site URL used to build absolute post links
    #[arg(long, env = "SITE_URL")]
    pub site_url: Option<String>,

    /// Shared secret required by the revalidation endpoint
    #[arg(long, env = "REVALIDATE_TOKEN", hide_env_values = true)]
    pub revalidate_token: Option<String>,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Most rendered pages kept between revalidations
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub cache_capacity: usize,

    /// How image cache-busting keys are applied
    #[arg(long, value_enum, default_value_t = CacheBustArg::Merge)]
    pub cache_bust: CacheBustArg,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,
}

impl SiteConfig {
    /// Configuration for `api_base` with every optional setting unset.
    pub fn with_api_base(api_base: Option<&str>) -> Self {
        Self {
            api_base: api_base.map(str::to_string),
            site_url: None,
            revalidate_token: None,
            bind: "127.0.0.1:3000".to_string(),
            cache_capacity: DEFAULT_CAPACITY,
            cache_bust: CacheBustArg::Merge,
            debug: false,
        }
    }

    pub fn cms_config(&self) -> Result<CmsConfig, ApiError> {
        let config = CmsConfig::new(self.api_base.as_deref().unwrap_or_default())?;
        Ok(config.with_cache_bust(self.cache_bust.into()))
    }

    /// Configured token, treating an empty value as unset.
    pub fn revalidate_token(&self) -> Option<&str> {
        self.revalidate_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Link to a post: absolute when a site URL is configured.
    pub fn post_url(&self, slug: &str) -> String {
        let site = self
            .site_url
            .as_deref()
            .map(|s| s.trim().trim_end_matches('/'))
            .unwrap_or_default();
        format!("{site}/blog/{slug}")
    }
}
