//! Rendered responses keyed by the site path they stand for.
//!
//! # Design
//! Keys are public paths: `/blog?page=2&per_page=10` for a listing page,
//! `/blog/hello-world` for a post. Revalidation evicts by pattern: the query
//! string is ignored and a `[param]` segment matches any one segment, so
//! `/blog` drops every listing page and `/blog/[slug]` drops every post.
//! The cache holds at most `capacity` entries; inserting a new key into a
//! full cache evicts the oldest entry.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use wp_core::PostQuery;

pub const DEFAULT_CAPACITY: usize = 512;

#[derive(Debug, Clone)]
pub struct CachedPage {
    pub value: Value,
    pub rendered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RenderCache {
    entries: Arc<RwLock<HashMap<String, CachedPage>>>,
    capacity: usize,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).map(|page| page.value.clone())
    }

    pub async fn insert(&self, key: String, value: Value) {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by(|a, b| a.1.rendered_at.cmp(&b.1.rendered_at).then_with(|| a.0.cmp(b.0)))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest, "render cache full, evicting oldest");
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CachedPage {
                value,
                rendered_at: Utc::now(),
            },
        );
    }

    /// Drop every entry whose path matches `pattern`. Returns how many went.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !path_matches(pattern, key));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Whether cache key `key` renders a path matched by `pattern`.
pub fn path_matches(pattern: &str, key: &str) -> bool {
    let path = key.split_once('?').map_or(key, |(path, _)| path);
    let pattern = pattern.split_once('?').map_or(pattern, |(path, _)| path);
    let mut wanted = pattern.trim_matches('/').split('/');
    let mut actual = path.trim_matches('/').split('/');
    loop {
        match (wanted.next(), actual.next()) {
            (None, None) => return true,
            (Some(w), Some(a)) if w == a => {}
            (Some(w), Some(a)) if is_param(w) && !a.is_empty() => {}
            _ => return false,
        }
    }
}

fn is_param(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('[') && segment.ends_with(']')
}

pub fn listing_key(query: &PostQuery) -> String {
    let mut key = format!("/blog?page={}&per_page={}", query.page, query.per_page);
    if let Some(category) = query.category {
        key.push_str(&format!("&category={category}"));
    }
    key
}

pub fn post_key(slug: &str) -> String {
    format!("/blog/{slug}")
}
