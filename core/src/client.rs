//! Stateless HTTP request builder and response parser for the WordPress REST API.
//!
//! # Design
//! `WpClient` holds only a validated `CmsConfig`. Each operation is split into
//! a `build_*` method producing an `HttpRequest` and a `parse_*` method
//! consuming an `HttpResponse`; the round-trip itself belongs to a
//! `Transport`. Listing responses are decoded item by item so a single
//! malformed post is replaced by a placeholder instead of failing the page.

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::form_urlencoded;

use crate::config::CmsConfig;
use crate::error::{snippet, ApiError};
use crate::http::{HttpRequest, HttpResponse, RequestOptions};
use crate::normalize::{normalize_value, Normalized};
use crate::types::{NormalizedPost, PostPage, PostQuery, RawMedia, Term, MAX_PER_PAGE};

pub const TOTAL_HEADER: &str = "x-wp-total";
pub const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

#[derive(Debug, Clone)]
pub struct WpClient {
    config: CmsConfig,
}

impl WpClient {
    pub fn new(config: CmsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CmsConfig {
        &self.config
    }

    /// Build a request for `path` under the REST namespace.
    ///
    /// `Accept: application/json` is always sent unless `options` overrides
    /// it; a body without an explicit content type is sent as JSON.
    pub fn build_request(
        &self,
        path: &str,
        query: &[(&str, String)],
        options: RequestOptions,
    ) -> HttpRequest {
        let mut url = format!("{}{}", self.config.api_root(), path);
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }

        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        for (name, value) in options.headers {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
            headers.push((name, value));
        }
        if options.body.is_some() && !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        HttpRequest {
            method: options.method,
            path: url,
            headers,
            body: options.body,
        }
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> HttpRequest {
        self.build_request(path, query, RequestOptions::default())
    }

    pub fn build_list_posts(&self, query: &PostQuery) -> HttpRequest {
        let mut pairs = vec![
            ("_embed", "1".to_string()),
            ("page", query.page.max(1).to_string()),
            ("per_page", query.per_page.clamp(1, MAX_PER_PAGE).to_string()),
        ];
        if let Some(category) = query.category {
            pairs.push(("categories", category.to_string()));
        }
        if let Some(tag) = query.tag {
            pairs.push(("tags", tag.to_string()));
        }
        if let Some(slug) = &query.slug {
            pairs.push(("slug", slug.clone()));
        }
        self.get("/posts", &pairs)
    }

    pub fn build_post_by_slug(&self, slug: &str) -> HttpRequest {
        self.get("/posts", &[("slug", slug.to_string()), ("_embed", "1".to_string())])
    }

    pub fn build_categories(&self) -> HttpRequest {
        self.get("/categories", &[("per_page", MAX_PER_PAGE.to_string())])
    }

    pub fn build_tags(&self) -> HttpRequest {
        self.get("/tags", &[("per_page", MAX_PER_PAGE.to_string())])
    }

    pub fn build_category_by_slug(&self, slug: &str) -> HttpRequest {
        self.get("/categories", &[("slug", slug.to_string())])
    }

    pub fn build_tag_by_slug(&self, slug: &str) -> HttpRequest {
        self.get("/tags", &[("slug", slug.to_string())])
    }

    /// Direct media lookup that asks intermediaries not to serve a cached copy.
    pub fn build_media(&self, id: u64) -> HttpRequest {
        self.build_request(
            &format!("/media/{id}"),
            &[],
            RequestOptions::default().header("cache-control", "no-cache"),
        )
    }

    /// Check status and content type, then decode the body as `T`.
    pub fn parse_json<T: DeserializeOwned>(&self, response: &HttpResponse) -> Result<T, ApiError> {
        check_response(response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError {
            url: response.url.clone(),
            message: e.to_string(),
        })
    }

    pub fn parse_post_page(&self, query: &PostQuery, response: HttpResponse) -> Result<PostPage, ApiError> {
        let items: Vec<Value> = self.parse_json(&response)?;
        let posts: Vec<NormalizedPost> = items
            .iter()
            .map(|item| normalize_value(item, &self.config).into_post())
            .collect();

        let header_total = header_number::<u64>(&response, TOTAL_HEADER);
        let header_pages = header_number::<u32>(&response, TOTAL_PAGES_HEADER);
        let per_page = u64::from(query.per_page.clamp(1, MAX_PER_PAGE));
        let (total, total_pages, approximate) = match (header_total, header_pages) {
            (Some(total), Some(pages)) => (total, pages, false),
            (Some(total), None) => (total, pages_for(total, per_page), false),
            (None, pages) => {
                let (total, approx_pages) = approximate_totals(query.page.max(1), per_page, posts.len() as u64);
                (total, pages.unwrap_or(approx_pages), true)
            }
        };

        Ok(PostPage {
            posts,
            total,
            total_pages,
            approximate,
        })
    }

    /// First matching post, or `None` when the slug is unknown. A record that
    /// only normalizes to a placeholder is treated as absent.
    pub fn parse_post_by_slug(&self, response: HttpResponse) -> Result<Option<NormalizedPost>, ApiError> {
        let items: Vec<Value> = self.parse_json(&response)?;
        Ok(match items.first().map(|item| normalize_value(item, &self.config)) {
            Some(Normalized::Complete(post)) => Some(post),
            _ => None,
        })
    }

    /// Terms that fail to decode are skipped.
    pub fn parse_terms(&self, response: HttpResponse) -> Result<Vec<Term>, ApiError> {
        let items: Vec<Value> = self.parse_json(&response)?;
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }

    pub fn parse_media(&self, response: HttpResponse) -> Result<RawMedia, ApiError> {
        self.parse_json(&response)
    }
}

/// Map non-success statuses and non-JSON bodies to the matching `ApiError`.
fn check_response(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == 404 {
        return Err(ApiError::NotFound {
            url: response.url.clone(),
        });
    }
    if !response.is_success() {
        return Err(ApiError::HttpError {
            url: response.url.clone(),
            status: response.status,
            body: snippet(&response.body),
        });
    }
    let content_type = response.content_type();
    if !content_type.to_ascii_lowercase().contains("application/json") {
        return Err(ApiError::UnexpectedContentType {
            url: response.url.clone(),
            content_type: content_type.to_string(),
            snippet: snippet(&response.body),
        });
    }
    Ok(())
}

fn header_number<T: std::str::FromStr>(response: &HttpResponse, name: &str) -> Option<T> {
    response.header(name).and_then(|v| v.trim().parse().ok())
}

fn pages_for(total: u64, per_page: u64) -> u32 {
    u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX)
}

/// Estimate `(total, total_pages)` from one page when the API sent no
/// pagination headers. A full page suggests at least one more; a partial
/// page is taken as the last one. Collections that are an exact multiple of
/// `per_page` are over-counted by one page.
fn approximate_totals(page: u32, per_page: u64, count: u64) -> (u64, u32) {
    let before = u64::from(page - 1) * per_page;
    if count == 0 {
        return (before, page - 1);
    }
    let pages = if count >= per_page { page.saturating_add(1) } else { page };
    (before + count, pages)
}
