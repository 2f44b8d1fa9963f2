//! HTTP routes over the content layer.
//!
//! CMS calls are blocking, so each one runs on the blocking pool. The blog
//! listing and single posts are served from the render cache until a
//! revalidation evicts them. When no API base is configured every listing is
//! empty and every lookup misses; the server still starts so revalidation and
//! health keep working.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use wp_core::{filter_posts, ApiError, Blog, PostPage, PostQuery, WpClient};

use crate::cache::{self, RenderCache};
use crate::config::SiteConfig;
use crate::revalidate;
use crate::transport::UreqTransport;
use crate::views::{no_results, PageView, PostView, SearchView, POST_NOT_FOUND};

pub type SiteBlog = Blog<UreqTransport>;

/// Page size for category and tag listings.
pub const TERM_PAGE_SIZE: u32 = 12;
/// Bounds for slug enumeration when the caller gives none.
pub const SLUG_MAX_PAGES: u32 = 5;
pub const SLUG_PER_PAGE: u32 = 50;
/// Size of the list the search filter runs over.
pub const SEARCH_CORPUS_SIZE: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SiteConfig>,
    pub blog: Option<Arc<SiteBlog>>,
    pub cache: RenderCache,
}

impl AppState {
    /// A missing API base is tolerated and logged; an invalid one is not.
    pub fn new(config: SiteConfig) -> Result<Self, ApiError> {
        let blog = match config.cms_config() {
            Ok(cms) => Some(Arc::new(Blog::new(WpClient::new(cms), UreqTransport::new()))),
            Err(ApiError::MissingBaseUrl) => {
                warn!("WP_API_BASE is not set; set it to your WordPress site base URL (e.g. https://example.com)");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            cache: RenderCache::with_capacity(config.cache_capacity),
            config: Arc::new(config),
            blog,
        })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/{slug}", get(get_post))
        .route("/api/categories", get(list_categories))
        .route("/api/categories/{slug}/posts", get(category_posts))
        .route("/api/tags", get(list_tags))
        .route("/api/tags/{slug}/posts", get(tag_posts))
        .route("/api/search", get(search))
        .route("/api/slugs", get(list_slugs))
        .route(
            "/api/revalidate",
            get(revalidate::usage).post(revalidate::revalidate),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run `f` against the blog on the blocking pool.
async fn blocking<R, F>(state: &AppState, f: F) -> Result<R, ApiError>
where
    F: FnOnce(&SiteBlog) -> Result<R, ApiError> + Send + 'static,
    R: Send + 'static,
{
    let Some(blog) = state.blog.clone() else {
        return Err(ApiError::MissingBaseUrl);
    };
    tokio::task::spawn_blocking(move || f(&blog))
        .await
        .map_err(|e| {
            error!(error = %e, "blocking CMS task failed");
            ApiError::Transport(e.to_string())
        })?
}

/// Serialize `view` into the render cache under `key`.
async fn remember<V: Serialize>(state: &AppState, key: String, view: &V) {
    match serde_json::to_value(view) {
        Ok(value) => state.cache.insert(key, value).await,
        Err(e) => warn!(%key, error = %e, "response not cached"),
    }
}

async fn cached(state: &AppState, key: &str) -> Option<Response> {
    let value = state.cache.get(key).await?;
    debug!(key, "render cache hit");
    Some(Json(value).into_response())
}

/// Listing response: a configuration gap reads as an empty listing, any other
/// failure as "try again later". Only successful listings are cached.
async fn page_response(
    state: &AppState,
    page: u32,
    result: Result<PostPage, ApiError>,
    cache_key: Option<String>,
) -> Response {
    match result {
        Ok(result) => {
            let view = PageView::new(&state.config, page, result);
            if let Some(key) = cache_key {
                remember(state, key, &view).await;
            }
            Json(view).into_response()
        }
        Err(e) if e.is_config() => {
            Json(PageView::new(&state.config, page, PostPage::empty())).into_response()
        }
        Err(e) => {
            warn!(page, error = %e, "listing unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(PageView::unavailable(page))).into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "cmsConfigured": state.blog.is_some() }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<u64>,
}

async fn list_posts(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let mut query = PostQuery::default().page(params.page.unwrap_or(1));
    if let Some(per_page) = params.per_page {
        query = query.per_page(per_page);
    }
    if let Some(category) = params.category {
        query = query.category(category);
    }
    let page = query.page;
    let key = cache::listing_key(&query);
    if let Some(response) = cached(&state, &key).await {
        return response;
    }
    let result = blocking(&state, move |blog| blog.try_posts(&query)).await;
    page_response(&state, page, result, Some(key)).await
}

#[derive(Debug, Default, Deserialize)]
pub struct PostParams {
    #[serde(default)]
    pub fresh: bool,
}

async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PostParams>,
) -> Response {
    let fresh_requested = params.fresh;
    let key = cache::post_key(&slug);
    if !fresh_requested {
        if let Some(response) = cached(&state, &key).await {
            return response;
        }
    }
    let lookup = slug.clone();
    let found = blocking(&state, move |blog| {
        Ok(blog.post_by_slug(&lookup).map(|post| {
            let fresh = if fresh_requested {
                blog.fresh_image_url(&post)
            } else {
                None
            };
            (post, fresh)
        }))
    })
    .await
    .unwrap_or(None);

    match found {
        Some((post, fresh)) => {
            let mut view = PostView::new(&state.config, post);
            if fresh_requested {
                view.fresh_image_url = fresh;
            } else {
                remember(&state, key, &view).await;
            }
            Json(view).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": POST_NOT_FOUND, "slug": slug })),
        )
            .into_response(),
    }
}

async fn list_categories(State(state): State<AppState>) -> Response {
    let terms = blocking(&state, |blog| Ok(blog.categories()))
        .await
        .unwrap_or_default();
    Json(terms).into_response()
}

async fn list_tags(State(state): State<AppState>) -> Response {
    let terms = blocking(&state, |blog| Ok(blog.tags()))
        .await
        .unwrap_or_default();
    Json(terms).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct TermPageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn category_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<TermPageParams>,
) -> Response {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(TERM_PAGE_SIZE);
    let result = blocking(&state, move |blog| {
        blog.try_posts_by_category_slug(&slug, page, per_page)
    })
    .await;
    page_response(&state, page, result, None).await
}

async fn tag_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<TermPageParams>,
) -> Response {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(TERM_PAGE_SIZE);
    let result = blocking(&state, move |blog| blog.try_posts_by_tag_slug(&slug, page, per_page)).await;
    page_response(&state, page, result, None).await
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let corpus = blocking(&state, |blog| Ok(blog.search_corpus(SEARCH_CORPUS_SIZE)))
        .await
        .unwrap_or_default();
    let results: Vec<PostView> = filter_posts(&corpus, &params.q)
        .into_iter()
        .map(|post| PostView::new(&state.config, post.clone()))
        .collect();
    let message = results.is_empty().then(|| no_results(&params.q));
    Json(SearchView {
        query: params.q,
        count: results.len(),
        results,
        message,
    })
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct SlugParams {
    pub max_pages: Option<u32>,
    pub per_page: Option<u32>,
}

async fn list_slugs(State(state): State<AppState>, Query(params): Query<SlugParams>) -> Response {
    let max_pages = params.max_pages.unwrap_or(SLUG_MAX_PAGES);
    let per_page = params.per_page.unwrap_or(SLUG_PER_PAGE);
    let slugs = blocking(&state, move |blog| Ok(blog.all_post_slugs(max_pages, per_page)))
        .await
        .unwrap_or_default();
    Json(json!({ "slugs": slugs })).into_response()
}
