use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const API_PREFIX: &str = "/wp-json/wp/v2";
const DEFAULT_PER_PAGE: usize = 10;
const MAX_PER_PAGE: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MockPost {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub date: String,
    pub modified: String,
    pub author: Option<u64>,
    /// 0 means no featured image, as in WordPress.
    pub featured_media: u64,
    pub categories: Vec<u64>,
    pub tags: Vec<u64>,
}

impl MockPost {
    pub fn new(id: u64, slug: &str, title: &str) -> Self {
        Self {
            id,
            slug: slug.to_string(),
            title: title.to_string(),
            excerpt: format!("<p>Summary of {title}</p>"),
            content: format!("<p>Body of {title}</p>"),
            date: "2024-03-05T10:00:00".to_string(),
            modified: "2024-03-05T10:00:00".to_string(),
            author: None,
            featured_media: 0,
            categories: Vec::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MockTerm {
    pub id: u64,
    pub slug: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MockMedia {
    pub id: u64,
    pub source_url: Option<String>,
    /// Size name (`thumbnail`, `medium`, `large`, `full`) to URL.
    pub sizes: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MockAuthor {
    pub id: u64,
    pub name: String,
}

/// Everything the mock API serves.
#[derive(Clone, Debug)]
pub struct Store {
    pub posts: Vec<MockPost>,
    pub categories: Vec<MockTerm>,
    pub tags: Vec<MockTerm>,
    pub media: Vec<MockMedia>,
    pub authors: Vec<MockAuthor>,
    /// Send `X-WP-Total` / `X-WP-TotalPages` on collection responses.
    pub pagination_headers: bool,
    /// Answer every API route with an HTML maintenance page.
    pub maintenance: bool,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            posts: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            media: Vec::new(),
            authors: Vec::new(),
            pagination_headers: true,
            maintenance: false,
        }
    }
}

impl Store {
    pub fn with_post(mut self, post: MockPost) -> Self {
        self.posts.push(post);
        self
    }

    pub fn with_category(mut self, id: u64, slug: &str, name: &str) -> Self {
        self.categories.push(MockTerm {
            id,
            slug: slug.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_tag(mut self, id: u64, slug: &str, name: &str) -> Self {
        self.tags.push(MockTerm {
            id,
            slug: slug.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_media(mut self, media: MockMedia) -> Self {
        self.media.push(media);
        self
    }

    pub fn with_author(mut self, id: u64, name: &str) -> Self {
        self.authors.push(MockAuthor {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn without_pagination_headers(mut self) -> Self {
        self.pagination_headers = false;
        self
    }

    /// `n` posts with ids `1..=n`, alternating between two categories, each
    /// with an author and a featured image.
    pub fn sample(n: u64) -> Self {
        let mut store = Store::default()
            .with_category(1, "news", "News")
            .with_category(2, "guides", "Guides")
            .with_tag(10, "rust", "Rust")
            .with_tag(11, "web", "Web")
            .with_author(1, "Ada Lovelace");
        for i in 1..=n {
            let media_id = 100 + i;
            store.media.push(MockMedia {
                id: media_id,
                source_url: Some(format!("/wp-content/uploads/post-{i}.jpg")),
                sizes: BTreeMap::from([(
                    "thumbnail".to_string(),
                    format!("/wp-content/uploads/post-{i}-150x150.jpg"),
                )]),
            });
            let mut post = MockPost::new(i, &format!("post-{i}"), &format!("Post {i}"));
            post.date = format!("2024-{:02}-{:02}T10:00:00", 1 + (i / 28) % 12, 1 + i % 28);
            post.modified = post.date.clone();
            post.author = Some(1);
            post.featured_media = media_id;
            post.categories = vec![if i % 2 == 1 { 1 } else { 2 }];
            post.tags = if i % 3 == 0 { vec![10, 11] } else { vec![10] };
            store.posts.push(post);
        }
        store
    }

    fn render_post(&self, post: &MockPost, embed: bool) -> Value {
        let mut value = json!({
            "id": post.id,
            "date": post.date,
            "modified": post.modified,
            "slug": post.slug,
            "status": "publish",
            "type": "post",
            "title": { "rendered": post.title },
            "content": { "rendered": post.content, "protected": false },
            "excerpt": { "rendered": post.excerpt, "protected": false },
            "author": post.author.unwrap_or(0),
            "featured_media": post.featured_media,
            "categories": post.categories,
            "tags": post.tags,
        });
        if embed {
            value["_embedded"] = self.render_embedded(post);
        }
        value
    }

    fn render_embedded(&self, post: &MockPost) -> Value {
        let mut embedded = serde_json::Map::new();
        if let Some(author) = post
            .author
            .and_then(|id| self.authors.iter().find(|a| a.id == id))
        {
            embedded.insert(
                "author".to_string(),
                json!([{ "id": author.id, "name": author.name }]),
            );
        }
        if post.featured_media != 0 {
            let media = self
                .media
                .iter()
                .find(|m| m.id == post.featured_media)
                .map(render_media)
                .unwrap_or_else(|| invalid_id_body(404));
            embedded.insert("wp:featuredmedia".to_string(), json!([media]));
        }
        let categories: Vec<Value> = post
            .categories
            .iter()
            .filter_map(|id| self.categories.iter().find(|t| t.id == *id))
            .map(|t| render_term(t, "category"))
            .collect();
        let tags: Vec<Value> = post
            .tags
            .iter()
            .filter_map(|id| self.tags.iter().find(|t| t.id == *id))
            .map(|t| render_term(t, "post_tag"))
            .collect();
        embedded.insert("wp:term".to_string(), json!([categories, tags]));
        Value::Object(embedded)
    }
}

fn render_media(media: &MockMedia) -> Value {
    let sizes: serde_json::Map<String, Value> = media
        .sizes
        .iter()
        .map(|(name, url)| (name.clone(), json!({ "source_url": url })))
        .collect();
    let mut value = json!({
        "id": media.id,
        "media_type": "image",
        "media_details": { "sizes": sizes },
    });
    if let Some(url) = &media.source_url {
        value["source_url"] = json!(url);
    }
    value
}

fn render_term(term: &MockTerm, taxonomy: &str) -> Value {
    json!({ "id": term.id, "slug": term.slug, "name": term.name, "taxonomy": taxonomy })
}

fn invalid_id_body(status: u16) -> Value {
    json!({ "code": "rest_post_invalid_id", "message": "Invalid post ID.", "data": { "status": status } })
}

fn wp_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "code": code, "message": message, "data": { "status": status.as_u16() } })),
    )
        .into_response()
}

fn maintenance_page() -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=UTF-8")],
        "<!DOCTYPE html><html><body><h1>Briefly unavailable for scheduled maintenance.</h1></body></html>",
    )
        .into_response()
}

pub type Db = Arc<RwLock<Store>>;

pub fn app(store: Store) -> Router {
    router(Arc::new(RwLock::new(store)))
}

/// Router over a shared store, for tests that change data between requests.
pub fn router(db: Db) -> Router {
    Router::new()
        .route(&format!("{API_PREFIX}/posts"), get(list_posts))
        .route(&format!("{API_PREFIX}/categories"), get(list_categories))
        .route(&format!("{API_PREFIX}/tags"), get(list_tags))
        .route(&format!("{API_PREFIX}/media/{{id}}"), get(get_media))
        .with_state(db)
}

pub async fn run(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app(store)).await
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectionParams {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub slug: Option<String>,
    pub categories: Option<String>,
    pub tags: Option<String>,
    #[serde(rename = "_embed")]
    pub embed: Option<String>,
}

/// Parse a comma-separated id list. `None` means no filter.
fn id_filter(raw: &Option<String>) -> Option<Vec<u64>> {
    raw.as_ref().map(|s| {
        s.split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    })
}

/// Slice one page out of `items` and attach WordPress pagination headers.
fn paginate(params: &CollectionParams, items: Vec<Value>, headers_enabled: bool) -> Response {
    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return wp_error(
            StatusCode::BAD_REQUEST,
            "rest_invalid_param",
            "Invalid parameter(s): per_page",
        );
    }
    let page = params.page.unwrap_or(1).max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page);
    if page > total_pages.max(1) {
        return wp_error(
            StatusCode::BAD_REQUEST,
            "rest_post_invalid_page_number",
            "The page number requested is larger than the number of pages available.",
        );
    }

    let body: Vec<Value> = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    let mut headers = HeaderMap::new();
    if headers_enabled {
        headers.insert(HeaderName::from_static("x-wp-total"), HeaderValue::from(total));
        headers.insert(
            HeaderName::from_static("x-wp-totalpages"),
            HeaderValue::from(total_pages),
        );
    }
    (headers, Json(body)).into_response()
}

async fn list_posts(State(db): State<Db>, Query(params): Query<CollectionParams>) -> Response {
    let store = db.read().await;
    if store.maintenance {
        return maintenance_page();
    }
    let categories = id_filter(&params.categories);
    let tags = id_filter(&params.tags);
    let embed = params.embed.is_some();
    let items: Vec<Value> = store
        .posts
        .iter()
        .filter(|p| params.slug.as_ref().map_or(true, |slug| &p.slug == slug))
        .filter(|p| {
            categories
                .as_ref()
                .map_or(true, |ids| p.categories.iter().any(|c| ids.contains(c)))
        })
        .filter(|p| tags.as_ref().map_or(true, |ids| p.tags.iter().any(|t| ids.contains(t))))
        .map(|p| store.render_post(p, embed))
        .collect();
    paginate(&params, items, store.pagination_headers)
}

fn list_terms(store: &Store, terms: &[MockTerm], taxonomy: &str, params: &CollectionParams) -> Response {
    if store.maintenance {
        return maintenance_page();
    }
    let items: Vec<Value> = terms
        .iter()
        .filter(|t| params.slug.as_ref().map_or(true, |slug| &t.slug == slug))
        .map(|t| render_term(t, taxonomy))
        .collect();
    paginate(params, items, store.pagination_headers)
}

async fn list_categories(State(db): State<Db>, Query(params): Query<CollectionParams>) -> Response {
    let store = db.read().await;
    list_terms(&store, &store.categories, "category", &params)
}

async fn list_tags(State(db): State<Db>, Query(params): Query<CollectionParams>) -> Response {
    let store = db.read().await;
    list_terms(&store, &store.tags, "post_tag", &params)
}

async fn get_media(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    if store.maintenance {
        return maintenance_page();
    }
    match store.media.iter().find(|m| m.id == id) {
        Some(media) => Json(render_media(media)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(invalid_id_body(404))).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_store_links_every_post() {
        let store = Store::sample(6);
        assert_eq!(store.posts.len(), 6);
        assert_eq!(store.media.len(), 6);
        assert!(store.posts.iter().all(|p| p.author == Some(1)));
        assert_eq!(store.posts[2].tags, vec![10, 11]);
    }

    #[test]
    fn embedded_terms_carry_taxonomy() {
        let store = Store::sample(1);
        let value = store.render_post(&store.posts[0], true);
        let terms = &value["_embedded"]["wp:term"];
        assert_eq!(terms[0][0]["taxonomy"], "category");
        assert_eq!(terms[1][0]["taxonomy"], "post_tag");
        assert_eq!(value["_embedded"]["author"][0]["name"], "Ada Lovelace");
    }

    #[test]
    fn missing_media_embeds_error_object() {
        let mut post = MockPost::new(1, "a", "A");
        post.featured_media = 999;
        let store = Store::default().with_post(post);
        let value = store.render_post(&store.posts[0], true);
        assert_eq!(
            value["_embedded"]["wp:featuredmedia"][0]["code"],
            "rest_post_invalid_id"
        );
    }

    #[test]
    fn no_embed_without_flag() {
        let store = Store::sample(1);
        let value = store.render_post(&store.posts[0], false);
        assert!(value.get("_embedded").is_none());
        assert_eq!(value["title"]["rendered"], "Post 1");
    }

    #[test]
    fn media_without_source_url_omits_it() {
        let media = MockMedia {
            id: 3,
            source_url: None,
            sizes: BTreeMap::from([("thumbnail".to_string(), "/t.jpg".to_string())]),
        };
        let value = render_media(&media);
        assert!(value.get("source_url").is_none());
        assert_eq!(value["media_details"]["sizes"]["thumbnail"]["source_url"], "/t.jpg");
    }

    #[test]
    fn id_filter_parses_lists() {
        assert_eq!(id_filter(&Some("1, 2,x".to_string())), Some(vec![1, 2]));
        assert_eq!(id_filter(&None), None);
    }
}
