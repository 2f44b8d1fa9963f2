use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, MockMedia, MockPost, Store};
use serde_json::Value;
use std::collections::BTreeMap;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn header<'a>(resp: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

// --- posts ---

#[tokio::test]
async fn list_posts_empty_store() {
    let resp = app(Store::default())
        .oneshot(get("/wp-json/wp/v2/posts"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-wp-total"), Some("0"));
    assert_eq!(header(&resp, "x-wp-totalpages"), Some("0"));
    let posts = body_json(resp).await;
    assert_eq!(posts, Value::Array(Vec::new()));
}

#[tokio::test]
async fn second_page_of_three() {
    let resp = app(Store::sample(30))
        .oneshot(get("/wp-json/wp/v2/posts?page=2&per_page=10"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-wp-total"), Some("30"));
    assert_eq!(header(&resp, "x-wp-totalpages"), Some("3"));
    let posts = body_json(resp).await;
    let ids: Vec<u64> = posts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, (11..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn page_past_the_end_is_rejected() {
    let resp = app(Store::sample(5))
        .oneshot(get("/wp-json/wp/v2/posts?page=3&per_page=5"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "rest_post_invalid_page_number");
}

#[tokio::test]
async fn per_page_over_limit_is_rejected() {
    let resp = app(Store::sample(5))
        .oneshot(get("/wp-json/wp/v2/posts?per_page=101"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn embed_expands_related_records() {
    let resp = app(Store::sample(2))
        .oneshot(get("/wp-json/wp/v2/posts?_embed=1&per_page=1"))
        .await
        .unwrap();

    let posts = body_json(resp).await;
    let embedded = &posts[0]["_embedded"];
    assert_eq!(embedded["author"][0]["name"], "Ada Lovelace");
    assert_eq!(
        embedded["wp:featuredmedia"][0]["source_url"],
        "/wp-content/uploads/post-1.jpg"
    );
    assert_eq!(embedded["wp:term"][0][0]["slug"], "news");
}

#[tokio::test]
async fn filter_by_slug_and_category() {
    let router = app(Store::sample(6));

    let resp = router
        .clone()
        .oneshot(get("/wp-json/wp/v2/posts?slug=post-4"))
        .await
        .unwrap();
    let posts = body_json(resp).await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["id"], 4);

    let resp = router
        .oneshot(get("/wp-json/wp/v2/posts?categories=2&per_page=100"))
        .await
        .unwrap();
    assert_eq!(header(&resp, "x-wp-total"), Some("3"));
    let posts = body_json(resp).await;
    assert!(posts
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["categories"][0] == 2));
}

#[tokio::test]
async fn pagination_headers_can_be_disabled() {
    let resp = app(Store::sample(3).without_pagination_headers())
        .oneshot(get("/wp-json/wp/v2/posts"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("x-wp-total").is_none());
    assert!(resp.headers().get("x-wp-totalpages").is_none());
}

#[tokio::test]
async fn maintenance_mode_serves_html() {
    let mut store = Store::sample(1);
    store.maintenance = true;
    let resp = app(store)
        .oneshot(get("/wp-json/wp/v2/posts"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header(&resp, "content-type").unwrap().starts_with("text/html"));
    let body = body_bytes(resp).await;
    assert!(body.starts_with(b"<!DOCTYPE html>"));
}

// --- terms ---

#[tokio::test]
async fn categories_filter_by_slug() {
    let resp = app(Store::sample(1))
        .oneshot(get("/wp-json/wp/v2/categories?slug=guides"))
        .await
        .unwrap();
    let terms = body_json(resp).await;
    assert_eq!(terms.as_array().unwrap().len(), 1);
    assert_eq!(terms[0]["id"], 2);
    assert_eq!(terms[0]["taxonomy"], "category");
}

#[tokio::test]
async fn tags_list_all() {
    let resp = app(Store::sample(1))
        .oneshot(get("/wp-json/wp/v2/tags?per_page=100"))
        .await
        .unwrap();
    let terms = body_json(resp).await;
    assert_eq!(terms.as_array().unwrap().len(), 2);
}

// --- media ---

#[tokio::test]
async fn get_media_by_id() {
    let store = Store::default().with_media(MockMedia {
        id: 7,
        source_url: None,
        sizes: BTreeMap::from([("large".to_string(), "/l.jpg".to_string())]),
    });
    let resp = app(store)
        .oneshot(get("/wp-json/wp/v2/media/7"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let media = body_json(resp).await;
    assert_eq!(media["media_details"]["sizes"]["large"]["source_url"], "/l.jpg");
}

#[tokio::test]
async fn missing_media_returns_404() {
    let resp = app(Store::default().with_post(MockPost::new(1, "a", "A")))
        .oneshot(get("/wp-json/wp/v2/media/123"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "rest_post_invalid_id");
}
