//! JSON shapes returned by the site routes, and the user-facing messages for
//! the not-found, retry and no-results states.

use serde::Serialize;
use wp_core::{NormalizedPost, PostPage};

use crate::config::SiteConfig;

pub const POST_NOT_FOUND: &str = "Post not found";
pub const TRY_AGAIN_LATER: &str = "Unable to load posts right now. Please try again later.";

pub fn no_results(query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        "No posts found.".to_string()
    } else {
        format!("No posts found matching \u{201c}{query}\u{201d}. Try a different search term.")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: NormalizedPost,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fresh_image_url: Option<String>,
}

impl PostView {
    pub fn new(config: &SiteConfig, post: NormalizedPost) -> Self {
        Self {
            url: config.post_url(&post.slug),
            post,
            fresh_image_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub page: u32,
    pub posts: Vec<PostView>,
    pub total: u64,
    pub total_pages: u32,
    pub approximate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PageView {
    pub fn new(config: &SiteConfig, page: u32, result: PostPage) -> Self {
        Self {
            page,
            posts: result
                .posts
                .into_iter()
                .map(|post| PostView::new(config, post))
                .collect(),
            total: result.total,
            total_pages: result.total_pages,
            approximate: result.approximate,
            message: None,
        }
    }

    pub fn unavailable(page: u32) -> Self {
        Self {
            page,
            posts: Vec::new(),
            total: 0,
            total_pages: 0,
            approximate: false,
            message: Some(TRY_AGAIN_LATER.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchView {
    pub query: String,
    pub count: usize,
    pub results: Vec<PostView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
