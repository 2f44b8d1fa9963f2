//! Substring search over an already fetched post list.
//!
//! Matching is case-insensitive and whole-field: no tokenizing, no ranking.
//! Posts that fail `is_displayable` are never returned, whatever the query.

use crate::normalize::PLACEHOLDER_TITLE;
use crate::types::NormalizedPost;

/// False for soft-deleted or malformed records: blank title, placeholder
/// title, missing slug or empty content.
pub fn is_displayable(post: &NormalizedPost) -> bool {
    let title = post.title.trim();
    !title.is_empty()
        && title != PLACEHOLDER_TITLE
        && !post.slug.trim().is_empty()
        && !post.content_html.trim().is_empty()
}

/// Displayable posts whose title, content or excerpt contains `query`.
/// A blank query returns every displayable post. Input order is kept.
pub fn filter_posts<'a>(posts: &'a [NormalizedPost], query: &str) -> Vec<&'a NormalizedPost> {
    let needle = query.trim().to_lowercase();
    posts
        .iter()
        .filter(|post| is_displayable(post))
        .filter(|post| {
            needle.is_empty()
                || [&post.title, &post.content_html, &post.excerpt_html]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}
