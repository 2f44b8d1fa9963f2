//! Mapping from CMS records to `NormalizedPost`.
//!
//! # Design
//! Every function here is infallible. `normalize_post` works on an already
//! decoded `RawPost` and fills absent sub-records with empty values.
//! `normalize_value` covers records that do not decode at all and reports the
//! outcome as a `Normalized` value, so callers can see when a placeholder was
//! substituted without any error crossing the listing boundary.
//!
//! Featured image URLs pick the first available candidate (direct source,
//! then large, medium, thumbnail), are made absolute against the CMS host and
//! carry a `v` query pair derived from the post id and modified timestamp.
//! Replacing an image under the same filename changes `modified`, which
//! changes the URL seen by downstream caches.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::{CacheBust, CmsConfig};
use crate::types::{NormalizedPost, RawMedia, RawPost, Term};

/// Title given to records that could not be decoded. Search never shows it.
pub const PLACEHOLDER_TITLE: &str = "Untitled";

/// Query key carrying the cache-busting value.
pub const CACHE_BUST_PARAM: &str = "v";

const CATEGORY_TAXONOMY: &str = "category";
const TAG_TAXONOMY: &str = "post_tag";

/// Result of normalizing one listing item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Complete(NormalizedPost),
    /// The record did not decode; `post` holds whatever could be salvaged.
    Fallback { post: NormalizedPost, reason: String },
}

impl Normalized {
    pub fn post(&self) -> &NormalizedPost {
        match self {
            Normalized::Complete(post) | Normalized::Fallback { post, .. } => post,
        }
    }

    pub fn into_post(self) -> NormalizedPost {
        match self {
            Normalized::Complete(post) | Normalized::Fallback { post, .. } => post,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Normalized::Fallback { .. })
    }
}

/// Parse a CMS timestamp as UTC. Accepts RFC 3339 with any offset, the
/// offset-less `YYYY-MM-DDTHH:MM:SS` form (read as UTC) and a bare date.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `YYYY-MM-DD` from the UTC calendar date, or empty when unparsable.
pub fn display_date(raw: &str) -> String {
    parse_utc(raw)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Cache-busting value for a post's image: `{id}-{unix seconds}`.
///
/// An unparsable `modified` contributes its alphanumeric characters instead.
/// An id of 0 is omitted.
pub fn cache_key(post_id: u64, modified: &str) -> Option<String> {
    let stamp = match parse_utc(modified) {
        Some(dt) => dt.timestamp().to_string(),
        None => modified.chars().filter(char::is_ascii_alphanumeric).collect(),
    };
    if stamp.is_empty() {
        return None;
    }
    Some(if post_id == 0 {
        stamp
    } else {
        format!("{post_id}-{stamp}")
    })
}

/// First non-empty candidate URL: direct source, then large, medium, thumbnail.
pub fn pick_media_url(media: &RawMedia) -> Option<&str> {
    let sizes = media.media_details.as_ref().map(|d| &d.sizes);
    let candidates = [
        media.source_url.as_deref(),
        sizes.and_then(|s| s.large.as_ref()).and_then(|s| s.source_url.as_deref()),
        sizes.and_then(|s| s.medium.as_ref()).and_then(|s| s.source_url.as_deref()),
        sizes.and_then(|s| s.thumbnail.as_ref()).and_then(|s| s.source_url.as_deref()),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|url| !url.trim().is_empty())
}

/// Absolute, cache-busted URL for `media`, or `None` when it has no usable
/// candidate.
pub fn resolve_image_url(
    media: &RawMedia,
    post_id: u64,
    modified: &str,
    config: &CmsConfig,
) -> Option<String> {
    let mut url = config.absolutize(pick_media_url(media)?)?;
    let Some(key) = cache_key(post_id, modified) else {
        return Some(url.into());
    };
    let has_query = url.query().is_some_and(|q| !q.is_empty());
    if has_query && config.cache_bust() == CacheBust::SkipWhenQueryPresent {
        return Some(url.into());
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != CACHE_BUST_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(CACHE_BUST_PARAM, &key);
    Some(url.into())
}

/// Split embedded term groups into `(categories, tags)`.
///
/// Terms are routed by their `taxonomy` field. Terms without one fall back to
/// the group position: group 0 holds categories, group 1 tags. Other
/// taxonomies are dropped.
pub fn split_terms(groups: &[Vec<Term>]) -> (Vec<Term>, Vec<Term>) {
    let mut categories = Vec::new();
    let mut tags = Vec::new();
    for (index, group) in groups.iter().enumerate() {
        for term in group {
            match (term.taxonomy.as_deref(), index) {
                (Some(CATEGORY_TAXONOMY), _) | (None, 0) => categories.push(term.clone()),
                (Some(TAG_TAXONOMY), _) | (None, 1) => tags.push(term.clone()),
                _ => {}
            }
        }
    }
    (categories, tags)
}

pub fn normalize_post(raw: &RawPost, config: &CmsConfig) -> NormalizedPost {
    let embedded = raw.embedded.as_ref();
    let (categories, tags) = embedded
        .map(|e| split_terms(&e.terms))
        .unwrap_or_default();
    let author_name = embedded
        .and_then(|e| e.author.first())
        .and_then(|a| a.name.clone())
        .filter(|name| !name.trim().is_empty());
    let media = embedded.and_then(|e| e.featured_media.first());
    let featured_image_url =
        media.and_then(|m| resolve_image_url(m, raw.id, &raw.modified, config));
    let featured_media_id = raw
        .featured_media
        .or_else(|| media.map(|m| m.id))
        .filter(|id| *id != 0);

    NormalizedPost {
        id: raw.id,
        slug: raw.slug.clone(),
        title: raw.title.rendered.clone(),
        excerpt_html: raw.excerpt.rendered.clone(),
        content_html: raw.content.rendered.clone(),
        date: raw.date.clone(),
        modified: raw.modified.clone(),
        date_display: display_date(&raw.date),
        author_name,
        featured_image_url,
        featured_media_id,
        categories,
        tags,
    }
}

/// Normalize an undecoded listing item.
pub fn normalize_value(value: &Value, config: &CmsConfig) -> Normalized {
    match RawPost::deserialize(value) {
        Ok(raw) => Normalized::Complete(normalize_post(&raw, config)),
        Err(e) => {
            let post = placeholder(value);
            warn!(id = post.id, slug = %post.slug, error = %e, "substituting placeholder for malformed post");
            Normalized::Fallback {
                post,
                reason: e.to_string(),
            }
        }
    }
}

fn placeholder(value: &Value) -> NormalizedPost {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let date = text("date");
    NormalizedPost {
        id: value.get("id").and_then(Value::as_u64).unwrap_or(0),
        slug: text("slug"),
        title: PLACEHOLDER_TITLE.to_string(),
        excerpt_html: String::new(),
        content_html: String::new(),
        date_display: display_date(&date),
        date,
        modified: text("modified"),
        author_name: None,
        featured_image_url: None,
        featured_media_id: None,
        categories: Vec::new(),
        tags: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaDetails, MediaSize, MediaSizes};
    use serde_json::json;

    fn config() -> CmsConfig {
        CmsConfig::new("https://cms.test").unwrap()
    }

    fn sized(url: &str) -> Option<MediaSize> {
        Some(MediaSize {
            source_url: Some(url.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn display_date_is_utc_calendar_date() {
        assert_eq!(display_date("2024-03-05T10:00:00Z"), "2024-03-05");
        assert_eq!(display_date("2024-03-05T10:00:00"), "2024-03-05");
        assert_eq!(display_date("2024-03-05T23:30:00-02:00"), "2024-03-06");
        assert_eq!(display_date("2024-03-05"), "2024-03-05");
        assert_eq!(display_date("yesterday"), "");
    }

    #[test]
    fn cache_key_uses_id_and_timestamp() {
        assert_eq!(
            cache_key(12, "2024-03-05T10:00:00").as_deref(),
            Some("12-1709632800")
        );
        assert_eq!(cache_key(0, "2024-03-05T10:00:00").as_deref(), Some("1709632800"));
        assert_eq!(cache_key(3, "rev 7!").as_deref(), Some("3-rev7"));
        assert_eq!(cache_key(3, ""), None);
    }

    #[test]
    fn direct_source_wins() {
        let media = RawMedia {
            id: 1,
            source_url: Some("https://cms.test/full.jpg".into()),
            media_details: Some(MediaDetails {
                sizes: MediaSizes {
                    large: sized("https://cms.test/large.jpg"),
                    ..Default::default()
                },
            }),
        };
        assert_eq!(pick_media_url(&media), Some("https://cms.test/full.jpg"));
    }

    #[test]
    fn falls_back_to_thumbnail_only() {
        let media = RawMedia {
            id: 1,
            source_url: None,
            media_details: Some(MediaDetails {
                sizes: MediaSizes {
                    thumbnail: sized("/wp-content/uploads/a-150x150.jpg"),
                    ..Default::default()
                },
            }),
        };
        let url = resolve_image_url(&media, 5, "2024-03-05T10:00:00", &config()).unwrap();
        assert_eq!(
            url,
            "https://cms.test/wp-content/uploads/a-150x150.jpg?v=5-1709632800"
        );
    }

    #[test]
    fn no_candidates_means_no_image() {
        assert_eq!(resolve_image_url(&RawMedia::default(), 1, "", &config()), None);
    }

    #[test]
    fn same_file_different_modified_gives_different_urls() {
        let media = RawMedia {
            id: 1,
            source_url: Some("/wp-content/uploads/hero.jpg".into()),
            media_details: None,
        };
        let a = resolve_image_url(&media, 1, "2024-03-05T10:00:00", &config()).unwrap();
        let b = resolve_image_url(&media, 1, "2024-04-01T08:00:00", &config()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn merge_policy_replaces_existing_key() {
        let media = RawMedia {
            id: 1,
            source_url: Some("https://cdn.test/a.jpg?w=300&v=old".into()),
            media_details: None,
        };
        let url = resolve_image_url(&media, 2, "2024-03-05T10:00:00", &config()).unwrap();
        assert_eq!(url, "https://cdn.test/a.jpg?w=300&v=2-1709632800");
    }

    #[test]
    fn skip_policy_leaves_query_urls_alone() {
        let config = config().with_cache_bust(CacheBust::SkipWhenQueryPresent);
        let media = RawMedia {
            id: 1,
            source_url: Some("https://cdn.test/a.jpg?w=300".into()),
            media_details: None,
        };
        let url = resolve_image_url(&media, 2, "2024-03-05T10:00:00", &config).unwrap();
        assert_eq!(url, "https://cdn.test/a.jpg?w=300");
    }

    #[test]
    fn terms_route_by_taxonomy_not_position() {
        let groups = vec![
            vec![Term {
                id: 9,
                slug: "rust".into(),
                name: "Rust".into(),
                taxonomy: Some("post_tag".into()),
            }],
            vec![Term {
                id: 2,
                slug: "news".into(),
                name: "News".into(),
                taxonomy: Some("category".into()),
            }],
        ];
        let (categories, tags) = split_terms(&groups);
        assert_eq!(categories[0].slug, "news");
        assert_eq!(tags[0].slug, "rust");
    }

    #[test]
    fn untagged_terms_use_position() {
        let term = |id| Term {
            id,
            slug: format!("t{id}"),
            name: String::new(),
            taxonomy: None,
        };
        let (categories, tags) = split_terms(&[vec![term(1)], vec![term(2)], vec![term(3)]]);
        assert_eq!(categories, vec![term(1)]);
        assert_eq!(tags, vec![term(2)]);
    }

    #[test]
    fn bare_post_normalizes_with_defaults() {
        let raw: RawPost = serde_json::from_value(json!({
            "id": 4,
            "slug": "bare",
            "title": { "rendered": "Bare" },
            "content": { "rendered": "<p>body</p>" },
            "date": "2024-03-05T10:00:00",
            "featured_media": 0
        }))
        .unwrap();
        let post = normalize_post(&raw, &config());
        assert_eq!(post.author_name, None);
        assert_eq!(post.featured_image_url, None);
        assert_eq!(post.featured_media_id, None);
        assert!(post.categories.is_empty());
        assert!(post.tags.is_empty());
        assert_eq!(post.date_display, "2024-03-05");
    }

    #[test]
    fn embedded_post_normalizes_fully() {
        let value = json!({
            "id": 10,
            "slug": "full",
            "title": { "rendered": "Full" },
            "excerpt": { "rendered": "<p>ex</p>" },
            "content": { "rendered": "<p>body</p>" },
            "date": "2024-03-05T10:00:00",
            "modified": "2024-03-06T10:00:00",
            "featured_media": 77,
            "_embedded": {
                "author": [{ "id": 1, "name": "Ada" }],
                "wp:featuredmedia": [{
                    "id": 77,
                    "media_details": { "sizes": { "medium": { "source_url": "/m.jpg" } } }
                }],
                "wp:term": [
                    [{ "id": 2, "slug": "news", "name": "News", "taxonomy": "category" }],
                    [{ "id": 5, "slug": "rust", "name": "Rust", "taxonomy": "post_tag" }]
                ]
            }
        });
        let normalized = normalize_value(&value, &config());
        assert!(!normalized.is_fallback());
        let post = normalized.into_post();
        assert_eq!(post.author_name.as_deref(), Some("Ada"));
        assert_eq!(post.featured_media_id, Some(77));
        assert_eq!(
            post.featured_image_url.as_deref(),
            Some("https://cms.test/m.jpg?v=10-1709719200")
        );
        assert_eq!(post.categories.len(), 1);
        assert_eq!(post.tags[0].name, "Rust");
    }

    #[test]
    fn undecodable_term_drops_only_itself() {
        let value = json!({
            "id": 11,
            "slug": "mixed-terms",
            "title": { "rendered": "Mixed" },
            "content": { "rendered": "<p>body</p>" },
            "_embedded": {
                "wp:term": [
                    [
                        { "id": 2, "slug": "news", "taxonomy": "category" },
                        { "slug": "broken", "taxonomy": "category" }
                    ],
                    [{ "id": 10, "slug": "rust", "taxonomy": "post_tag" }]
                ]
            }
        });
        let post = normalize_value(&value, &config()).into_post();
        let categories: Vec<&str> = post.categories.iter().map(|t| t.slug.as_str()).collect();
        let tags: Vec<&str> = post.tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(categories, ["news"]);
        assert_eq!(tags, ["rust"]);
    }

    #[test]
    fn undecodable_post_becomes_placeholder() {
        let value = json!({ "id": 3, "slug": "broken", "title": "not an object" });
        let normalized = normalize_value(&value, &config());
        assert!(normalized.is_fallback());
        let post = normalized.post();
        assert_eq!(post.id, 3);
        assert_eq!(post.slug, "broken");
        assert_eq!(post.title, PLACEHOLDER_TITLE);
        assert!(post.content_html.is_empty());
        assert_eq!(post.featured_image_url, None);
    }

    #[test]
    fn non_object_item_still_normalizes() {
        let normalized = normalize_value(&json!("garbage"), &config());
        assert!(normalized.is_fallback());
        assert_eq!(normalized.post().id, 0);
    }
}
