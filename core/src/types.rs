//! CMS records and the normalized shapes handed to rendering code.
//!
//! # Design
//! `Raw*` types mirror the WordPress REST schema. Embedded sub-records are
//! decoded leniently: a malformed author, media or term list becomes empty
//! instead of failing the surrounding post. `NormalizedPost` is the flat shape
//! consumers read and serializes in camelCase.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 10;
/// Upper bound the REST API accepts for `per_page`.
pub const MAX_PER_PAGE: u32 = 100;

/// A `{ "rendered": "..." }` wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

impl From<&str> for Rendered {
    fn from(s: &str) -> Self {
        Self { rendered: s.to_string() }
    }
}

/// A category or tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
}

/// Embedded author. WordPress substitutes an error object when the author is
/// not readable, hence the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSize {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSizes {
    #[serde(default, deserialize_with = "lenient")]
    pub thumbnail: Option<MediaSize>,
    #[serde(default, deserialize_with = "lenient")]
    pub medium: Option<MediaSize>,
    #[serde(default, deserialize_with = "lenient")]
    pub large: Option<MediaSize>,
    #[serde(default, deserialize_with = "lenient")]
    pub full: Option<MediaSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDetails {
    #[serde(default)]
    pub sizes: MediaSizes,
}

/// Media attachment, embedded or fetched from `/media/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMedia {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub media_details: Option<MediaDetails>,
}

/// The `_embedded` block produced by `?_embed`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Embedded {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub author: Vec<RawAuthor>,
    #[serde(default, rename = "wp:featuredmedia", deserialize_with = "lenient_vec")]
    pub featured_media: Vec<RawMedia>,
    /// One group per taxonomy. Groups are conventionally ordered categories
    /// then tags, but the normalizer reads each term's `taxonomy` first.
    #[serde(default, rename = "wp:term", deserialize_with = "lenient_groups")]
    pub terms: Vec<Vec<Term>>,
}

/// A post as the REST API returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPost {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub featured_media: Option<u64>,
    #[serde(default, rename = "_embedded", deserialize_with = "lenient")]
    pub embedded: Option<Embedded>,
}

/// Flat post representation consumed by rendering code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPost {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub excerpt_html: String,
    pub content_html: String,
    pub date: String,
    pub modified: String,
    /// `YYYY-MM-DD` in UTC; empty when `date` is unparsable.
    pub date_display: String,
    pub author_name: Option<String>,
    pub featured_image_url: Option<String>,
    pub featured_media_id: Option<u64>,
    pub categories: Vec<Term>,
    pub tags: Vec<Term>,
}

/// One page of a post listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<NormalizedPost>,
    pub total: u64,
    pub total_pages: u32,
    /// True when totals were inferred from the item count because the
    /// response carried no pagination headers.
    pub approximate: bool,
}

impl PostPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Filters for `/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub page: u32,
    pub per_page: u32,
    pub category: Option<u64>,
    pub tag: Option<u64>,
    pub slug: Option<String>,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            category: None,
            tag: None,
            slug: None,
        }
    }
}

impl PostQuery {
    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn category(mut self, id: u64) -> Self {
        self.category = Some(id);
        self
    }

    pub fn tag(mut self, id: u64) -> Self {
        self.tag = Some(id);
        self
    }

    pub fn slug(mut self, slug: &str) -> Self {
        self.slug = Some(slug.to_string());
        self
    }
}

/// Decode an object into `T`. Any other JSON value, or an object that does
/// not fit, reads as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

/// Decode a list element by element, dropping elements that do not fit.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Decode a list of term groups term by term. A group that is not a list
/// becomes empty so later groups keep their position.
fn lenient_groups<'de, D>(deserializer: D) -> Result<Vec<Vec<Term>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(groups) = value else {
        return Ok(Vec::new());
    };
    Ok(groups
        .into_iter()
        .map(|group| match group {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_post_without_embed() {
        let raw: RawPost = serde_json::from_value(json!({
            "id": 7,
            "slug": "hello",
            "title": { "rendered": "Hello" },
            "date": "2024-03-05T10:00:00"
        }))
        .unwrap();
        assert_eq!(raw.id, 7);
        assert!(raw.embedded.is_none());
        assert_eq!(raw.content.rendered, "");
    }

    #[test]
    fn malformed_embedded_parts_degrade_to_empty() {
        let raw: RawPost = serde_json::from_value(json!({
            "id": 1,
            "slug": "s",
            "_embedded": {
                "author": "not-a-list",
                "wp:featuredmedia": [{ "code": "rest_forbidden", "message": "nope" }],
                "wp:term": [[{ "id": 3, "slug": "news", "name": "News" }], "junk"]
            }
        }))
        .unwrap();
        let embedded = raw.embedded.unwrap();
        assert!(embedded.author.is_empty());
        assert_eq!(embedded.featured_media.len(), 1);
        assert_eq!(embedded.featured_media[0].source_url, None);
        assert_eq!(embedded.terms.len(), 2);
        assert_eq!(embedded.terms[0].len(), 1);
        assert!(embedded.terms[1].is_empty());
    }

    #[test]
    fn broken_term_keeps_its_siblings() {
        let raw: RawPost = serde_json::from_value(json!({
            "id": 1,
            "slug": "s",
            "_embedded": {
                "wp:term": [
                    [
                        { "id": 2, "slug": "news", "taxonomy": "category" },
                        { "slug": "broken", "taxonomy": "category" }
                    ],
                    [{ "id": 10, "slug": "rust", "taxonomy": "post_tag" }]
                ]
            }
        }))
        .unwrap();
        let terms = raw.embedded.unwrap().terms;
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].len(), 1);
        assert_eq!(terms[0][0].slug, "news");
        assert_eq!(terms[1][0].slug, "rust");
    }

    #[test]
    fn media_details_as_array_is_ignored() {
        let media: RawMedia = serde_json::from_value(json!({
            "id": 9,
            "source_url": "/a.png",
            "media_details": []
        }))
        .unwrap();
        assert!(media.media_details.is_none());

        let media: RawMedia = serde_json::from_value(json!({ "id": 9, "media_details": "x" })).unwrap();
        assert!(media.media_details.is_none());
        assert_eq!(media.source_url.as_deref(), Some("/a.png"));
    }

    #[test]
    fn query_builder_clamps() {
        let q = PostQuery::default().page(0).per_page(500);
        assert_eq!(q.page, 1);
        assert_eq!(q.per_page, MAX_PER_PAGE);
    }

    #[test]
    fn normalized_post_serializes_camel_case() {
        let post = NormalizedPost {
            id: 1,
            slug: "a".into(),
            title: "A".into(),
            excerpt_html: String::new(),
            content_html: "<p>x</p>".into(),
            date: "2024-03-05T10:00:00".into(),
            modified: String::new(),
            date_display: "2024-03-05".into(),
            author_name: None,
            featured_image_url: None,
            featured_media_id: None,
            categories: Vec::new(),
            tags: Vec::new(),
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["dateDisplay"], "2024-03-05");
        assert_eq!(value["contentHtml"], "<p>x</p>");
    }
}
