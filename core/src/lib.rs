//! WordPress content layer for a server-rendered blog.
//!
//! # Overview
//! Builds REST requests, parses responses and normalizes CMS posts into a
//! flat `NormalizedPost`. The core never touches the network: a `Transport`
//! supplied by the host performs each round-trip (host-does-IO pattern).
//!
//! # Design
//! - `WpClient` is stateless; it holds only the validated `CmsConfig`.
//! - Each operation is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit and parsing is testable from canned responses.
//! - `Blog` composes the two over a `Transport` and applies the failure
//!   policy: listings degrade to empty results, image refreshes to no image.
//! - Normalization never fails; malformed records become placeholders.

pub mod blog;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod search;
pub mod types;

pub use blog::Blog;
pub use client::WpClient;
pub use config::{CacheBust, CmsConfig};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestOptions, Transport};
pub use normalize::{display_date, normalize_post, normalize_value, Normalized, PLACEHOLDER_TITLE};
pub use search::{filter_posts, is_displayable};
pub use types::{NormalizedPost, PostPage, PostQuery, RawMedia, RawPost, Term};
