//! Listing and lookup operations that run a `WpClient` over a `Transport`.
//!
//! # Design
//! Each operation comes in two forms. `try_*` returns the `ApiError` for call
//! sites that need to tell "empty" from "failed" (a listing page that wants to
//! show a retry message). The plain form logs the failure and returns an
//! empty value, so one failed request never aborts rendering.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::client::WpClient;
use crate::config::CmsConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::normalize::resolve_image_url;
use crate::types::{NormalizedPost, PostPage, PostQuery, Term, MAX_PER_PAGE};

#[derive(Debug, Clone)]
pub struct Blog<T> {
    client: WpClient,
    transport: T,
}

impl<T: Transport> Blog<T> {
    pub fn new(client: WpClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn from_base(api_base: &str, transport: T) -> Result<Self, ApiError> {
        Ok(Self::new(WpClient::new(CmsConfig::new(api_base)?), transport))
    }

    pub fn client(&self) -> &WpClient {
        &self.client
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), url = %request.path, "cms request");
        self.transport.execute(&request)
    }

    pub fn try_posts(&self, query: &PostQuery) -> Result<PostPage, ApiError> {
        let response = self.send(self.client.build_list_posts(query))?;
        self.client.parse_post_page(query, response)
    }

    pub fn posts(&self, query: &PostQuery) -> PostPage {
        self.try_posts(query).unwrap_or_else(|e| {
            warn!(page = query.page, error = %e, "post listing failed");
            PostPage::empty()
        })
    }

    pub fn try_post_by_slug(&self, slug: &str) -> Result<Option<NormalizedPost>, ApiError> {
        let response = self.send(self.client.build_post_by_slug(slug))?;
        self.client.parse_post_by_slug(response)
    }

    pub fn post_by_slug(&self, slug: &str) -> Option<NormalizedPost> {
        self.try_post_by_slug(slug).unwrap_or_else(|e| {
            warn!(slug, error = %e, "post lookup failed");
            None
        })
    }

    pub fn try_categories(&self) -> Result<Vec<Term>, ApiError> {
        let response = self.send(self.client.build_categories())?;
        self.client.parse_terms(response)
    }

    pub fn categories(&self) -> Vec<Term> {
        self.try_categories().unwrap_or_else(|e| {
            warn!(error = %e, "category listing failed");
            Vec::new()
        })
    }

    pub fn try_tags(&self) -> Result<Vec<Term>, ApiError> {
        let response = self.send(self.client.build_tags())?;
        self.client.parse_terms(response)
    }

    pub fn tags(&self) -> Vec<Term> {
        self.try_tags().unwrap_or_else(|e| {
            warn!(error = %e, "tag listing failed");
            Vec::new()
        })
    }

    /// Exact slug match first; otherwise whatever the API matched.
    fn find_term(&self, request: HttpRequest, slug: &str) -> Result<Option<Term>, ApiError> {
        let mut terms = self.client.parse_terms(self.send(request)?)?;
        if terms.is_empty() {
            return Ok(None);
        }
        let index = terms.iter().position(|t| t.slug == slug).unwrap_or(0);
        Ok(Some(terms.swap_remove(index)))
    }

    /// An unknown category yields an empty page without a listing request.
    pub fn try_posts_by_category_slug(
        &self,
        slug: &str,
        page: u32,
        per_page: u32,
    ) -> Result<PostPage, ApiError> {
        let Some(category) = self.find_term(self.client.build_category_by_slug(slug), slug)? else {
            debug!(slug, "unknown category");
            return Ok(PostPage::empty());
        };
        self.try_posts(&PostQuery::default().page(page).per_page(per_page).category(category.id))
    }

    pub fn posts_by_category_slug(&self, slug: &str, page: u32, per_page: u32) -> PostPage {
        self.try_posts_by_category_slug(slug, page, per_page)
            .unwrap_or_else(|e| {
                warn!(slug, page, error = %e, "category listing failed");
                PostPage::empty()
            })
    }

    pub fn try_posts_by_tag_slug(&self, slug: &str, page: u32, per_page: u32) -> Result<PostPage, ApiError> {
        let Some(tag) = self.find_term(self.client.build_tag_by_slug(slug), slug)? else {
            debug!(slug, "unknown tag");
            return Ok(PostPage::empty());
        };
        self.try_posts(&PostQuery::default().page(page).per_page(per_page).tag(tag.id))
    }

    pub fn posts_by_tag_slug(&self, slug: &str, page: u32, per_page: u32) -> PostPage {
        self.try_posts_by_tag_slug(slug, page, per_page)
            .unwrap_or_else(|e| {
                warn!(slug, page, error = %e, "tag listing failed");
                PostPage::empty()
            })
    }

    /// Enumerate post slugs for static generation.
    ///
    /// Walks pages `1..=max_pages`, stopping once the reported total is
    /// reached. Slugs keep first-seen order and appear once. A failed page
    /// ends the walk with what was collected so far.
    pub fn all_post_slugs(&self, max_pages: u32, per_page: u32) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut slugs = Vec::new();
        for page in 1..=max_pages {
            let query = PostQuery::default().page(page).per_page(per_page);
            let result = match self.try_posts(&query) {
                Ok(result) => result,
                Err(e) => {
                    warn!(page, error = %e, "slug enumeration stopped early");
                    break;
                }
            };
            for post in result.posts {
                if !post.slug.is_empty() && seen.insert(post.slug.clone()) {
                    slugs.push(post.slug);
                }
            }
            if page >= result.total_pages {
                break;
            }
        }
        slugs
    }

    /// Re-read the post's featured media directly, skipping any cached embed.
    /// A deleted attachment or any other failure reads as "no image".
    pub fn fresh_image_url(&self, post: &NormalizedPost) -> Option<String> {
        let media_id = post.featured_media_id?;
        let media = self
            .send(self.client.build_media(media_id))
            .and_then(|response| self.client.parse_media(response));
        match media {
            Ok(media) => resolve_image_url(&media, post.id, &post.modified, self.client.config()),
            Err(e) if e.is_not_found() => {
                debug!(post = post.id, media_id, "featured media no longer exists");
                None
            }
            Err(e) => {
                warn!(post = post.id, media_id, error = %e, "fresh image lookup failed");
                None
            }
        }
    }

    /// The in-memory list search runs over: newest posts, one request.
    pub fn search_corpus(&self, per_page: u32) -> Vec<NormalizedPost> {
        self.posts(&PostQuery::default().per_page(per_page.min(MAX_PER_PAGE)))
            .posts
    }
}
