//! Blog host over the WordPress content layer.
//!
//! # Overview
//! Serves normalized posts, term listings, search and slug enumeration as
//! JSON, plus the on-demand revalidation endpoint the CMS calls after a
//! publish to evict cached pages. All CMS access goes through
//! `wp_core::Blog` with a ureq transport running on the blocking pool.

pub mod cache;
pub mod config;
pub mod revalidate;
pub mod routes;
pub mod transport;
pub mod views;

pub use cache::RenderCache;
pub use config::SiteConfig;
pub use routes::{app, AppState};
pub use transport::UreqTransport;
