//! # docrender-app
//!
//! Request glue: the one application use case that turns an inbound render
//! request into a `QueueItem`, submits it to the render queue, and maps the
//! settlement back to a caller. This crate depends on `ports`, `domain`,
//! and `shared` only.

pub mod render_article;
pub mod url_template;

pub use render_article::{RenderArticleDeps, RenderArticleInput, render_article};
pub use url_template::{ArticleRequest, build_article_request};

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
