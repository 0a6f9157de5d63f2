//! # docrender-domain
//!
//! Domain entities for the render queue: no infrastructure dependencies.
//!
//! - **Queue** - `Queue`, `QueueConfig`: the bounded, admission-controlled
//!   FIFO render queue.
//! - **Queue item** - `QueueItem` and its `process`/`cancel` contracts.
//! - **Events** - `QueueEvent`, the narrow `QueueObserver` trait.
//! - **Errors** - `RenderError`, the closed render-job error taxonomy.
//! - **Result** - `PdfResult`, the success payload of a render job.
//!
//! ## Dependency Rules
//!
//! - Depends only on the `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use docrender_shared::shared_crate_version;

// =============================================================================
// DOMAIN MODULES
// =============================================================================

pub mod events;
pub mod pdf_result;
pub mod queue;
pub mod queue_item;
pub mod render_error;

pub use events::{QueueEvent, QueueObserver, NoopObserver};
pub use pdf_result::PdfResult;
pub use queue::{Queue, QueueConfig};
pub use queue_item::{CancelFuture, CancelHandle, ProcessFn, ProcessFuture, QueueItem};
pub use render_error::RenderError;

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================
