//! crates/quillify_core/src/ports.rs
//!
//! Defines the service contracts (traits) the editor core depends on.
//! Persistence and user notifications live behind these traits so the core
//! stays independent of the backend and of the UI toolkit.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Chapter, Notification};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChapterService: Send + Sync {
    /// Lists a story's chapters sorted by `order_index` ascending.
    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>>;

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter>;

    /// Appends a new, empty chapter at `max(order_index) + 1`.
    async fn create_chapter(&self, story_id: Uuid, title: &str) -> PortResult<Chapter>;

    /// Overwrites a chapter's title and content.
    ///
    /// This is a full-row overwrite, so repeating a call is harmless.
    async fn update_chapter(&self, chapter_id: Uuid, title: &str, content: &str) -> PortResult<()>;

    async fn delete_chapter(&self, chapter_id: Uuid) -> PortResult<()>;
}

/// Delivers transient, user-visible messages.
pub trait NotificationService: Send + Sync {
    fn notify(&self, notification: Notification);
}
