//! crates/quillify_core/src/domain.rs
//!
//! Defines the pure, core data structures for the chapter editor.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Title persisted in place of an empty chapter title.
pub const UNTITLED_CHAPTER: &str = "Untitled Chapter";

/// A single chapter of a story. Content is the editor's HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: Uuid,
    pub story_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The order index a newly appended chapter receives.
///
/// Gaps left behind by deletions are never reused.
pub fn next_order_index(chapters: &[Chapter]) -> i32 {
    chapters
        .iter()
        .map(|chapter| chapter.order_index)
        .max()
        .map_or(0, |max| max + 1)
}

/// Title given to a chapter created when `existing` chapters are present.
pub fn default_chapter_title(existing: usize) -> String {
    format!("Chapter {}", existing + 1)
}

/// The title actually written to storage for a live title.
pub fn persisted_title(title: &str) -> &str {
    if title.trim().is_empty() {
        UNTITLED_CHAPTER
    } else {
        title
    }
}

/// The in-memory editing state of one chapter.
///
/// The baseline is the last known-persisted value of each field; a draft is
/// dirty whenever a live value differs from its baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDraft {
    pub chapter_id: Uuid,
    pub live_title: String,
    pub live_content: String,
    pub baseline_title: String,
    pub baseline_content: String,
}

impl ChapterDraft {
    pub fn from_chapter(chapter: &Chapter) -> Self {
        let content = chapter.content.clone().unwrap_or_default();
        Self {
            chapter_id: chapter.id,
            live_title: chapter.title.clone(),
            live_content: content.clone(),
            baseline_title: chapter.title.clone(),
            baseline_content: content,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.live_title != self.baseline_title || self.live_content != self.baseline_content
    }

    /// Records `title` and `content` as persisted.
    pub fn mark_saved(&mut self, title: String, content: String) {
        self.baseline_title = title;
        self.baseline_content = content;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A transient, user-visible message (a "toast").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(order_index: i32) -> Chapter {
        let now = Utc::now();
        Chapter {
            id: Uuid::new_v4(),
            story_id: Uuid::nil(),
            title: format!("Chapter {}", order_index),
            content: None,
            order_index,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn next_order_index_appends_after_the_highest_index() {
        assert_eq!(next_order_index(&[]), 0);
        assert_eq!(next_order_index(&[chapter(0), chapter(1)]), 2);
        // gaps are tolerated, never filled
        assert_eq!(next_order_index(&[chapter(4), chapter(0)]), 5);
    }

    #[test]
    fn draft_is_dirty_only_when_live_differs_from_baseline() {
        let mut draft = ChapterDraft::from_chapter(&chapter(0));
        assert_eq!(draft.live_content, "");
        assert!(!draft.is_dirty());

        draft.live_content = "<p>Once</p>".to_string();
        assert!(draft.is_dirty());

        draft.live_content.clear();
        assert!(!draft.is_dirty());

        draft.live_title = "Prologue".to_string();
        assert!(draft.is_dirty());
        draft.mark_saved("Prologue".to_string(), String::new());
        assert!(!draft.is_dirty());
    }

    #[test]
    fn blank_titles_are_persisted_as_untitled() {
        assert_eq!(persisted_title(""), UNTITLED_CHAPTER);
        assert_eq!(persisted_title("   "), UNTITLED_CHAPTER);
        assert_eq!(persisted_title("The Storm"), "The Storm");
        assert_eq!(default_chapter_title(2), "Chapter 3");
    }
}
