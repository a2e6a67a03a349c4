//! crates/quillify_core/src/status.rs
//!
//! Save status as seen by whatever renders the editor.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing to save and nothing saved yet in this session.
    Idle,
    Unsaved,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Unsaved => "unsaved",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        }
    }

    /// Derives the status shown to the user. An in-flight save wins over a
    /// previous error, which wins over unsaved changes.
    pub fn derive(
        is_saving: bool,
        has_error: bool,
        is_dirty: bool,
        last_saved_at: Option<DateTime<Utc>>,
    ) -> Self {
        if is_saving {
            SaveStatus::Saving
        } else if has_error {
            SaveStatus::Error
        } else if is_dirty {
            SaveStatus::Unsaved
        } else if last_saved_at.is_some() {
            SaveStatus::Saved
        } else {
            SaveStatus::Idle
        }
    }
}

/// A snapshot of the autosave controller's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveState {
    pub chapter_id: Option<Uuid>,
    pub status: SaveStatus,
    pub is_dirty: bool,
    pub is_saving: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for SaveState {
    fn default() -> Self {
        Self {
            chapter_id: None,
            status: SaveStatus::Idle,
            is_dirty: false,
            is_saving: false,
            last_saved_at: None,
            last_error: None,
        }
    }
}

/// Formats a last-saved time relative to `now`, e.g. "3 minutes ago".
/// Anything an hour or older is shown as the wall-clock time.
pub fn format_last_saved(saved_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - saved_at).num_minutes();
    match minutes {
        m if m < 1 => "just now".to_string(),
        1 => "1 minute ago".to_string(),
        m if m < 60 => format!("{} minutes ago", m),
        _ => saved_at.format("%H:%M").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn status_priority() {
        let at = Some(Utc::now());
        assert_eq!(SaveStatus::derive(true, true, true, at), SaveStatus::Saving);
        assert_eq!(SaveStatus::derive(false, true, true, at), SaveStatus::Error);
        assert_eq!(SaveStatus::derive(false, false, true, at), SaveStatus::Unsaved);
        assert_eq!(SaveStatus::derive(false, false, false, at), SaveStatus::Saved);
        assert_eq!(SaveStatus::derive(false, false, false, None), SaveStatus::Idle);
    }

    #[test]
    fn last_saved_labels() {
        let saved_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let label = |elapsed: Duration| format_last_saved(saved_at, saved_at + elapsed);

        assert_eq!(label(Duration::seconds(30)), "just now");
        assert_eq!(label(Duration::seconds(90)), "1 minute ago");
        assert_eq!(label(Duration::minutes(59)), "59 minutes ago");
        assert_eq!(label(Duration::hours(2)), "14:05");
    }
}
