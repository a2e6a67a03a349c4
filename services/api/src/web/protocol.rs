//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser editor and the API
//! server for a chapter-editing session.

use chrono::{DateTime, Utc};
use quillify_core::{format_last_saved, format_word_count, Chapter, Notification, SaveState, Severity};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens an editing session for a story. This must be the first message sent
    /// on the connection. `chapter_id` pre-selects a chapter.
    Init {
        story_id: Uuid,
        #[serde(default)]
        chapter_id: Option<Uuid>,
    },

    /// Asks for a fresh copy of the chapter list.
    ListChapters,

    /// Switches the editor to another chapter. Unsaved edits are flushed first.
    SelectChapter { chapter_id: Uuid },

    /// Appends a new chapter and switches the editor to it.
    CreateChapter,

    /// Deletes a chapter. The client has already asked the user to confirm.
    DeleteChapter { chapter_id: Uuid },

    /// The title field changed.
    UpdateTitle { title: String },

    /// The body editor changed. `content` is the editor's full HTML.
    UpdateContent { content: String },

    /// The user asked to save now.
    Save,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization.
    SessionInitialized {
        story_id: Uuid,
        chapters: Vec<ChapterSummary>,
    },

    /// The current chapter list, in reading order.
    ChapterList {
        chapters: Vec<ChapterSummary>,
        selected_chapter_id: Option<Uuid>,
    },

    /// The editor now shows this chapter.
    ChapterSelected { chapter: ChapterPayload },

    /// Live word count of the chapter being edited.
    WordCount { words: usize, label: String },

    /// The save indicator changed.
    SaveState {
        chapter_id: Option<Uuid>,
        status: &'static str,
        is_dirty: bool,
        last_saved_at: Option<DateTime<Utc>>,
        last_saved_label: Option<String>,
        error: Option<String>,
    },

    /// A transient message for the user (a "toast").
    Notification {
        variant: &'static str,
        title: String,
        description: String,
    },

    /// Reports an error for a request the server could not carry out.
    Error { message: String },
}

impl ServerMessage {
    pub fn word_count(words: usize) -> Self {
        ServerMessage::WordCount {
            words,
            label: format_word_count(words),
        }
    }

    pub fn save_state(state: &SaveState, now: DateTime<Utc>) -> Self {
        ServerMessage::SaveState {
            chapter_id: state.chapter_id,
            status: state.status.as_str(),
            is_dirty: state.is_dirty,
            last_saved_at: state.last_saved_at,
            last_saved_label: state.last_saved_at.map(|at| format_last_saved(at, now)),
            error: state.last_error.clone(),
        }
    }

    pub fn chapter_list(chapters: &[Chapter], selected_chapter_id: Option<Uuid>) -> Self {
        ServerMessage::ChapterList {
            chapters: chapters.iter().map(ChapterSummary::from).collect(),
            selected_chapter_id,
        }
    }
}

impl From<Notification> for ServerMessage {
    fn from(notification: Notification) -> Self {
        ServerMessage::Notification {
            variant: match notification.severity {
                Severity::Info => "default",
                Severity::Error => "destructive",
            },
            title: notification.title,
            description: notification.description,
        }
    }
}

//=========================================================================================
// Shared Payloads (also used by the REST API)
//=========================================================================================

/// A chapter as shown in the table of contents.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ChapterSummary {
    pub id: Uuid,
    pub title: String,
    pub order_index: i32,
    pub word_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Chapter> for ChapterSummary {
    fn from(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id,
            title: chapter.title.clone(),
            order_index: chapter.order_index,
            word_count: quillify_core::count_words(chapter.content.as_deref()),
            updated_at: chapter.updated_at,
        }
    }
}

/// A chapter loaded into the editor.
#[derive(Serialize, Debug, Clone)]
pub struct ChapterPayload {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub order_index: i32,
    pub word_count: usize,
}

impl From<&Chapter> for ChapterPayload {
    fn from(chapter: &Chapter) -> Self {
        let content = chapter.content.clone().unwrap_or_default();
        Self {
            id: chapter.id,
            title: chapter.title.clone(),
            word_count: quillify_core::count_words(Some(content.as_str())),
            content,
            order_index: chapter.order_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillify_core::SaveStatus;
    use serde_json::json;

    #[test]
    fn client_messages_are_tagged_by_type() {
        let story_id = Uuid::new_v4();
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "init", "story_id": story_id })).unwrap();
        assert!(matches!(msg, ClientMessage::Init { story_id: s, chapter_id: None } if s == story_id));

        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "update_content", "content": "<p>hi</p>" }))
                .unwrap();
        assert!(matches!(msg, ClientMessage::UpdateContent { ref content } if content == "<p>hi</p>"));

        let msg: ClientMessage = serde_json::from_value(json!({ "type": "save" })).unwrap();
        assert!(matches!(msg, ClientMessage::Save));

        assert!(serde_json::from_value::<ClientMessage>(json!({ "type": "format_disk" })).is_err());
    }

    #[test]
    fn save_state_carries_a_readable_label() {
        let now = Utc::now();
        let state = SaveState {
            chapter_id: Some(Uuid::nil()),
            status: SaveStatus::Saved,
            is_dirty: false,
            is_saving: false,
            last_saved_at: Some(now),
            last_error: None,
        };
        let value = serde_json::to_value(ServerMessage::save_state(&state, now)).unwrap();
        assert_eq!(value["type"], "save_state");
        assert_eq!(value["status"], "saved");
        assert_eq!(value["last_saved_label"], "just now");
    }

    #[test]
    fn notifications_map_to_toast_variants() {
        let value =
            serde_json::to_value(ServerMessage::from(Notification::error("Save failed", "x")))
                .unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["variant"], "destructive");

        let value = serde_json::to_value(ServerMessage::word_count(1)).unwrap();
        assert_eq!(value["label"], "1 word");
    }
}
