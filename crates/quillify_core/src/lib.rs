pub mod autosave;
pub mod domain;
pub mod editor;
pub mod memory;
pub mod ports;
pub mod status;
pub mod word_count;

pub use autosave::{AutosaveConfig, AutosaveController, SaveOutcome};
pub use domain::{Chapter, ChapterDraft, Notification, Severity};
pub use editor::ChapterEditor;
pub use ports::{ChapterService, NotificationService, PortError, PortResult};
pub use status::{format_last_saved, SaveState, SaveStatus};
pub use word_count::{aggregate_word_count, count_words, format_word_count, story_word_count};
