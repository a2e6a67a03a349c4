//! crates/quillify_core/src/autosave.rs
//!
//! Debounced persistence of the chapter currently being edited.
//!
//! The controller owns the draft. Every edit re-evaluates dirtiness against
//! the baseline and either cancels the pending save or re-arms it, so a flush
//! only happens after a quiet period following the most recent edit. A flush
//! gate keeps at most one `update_chapter` call in flight per controller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{persisted_title, Chapter, ChapterDraft, Notification};
use crate::ports::{ChapterService, NotificationService};
use crate::status::{SaveState, SaveStatus};
use crate::word_count::count_words;

/// Quiet period after the last edit before an autosave fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Retries scheduled after a failed save when the user stops editing.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub debounce: Duration,
    /// Zero disables retries: a failed autosave then waits for the next edit.
    pub max_retries: u32,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl AutosaveConfig {
    /// Delay before retry number `attempt` (1-based): the debounce doubled per attempt.
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.debounce.saturating_mul(1u32 << attempt.min(16))
    }
}

/// The result of one flush request. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No chapter is selected.
    NoChapter,
    /// The draft already matches its baseline.
    Clean,
    /// Another save is in flight; this request was ignored.
    AlreadySaving,
    Saved(DateTime<Utc>),
    Failed(String),
    /// The editor moved on or closed while the save was in flight.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Timer,
    Manual,
    BeforeSwitch,
}

struct EditorState {
    draft: Option<ChapterDraft>,
    is_saving: bool,
    last_saved_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    failed_attempts: u32,
    /// The single timer slot.
    pending: Option<CancellationToken>,
    /// Bumped whenever the draft is replaced, so late results can be recognised.
    epoch: u64,
    closed: bool,
}

impl EditorState {
    fn new() -> Self {
        Self {
            draft: None,
            is_saving: false,
            last_saved_at: None,
            last_error: None,
            failed_attempts: 0,
            pending: None,
            epoch: 0,
            closed: false,
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    fn is_dirty(&self) -> bool {
        self.draft.as_ref().is_some_and(ChapterDraft::is_dirty)
    }

    fn snapshot(&self) -> SaveState {
        let is_dirty = self.is_dirty();
        SaveState {
            chapter_id: self.draft.as_ref().map(|draft| draft.chapter_id),
            status: SaveStatus::derive(
                self.is_saving,
                self.last_error.is_some(),
                is_dirty,
                self.last_saved_at,
            ),
            is_dirty,
            is_saving: self.is_saving,
            last_saved_at: self.last_saved_at,
            last_error: self.last_error.clone(),
        }
    }
}

struct Shared {
    chapters: Arc<dyn ChapterService>,
    notifier: Arc<dyn NotificationService>,
    config: AutosaveConfig,
    state: Mutex<EditorState>,
    /// Held for the whole duration of a flush.
    flush_gate: Mutex<()>,
    status_tx: watch::Sender<SaveState>,
}

/// Decides when the chapter being edited is written to storage.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct AutosaveController {
    shared: Arc<Shared>,
}

impl AutosaveController {
    pub fn new(
        chapters: Arc<dyn ChapterService>,
        notifier: Arc<dyn NotificationService>,
        config: AutosaveConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(SaveState::default());
        Self {
            shared: Arc::new(Shared {
                chapters,
                notifier,
                config,
                state: Mutex::new(EditorState::new()),
                flush_gate: Mutex::new(()),
                status_tx,
            }),
        }
    }

    pub fn config(&self) -> AutosaveConfig {
        self.shared.config
    }

    /// Receives every change of the save state.
    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.shared.status_tx.subscribe()
    }

    pub async fn state(&self) -> SaveState {
        self.shared.state.lock().await.snapshot()
    }

    pub async fn draft(&self) -> Option<ChapterDraft> {
        self.shared.state.lock().await.draft.clone()
    }

    /// Live word count of the draft's content.
    pub async fn word_count(&self) -> usize {
        let state = self.shared.state.lock().await;
        count_words(state.draft.as_ref().map(|draft| draft.live_content.as_str()))
    }

    /// Starts editing `chapter`, replacing the current draft wholesale.
    ///
    /// Unsaved edits to the previous chapter are dropped; call
    /// [`flush_before_switch`](Self::flush_before_switch) first, or use
    /// [`switch_to`](Self::switch_to).
    pub async fn load(&self, chapter: &Chapter) {
        let mut state = self.shared.state.lock().await;
        if state.closed {
            warn!(chapter_id = %chapter.id, "Ignoring chapter load on a closed editor");
            return;
        }
        state.cancel_pending();
        state.draft = Some(ChapterDraft::from_chapter(chapter));
        state.epoch += 1;
        state.last_saved_at = None;
        state.last_error = None;
        state.failed_attempts = 0;
        debug!(chapter_id = %chapter.id, "Chapter loaded into the editor");
        self.publish(&state);
    }

    /// Flushes the current chapter, then starts editing `chapter`.
    pub async fn switch_to(&self, chapter: &Chapter) -> SaveOutcome {
        let outcome = self.flush_before_switch().await;
        self.load(chapter).await;
        outcome
    }

    /// Stops editing without selecting another chapter.
    pub async fn unload(&self) {
        let mut state = self.shared.state.lock().await;
        state.cancel_pending();
        state.draft = None;
        state.epoch += 1;
        state.last_saved_at = None;
        state.last_error = None;
        state.failed_attempts = 0;
        self.publish(&state);
    }

    /// Tears the controller down. The pending timer is cancelled and the
    /// result of a save still in flight is discarded.
    pub async fn close(&self) {
        let mut state = self.shared.state.lock().await;
        state.cancel_pending();
        state.closed = true;
        state.epoch += 1;
        debug!("Autosave controller closed");
    }

    pub async fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.edit(move |draft| draft.live_title = title).await;
    }

    pub async fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.edit(move |draft| draft.live_content = content).await;
    }

    async fn edit(&self, apply: impl FnOnce(&mut ChapterDraft)) {
        let mut state = self.shared.state.lock().await;
        let Some(draft) = state.draft.as_mut() else {
            debug!("Ignoring edit without a selected chapter");
            return;
        };
        apply(draft);
        state.failed_attempts = 0;
        if !state.is_dirty() {
            state.last_error = None;
        }
        self.reschedule(&mut state);
        self.publish(&state);
    }

    /// Re-evaluates the draft: a clean draft cancels the pending save, a
    /// dirty one pushes it out by the full debounce delay.
    pub async fn observe(&self) {
        let mut state = self.shared.state.lock().await;
        self.reschedule(&mut state);
        self.publish(&state);
    }

    /// Saves immediately, bypassing the debounce.
    ///
    /// Ignored while another save is in flight. Confirms success (and reports
    /// failure) through the notification service.
    pub async fn manual_save(&self) -> SaveOutcome {
        let Ok(_gate) = self.shared.flush_gate.try_lock() else {
            debug!("Manual save requested while a save is in flight");
            return SaveOutcome::AlreadySaving;
        };
        self.flush(FlushTrigger::Manual).await
    }

    /// Waits for any save in flight, then saves the draft if it is dirty.
    ///
    /// Must complete before the draft is replaced by another chapter.
    pub async fn flush_before_switch(&self) -> SaveOutcome {
        let _gate = self.shared.flush_gate.lock().await;
        self.flush(FlushTrigger::BeforeSwitch).await
    }

    fn reschedule(&self, state: &mut EditorState) {
        if !state.closed && state.is_dirty() {
            self.arm(state, self.shared.config.debounce);
        } else {
            state.cancel_pending();
        }
    }

    /// Cancels the timer slot and arms it again for `delay`.
    fn arm(&self, state: &mut EditorState, delay: Duration) {
        state.cancel_pending();
        let token = CancellationToken::new();
        state.pending = Some(token.clone());

        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(shared) = shared.upgrade() {
                        AutosaveController { shared }.on_timer_expired(token).await;
                    }
                }
            }
        });
    }

    async fn on_timer_expired(&self, token: CancellationToken) {
        let _gate = self.shared.flush_gate.lock().await;
        if token.is_cancelled() {
            return;
        }
        self.flush(FlushTrigger::Timer).await;
    }

    /// Persists the draft. The caller holds the flush gate.
    async fn flush(&self, trigger: FlushTrigger) -> SaveOutcome {
        let (chapter_id, title, content, epoch) = {
            let mut state = self.shared.state.lock().await;
            if state.closed {
                return SaveOutcome::Discarded;
            }
            let Some(draft) = state.draft.as_ref() else {
                return SaveOutcome::NoChapter;
            };
            // An explicit save writes even a clean draft.
            if trigger != FlushTrigger::Manual && !draft.is_dirty() {
                state.cancel_pending();
                return SaveOutcome::Clean;
            }
            let snapshot = (
                draft.chapter_id,
                draft.live_title.clone(),
                draft.live_content.clone(),
                state.epoch,
            );
            state.cancel_pending();
            state.is_saving = true;
            self.publish(&state);
            snapshot
        };

        let result = self
            .shared
            .chapters
            .update_chapter(chapter_id, persisted_title(&title), &content)
            .await;

        let mut state = self.shared.state.lock().await;
        state.is_saving = false;
        if state.closed || state.epoch != epoch {
            debug!(%chapter_id, ?trigger, "Discarding the result of a save for a chapter no longer edited");
            if !state.closed {
                self.publish(&state);
            }
            return SaveOutcome::Discarded;
        }

        match result {
            Ok(()) => {
                let saved_at = Utc::now();
                state.last_saved_at = Some(saved_at);
                state.last_error = None;
                state.failed_attempts = 0;
                if let Some(draft) = state.draft.as_mut() {
                    draft.mark_saved(title, content);
                }
                info!(%chapter_id, ?trigger, "Chapter saved");
                self.publish(&state);
                drop(state);

                if trigger == FlushTrigger::Manual {
                    self.shared.notifier.notify(Notification::info(
                        "Chapter saved",
                        "Your changes have been saved.",
                    ));
                }
                SaveOutcome::Saved(saved_at)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(%chapter_id, ?trigger, error = %message, "Chapter save failed");
                state.last_error = Some(message.clone());
                state.failed_attempts += 1;

                let attempt = state.failed_attempts;
                let max_retries = self.shared.config.max_retries;
                if state.pending.is_none() && state.is_dirty() && attempt <= max_retries {
                    let delay = self.shared.config.retry_delay(attempt);
                    debug!(%chapter_id, attempt, ?delay, "Scheduling save retry");
                    self.arm(&mut state, delay);
                }
                self.publish(&state);
                drop(state);

                if trigger != FlushTrigger::Timer {
                    self.shared.notifier.notify(Notification::error(
                        "Save failed",
                        "Failed to save the chapter. Your changes are still in the editor.",
                    ));
                }
                SaveOutcome::Failed(message)
            }
        }
    }

    fn publish(&self, state: &EditorState) {
        let snapshot = state.snapshot();
        self.shared.status_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
