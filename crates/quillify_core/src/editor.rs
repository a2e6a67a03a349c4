//! crates/quillify_core/src/editor.rs
//!
//! A chapter-editing session for one story: the chapter list, the selected
//! chapter, and the autosave controller that persists it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use crate::autosave::{AutosaveConfig, AutosaveController, SaveOutcome};
use crate::domain::{default_chapter_title, Chapter, Notification};
use crate::ports::{ChapterService, NotificationService, PortError, PortResult};
use crate::status::SaveState;
use crate::word_count::story_word_count;

pub struct ChapterEditor {
    story_id: Uuid,
    chapter_service: Arc<dyn ChapterService>,
    notifier: Arc<dyn NotificationService>,
    chapters: Vec<Chapter>,
    selected: Option<Uuid>,
    autosave: AutosaveController,
}

impl ChapterEditor {
    pub fn new(
        story_id: Uuid,
        chapter_service: Arc<dyn ChapterService>,
        notifier: Arc<dyn NotificationService>,
        config: AutosaveConfig,
    ) -> Self {
        let autosave = AutosaveController::new(chapter_service.clone(), notifier.clone(), config);
        Self {
            story_id,
            chapter_service,
            notifier,
            chapters: Vec::new(),
            selected: None,
            autosave,
        }
    }

    pub fn story_id(&self) -> Uuid {
        self.story_id
    }

    /// The chapter list as last loaded, in reading order.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn selected_chapter_id(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn autosave(&self) -> &AutosaveController {
        &self.autosave
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.autosave.subscribe()
    }

    pub async fn load_chapters(&mut self) -> PortResult<&[Chapter]> {
        match self.chapter_service.list_chapters(self.story_id).await {
            Ok(chapters) => {
                self.chapters = chapters;
                Ok(&self.chapters)
            }
            Err(e) => {
                error!(story_id = %self.story_id, "Error fetching chapters: {:?}", e);
                self.notifier
                    .notify(Notification::error("Error", "Failed to load chapters."));
                Err(e)
            }
        }
    }

    /// Saves the current chapter if needed, then starts editing `chapter_id`.
    pub async fn select_chapter(&mut self, chapter_id: Uuid) -> PortResult<Chapter> {
        if !self.chapters.iter().any(|chapter| chapter.id == chapter_id) {
            return Err(PortError::NotFound(format!(
                "Chapter {} is not part of story {}",
                chapter_id, self.story_id
            )));
        }
        if self.selected.is_some() {
            self.autosave.flush_before_switch().await;
        }

        // Re-read so content saved earlier in this session is not stale.
        let chapter = self.chapter_service.get_chapter(chapter_id).await?;
        self.replace_cached(&chapter);
        self.autosave.load(&chapter).await;
        self.selected = Some(chapter.id);
        Ok(chapter)
    }

    /// Saves the current chapter if needed, then appends and selects a new one.
    pub async fn create_chapter(&mut self) -> PortResult<Chapter> {
        if self.selected.is_some() {
            self.autosave.flush_before_switch().await;
        }

        let title = default_chapter_title(self.chapters.len());
        match self
            .chapter_service
            .create_chapter(self.story_id, &title)
            .await
        {
            Ok(chapter) => {
                info!(chapter_id = %chapter.id, order_index = chapter.order_index, "Chapter created");
                self.chapters.push(chapter.clone());
                self.autosave.load(&chapter).await;
                self.selected = Some(chapter.id);
                self.notifier.notify(Notification::info(
                    "Chapter created",
                    "New chapter added to your story.",
                ));
                Ok(chapter)
            }
            Err(e) => {
                error!(story_id = %self.story_id, "Error creating chapter: {:?}", e);
                self.notifier
                    .notify(Notification::error("Error", "Failed to create new chapter."));
                Err(e)
            }
        }
    }

    /// Deletes a chapter. The caller is responsible for confirming with the user.
    pub async fn delete_chapter(&mut self, chapter_id: Uuid) -> PortResult<()> {
        let title = self
            .chapters
            .iter()
            .find(|chapter| chapter.id == chapter_id)
            .map(|chapter| chapter.title.clone())
            .unwrap_or_default();

        if let Err(e) = self.chapter_service.delete_chapter(chapter_id).await {
            error!(%chapter_id, "Error deleting chapter: {:?}", e);
            self.notifier
                .notify(Notification::error("Error", "Failed to delete the chapter."));
            return Err(e);
        }

        self.chapters.retain(|chapter| chapter.id != chapter_id);
        if self.selected == Some(chapter_id) {
            self.autosave.unload().await;
            self.selected = None;
        }
        self.notifier.notify(Notification::info(
            "Chapter deleted",
            format!("\"{}\" has been removed from your story.", title),
        ));
        Ok(())
    }

    pub async fn edit_title(&self, title: impl Into<String>) {
        self.autosave.set_title(title).await;
    }

    pub async fn edit_content(&self, content: impl Into<String>) {
        self.autosave.set_content(content).await;
    }

    pub async fn manual_save(&self) -> SaveOutcome {
        self.autosave.manual_save().await
    }

    /// Live word count of the chapter being edited.
    pub async fn word_count(&self) -> usize {
        self.autosave.word_count().await
    }

    /// Total word count of the story as stored.
    pub async fn story_word_count(&self) -> PortResult<usize> {
        let chapters = self.chapter_service.list_chapters(self.story_id).await?;
        Ok(story_word_count(&chapters))
    }

    /// Flushes pending edits and closes the session.
    pub async fn shutdown(&self) -> SaveOutcome {
        let outcome = self.autosave.flush_before_switch().await;
        self.autosave.close().await;
        outcome
    }

    fn replace_cached(&mut self, chapter: &Chapter) {
        if let Some(cached) = self.chapters.iter_mut().find(|c| c.id == chapter.id) {
            *cached = chapter.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::memory::{InMemoryChapterService, RecordingNotifier};
    use std::time::Duration;

    async fn editor_with_chapters(
        titles: &[&str],
    ) -> (ChapterEditor, InMemoryChapterService, RecordingNotifier) {
        let chapters = InMemoryChapterService::new();
        let notifier = RecordingNotifier::new();
        let story_id = Uuid::new_v4();
        for title in titles {
            chapters
                .seed(story_id, title, Some(format!("<p>{} text</p>", title).as_str()))
                .await;
        }
        let mut editor = ChapterEditor::new(
            story_id,
            Arc::new(chapters.clone()),
            Arc::new(notifier.clone()),
            AutosaveConfig::default(),
        );
        editor.load_chapters().await.unwrap();
        (editor, chapters, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_another_chapter_keeps_earlier_edits() {
        let (mut editor, chapters, _) = editor_with_chapters(&["One", "Two"]).await;
        let one = editor.chapters()[0].id;
        let two = editor.chapters()[1].id;

        editor.select_chapter(one).await.unwrap();
        editor.edit_content("<p>rewritten opening</p>").await;
        editor.select_chapter(two).await.unwrap();

        let stored = chapters.get_chapter(one).await.unwrap();
        assert_eq!(stored.content.as_deref(), Some("<p>rewritten opening</p>"));

        // coming back shows the saved text, not the list loaded at start
        let reloaded = editor.select_chapter(one).await.unwrap();
        assert_eq!(reloaded.content.as_deref(), Some("<p>rewritten opening</p>"));
        assert_eq!(editor.word_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn new_chapters_are_appended_selected_and_announced() {
        let (mut editor, _, notifier) = editor_with_chapters(&["One", "Two"]).await;
        let first = editor.chapters()[0].id;
        editor.select_chapter(first).await.unwrap();

        let created = editor.create_chapter().await.unwrap();
        assert_eq!(created.title, "Chapter 3");
        assert_eq!(created.order_index, 2);
        assert_eq!(editor.selected_chapter_id(), Some(created.id));
        assert_eq!(editor.chapters().len(), 3);

        let notifications = notifier.notifications();
        assert_eq!(notifications.last().unwrap().title, "Chapter created");
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_the_selected_chapter_clears_the_selection() {
        let (mut editor, chapters, notifier) = editor_with_chapters(&["One", "Two"]).await;
        let one = editor.chapters()[0].id;
        editor.select_chapter(one).await.unwrap();
        editor.edit_content("<p>doomed</p>").await;

        editor.delete_chapter(one).await.unwrap();
        assert_eq!(editor.selected_chapter_id(), None);
        assert_eq!(editor.chapters().len(), 1);

        // the pending autosave for the deleted chapter never fires
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(chapters.update_calls(), 0);
        let last = notifier.notifications().pop().unwrap();
        assert_eq!(last.description, "\"One\" has been removed from your story.");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deletion_is_reported() {
        let (mut editor, _, notifier) = editor_with_chapters(&["One"]).await;
        assert!(editor.delete_chapter(Uuid::new_v4()).await.is_err());

        let last = notifier.notifications().pop().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(editor.chapters().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn story_word_count_sums_stored_chapters() {
        let (mut editor, _, _) = editor_with_chapters(&["One", "Two"]).await;
        // "<p>One text</p>" + "<p>Two text</p>"
        assert_eq!(editor.story_word_count().await.unwrap(), 4);

        let two = editor.chapters()[1].id;
        editor.select_chapter(two).await.unwrap();
        editor.edit_content("<p>Two has more text now</p>").await;
        assert!(matches!(editor.manual_save().await, SaveOutcome::Saved(_)));
        assert_eq!(editor.story_word_count().await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_edits() {
        let (mut editor, chapters, _) = editor_with_chapters(&["One"]).await;
        let one = editor.chapters()[0].id;
        editor.select_chapter(one).await.unwrap();
        editor.edit_title("Prologue").await;

        assert!(matches!(editor.shutdown().await, SaveOutcome::Saved(_)));
        assert_eq!(chapters.get_chapter(one).await.unwrap().title, "Prologue");

        // edits after shutdown go nowhere
        editor.edit_title("Ignored").await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(chapters.update_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_chapters_cannot_be_selected() {
        let (mut editor, _, _) = editor_with_chapters(&["One"]).await;
        assert!(matches!(
            editor.select_chapter(Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
    }
}
