//! crates/quillify_core/src/memory.rs
//!
//! In-memory adapters for the core ports, used by tests and by the API when no
//! database is configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{next_order_index, Chapter, Notification};
use crate::ports::{ChapterService, NotificationService, PortError, PortResult};

#[derive(Default)]
struct Inner {
    chapters: RwLock<HashMap<Uuid, Chapter>>,
    failures_remaining: AtomicUsize,
    update_calls: AtomicUsize,
    updates_in_flight: AtomicUsize,
    max_updates_in_flight: AtomicUsize,
}

/// A HashMap-backed `ChapterService`. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryChapterService {
    inner: Arc<Inner>,
    update_latency: Option<Duration>,
}

impl InMemoryChapterService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `update_chapter` call take `latency` before completing.
    pub fn with_update_latency(mut self, latency: Duration) -> Self {
        self.update_latency = Some(latency);
        self
    }

    /// Makes the next `count` calls to `update_chapter` fail.
    pub fn fail_next_updates(&self, count: usize) {
        self.inner.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Total number of `update_chapter` calls, failed ones included.
    pub fn update_calls(&self) -> usize {
        self.inner.update_calls.load(Ordering::SeqCst)
    }

    /// The highest number of `update_chapter` calls ever running at once.
    pub fn max_concurrent_updates(&self) -> usize {
        self.inner.max_updates_in_flight.load(Ordering::SeqCst)
    }

    /// Inserts a chapter with the given content, appended to its story.
    pub async fn seed(&self, story_id: Uuid, title: &str, content: Option<&str>) -> Chapter {
        let mut chapters = self.inner.chapters.write().await;
        let chapter = new_chapter(&chapters, story_id, title, content.map(str::to_string));
        chapters.insert(chapter.id, chapter.clone());
        chapter
    }

    async fn apply_update(&self, chapter_id: Uuid, title: &str, content: &str) -> PortResult<()> {
        let injected = self
            .inner
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(PortError::Unexpected("injected update failure".to_string()));
        }

        let mut chapters = self.inner.chapters.write().await;
        let chapter = chapters
            .get_mut(&chapter_id)
            .ok_or_else(|| PortError::NotFound(format!("Chapter {} not found", chapter_id)))?;
        chapter.title = title.to_string();
        chapter.content = Some(content.to_string());
        chapter.updated_at = Utc::now();
        Ok(())
    }
}

fn new_chapter(
    chapters: &HashMap<Uuid, Chapter>,
    story_id: Uuid,
    title: &str,
    content: Option<String>,
) -> Chapter {
    let siblings: Vec<Chapter> = chapters
        .values()
        .filter(|chapter| chapter.story_id == story_id)
        .cloned()
        .collect();
    let now = Utc::now();
    Chapter {
        id: Uuid::new_v4(),
        story_id,
        title: title.to_string(),
        content,
        order_index: next_order_index(&siblings),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ChapterService for InMemoryChapterService {
    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>> {
        let chapters = self.inner.chapters.read().await;
        let mut listed: Vec<Chapter> = chapters
            .values()
            .filter(|chapter| chapter.story_id == story_id)
            .cloned()
            .collect();
        listed.sort_by_key(|chapter| chapter.order_index);
        Ok(listed)
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        let chapters = self.inner.chapters.read().await;
        chapters
            .get(&chapter_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Chapter {} not found", chapter_id)))
    }

    async fn create_chapter(&self, story_id: Uuid, title: &str) -> PortResult<Chapter> {
        let mut chapters = self.inner.chapters.write().await;
        let chapter = new_chapter(&chapters, story_id, title, Some(String::new()));
        chapters.insert(chapter.id, chapter.clone());
        Ok(chapter)
    }

    async fn update_chapter(&self, chapter_id: Uuid, title: &str, content: &str) -> PortResult<()> {
        self.inner.update_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.inner.updates_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .max_updates_in_flight
            .fetch_max(running, Ordering::SeqCst);

        if let Some(latency) = self.update_latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.apply_update(chapter_id, title, content).await;

        self.inner.updates_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete_chapter(&self, chapter_id: Uuid) -> PortResult<()> {
        let mut chapters = self.inner.chapters.write().await;
        chapters
            .remove(&chapter_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Chapter {} not found", chapter_id)))
    }
}

/// A `NotificationService` that keeps every notification it receives.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }
}

impl NotificationService for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut received) = self.received.lock() {
            received.push(notification);
        }
    }
}
