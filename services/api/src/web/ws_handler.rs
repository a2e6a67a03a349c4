//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a chapter-editing
//! WebSocket connection. Each connection owns one `ChapterEditor`; its
//! autosave controller persists edits in the background.

use crate::web::{
    protocol::{ChapterPayload, ChapterSummary, ClientMessage, ServerMessage},
    state::{AppState, WsNotifier},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use quillify_core::{ChapterEditor, SaveOutcome, SaveState};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{self, UnboundedSender},
    watch,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New editing connection established.");

    // Everything sent to the client goes through one queue, drained by a writer task.
    let (mut sender, mut receiver) = socket.split();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("Client went away; stopping the writer.");
                break;
            }
        }
    });

    // --- 1. Initialization Phase ---
    let (story_id, initial_chapter) = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(init_json.as_str()) {
                Ok(ClientMessage::Init { story_id, chapter_id }) => (story_id, chapter_id),
                _ => {
                    error!("First message was not a valid Init message.");
                    send(&outgoing, ServerMessage::Error {
                        message: "The first message must be an init message.".to_string(),
                    });
                    drop(outgoing);
                    let _ = writer.await;
                    return;
                }
            }
        }
        _ => {
            error!("Client disconnected before sending Init message.");
            writer.abort();
            return;
        }
    };

    let Some((mut editor, mut status)) =
        open_session(story_id, initial_chapter, &app_state, &outgoing).await
    else {
        drop(outgoing);
        let _ = writer.await;
        return;
    };

    // --- 2. Save State Forwarding ---
    let status_task = {
        let outgoing = outgoing.clone();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let state = status.borrow_and_update().clone();
                if outgoing.send(ServerMessage::save_state(&state, Utc::now())).is_err() {
                    break;
                }
            }
        })
    };

    // --- 3. Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(text.as_str(), &mut editor, &outgoing).await;
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- 4. Cleanup ---
    if let SaveOutcome::Failed(e) = editor.shutdown().await {
        error!("Final save for story {} failed: {}", story_id, e);
    }
    status_task.abort();
    writer.abort();
    info!("Editing connection closed.");
}

/// Builds the editor for `story_id`, announces the chapter list, and applies
/// the optional initial selection. The client then receives the current save
/// state; the returned receiver has already seen it.
async fn open_session(
    story_id: Uuid,
    initial_chapter: Option<Uuid>,
    app_state: &AppState,
    outgoing: &UnboundedSender<ServerMessage>,
) -> Option<(ChapterEditor, watch::Receiver<SaveState>)> {
    info!("Initializing editing session for story: {}", story_id);
    let notifier = Arc::new(WsNotifier::new(outgoing.clone()));
    let mut editor = ChapterEditor::new(
        story_id,
        app_state.chapters.clone(),
        notifier,
        app_state.config.autosave(),
    );

    match editor.load_chapters().await {
        Ok(chapters) => send(outgoing, ServerMessage::SessionInitialized {
            story_id,
            chapters: chapters.iter().map(ChapterSummary::from).collect(),
        }),
        Err(e) => {
            error!("Failed to initialize editing session: {:?}", e);
            send(outgoing, ServerMessage::Error {
                message: "Failed to load the story's chapters.".to_string(),
            });
            return None;
        }
    }
    if let Some(chapter_id) = initial_chapter {
        select_and_announce(&mut editor, chapter_id, outgoing).await;
    }

    let mut status = editor.subscribe();
    let initial = status.borrow_and_update().clone();
    send(outgoing, ServerMessage::save_state(&initial, Utc::now()));
    Some((editor, status))
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    editor: &mut ChapterEditor,
    outgoing: &UnboundedSender<ServerMessage>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => client_msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    match client_msg {
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
        }
        ClientMessage::ListChapters => {
            if editor.load_chapters().await.is_ok() {
                send(
                    outgoing,
                    ServerMessage::chapter_list(editor.chapters(), editor.selected_chapter_id()),
                );
            }
        }
        ClientMessage::SelectChapter { chapter_id } => {
            select_and_announce(editor, chapter_id, outgoing).await;
        }
        ClientMessage::CreateChapter => {
            // Failures are already reported through the notifier.
            if let Ok(chapter) = editor.create_chapter().await {
                send(outgoing, ServerMessage::ChapterSelected {
                    chapter: ChapterPayload::from(&chapter),
                });
                send(
                    outgoing,
                    ServerMessage::chapter_list(editor.chapters(), editor.selected_chapter_id()),
                );
            }
        }
        ClientMessage::DeleteChapter { chapter_id } => {
            if editor.delete_chapter(chapter_id).await.is_ok() {
                send(
                    outgoing,
                    ServerMessage::chapter_list(editor.chapters(), editor.selected_chapter_id()),
                );
            }
        }
        ClientMessage::UpdateTitle { title } => {
            editor.edit_title(title).await;
        }
        ClientMessage::UpdateContent { content } => {
            editor.edit_content(content).await;
            send(outgoing, ServerMessage::word_count(editor.word_count().await));
        }
        ClientMessage::Save => {
            // Off the message loop, so edits keep arriving while the save is in flight.
            let autosave = editor.autosave().clone();
            tokio::spawn(async move {
                if autosave.manual_save().await == SaveOutcome::AlreadySaving {
                    debug!("Save request ignored; a save is already in flight.");
                }
            });
        }
    }
}

async fn select_and_announce(
    editor: &mut ChapterEditor,
    chapter_id: Uuid,
    outgoing: &UnboundedSender<ServerMessage>,
) {
    match editor.select_chapter(chapter_id).await {
        Ok(chapter) => {
            send(outgoing, ServerMessage::ChapterSelected {
                chapter: ChapterPayload::from(&chapter),
            });
        }
        Err(e) => {
            warn!("Failed to select chapter {}: {}", chapter_id, e);
            send(outgoing, ServerMessage::Error {
                message: "Failed to load the chapter.".to_string(),
            });
        }
    }
}

fn send(outgoing: &UnboundedSender<ServerMessage>, msg: ServerMessage) {
    if outgoing.send(msg).is_err() {
        debug!("Outgoing queue closed; dropping message.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use quillify_core::memory::InMemoryChapterService;
    use quillify_core::ports::ChapterService;
    use quillify_core::AutosaveConfig;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Session {
        chapters: InMemoryChapterService,
        editor: ChapterEditor,
        outgoing: UnboundedSender<ServerMessage>,
        incoming: UnboundedReceiver<ServerMessage>,
    }

    async fn session() -> Session {
        let chapters = InMemoryChapterService::new();
        let story_id = Uuid::new_v4();
        chapters.seed(story_id, "One", Some("<p>first chapter</p>")).await;
        chapters.seed(story_id, "Two", None).await;

        let (outgoing, incoming) = mpsc::unbounded_channel();
        let mut editor = ChapterEditor::new(
            story_id,
            Arc::new(chapters.clone()),
            Arc::new(WsNotifier::new(outgoing.clone())),
            AutosaveConfig::default(),
        );
        editor.load_chapters().await.unwrap();
        Session { chapters, editor, outgoing, incoming }
    }

    impl Session {
        async fn send(&mut self, msg: Value) {
            handle_text_message(&msg.to_string(), &mut self.editor, &self.outgoing).await;
        }

        fn drain(&mut self) -> Vec<Value> {
            let mut received = Vec::new();
            while let Ok(msg) = self.incoming.try_recv() {
                received.push(serde_json::to_value(msg).unwrap());
            }
            received
        }
    }

    fn types(messages: &[Value]) -> Vec<&str> {
        messages.iter().filter_map(|m| m["type"].as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn opening_a_session_reports_the_initial_save_state() {
        let chapters = InMemoryChapterService::new();
        let story_id = Uuid::new_v4();
        let chapter = chapters.seed(story_id, "One", Some("<p>hello</p>")).await;
        let app_state = AppState {
            chapters: Arc::new(chapters),
            config: Arc::new(Config::from_lookup(|_| None).unwrap()),
        };

        let (outgoing, mut incoming) = mpsc::unbounded_channel();
        let (editor, status) = open_session(story_id, Some(chapter.id), &app_state, &outgoing)
            .await
            .unwrap();
        assert_eq!(editor.selected_chapter_id(), Some(chapter.id));
        assert!(!status.has_changed().unwrap());

        let mut received = Vec::new();
        while let Ok(msg) = incoming.try_recv() {
            received.push(serde_json::to_value(msg).unwrap());
        }
        assert_eq!(
            types(&received),
            ["session_initialized", "chapter_selected", "save_state"]
        );
        assert_eq!(received[2]["chapter_id"], chapter.id.to_string());
        assert_eq!(received[2]["status"], "idle");
    }

    #[tokio::test(start_paused = true)]
    async fn editing_flow_over_the_protocol() {
        let mut s = session().await;
        let one = s.editor.chapters()[0].id;
        let two = s.editor.chapters()[1].id;

        s.send(json!({ "type": "select_chapter", "chapter_id": one })).await;
        let received = s.drain();
        assert_eq!(types(&received), ["chapter_selected"]);
        assert_eq!(received[0]["chapter"]["word_count"], 2);

        s.send(json!({ "type": "update_content", "content": "<p>a new first chapter</p>" }))
            .await;
        let received = s.drain();
        assert_eq!(received[0]["type"], "word_count");
        assert_eq!(received[0]["words"], 4);

        // switching flushes the edit before loading chapter two
        s.send(json!({ "type": "select_chapter", "chapter_id": two })).await;
        let stored = s.chapters.get_chapter(one).await.unwrap();
        assert_eq!(stored.content.as_deref(), Some("<p>a new first chapter</p>"));
        assert_eq!(types(&s.drain()), ["chapter_selected"]);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_confirms_with_a_notification() {
        let mut s = session().await;
        let one = s.editor.chapters()[0].id;
        s.send(json!({ "type": "select_chapter", "chapter_id": one })).await;
        s.send(json!({ "type": "update_title", "title": "Prologue" })).await;
        s.drain();

        s.send(json!({ "type": "save" })).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let received = s.drain();
        assert_eq!(types(&received), ["notification"]);
        assert_eq!(received[0]["title"], "Chapter saved");
        assert_eq!(s.chapters.get_chapter(one).await.unwrap().title, "Prologue");
    }

    #[tokio::test(start_paused = true)]
    async fn creating_and_deleting_chapters_refreshes_the_list() {
        let mut s = session().await;

        s.send(json!({ "type": "create_chapter" })).await;
        let received = s.drain();
        assert_eq!(
            types(&received),
            ["notification", "chapter_selected", "chapter_list"]
        );
        assert_eq!(received[1]["chapter"]["title"], "Chapter 3");
        assert_eq!(received[2]["chapters"].as_array().unwrap().len(), 3);

        let created = s.editor.selected_chapter_id().unwrap();
        s.send(json!({ "type": "delete_chapter", "chapter_id": created })).await;
        let received = s.drain();
        assert_eq!(types(&received), ["notification", "chapter_list"]);
        assert_eq!(received[1]["selected_chapter_id"], Value::Null);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_chapters_and_garbage_are_handled_gracefully() {
        let mut s = session().await;
        s.send(json!({ "type": "select_chapter", "chapter_id": Uuid::new_v4() })).await;
        assert_eq!(types(&s.drain()), ["error"]);

        handle_text_message("not json", &mut s.editor, &s.outgoing).await;
        s.send(json!({ "type": "init", "story_id": Uuid::new_v4() })).await;
        assert!(s.drain().is_empty());
    }
}
