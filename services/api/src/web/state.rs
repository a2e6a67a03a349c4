//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-connection notifier.

use crate::config::Config;
use crate::web::protocol::ServerMessage;
use quillify_core::ports::{ChapterService, NotificationService};
use quillify_core::Notification;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub chapters: Arc<dyn ChapterService>,
    pub config: Arc<Config>,
}

//=========================================================================================
// Notifications for One WebSocket Connection
//=========================================================================================

/// Forwards notifications to the connection's outgoing message queue.
pub struct WsNotifier {
    outgoing: UnboundedSender<ServerMessage>,
}

impl WsNotifier {
    pub fn new(outgoing: UnboundedSender<ServerMessage>) -> Self {
        Self { outgoing }
    }
}

impl NotificationService for WsNotifier {
    fn notify(&self, notification: Notification) {
        if self.outgoing.send(notification.into()).is_err() {
            debug!("Dropping notification for a closed connection");
        }
    }
}
