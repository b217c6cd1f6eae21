//! Lifecycle event payloads and the in-process fan-out bus used by the demo
//! binary's [`crate::demo_gateway::DemoGateway`].
//!
//! The core playout engine only ever produces one of three fixed JSON
//! strings (SPEC_FULL.md §6); `EventBus` itself is adapted from the
//! teacher's broadcast-based `EventBus` (`events.rs`), narrowed down from a
//! rich room/participant/quality event taxonomy to these three.

use serde::Serialize;
use tokio::sync::broadcast;

/// Emitted once, before the playout loop begins.
pub const EVENT_START: &str = r#"{"play":"start"}"#;
/// Emitted when the index is exhausted or the session/recording ends the
/// loop without an explicit stop request.
pub const EVENT_ENDED: &str = r#"{"play":"ended"}"#;
/// Emitted when `stop_playing` caused the loop to exit.
pub const EVENT_STOPPED: &str = r#"{"play":"stopped"}"#;

/// A terminal/start event observed by the demo binary's event bus, wrapping
/// the fixed JSON string with the session/transaction it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackEvent {
    pub session_id: String,
    pub transaction: String,
    pub payload: String,
}

/// Broadcast-based fan-out channel for [`PlaybackEvent`], used internally by
/// the demo binary so its `/v1/events` SSE-style endpoint (or tests) can
/// observe lifecycle transitions without touching the control surface's
/// own return-code path.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn emit(&self, session_id: &str, transaction: &str, payload: &str) {
        let _ = self.tx.send(PlaybackEvent {
            session_id: session_id.to_string(),
            transaction: transaction.to_string(),
            payload: payload.to_string(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
