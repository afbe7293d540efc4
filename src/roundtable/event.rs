//! Discussion event stream.
//!
//! A [`Discussion`](crate::roundtable::session::Discussion) reports everything that happens to
//! it through a single [`EventHandler`]. Events of one session arrive in order: for any
//! message id, `message_start` comes first, then its `message_chunk`s, then `message_end`.
//! Chunks of different ids may interleave while personas of the same round stream at once.
//!
//! Events serialize as `{"type": "...", "data": {...}}`, which is what a WebSocket bridge
//! forwards to clients.
//!
//! ```
//! use roundtable::event::DiscussionEvent;
//!
//! let event = DiscussionEvent::MessageChunk { id: 7, delta: "Why would ".to_string() };
//! assert_eq!(
//!     event.to_json(),
//!     serde_json::json!({ "type": "message_chunk", "data": { "id": 7, "delta": "Why would " } })
//! );
//! ```

use crate::roundtable::persona::PersonaId;
use crate::roundtable::session::EndReport;
use crate::roundtable::store::{Message, MessageKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DiscussionEvent {
    DiscussionStarted {
        session_id: String,
        topic: String,
        goal: String,
    },
    /// A message got its id; its content follows as chunks.
    MessageStart {
        id: u64,
        speaker: String,
        kind: MessageKind,
        round: u32,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        persona: Option<PersonaId>,
    },
    MessageChunk {
        id: u64,
        delta: String,
    },
    /// The streamed message is final and stored.
    MessageEnd(Message),
    /// A message that was stored without streaming (human and system messages).
    NewMessage(Message),
    /// These personas are about to generate their turn of `round`.
    AgentsThinking {
        round: u32,
        personas: Vec<PersonaId>,
    },
    DiscussionEnded(EndReport),
}

impl DiscussionEvent {
    /// The `type` field of the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            DiscussionEvent::DiscussionStarted { .. } => "discussion_started",
            DiscussionEvent::MessageStart { .. } => "message_start",
            DiscussionEvent::MessageChunk { .. } => "message_chunk",
            DiscussionEvent::MessageEnd(_) => "message_end",
            DiscussionEvent::NewMessage(_) => "new_message",
            DiscussionEvent::AgentsThinking { .. } => "agents_thinking",
            DiscussionEvent::DiscussionEnded(_) => "discussion_ended",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            log::error!("failed to serialize {} event: {}", self.name(), e);
            serde_json::json!({ "type": self.name(), "data": null })
        })
    }
}

/// Receives discussion events. The default implementation ignores them.
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use roundtable::event::{DiscussionEvent, EventHandler};
///
/// struct Printer;
///
/// #[async_trait]
/// impl EventHandler for Printer {
///     async fn on_discussion_event(&self, event: &DiscussionEvent) {
///         if let DiscussionEvent::MessageChunk { delta, .. } = event {
///             print!("{}", delta);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_discussion_event(&self, _event: &DiscussionEvent) {}
}

/// Handler that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventHandler;

#[async_trait]
impl EventHandler for NoopEventHandler {}
