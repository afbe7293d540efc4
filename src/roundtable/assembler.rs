//! Streaming message assembly.
//!
//! The assembler turns incremental output into addressable messages. `start` hands out the
//! next id of the session and opens a buffer, `chunk` appends to it and `end` closes it into
//! a finalized [`Message`]. Ids are allocated when a message *starts*, so messages that stream
//! at the same time still get ids in the order they were opened.
//!
//! Concatenating every chunk accepted for an id yields the `final_content` passed to its
//! `end`; a mismatch is logged. Closing an id twice is a no-op.

use crate::roundtable::event::DiscussionEvent;
use crate::roundtable::persona::PersonaId;
use crate::roundtable::store::{Message, MessageKind, MessageOrigin};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;

/// Metadata of a message about to stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub speaker: String,
    pub kind: MessageKind,
    pub round: u32,
    pub persona: Option<PersonaId>,
    pub origin: MessageOrigin,
    pub timestamp: DateTime<Utc>,
}

/// Why a chunk was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRejected {
    UnknownId(u64),
    AlreadyFinalized(u64),
}

impl fmt::Display for ChunkRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkRejected::UnknownId(id) => write!(f, "no open message with id {}", id),
            ChunkRejected::AlreadyFinalized(id) => write!(f, "message {} is already closed", id),
        }
    }
}

impl Error for ChunkRejected {}

#[derive(Debug)]
struct OpenMessage {
    draft: MessageDraft,
    buffer: String,
}

/// Id allocator and open-buffer table of one session.
#[derive(Debug)]
pub struct MessageAssembler {
    session_id: String,
    next_id: u64,
    open: HashMap<u64, OpenMessage>,
    closed: HashSet<u64>,
}

impl MessageAssembler {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            next_id: 1,
            open: HashMap::new(),
            closed: HashSet::new(),
        }
    }

    /// Hands out the next message id. Used directly for messages that do not stream.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Builds a finalized message under a fresh id without opening a buffer.
    pub fn complete(&mut self, draft: MessageDraft, content: impl Into<String>) -> Message {
        let id = self.allocate_id();
        self.closed.insert(id);
        self.finalize(id, draft, content.into())
    }

    pub fn start(&mut self, draft: MessageDraft) -> (u64, DiscussionEvent) {
        let id = self.allocate_id();
        let event = DiscussionEvent::MessageStart {
            id,
            speaker: draft.speaker.clone(),
            kind: draft.kind,
            round: draft.round,
            timestamp: draft.timestamp,
            persona: draft.persona,
        };
        self.open.insert(
            id,
            OpenMessage {
                draft,
                buffer: String::new(),
            },
        );
        (id, event)
    }

    pub fn chunk(&mut self, id: u64, delta: &str) -> Result<DiscussionEvent, ChunkRejected> {
        match self.open.get_mut(&id) {
            Some(open) => {
                open.buffer.push_str(delta);
                Ok(DiscussionEvent::MessageChunk {
                    id,
                    delta: delta.to_string(),
                })
            }
            None if self.closed.contains(&id) => Err(ChunkRejected::AlreadyFinalized(id)),
            None => Err(ChunkRejected::UnknownId(id)),
        }
    }

    /// Closes `id` with `final_content`. Returns `None` if it was not open.
    pub fn end(&mut self, id: u64, final_content: impl Into<String>) -> Option<Message> {
        let open = self.open.remove(&id)?;
        self.closed.insert(id);
        let final_content = final_content.into();
        if open.buffer != final_content {
            log::warn!(
                "message {}: streamed {} bytes but final content has {}",
                id,
                open.buffer.len(),
                final_content.len()
            );
        }
        Some(self.finalize(id, open.draft, final_content))
    }

    /// Drops an open buffer without producing a message.
    pub fn abort(&mut self, id: u64) -> bool {
        if self.open.remove(&id).is_some() {
            self.closed.insert(id);
            true
        } else {
            false
        }
    }

    /// Drops every open buffer, e.g. when the session ends mid-round.
    pub fn abort_all(&mut self) -> usize {
        let ids: Vec<u64> = self.open.keys().copied().collect();
        for id in &ids {
            self.abort(*id);
        }
        ids.len()
    }

    pub fn buffered(&self, id: u64) -> Option<&str> {
        self.open.get(&id).map(|o| o.buffer.as_str())
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn finalize(&self, id: u64, draft: MessageDraft, content: String) -> Message {
        Message {
            id,
            session_id: self.session_id.clone(),
            speaker: draft.speaker,
            kind: draft.kind,
            content,
            round: draft.round,
            timestamp: draft.timestamp,
            persona: draft.persona,
            origin: draft.origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(speaker: &str) -> MessageDraft {
        MessageDraft {
            speaker: speaker.to_string(),
            kind: MessageKind::Agent,
            round: 1,
            persona: Some(PersonaId::Analyst),
            origin: MessageOrigin::Degraded,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn chunks_accumulate_until_end() {
        let mut assembler = MessageAssembler::new("session_a");
        let (id, _) = assembler.start(draft("Dr. Data"));
        for delta in ["[ANALYST] ", "The data ", "is thin."] {
            assembler.chunk(id, delta).unwrap();
        }
        assert_eq!(assembler.buffered(id), Some("[ANALYST] The data is thin."));
        let message = assembler.end(id, "[ANALYST] The data is thin.").unwrap();
        assert_eq!(message.content, "[ANALYST] The data is thin.");
        assert_eq!(message.session_id, "session_a");
        assert_eq!(assembler.open_count(), 0);
    }

    #[test]
    fn ids_follow_start_order_across_interleaved_streams() {
        let mut assembler = MessageAssembler::new("s");
        let (first, _) = assembler.start(draft("A"));
        let (second, _) = assembler.start(draft("B"));
        assembler.chunk(second, "b").unwrap();
        assembler.chunk(first, "a").unwrap();
        let b = assembler.end(second, "b").unwrap();
        let a = assembler.end(first, "a").unwrap();
        assert!(a.id < b.id);
    }

    #[test]
    fn duplicate_end_is_a_no_op() {
        let mut assembler = MessageAssembler::new("s");
        let (id, _) = assembler.start(draft("A"));
        assert!(assembler.end(id, "").is_some());
        assert!(assembler.end(id, "").is_none());
        assert_eq!(
            assembler.chunk(id, "late"),
            Err(ChunkRejected::AlreadyFinalized(id))
        );
        assert_eq!(assembler.chunk(99, "x"), Err(ChunkRejected::UnknownId(99)));
    }

    #[test]
    fn aborted_buffers_never_finalize() {
        let mut assembler = MessageAssembler::new("s");
        let (id, _) = assembler.start(draft("A"));
        assembler.chunk(id, "partial").unwrap();
        assert!(assembler.abort(id));
        assert!(assembler.end(id, "partial").is_none());
        let (next, _) = assembler.start(draft("B"));
        assert_eq!(next, id + 1);
        assert_eq!(assembler.abort_all(), 1);
    }
}
