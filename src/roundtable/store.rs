//! Append-only conversation log.

use crate::roundtable::persona::PersonaId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Speaker name used for engine-generated messages.
pub const SYSTEM_SPEAKER: &str = "SYSTEM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Agent,
    System,
}

/// Where a message's content came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MessageOrigin {
    Human,
    System,
    Provider { provider: String, account: String },
    /// Simulated persona text produced after every provider failed.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: u64,
    pub session_id: String,
    pub speaker: String,
    pub kind: MessageKind,
    pub content: String,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaId>,
    pub origin: MessageOrigin,
}

/// Messages of one session, ordered by id.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: BTreeMap<u64, Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a finalized message. Returns `false`, leaving the store untouched, when the id is
    /// already present.
    pub fn append(&mut self, message: Message) -> bool {
        if self.messages.contains_key(&message.id) {
            log::warn!("message {} already stored, ignoring duplicate", message.id);
            return false;
        }
        self.messages.insert(message.id, message);
        true
    }

    pub fn get(&self, id: u64) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.values().skip(skip).cloned().collect()
    }

    pub fn by_round(&self, round: u32) -> Vec<Message> {
        self.messages
            .values()
            .filter(|m| m.round == round)
            .cloned()
            .collect()
    }

    pub fn by_kind(&self, kind: MessageKind) -> Vec<Message> {
        self.messages
            .values()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    pub fn count_kind(&self, kind: MessageKind) -> usize {
        self.messages.values().filter(|m| m.kind == kind).count()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: u64, kind: MessageKind, round: u32) -> Message {
        Message {
            id,
            session_id: "session_test".to_string(),
            speaker: "Alice".to_string(),
            kind,
            content: format!("message {}", id),
            round,
            timestamp: Utc::now(),
            persona: None,
            origin: MessageOrigin::Human,
        }
    }

    #[test]
    fn iteration_follows_id_order_regardless_of_append_order() {
        let mut store = MessageStore::new();
        store.append(message(3, MessageKind::Agent, 1));
        store.append(message(1, MessageKind::System, 0));
        store.append(message(2, MessageKind::Agent, 1));
        let ids: Vec<u64> = store.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = MessageStore::new();
        assert!(store.append(message(1, MessageKind::Human, 0)));
        let mut dup = message(1, MessageKind::Human, 0);
        dup.content = "changed".to_string();
        assert!(!store.append(dup));
        assert_eq!(store.get(1).unwrap().content, "message 1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn queries_filter_by_round_and_kind() {
        let mut store = MessageStore::new();
        store.append(message(1, MessageKind::System, 0));
        store.append(message(2, MessageKind::Human, 0));
        store.append(message(3, MessageKind::Agent, 1));
        store.append(message(4, MessageKind::Agent, 1));
        assert_eq!(store.by_round(1).len(), 2);
        assert_eq!(store.by_kind(MessageKind::Human).len(), 1);
        assert_eq!(store.count_kind(MessageKind::Agent), 2);
        let recent: Vec<u64> = store.recent(2).iter().map(|m| m.id).collect();
        assert_eq!(recent, vec![3, 4]);
        assert_eq!(store.recent(10).len(), 4);
    }
}
