//! The seam between the router and concrete text-generation backends.
//!
//! A [`ProviderAdapter`] turns a [`GenerationRequest`] into a [`ChunkStream`] of incremental
//! output. Adapters only report failures; quota accounting, cool-downs and fallback belong to
//! the [`ProviderRouter`](crate::roundtable::router::ProviderRouter).

use crate::roundtable::config::ProviderAccount;
use crate::roundtable::error::ProviderError;
use crate::roundtable::persona::PersonaId;
use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;

/// Role of a prompt message in a chat-completions request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// Everything an adapter needs to produce one persona turn.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub persona: PersonaId,
    /// Model override; adapters use their own default when `None`.
    pub model: Option<String>,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A piece of streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderChunk {
    /// The incremental content in this chunk.
    pub content: String,
    /// Whether this is the final chunk in the stream.
    pub is_final: bool,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ProviderChunk, ProviderError>> + Send>>;

/// A text-generation backend reachable under one provider name.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name as used in affinity chains and accounts.
    fn name(&self) -> &str;

    /// Starts a generation using `account`'s credential.
    async fn generate(
        &self,
        request: GenerationRequest,
        account: &ProviderAccount,
    ) -> Result<ChunkStream, ProviderError>;
}

/// Splits a whole text into deltas of `words_per_chunk` words each.
///
/// Whitespace is preserved exactly: each delta carries the whitespace that follows its last
/// word, and leading whitespace stays in the first delta, so concatenating the result gives
/// back `text`.
///
/// ```
/// use roundtable::provider::split_into_deltas;
///
/// let deltas = split_into_deltas("one two  three four five\nsix", 4);
/// assert_eq!(deltas, vec!["one two  three four ", "five\nsix"]);
/// assert_eq!(deltas.concat(), "one two  three four five\nsix");
/// ```
pub fn split_into_deltas(text: &str, words_per_chunk: usize) -> Vec<String> {
    let per_chunk = words_per_chunk.max(1);
    let mut deltas = Vec::new();
    let mut start = 0;
    let mut words = 0;
    let mut in_word = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
            continue;
        }
        if !in_word {
            in_word = true;
            if words == per_chunk {
                deltas.push(text[start..i].to_string());
                start = i;
                words = 0;
            }
            words += 1;
        }
    }
    if start < text.len() {
        deltas.push(text[start..].to_string());
    }
    deltas
}

/// Wraps a complete text as a stream, for backends that do not stream.
pub fn whole_text_stream(text: &str, words_per_chunk: usize) -> ChunkStream {
    let deltas = split_into_deltas(text, words_per_chunk);
    let last = deltas.len().saturating_sub(1);
    let chunks: Vec<Result<ProviderChunk, ProviderError>> = deltas
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            Ok(ProviderChunk {
                content,
                is_final: i == last,
            })
        })
        .collect();
    Box::pin(futures_util::stream::iter(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn split_handles_edges() {
        assert!(split_into_deltas("", 4).is_empty());
        assert_eq!(split_into_deltas("   ", 4), vec!["   "]);
        assert_eq!(split_into_deltas("  lead", 4), vec!["  lead"]);
        assert_eq!(split_into_deltas("a b c", 0), vec!["a ", "b ", "c"]);
    }

    #[test]
    fn split_keeps_unicode_intact() {
        let text = "Über naïve café résumé déjà vu";
        let deltas = split_into_deltas(text, 2);
        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas.concat(), text);
    }

    #[tokio::test]
    async fn whole_text_stream_marks_last_chunk_final() {
        let chunks: Vec<ProviderChunk> = whole_text_stream("a b c d e f g h i", 4)
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks[2].is_final);
        assert!(!chunks[0].is_final);
    }
}
