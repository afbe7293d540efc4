//! Prompt construction for persona turns.

use crate::roundtable::config::DiscussionSettings;
use crate::roundtable::persona::Persona;
use crate::roundtable::provider::{GenerationRequest, PromptMessage};
use crate::roundtable::session::DiscussionGoal;
use crate::roundtable::store::{Message, MessageKind};

/// Builds the request for `persona`'s next turn.
///
/// `history` is the tail of the conversation (the last `context_messages` messages). System
/// messages are dropped from it and the last `quoted_messages` of the rest are quoted as
/// `speaker: content` lines under the topic.
pub fn build_request(
    persona: &Persona,
    goal: &DiscussionGoal,
    topic: &str,
    history: &[Message],
    settings: &DiscussionSettings,
) -> GenerationRequest {
    let descriptor = persona.descriptor();
    let system = format!("{}\n\n{}", descriptor.system_prompt, goal.directive());

    let lines: Vec<String> = history
        .iter()
        .filter(|m| m.kind != MessageKind::System)
        .map(|m| format!("{}: {}", m.speaker, m.content))
        .collect();
    let quoted = &lines[lines.len().saturating_sub(settings.quoted_messages)..];

    let context = format!("Topic: {}", topic);
    let user = if quoted.is_empty() {
        format!("Discussion context: {}", context)
    } else {
        format!(
            "Discussion context: {}\n\nPrevious messages:\n{}",
            context,
            quoted.join("\n")
        )
    };

    GenerationRequest {
        persona: persona.id,
        model: None,
        messages: vec![PromptMessage::system(system), PromptMessage::user(user)],
        temperature: descriptor.temperature,
        max_tokens: descriptor.max_tokens,
    }
}
