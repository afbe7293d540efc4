//! Discussion personas.
//!
//! A persona is identified by a [`PersonaId`] and described by a static
//! [`PersonaDescriptor`] table; there is no lookup by display name. The only per-deployment
//! part of a persona is its affinity chain, the ordered list of (provider, account) targets
//! the router walks when the persona speaks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed roster of discussion personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    Skeptic,
    Synthesizer,
    Analyst,
    Explorer,
}

impl PersonaId {
    /// Every persona, in default roster order.
    pub const ALL: [PersonaId; 4] = [
        PersonaId::Skeptic,
        PersonaId::Synthesizer,
        PersonaId::Analyst,
        PersonaId::Explorer,
    ];

    pub fn descriptor(self) -> &'static PersonaDescriptor {
        match self {
            PersonaId::Skeptic => &DESCRIPTORS[0],
            PersonaId::Synthesizer => &DESCRIPTORS[1],
            PersonaId::Analyst => &DESCRIPTORS[2],
            PersonaId::Explorer => &DESCRIPTORS[3],
        }
    }

    /// Stable snake_case key, e.g. `"skeptic"`.
    pub fn key(self) -> &'static str {
        self.descriptor().key
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Static description of a persona.
#[derive(Debug)]
pub struct PersonaDescriptor {
    pub key: &'static str,
    /// Name shown as the message speaker.
    pub display_name: &'static str,
    pub role: &'static str,
    /// Every reply of this persona starts with this tag.
    pub role_tag: &'static str,
    pub system_prompt: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Canned replies used when no provider can serve the persona. `{topic}` is substituted.
    pub simulated_replies: &'static [&'static str],
}

static DESCRIPTORS: [PersonaDescriptor; 4] = [
    PersonaDescriptor {
        key: "skeptic",
        display_name: "Dr. Skeptic",
        role: "Critical Analyst",
        role_tag: "[SKEPTIC]",
        system_prompt: "You are Dr. Skeptic, a rigorous critical thinker whose role is to question \
assumptions, identify logical flaws, and challenge weak arguments. Your approach is:\n\n\
- Question every claim and ask for evidence\n\
- Identify logical fallacies and inconsistencies\n\
- Point out missing information or alternative explanations\n\
- Challenge groupthink and popular opinions\n\
- Ask probing questions that others might miss\n\
- Remain respectful but intellectually rigorous\n\n\
Always start your responses with your role identifier: \"[SKEPTIC]\"\n\
Be thorough but concise. Focus on substance over style.",
        temperature: 0.3,
        max_tokens: 500,
        simulated_replies: &[
            "I question the assumptions underlying {topic}. What evidence supports this position?",
            "This raises several red flags. Have we considered the potential downsides of {topic}?",
            "I'm not convinced by this argument. What alternative explanations might exist?",
            "The claims about {topic} seem overstated. What data backs this up?",
        ],
    },
    PersonaDescriptor {
        key: "synthesizer",
        display_name: "Dr. Synthesis",
        role: "Integrative Thinker",
        role_tag: "[SYNTHESIZER]",
        system_prompt: "You are Dr. Synthesis, a collaborative thinker who builds bridges between \
ideas and finds common ground. Your approach is:\n\n\
- Connect different viewpoints and find shared elements\n\
- Build upon others' ideas constructively\n\
- Identify patterns and relationships across arguments\n\
- Propose integrated solutions that address multiple concerns\n\
- Highlight agreements and resolve apparent contradictions\n\
- Summarize key insights and consensus points\n\n\
Always start your responses with your role identifier: \"[SYNTHESIZER]\"\n\
Focus on finding connections and building comprehensive understanding.",
        temperature: 0.5,
        max_tokens: 500,
        simulated_replies: &[
            "I see interesting connections between the points raised about {topic}.",
            "Building on the previous discussion, we might find common ground in {topic}.",
            "The various viewpoints about {topic} actually complement each other in several ways.",
            "I notice patterns emerging from our discussion of {topic} that deserve a closer look.",
        ],
    },
    PersonaDescriptor {
        key: "analyst",
        display_name: "Dr. Data",
        role: "Evidence-Based Researcher",
        role_tag: "[ANALYST]",
        system_prompt: "You are Dr. Data, a methodical analyst who grounds discussions in facts, \
research, and empirical evidence. Your approach is:\n\n\
- Provide relevant statistics, studies, and data\n\
- Reference credible sources and research findings\n\
- Analyze trends and quantitative information\n\
- Fact-check claims made by others\n\
- Present objective, data-driven perspectives\n\
- Identify what evidence is missing or needed\n\n\
Always start your responses with your role identifier: \"[ANALYST]\"\n\
Prioritize accuracy and cite sources when possible.",
        temperature: 0.2,
        max_tokens: 600,
        simulated_replies: &[
            "Looking at the evidence on {topic}, we need measurable indicators before drawing conclusions.",
            "The available data on {topic} is mixed. Which sources are we relying on?",
            "Before going further on {topic}, we should separate anecdotes from systematic studies.",
            "A quantitative view of {topic} would help. What baseline are we comparing against?",
        ],
    },
    PersonaDescriptor {
        key: "explorer",
        display_name: "Dr. Discovery",
        role: "Creative Visionary",
        role_tag: "[EXPLORER]",
        system_prompt: "You are Dr. Discovery, an innovative thinker who brings creativity, novel \
perspectives, and unconventional approaches to discussions. Your approach is:\n\n\
- Generate creative and original ideas\n\
- Think outside conventional frameworks\n\
- Propose innovative solutions and alternatives\n\
- Ask \"what if\" questions that open new directions\n\
- Challenge conventional wisdom with fresh perspectives\n\
- Imagine future possibilities and scenarios\n\n\
Always start your responses with your role identifier: \"[EXPLORER]\"\n\
Be imaginative while remaining grounded in logic.",
        temperature: 0.8,
        max_tokens: 500,
        simulated_replies: &[
            "What if we looked at {topic} from a completely different angle?",
            "Imagine how {topic} might look ten years from now. What would surprise us?",
            "There may be an unconventional path through {topic} that nobody has tried yet.",
            "Let's challenge the framing of {topic} itself. What are we taking for granted?",
        ],
    },
];

/// One (provider, account) candidate in a persona's fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffinityTarget {
    pub provider: String,
    pub account: String,
    /// Overrides the endpoint's default model for this persona.
    #[serde(default)]
    pub model: Option<String>,
}

impl AffinityTarget {
    pub fn new(provider: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            account: account.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A configured persona: its identity plus its ordered affinity chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub affinity: Vec<AffinityTarget>,
}

impl Persona {
    pub fn new(id: PersonaId, affinity: Vec<AffinityTarget>) -> Self {
        Self { id, affinity }
    }

    pub fn descriptor(&self) -> &'static PersonaDescriptor {
        self.id.descriptor()
    }

    pub fn display_name(&self) -> &'static str {
        self.id.descriptor().display_name
    }
}

/// Makes sure a reply begins with the persona's role tag while text is streamed.
///
/// Deltas are fed one at a time. While the opening of the reply could still turn into the
/// tag, output is held back; once it is decided, the tag (plus a space) is emitted ahead of
/// the reply if it was missing and everything afterwards passes through unchanged. The
/// concatenation of all returned pieces always equals [`RoleTagger::apply`] on the full text.
///
/// ```
/// use roundtable::persona::RoleTagger;
///
/// let mut tagger = RoleTagger::new("[SKEPTIC]");
/// let mut out = String::new();
/// for delta in ["Why ", "would ", "that ", "hold?"] {
///     if let Some(piece) = tagger.feed(delta) {
///         out.push_str(&piece);
///     }
/// }
/// out.push_str(&tagger.finish().unwrap_or_default());
/// assert_eq!(out, "[SKEPTIC] Why would that hold?");
/// assert_eq!(out, RoleTagger::apply("[SKEPTIC]", "Why would that hold?"));
/// ```
#[derive(Debug)]
pub struct RoleTagger {
    tag: &'static str,
    pending: String,
    decided: bool,
}

impl RoleTagger {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            pending: String::new(),
            decided: false,
        }
    }

    /// Whole-text form of the tagging rule. Leading whitespace before a tag the model
    /// already wrote is left alone.
    pub fn apply(tag: &str, text: &str) -> String {
        if text.trim_start().starts_with(tag) {
            text.to_string()
        } else {
            format!("{} {}", tag, text)
        }
    }

    /// Feed the next delta; returns the text to forward, if any.
    pub fn feed(&mut self, delta: &str) -> Option<String> {
        if self.decided {
            return if delta.is_empty() {
                None
            } else {
                Some(delta.to_string())
            };
        }

        self.pending.push_str(delta);
        let opening = self.pending.trim_start();
        if opening.starts_with(self.tag) {
            self.decided = true;
            return Some(std::mem::take(&mut self.pending));
        }
        if self.tag.starts_with(opening) {
            // still a possible prefix of the tag
            return None;
        }
        self.decided = true;
        let pending = std::mem::take(&mut self.pending);
        Some(format!("{} {}", self.tag, pending))
    }

    /// Flush whatever is still held back at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.decided {
            return None;
        }
        self.decided = true;
        let pending = std::mem::take(&mut self.pending);
        Some(Self::apply(self.tag, &pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tag: &'static str, deltas: &[&str]) -> String {
        let mut tagger = RoleTagger::new(tag);
        let mut out = String::new();
        for d in deltas {
            if let Some(piece) = tagger.feed(d) {
                out.push_str(&piece);
            }
        }
        if let Some(rest) = tagger.finish() {
            out.push_str(&rest);
        }
        out
    }

    #[test]
    fn tag_already_present_is_kept_as_is() {
        let out = run("[ANALYST]", &["[ANA", "LYST] The ", "numbers say otherwise."]);
        assert_eq!(out, "[ANALYST] The numbers say otherwise.");
    }

    #[test]
    fn tag_is_prepended_when_missing() {
        let out = run("[EXPLORER]", &["What ", "if?"]);
        assert_eq!(out, "[EXPLORER] What if?");
    }

    #[test]
    fn partial_tag_prefix_that_diverges_is_prepended() {
        let deltas = ["[EXP", "ERIMENT] try it"];
        let out = run("[EXPLORER]", &deltas);
        assert_eq!(out, RoleTagger::apply("[EXPLORER]", "[EXPERIMENT] try it"));
    }

    #[test]
    fn leading_whitespace_before_tag_is_not_retagged() {
        let out = run("[SKEPTIC]", &["\n", "[SKEP", "TIC] leading newline from model"]);
        assert_eq!(out, "\n[SKEPTIC] leading newline from model");
        assert_eq!(out, RoleTagger::apply("[SKEPTIC]", &out));
        assert_eq!(
            RoleTagger::apply("[SKEPTIC]", " [SKEPTIC] hi"),
            " [SKEPTIC] hi"
        );
    }

    #[test]
    fn leading_whitespace_without_tag_gets_tagged_once() {
        let out = run("[ANALYST]", &["  ", "  Data first."]);
        assert_eq!(out, "[ANALYST]     Data first.");
        assert_eq!(out, RoleTagger::apply("[ANALYST]", "    Data first."));
    }

    #[test]
    fn empty_reply_still_gets_tag() {
        assert_eq!(run("[SKEPTIC]", &[]), "[SKEPTIC] ");
    }

    #[test]
    fn descriptor_table_matches_ids() {
        for id in PersonaId::ALL {
            assert_eq!(id.descriptor().key, id.key());
            assert!(id.descriptor().system_prompt.contains(id.descriptor().role_tag));
            assert!(!id.descriptor().simulated_replies.is_empty());
        }
    }
}
