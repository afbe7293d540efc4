//! The discussion session state machine.
//!
//! A [`Discussion`] moves `Created → Active → Ended`. While active, humans add messages with
//! [`Discussion::add_message`] and personas answer in rounds driven by
//! [`Discussion::generate_next_round`]. Each round asks the [`TurnScheduler`] who speaks,
//! spawns one tokio task per chosen persona, and lets every task stream its reply through the
//! [`MessageAssembler`] into the [`MessageStore`].
//!
//! All session state lives behind one async mutex. A round task takes it once per assembler
//! step (start, each chunk, end), so concurrent streams interleave chunk by chunk but never
//! mix. Rounds themselves are serialized by a separate gate; `add_message` and `end` only
//! need the state lock and therefore go through while personas are still generating.
//!
//! `end` and `reset` bump the session *epoch*. A task re-checks status and epoch under the
//! lock at every step and drops its buffer as soon as either changed, so output that arrives
//! after the discussion closed is discarded rather than stored.
//!
//! Events are queued under the state lock and handed to the [`EventHandler`] once it is
//! released, so a handler can query the session it listens to.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roundtable::clock::SystemClock;
//! use roundtable::config::RoundtableConfig;
//! use roundtable::quota::QuotaLedger;
//! use roundtable::router::ProviderRouter;
//! use roundtable::session::{Discussion, DiscussionGoal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     roundtable::init_logger();
//!     let config = RoundtableConfig::default();
//!     let ledger = Arc::new(QuotaLedger::new(
//!         &config.accounts,
//!         Arc::new(SystemClock),
//!         config.router.cooldown(),
//!     ));
//!     let router = Arc::new(ProviderRouter::new(&config, ledger).with_openai_compatible_adapters());
//!     let discussion = Discussion::new(&config, router)?;
//!
//!     discussion.start("Should cities ban cars?", DiscussionGoal::StressTest).await?;
//!     discussion.add_message("Ana", "What about deliveries?").await?;
//!     let report = discussion.generate_next_round().await?;
//!     for message in report.messages {
//!         println!("{}: {}", message.speaker, message.content);
//!     }
//!     discussion.end().await?;
//!     Ok(())
//! }
//! ```

use crate::roundtable::assembler::{MessageAssembler, MessageDraft};
use crate::roundtable::clock::{Clock, SystemClock};
use crate::roundtable::config::{DiscussionSettings, RoundtableConfig};
use crate::roundtable::error::{ConfigError, DiscussionError, SessionError};
use crate::roundtable::event::{DiscussionEvent, EventHandler, NoopEventHandler};
use crate::roundtable::persona::{Persona, PersonaId, RoleTagger};
use crate::roundtable::prompt::build_request;
use crate::roundtable::provider::GenerationRequest;
use crate::roundtable::quota::{CostEstimate, UsageSummary};
use crate::roundtable::router::ProviderRouter;
use crate::roundtable::scheduler::{Participation, ParticipationLedger, TurnScheduler};
use crate::roundtable::store::{Message, MessageKind, MessageOrigin, MessageStore, SYSTEM_SPEAKER};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Active,
    Ended,
}

/// What the discussion is steering toward. Each goal adds a directive to persona prompts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DiscussionGoal {
    #[default]
    Explore,
    Outline,
    StressTest,
    Custom(String),
}

impl DiscussionGoal {
    /// Parses `"explore"`, `"outline"` or `"stress_test"`; any other non-blank text becomes
    /// [`DiscussionGoal::Custom`] and blank text the default.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "explore" => DiscussionGoal::Explore,
            "outline" => DiscussionGoal::Outline,
            "stress_test" | "stress-test" => DiscussionGoal::StressTest,
            _ => DiscussionGoal::Custom(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DiscussionGoal::Explore => "explore",
            DiscussionGoal::Outline => "outline",
            DiscussionGoal::StressTest => "stress_test",
            DiscussionGoal::Custom(text) => text,
        }
    }

    pub fn directive(&self) -> String {
        match self {
            DiscussionGoal::Explore => {
                "Goal: explore the topic broadly and surface perspectives and open questions."
                    .to_string()
            }
            DiscussionGoal::Outline => {
                "Goal: work toward a structured outline of the topic's key points.".to_string()
            }
            DiscussionGoal::StressTest => {
                "Goal: stress-test the ideas under discussion by probing for weaknesses and failure modes."
                    .to_string()
            }
            DiscussionGoal::Custom(text) => format!("Goal: {}", text),
        }
    }
}

impl fmt::Display for DiscussionGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DiscussionGoal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome of one successful `generate_next_round`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport {
    pub round: u32,
    /// Messages stored this round, in id order.
    pub messages: Vec<Message>,
    /// How many of them are degraded responses.
    pub degraded: usize,
    /// Turns dropped because the session ended or reset mid-round.
    pub discarded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participants {
    pub agents: Vec<String>,
    pub humans: Vec<String>,
}

/// Final account of a discussion, produced by `end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndReport {
    pub session_id: String,
    pub topic: String,
    pub total_messages: usize,
    pub rounds: u32,
    pub summary: String,
    pub participants: Participants,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentParticipation {
    pub persona: PersonaId,
    pub name: String,
    pub responses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub status: SessionStatus,
    pub session_id: String,
    pub topic: String,
    pub goal: DiscussionGoal,
    pub round: u32,
    pub max_rounds: u32,
    pub total_messages: usize,
    pub agent_participation: Vec<AgentParticipation>,
    pub human_participants: Vec<String>,
    pub api_usage: UsageSummary,
    pub cost_estimate: CostEstimate,
}

/// Everything needed to persist or export a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub topic: String,
    pub goal: DiscussionGoal,
    pub status: SessionStatus,
    pub round: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub messages: Vec<Message>,
    pub participation: Vec<Participation>,
    pub human_participants: Vec<String>,
}

struct SessionState {
    session_id: String,
    topic: String,
    goal: DiscussionGoal,
    status: SessionStatus,
    round: u32,
    started_at: Option<DateTime<Utc>>,
    epoch: u64,
    store: MessageStore,
    assembler: MessageAssembler,
    participation: ParticipationLedger,
    humans: Vec<String>,
}

impl SessionState {
    fn new(roster: &[PersonaId], epoch: u64) -> Self {
        let session_id = new_session_id();
        Self {
            assembler: MessageAssembler::new(session_id.clone()),
            session_id,
            topic: String::new(),
            goal: DiscussionGoal::default(),
            status: SessionStatus::Created,
            round: 0,
            started_at: None,
            epoch,
            store: MessageStore::new(),
            participation: ParticipationLedger::new(roster),
            humans: Vec::new(),
        }
    }

    fn require_active(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Active {
            Ok(())
        } else {
            Err(SessionError::NotActive)
        }
    }

    /// Whether a round task started under `epoch` may still touch this session.
    fn accepts(&self, epoch: u64) -> bool {
        self.status == SessionStatus::Active && self.epoch == epoch
    }

    fn summary(&self) -> String {
        format!(
            "Discussion on '{}' with {} agent contributions and {} human contributions across {} rounds.",
            self.topic,
            self.store.count_kind(MessageKind::Agent),
            self.store.count_kind(MessageKind::Human),
            self.round
        )
    }

    fn system_message(&mut self, content: String, now: DateTime<Utc>) -> Message {
        let draft = MessageDraft {
            speaker: SYSTEM_SPEAKER.to_string(),
            kind: MessageKind::System,
            round: self.round,
            persona: None,
            origin: MessageOrigin::System,
            timestamp: now,
        };
        let message = self.assembler.complete(draft, content);
        self.store.append(message.clone());
        message
    }
}

fn new_session_id() -> String {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}

/// Events waiting to be handed to the [`EventHandler`].
///
/// Events are queued while the session lock is held, so the queue order is the order in
/// which state changed. They are delivered after the lock is released; a handler may call
/// back into the session. Only one task delivers at a time, and a task that finds delivery
/// busy leaves its events to the active deliverer.
#[derive(Default)]
struct EventOutbox {
    queue: std::sync::Mutex<VecDeque<DiscussionEvent>>,
    delivering: Mutex<()>,
}

impl EventOutbox {
    fn push(&self, event: DiscussionEvent) {
        self.queue
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(event);
    }

    fn pop(&self) -> Option<DiscussionEvent> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner()).pop_front()
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().unwrap_or_else(|p| p.into_inner()).is_empty()
    }
}

/// Handles shared between the session and its round tasks.
#[derive(Clone)]
struct TurnContext {
    state: Arc<Mutex<SessionState>>,
    router: Arc<ProviderRouter>,
    events: Arc<dyn EventHandler>,
    outbox: Arc<EventOutbox>,
    clock: Arc<dyn Clock>,
}

enum TurnOutcome {
    Stored { message: Message, degraded: bool },
    Discarded,
}

impl TurnContext {
    /// Queues `event`; call while holding the state lock.
    fn queue(&self, event: DiscussionEvent) {
        self.outbox.push(event);
    }

    /// Delivers queued events. Must not be called with the state lock held.
    async fn flush(&self) {
        loop {
            let Ok(guard) = self.outbox.delivering.try_lock() else {
                return;
            };
            while let Some(event) = self.outbox.pop() {
                self.events.on_discussion_event(&event).await;
            }
            drop(guard);
            // an event queued while we held the guard may have found delivery busy
            if self.outbox.is_empty() {
                return;
            }
        }
    }

    /// Locks the state if the task's epoch is still current.
    async fn lock_live(&self, epoch: u64) -> Option<MutexGuard<'_, SessionState>> {
        let state = self.state.lock().await;
        if state.accepts(epoch) {
            Some(state)
        } else {
            None
        }
    }

    async fn run_turn(
        self,
        persona: Persona,
        request: GenerationRequest,
        topic: String,
        round: u32,
        epoch: u64,
    ) -> TurnOutcome {
        let generation = self.router.generate(&persona, request, &topic, round).await;
        let degraded = generation.is_degraded();
        let tag = persona.descriptor().role_tag;
        let final_content = RoleTagger::apply(tag, &generation.text());

        let id = {
            let Some(mut state) = self.lock_live(epoch).await else {
                log::info!("{}: discarding reply, session closed", persona.id);
                return TurnOutcome::Discarded;
            };
            let (id, event) = state.assembler.start(MessageDraft {
                speaker: persona.display_name().to_string(),
                kind: MessageKind::Agent,
                round,
                persona: Some(persona.id),
                origin: generation.origin().clone(),
                timestamp: self.clock.now(),
            });
            self.queue(event);
            id
        };
        self.flush().await;

        let mut tagger = RoleTagger::new(tag);
        let pieces = generation
            .deltas()
            .iter()
            .filter_map(|delta| tagger.feed(delta))
            .collect::<Vec<_>>()
            .into_iter()
            .chain(tagger.finish());

        for piece in pieces {
            {
                let mut state = self.state.lock().await;
                if !state.accepts(epoch) {
                    state.assembler.abort(id);
                    log::info!("{}: dropping message {} mid-stream", persona.id, id);
                    return TurnOutcome::Discarded;
                }
                match state.assembler.chunk(id, &piece) {
                    Ok(event) => self.queue(event),
                    Err(rejected) => {
                        log::warn!("{}: {}", persona.id, rejected);
                        return TurnOutcome::Discarded;
                    }
                }
            }
            self.flush().await;
        }

        let message = {
            let mut state = self.state.lock().await;
            if !state.accepts(epoch) {
                state.assembler.abort(id);
                return TurnOutcome::Discarded;
            }
            let Some(message) = state.assembler.end(id, final_content) else {
                return TurnOutcome::Discarded;
            };
            if !state.store.append(message.clone()) {
                return TurnOutcome::Discarded;
            }
            state.participation.record(persona.id);
            self.queue(DiscussionEvent::MessageEnd(message.clone()));
            message
        };
        self.flush().await;
        TurnOutcome::Stored { message, degraded }
    }
}

/// One discussion session.
pub struct Discussion {
    ctx: TurnContext,
    round_gate: Mutex<()>,
    roster: Vec<Persona>,
    settings: DiscussionSettings,
    scheduler: TurnScheduler,
}

impl Discussion {
    /// Creates a session in the `Created` state.
    pub fn new(config: &RoundtableConfig, router: Arc<ProviderRouter>) -> Result<Self, ConfigError> {
        config.validate()?;
        let roster = config.personas.clone();
        let ids: Vec<PersonaId> = roster.iter().map(|p| p.id).collect();
        Ok(Self {
            ctx: TurnContext {
                state: Arc::new(Mutex::new(SessionState::new(&ids, 0))),
                router,
                events: Arc::new(NoopEventHandler),
                outbox: Arc::new(EventOutbox::default()),
                clock: Arc::new(SystemClock),
            },
            round_gate: Mutex::new(()),
            roster,
            settings: config.discussion.clone(),
            scheduler: TurnScheduler::new(config.discussion.responders_per_round),
        })
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.ctx.events = handler;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ctx.clock = clock;
        self
    }

    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.ctx.router
    }

    pub async fn session_id(&self) -> String {
        self.ctx.state.lock().await.session_id.clone()
    }

    pub async fn status_kind(&self) -> SessionStatus {
        self.ctx.state.lock().await.status
    }

    /// Opens the discussion on `topic`.
    pub async fn start(
        &self,
        topic: &str,
        goal: DiscussionGoal,
    ) -> Result<String, DiscussionError> {
        let mut state = self.ctx.state.lock().await;
        if state.status != SessionStatus::Created {
            return Err(SessionError::AlreadyActive.into());
        }
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::EmptyTopic.into());
        }

        let now = self.ctx.clock.now();
        state.topic = topic.to_string();
        state.goal = goal;
        state.status = SessionStatus::Active;
        state.round = 0;
        state.started_at = Some(now);
        log::info!("{}: started on '{}' ({})", state.session_id, state.topic, state.goal);

        self.ctx.queue(DiscussionEvent::DiscussionStarted {
            session_id: state.session_id.clone(),
            topic: state.topic.clone(),
            goal: state.goal.to_string(),
        });
        let content = format!("Discussion started on topic: {}", state.topic);
        let message = state.system_message(content, now);
        self.ctx.queue(DiscussionEvent::NewMessage(message));
        let session_id = state.session_id.clone();
        drop(state);

        self.ctx.flush().await;
        Ok(session_id)
    }

    /// Adds a human contribution to the current round.
    pub async fn add_message(&self, speaker: &str, content: &str) -> Result<Message, DiscussionError> {
        let mut state = self.ctx.state.lock().await;
        state.require_active()?;

        let draft = MessageDraft {
            speaker: speaker.to_string(),
            kind: MessageKind::Human,
            round: state.round,
            persona: None,
            origin: MessageOrigin::Human,
            timestamp: self.ctx.clock.now(),
        };
        let message = state.assembler.complete(draft, content);
        state.store.append(message.clone());
        if !state.humans.iter().any(|h| h == speaker) {
            state.humans.push(speaker.to_string());
        }
        self.ctx.queue(DiscussionEvent::NewMessage(message.clone()));
        drop(state);

        self.ctx.flush().await;
        Ok(message)
    }

    /// Runs the next round of persona turns.
    ///
    /// Returns [`SessionError::RoundLimitReached`] once `max_rounds` rounds have run; that
    /// error is terminal (see [`DiscussionError::is_terminal`]) and means the caller should
    /// wrap up. A scheduling failure leaves the round counter untouched.
    pub async fn generate_next_round(&self) -> Result<RoundReport, DiscussionError> {
        let _gate = self.round_gate.lock().await;

        let (round, epoch, turns) = {
            let mut state = self.ctx.state.lock().await;
            state.require_active()?;
            if state.round >= self.settings.max_rounds {
                return Err(SessionError::RoundLimitReached {
                    max_rounds: self.settings.max_rounds,
                }
                .into());
            }

            let selected = self.scheduler.select(&state.participation)?;
            state.round += 1;
            let round = state.round;

            let history = state.store.recent(self.settings.context_messages);
            let now = self.ctx.clock.now();
            let marker = state.system_message(format!("--- Round {} ---", round), now);
            self.ctx.queue(DiscussionEvent::NewMessage(marker));
            let turns: Vec<(Persona, GenerationRequest)> = selected
                .iter()
                .filter_map(|id| self.roster.iter().find(|p| p.id == *id))
                .map(|persona| {
                    let request =
                        build_request(persona, &state.goal, &state.topic, &history, &self.settings);
                    (persona.clone(), request)
                })
                .collect();

            log::info!(
                "{}: round {} with {:?}",
                state.session_id,
                round,
                selected
            );
            self.ctx.queue(DiscussionEvent::AgentsThinking {
                round,
                personas: selected,
            });
            let topic = state.topic.clone();
            let epoch = state.epoch;
            (
                round,
                epoch,
                turns
                    .into_iter()
                    .map(|(persona, request)| (persona, request, topic.clone()))
                    .collect::<Vec<_>>(),
            )
        };
        self.ctx.flush().await;

        let mut tasks = Vec::with_capacity(turns.len());
        for (persona, request, topic) in turns {
            let ctx = self.ctx.clone();
            tasks.push(tokio::spawn(async move {
                ctx.run_turn(persona, request, topic, round, epoch).await
            }));
        }

        let mut report = RoundReport {
            round,
            messages: Vec::new(),
            degraded: 0,
            discarded: 0,
        };
        for task in tasks {
            match task.await {
                Ok(TurnOutcome::Stored { message, degraded }) => {
                    if degraded {
                        report.degraded += 1;
                    }
                    report.messages.push(message);
                }
                Ok(TurnOutcome::Discarded) => report.discarded += 1,
                Err(e) => {
                    log::error!("round {} task failed: {}", round, e);
                    report.discarded += 1;
                }
            }
        }
        report.messages.sort_by_key(|m| m.id);
        Ok(report)
    }

    /// Closes the discussion. In-flight persona turns are discarded.
    pub async fn end(&self) -> Result<EndReport, DiscussionError> {
        let mut state = self.ctx.state.lock().await;
        state.require_active()?;

        state.epoch += 1;
        let dropped = state.assembler.abort_all();
        if dropped > 0 {
            log::info!("{}: dropped {} unfinished messages", state.session_id, dropped);
        }
        state.status = SessionStatus::Ended;

        let summary = state.summary();
        let now = self.ctx.clock.now();
        let message = state.system_message(format!("Discussion ended. Summary: {}", summary), now);
        self.ctx.queue(DiscussionEvent::NewMessage(message));

        let report = EndReport {
            session_id: state.session_id.clone(),
            topic: state.topic.clone(),
            total_messages: state.store.len(),
            rounds: state.round,
            summary,
            participants: Participants {
                agents: self.agent_names(&state),
                humans: state.humans.clone(),
            },
        };
        log::info!("{}: ended after {} rounds", state.session_id, state.round);
        self.ctx.queue(DiscussionEvent::DiscussionEnded(report.clone()));
        drop(state);

        self.ctx.flush().await;
        Ok(report)
    }

    /// Throws the session away and starts over in `Created` with a new id.
    pub async fn reset(&self) -> String {
        let mut state = self.ctx.state.lock().await;
        let epoch = state.epoch + 1;
        let previous = state.session_id.clone();
        let ids: Vec<PersonaId> = self.roster.iter().map(|p| p.id).collect();
        *state = SessionState::new(&ids, epoch);
        log::info!("{}: reset, new session {}", previous, state.session_id);
        state.session_id.clone()
    }

    fn agent_names(&self, state: &SessionState) -> Vec<String> {
        self.roster
            .iter()
            .filter(|p| state.participation.responses(p.id) > 0)
            .map(|p| p.display_name().to_string())
            .collect()
    }

    pub async fn summary(&self) -> String {
        self.ctx.state.lock().await.summary()
    }

    pub async fn status(&self) -> StatusReport {
        let api_usage = self.ctx.router.usage_summary();
        let state = self.ctx.state.lock().await;
        StatusReport {
            status: state.status,
            session_id: state.session_id.clone(),
            topic: state.topic.clone(),
            goal: state.goal.clone(),
            round: state.round,
            max_rounds: self.settings.max_rounds,
            total_messages: state.store.len(),
            agent_participation: self
                .roster
                .iter()
                .map(|p| AgentParticipation {
                    persona: p.id,
                    name: p.display_name().to_string(),
                    responses: state.participation.responses(p.id),
                })
                .collect(),
            human_participants: state.humans.clone(),
            cost_estimate: api_usage.cost_estimate.clone(),
            api_usage,
        }
    }

    /// The last `n` messages, oldest first.
    pub async fn recent_messages(&self, n: usize) -> Vec<Message> {
        self.ctx.state.lock().await.store.recent(n)
    }

    pub async fn messages_in_round(&self, round: u32) -> Vec<Message> {
        self.ctx.state.lock().await.store.by_round(round)
    }

    /// Every message of one speaker kind, in id order.
    pub async fn messages_by_kind(&self, kind: MessageKind) -> Vec<Message> {
        self.ctx.state.lock().await.store.by_kind(kind)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.ctx.state.lock().await;
        SessionSnapshot {
            session_id: state.session_id.clone(),
            topic: state.topic.clone(),
            goal: state.goal.clone(),
            status: state.status,
            round: state.round,
            started_at: state.started_at,
            messages: state.store.snapshot(),
            participation: state.participation.entries().to_vec(),
            human_participants: state.humans.clone(),
        }
    }
}

impl fmt::Debug for Discussion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discussion")
            .field("roster", &self.roster.iter().map(|p| p.id).collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_parsing() {
        assert_eq!(DiscussionGoal::parse("explore"), DiscussionGoal::Explore);
        assert_eq!(DiscussionGoal::parse(" Outline "), DiscussionGoal::Outline);
        assert_eq!(DiscussionGoal::parse("stress_test"), DiscussionGoal::StressTest);
        assert_eq!(DiscussionGoal::parse(""), DiscussionGoal::Explore);
        assert_eq!(
            DiscussionGoal::parse("find a compromise"),
            DiscussionGoal::Custom("find a compromise".to_string())
        );
    }

    #[test]
    fn goal_serializes_as_plain_string() {
        let json = serde_json::to_value(DiscussionGoal::StressTest).unwrap();
        assert_eq!(json, serde_json::json!("stress_test"));
    }

    #[test]
    fn session_ids_are_prefixed_and_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(a.starts_with("session_"));
        assert_ne!(a, b);
    }
}
