//! # Roundtable
//!
//! Roundtable runs multi-round discussions between a fixed roster of AI personas and human
//! participants. Every persona turn is generated by one of several interchangeable,
//! rate-limited text-generation providers, and the engine keeps the conversation going when
//! some of them run out of quota or fail.
//!
//! The crate is layered, leaves first:
//!
//! * **Quota ledger** ([`quota`]): per (provider, account) daily counters with lazy UTC
//!   rollover, cool-downs and reserve-then-commit permits.
//! * **Provider router** ([`router`]): walks a persona's affinity chain, skipping exhausted or
//!   failing accounts, and falls back to a clearly tagged degraded response.
//! * **Turn scheduler** ([`scheduler`]): picks who speaks each round, least active first.
//! * **Streaming assembler** ([`assembler`]): turns token deltas into ordered, addressable
//!   messages and emits start/chunk/end [`event`]s.
//! * **Message store** ([`store`]): the append-only, id-ordered conversation log.
//! * **Session** ([`session`]): the `Created → Active → Ended` state machine tying it together.
//! * **Service facade** ([`engine`]): structured, never-failing results for a transport layer.
//!
//! Providers plug in through the [`provider::ProviderAdapter`] trait; the bundled
//! [`providers::OpenAICompatibleProvider`] speaks the chat-completions streaming protocol used
//! by Google AI Studio, Groq, OpenRouter and Cerebras.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roundtable::clock::SystemClock;
//! use roundtable::config::RoundtableConfig;
//! use roundtable::quota::QuotaLedger;
//! use roundtable::router::ProviderRouter;
//! use roundtable::DiscussionService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     roundtable::init_logger();
//!
//!     let config = RoundtableConfig::default().with_max_rounds(5);
//!     let ledger = Arc::new(QuotaLedger::new(
//!         &config.accounts,
//!         Arc::new(SystemClock),
//!         config.router.cooldown(),
//!     ));
//!     let router = Arc::new(ProviderRouter::new(&config, ledger).with_openai_compatible_adapters());
//!     let service = DiscussionService::from_config(&config, router)?;
//!
//!     service.start("Is nuclear power the answer to climate change?", "stress_test").await;
//!     service.speak("Waste storage still worries me.", "Maya").await;
//!     loop {
//!         let round = service.generate_next_round().await;
//!         if !round.success {
//!             break;
//!         }
//!         for message in round.data.map(|r| r.messages).unwrap_or_default() {
//!             println!("{}: {}", message.speaker, message.content);
//!         }
//!     }
//!     let ended = service.end().await;
//!     println!("{}", ended.data.map(|r| r.summary).unwrap_or_default());
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// ```rust
/// roundtable::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

pub mod roundtable;

// Re-exporting key items for easier external access.
pub use roundtable::assembler;
pub use roundtable::clock;
pub use roundtable::config;
pub use roundtable::config::RoundtableConfig;
pub use roundtable::engine;
pub use roundtable::engine::{DiscussionService, OperationResult};
pub use roundtable::error;
pub use roundtable::event;
pub use roundtable::event::{DiscussionEvent, EventHandler};
pub use roundtable::persona;
pub use roundtable::persona::{Persona, PersonaId};
pub use roundtable::prompt;
pub use roundtable::provider;
pub use roundtable::providers;
pub use roundtable::quota;
pub use roundtable::quota::QuotaLedger;
pub use roundtable::router;
pub use roundtable::router::ProviderRouter;
pub use roundtable::scheduler;
pub use roundtable::session;
pub use roundtable::session::{Discussion, DiscussionGoal};
pub use roundtable::store;
pub use roundtable::store::Message;
