//! Error taxonomy for the discussion engine.
//!
//! Errors are split by the layer that raises them:
//!
//! * [`SessionError`]: flow errors from the session state machine. These are surfaced to
//!   callers as structured failure results. [`SessionError::RoundLimitReached`] is an
//!   expected end condition rather than a fault; check [`SessionError::is_terminal`].
//! * [`SchedulingError`]: the turn scheduler could not pick anyone for a round. Fatal for
//!   that round only; the session stays active.
//! * [`ProviderError`]: failures of a single generation backend call. The router absorbs
//!   these through its fallback walk, so only [`ProviderError::AllProvidersExhausted`] is
//!   ever visible outside it (as a tag on a degraded response).
//! * [`ConfigError`]: invalid configuration detected by
//!   [`RoundtableConfig::validate`](crate::roundtable::config::RoundtableConfig::validate).
//!
//! [`DiscussionError`] wraps the caller-visible kinds so the session API can return a single
//! error type.
//!
//! ```
//! use roundtable::error::{DiscussionError, SessionError};
//!
//! let err: DiscussionError = SessionError::RoundLimitReached { max_rounds: 10 }.into();
//! assert!(err.is_terminal());
//! assert_eq!(err.to_string(), "Round limit reached (10 rounds)");
//! ```

use std::error::Error;
use std::fmt;

/// Flow errors raised by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The operation needs an `Active` session.
    NotActive,
    /// `start` was called on a session that already left the `Created` state.
    AlreadyActive,
    /// The configured round limit was hit. Callers should move to a closing phase.
    RoundLimitReached {
        /// The configured limit.
        max_rounds: u32,
    },
    /// `start` was called with a blank topic.
    EmptyTopic,
}

impl SessionError {
    /// `true` for expected end-of-discussion signals that are not faults.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionError::RoundLimitReached { .. })
    }

    /// Stable machine-readable code used by the service facade.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotActive => "not_active",
            SessionError::AlreadyActive => "already_active",
            SessionError::RoundLimitReached { .. } => "round_limit_reached",
            SessionError::EmptyTopic => "empty_topic",
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotActive => write!(f, "No active discussion"),
            SessionError::AlreadyActive => write!(f, "A discussion is already running"),
            SessionError::RoundLimitReached { max_rounds } => {
                write!(f, "Round limit reached ({} rounds)", max_rounds)
            }
            SessionError::EmptyTopic => write!(f, "Discussion topic must not be empty"),
        }
    }
}

impl Error for SessionError {}

/// Raised by the turn scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// The roster is empty or the per-round response count is zero.
    NoEligibleAgents,
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingError::NoEligibleAgents => write!(f, "No eligible agents for this round"),
        }
    }
}

impl Error for SchedulingError {}

/// Failure of a generation backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The backend answered with a rate-limit response (HTTP 429 or equivalent).
    RateLimited,
    /// The call did not complete within its time budget.
    Timeout,
    /// The credential was rejected or is missing.
    AuthFailure,
    /// Anything else: transport errors, malformed payloads, 5xx responses.
    Unknown(String),
    /// Every candidate of a persona's fallback chain was skipped or failed.
    AllProvidersExhausted,
}

impl ProviderError {
    /// Short label used in logs and usage reports.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderError::RateLimited => "rate_limited",
            ProviderError::Timeout => "timeout",
            ProviderError::AuthFailure => "auth_failure",
            ProviderError::Unknown(_) => "unknown",
            ProviderError::AllProvidersExhausted => "all_providers_exhausted",
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::RateLimited => write!(f, "Provider rate limit hit"),
            ProviderError::Timeout => write!(f, "Provider call timed out"),
            ProviderError::AuthFailure => write!(f, "Provider rejected the credential"),
            ProviderError::Unknown(msg) => write!(f, "Provider error: {}", msg),
            ProviderError::AllProvidersExhausted => {
                write!(f, "All API providers failed or quota exceeded")
            }
        }
    }
}

impl Error for ProviderError {}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No personas were configured.
    EmptyRoster,
    /// `responders_per_round` is zero.
    ZeroResponders,
    /// Two accounts share the same (provider, account) key.
    DuplicateAccount(String),
    /// An affinity chain names a (provider, account) pair with no account entry.
    UnknownTarget(String),
    /// A persona appears twice in the roster.
    DuplicatePersona(String),
    /// The configuration text could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyRoster => write!(f, "Persona roster is empty"),
            ConfigError::ZeroResponders => write!(f, "responders_per_round must be at least 1"),
            ConfigError::DuplicateAccount(key) => write!(f, "Duplicate provider account: {}", key),
            ConfigError::UnknownTarget(key) => {
                write!(f, "Affinity chain references unknown account: {}", key)
            }
            ConfigError::DuplicatePersona(id) => write!(f, "Persona listed twice: {}", id),
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for ConfigError {}

/// Caller-visible error of the session API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscussionError {
    Session(SessionError),
    Scheduling(SchedulingError),
    Config(ConfigError),
}

impl DiscussionError {
    /// See [`SessionError::is_terminal`].
    pub fn is_terminal(&self) -> bool {
        match self {
            DiscussionError::Session(e) => e.is_terminal(),
            _ => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DiscussionError::Session(e) => e.code(),
            DiscussionError::Scheduling(SchedulingError::NoEligibleAgents) => "no_eligible_agents",
            DiscussionError::Config(_) => "invalid_config",
        }
    }
}

impl fmt::Display for DiscussionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscussionError::Session(e) => write!(f, "{}", e),
            DiscussionError::Scheduling(e) => write!(f, "{}", e),
            DiscussionError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl Error for DiscussionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DiscussionError::Session(e) => Some(e),
            DiscussionError::Scheduling(e) => Some(e),
            DiscussionError::Config(e) => Some(e),
        }
    }
}

impl From<SessionError> for DiscussionError {
    fn from(e: SessionError) -> Self {
        DiscussionError::Session(e)
    }
}

impl From<SchedulingError> for DiscussionError {
    fn from(e: SchedulingError) -> Self {
        DiscussionError::Scheduling(e)
    }
}

impl From<ConfigError> for DiscussionError {
    fn from(e: ConfigError) -> Self {
        DiscussionError::Config(e)
    }
}
