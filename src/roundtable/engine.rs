//! Transport-facing service facade.
//!
//! [`DiscussionService`] wraps a [`Discussion`] and turns every outcome into an
//! [`OperationResult`], the JSON shape an HTTP or WebSocket layer returns to clients. No
//! error crosses this boundary: failures come back with `success: false`, a stable `code`
//! and a human-readable `message`. Hitting the round limit is reported with
//! `terminal: true` so clients can switch to a closing phase instead of showing an error.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roundtable::clock::SystemClock;
//! use roundtable::config::RoundtableConfig;
//! use roundtable::engine::DiscussionService;
//! use roundtable::quota::QuotaLedger;
//! use roundtable::router::ProviderRouter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RoundtableConfig::default();
//!     let ledger = Arc::new(QuotaLedger::new(&config.accounts, Arc::new(SystemClock), config.router.cooldown()));
//!     let router = Arc::new(ProviderRouter::new(&config, ledger).with_openai_compatible_adapters());
//!     let service = DiscussionService::from_config(&config, router).unwrap();
//!
//!     let started = service.start("Remote work", "explore").await;
//!     println!("{}", serde_json::to_string(&started).unwrap());
//!     let round = service.generate_next_round().await;
//!     if !round.success && round.terminal {
//!         service.end().await;
//!     }
//! }
//! ```

use crate::roundtable::config::RoundtableConfig;
use crate::roundtable::error::{ConfigError, DiscussionError, SessionError};
use crate::roundtable::quota::UsageSummary;
use crate::roundtable::router::ProviderRouter;
use crate::roundtable::session::{
    Discussion, DiscussionGoal, EndReport, RoundReport, SessionStatus, StatusReport,
};
use crate::roundtable::store::Message;
use serde::Serialize;
use std::sync::Arc;

/// Author name used when a human message arrives without one.
pub const DEFAULT_AUTHOR: &str = "Human";

/// Uniform result envelope of every facade operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub message: String,
    /// Machine-readable failure code, e.g. `"not_active"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Set when the failure is an expected end condition.
    pub terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> OperationResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            terminal: false,
            data: Some(data),
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: Some(code.into()),
            terminal: false,
            data: None,
        }
    }

    pub fn from_error(err: &DiscussionError) -> Self {
        Self {
            terminal: err.is_terminal(),
            ..Self::failure(err.code(), err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedDiscussion {
    pub session_id: String,
    pub topic: String,
    pub goal: DiscussionGoal,
}

/// Structured front door to one [`Discussion`].
#[derive(Debug)]
pub struct DiscussionService {
    discussion: Discussion,
}

impl DiscussionService {
    pub fn new(discussion: Discussion) -> Self {
        Self { discussion }
    }

    pub fn from_config(
        config: &RoundtableConfig,
        router: Arc<ProviderRouter>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(Discussion::new(config, router)?))
    }

    pub fn discussion(&self) -> &Discussion {
        &self.discussion
    }

    /// Starts a discussion. A previous discussion that already ended is replaced.
    pub async fn start(&self, topic: &str, goal: &str) -> OperationResult<StartedDiscussion> {
        if self.discussion.status_kind().await == SessionStatus::Ended {
            self.discussion.reset().await;
        }
        let goal = DiscussionGoal::parse(goal);
        match self.discussion.start(topic, goal.clone()).await {
            Ok(session_id) => OperationResult::ok(
                "Discussion started successfully!",
                StartedDiscussion {
                    session_id,
                    topic: topic.trim().to_string(),
                    goal,
                },
            ),
            Err(e) => OperationResult::from_error(&e),
        }
    }

    pub async fn speak(&self, message: &str, author: &str) -> OperationResult<Message> {
        if message.trim().is_empty() {
            return OperationResult::failure("empty_message", "Message must not be empty");
        }
        let author = if author.trim().is_empty() {
            DEFAULT_AUTHOR
        } else {
            author.trim()
        };
        match self.discussion.add_message(author, message).await {
            Ok(stored) => OperationResult::ok("Message added to discussion", stored),
            Err(e) => OperationResult::from_error(&e),
        }
    }

    pub async fn generate_next_round(&self) -> OperationResult<RoundReport> {
        match self.discussion.generate_next_round().await {
            Ok(report) => {
                let message = format!(
                    "Round {} complete with {} responses",
                    report.round,
                    report.messages.len()
                );
                OperationResult::ok(message, report)
            }
            Err(e) => OperationResult::from_error(&e),
        }
    }

    pub async fn status(&self) -> OperationResult<StatusReport> {
        OperationResult::ok("Status retrieved", self.discussion.status().await)
    }

    pub async fn summary(&self) -> OperationResult<String> {
        if self.discussion.status_kind().await == SessionStatus::Created {
            return OperationResult::from_error(&SessionError::NotActive.into());
        }
        OperationResult::ok("Summary generated", self.discussion.summary().await)
    }

    /// The last `limit` messages; empty before a discussion started.
    pub async fn messages(&self, limit: usize) -> OperationResult<Vec<Message>> {
        let messages = self.discussion.recent_messages(limit).await;
        OperationResult::ok(format!("{} messages", messages.len()), messages)
    }

    pub async fn usage_report(&self) -> OperationResult<UsageSummary> {
        OperationResult::ok(
            "API usage retrieved",
            self.discussion.router().usage_summary(),
        )
    }

    pub async fn end(&self) -> OperationResult<EndReport> {
        match self.discussion.end().await {
            Ok(report) => OperationResult::ok("Discussion ended", report),
            Err(e) => OperationResult::from_error(&e),
        }
    }

    /// Discards the current discussion; returns the new session id.
    pub async fn reset(&self) -> OperationResult<String> {
        let session_id = self.discussion.reset().await;
        OperationResult::ok("Discussion reset", session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_are_flagged() {
        let err: DiscussionError = SessionError::RoundLimitReached { max_rounds: 2 }.into();
        let result: OperationResult<()> = OperationResult::from_error(&err);
        assert!(!result.success);
        assert!(result.terminal);
        assert_eq!(result.code.as_deref(), Some("round_limit_reached"));
    }

    #[test]
    fn failures_serialize_without_data() {
        let result: OperationResult<u32> = OperationResult::failure("not_active", "No active discussion");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "message": "No active discussion",
                "code": "not_active",
                "terminal": false
            })
        );
    }
}
