// Import the top-level `roundtable` module.
// src/roundtable/mod.rs

pub mod assembler;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod persona;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod quota;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod store;

// Re-export the session types so they are reachable as roundtable::Discussion.
pub use engine::{DiscussionService, OperationResult};
pub use session::{Discussion, DiscussionGoal};
