//! Concrete [`ProviderAdapter`](crate::roundtable::provider::ProviderAdapter) implementations.

pub mod http_pool;
pub mod openai_compatible;

pub use openai_compatible::OpenAICompatibleProvider;
