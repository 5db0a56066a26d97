//! Content-generation providers.
//!
//! Each backend implements [`QuoteProvider`]; [`chain::ProviderChain`] walks
//! them in order and degrades to the static pool when they fail. The HTTP
//! wire format is an implementation detail of each provider — callers only
//! see quotes and the error taxonomy below.

use async_trait::async_trait;
use thiserror::Error;

use crate::dedup::Exclusions;
use crate::model::Quote;

pub mod chain;
pub mod fallback;
pub mod openai;

pub use chain::{CooldownState, Generated, ProviderChain};
pub use openai::ChatCompletionsProvider;

/// Errors a single provider attempt can raise.
///
/// `Quota` marks the chain's cooldown and triggers the pool fallback so the
/// caller never stalls; `Failed` falls through to the next provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider quota exhausted: {0}")]
    Quota(String),
    #[error("provider failure: {0}")]
    Failed(String),
}

/// One interchangeable generation backend.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a candidate quote, honoring the exclusion lists as negative
    /// constraints. Honoring is best-effort — the orchestrator re-checks.
    async fn generate(&self, exclusions: &Exclusions) -> Result<Quote, ProviderError>;
}
