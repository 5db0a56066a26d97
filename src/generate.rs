//! Generation orchestrator: the per-date control loop.
//!
//! Pulls exclusions from the dedup index, asks the provider chain for a
//! candidate, retries on duplicates (extending the in-memory exclusions each
//! round), and writes the accepted result to the queue as a draft. The
//! store's duplicate guard backs the in-memory check as the authoritative
//! last line.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::db::{self, StoreError};
use crate::dedup;
use crate::model::{QueueStatus, Quote};
use crate::provider::ProviderChain;

/// Attempt bound per date. Exhausting it is terminal for that date.
pub const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no acceptable candidate for {date} after {attempts} attempts")]
    Exhausted { date: String, attempts: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a successful round produced. `degraded` carries the first
/// degradation notice seen, so operators learn about quota fallback once.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub quote: Quote,
    pub provider: String,
    pub degraded: Option<String>,
}

/// Fill one date with a fresh draft quote.
///
/// Silent callers (auto-fill) get errors back for logging only; interactive
/// callers surface them to the operator. Every accepted generation is
/// persisted before returning, so the queue view is read-your-write.
#[instrument(skip_all, fields(date = %date_key, silent))]
pub async fn generate_for_date(
    pool: &db::Pool,
    chain: &ProviderChain,
    date_key: &str,
    silent: bool,
) -> Result<GenerationOutcome, GenerateError> {
    let mut exclusions = dedup::build_exclusions(pool).await?;
    let mut degraded: Option<String> = None;

    for attempt in 0..MAX_ATTEMPTS {
        let generated = chain.generate(&exclusions).await;
        if degraded.is_none() {
            degraded = generated.degraded.clone();
        }

        if exclusions.is_duplicate(&generated.quote) {
            debug!(attempt, "candidate collided with exclusions; retrying");
            exclusions.note(&generated.quote);
            continue;
        }

        match db::upsert(pool, date_key, QueueStatus::Draft, Some(&generated.quote)).await {
            Ok(()) => {
                info!(provider = %generated.provider, attempt, "draft accepted");
                return Ok(GenerationOutcome {
                    quote: generated.quote,
                    provider: generated.provider,
                    degraded,
                });
            }
            Err(StoreError::Duplicate { date }) => {
                debug!(attempt, clash = %date, "store rejected duplicate; retrying");
                exclusions.note(&generated.quote);
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    if silent {
        warn!("generation exhausted; leaving date for a later pass");
    }
    Err(GenerateError::Exhausted {
        date: date_key.to_string(),
        attempts: MAX_ATTEMPTS,
    })
}
