//! Auto-fill scheduler: a cooperative background worker that keeps the
//! 30-day horizon populated, one slot at a time.
//!
//! Every queue mutation sends a change signal; the worker debounces, scans
//! the horizon in date order, fills the first empty date that nobody else is
//! generating, and the resulting mutation triggers the next pass. Once a
//! full scan finds nothing to do the worker idles until the next signal.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::db;
use crate::generate::{self, GenerateError};
use crate::model::horizon_keys;
use crate::provider::ProviderChain;

/// Dates with a generation currently in flight. Shared between the worker
/// and manual admin generation so the two never race on one date.
#[derive(Debug, Default)]
pub struct InFlight(Mutex<HashSet<String>>);

impl InFlight {
    /// Claim a date. Returns false when someone already holds it.
    pub fn begin(&self, date_key: &str) -> bool {
        self.0
            .lock()
            .expect("in-flight lock")
            .insert(date_key.to_string())
    }

    pub fn end(&self, date_key: &str) {
        self.0.lock().expect("in-flight lock").remove(date_key);
    }

    pub fn contains(&self, date_key: &str) -> bool {
        self.0.lock().expect("in-flight lock").contains(date_key)
    }
}

/// Sender half: anything that mutates the queue calls [`QueueChanged::notify`].
/// Each signal restarts the worker's pending debounce.
#[derive(Debug, Clone)]
pub struct QueueChanged(mpsc::UnboundedSender<()>);

impl QueueChanged {
    pub fn notify(&self) {
        let _ = self.0.send(());
    }
}

pub struct AutoFill {
    pool: db::Pool,
    chain: Arc<ProviderChain>,
    in_flight: Arc<InFlight>,
    debounce: Duration,
    rx: mpsc::UnboundedReceiver<()>,
}

impl AutoFill {
    pub fn new(
        pool: db::Pool,
        chain: Arc<ProviderChain>,
        in_flight: Arc<InFlight>,
        debounce: Duration,
    ) -> (Self, QueueChanged) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                pool,
                chain,
                in_flight,
                debounce,
                rx,
            },
            QueueChanged(tx),
        )
    }

    /// Worker loop. Runs until every [`QueueChanged`] handle is dropped.
    pub async fn run(mut self) {
        loop {
            // Debounce: restart the timer while more signals arrive.
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.debounce) => break,
                    changed = self.rx.recv() => {
                        if changed.is_none() {
                            return;
                        }
                    }
                }
            }

            match self.fill_next_slot().await {
                // A slot was filled; rescan after the next debounce.
                Ok(true) => continue,
                // Horizon complete or blocked for now: idle until a mutation.
                Ok(false) => {
                    if self.rx.recv().await.is_none() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(?err, "auto-fill pass failed");
                    if self.rx.recv().await.is_none() {
                        return;
                    }
                }
            }
        }
    }

    /// Scan the horizon in date order and fill the first empty date that is
    /// not already being generated. At most one slot per pass.
    async fn fill_next_slot(&self) -> Result<bool, GenerateError> {
        let items = db::get_all(&self.pool).await.map_err(GenerateError::Store)?;

        for key in horizon_keys() {
            if items.contains_key(&key) {
                continue;
            }
            if !self.in_flight.begin(&key) {
                continue;
            }
            let result = generate::generate_for_date(&self.pool, &self.chain, &key, true).await;
            self.in_flight.end(&key);

            return match result {
                Ok(outcome) => {
                    info!(date = %key, provider = %outcome.provider, "auto-filled slot");
                    Ok(true)
                }
                // Silent mode: log, stop advancing, retry on a later pass.
                Err(err) => {
                    warn!(date = %key, ?err, "auto-fill generation failed");
                    Ok(false)
                }
            };
        }

        info!("auto-fill horizon complete");
        Ok(false)
    }
}
