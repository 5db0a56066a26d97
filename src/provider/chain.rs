//! Ordered provider chain with quota cooldown.
//!
//! Providers are tried in order; a quota error puts the whole chain into a
//! cooldown window and the static pool answers until it expires or an
//! operator resets it. Generic failures fall through to the next provider,
//! then to the pool, so `generate` always yields a quote.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::{fallback, ChatCompletionsProvider, ProviderError, QuoteProvider};
use crate::config;
use crate::dedup::Exclusions;
use crate::model::Quote;

/// Quota cooldown state. Explicit injected state with a defined lifecycle:
/// created with the chain, auto-clears after the window, reset on demand.
#[derive(Debug)]
pub struct CooldownState {
    window: Duration,
    blocked_at: Mutex<Option<Instant>>,
}

impl CooldownState {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            blocked_at: Mutex::new(None),
        }
    }

    pub fn mark(&self) {
        *self.blocked_at.lock().expect("cooldown lock") = Some(Instant::now());
    }

    pub fn reset(&self) {
        *self.blocked_at.lock().expect("cooldown lock") = None;
    }

    /// True while inside the cooldown window. Expired windows clear on read.
    pub fn is_blocked(&self) -> bool {
        let mut guard = self.blocked_at.lock().expect("cooldown lock");
        match *guard {
            Some(at) if at.elapsed() <= self.window => true,
            Some(_) => {
                *guard = None;
                false
            }
            None => false,
        }
    }

    /// Time left in the window, for operator display.
    pub fn remaining(&self) -> Option<Duration> {
        let guard = self.blocked_at.lock().expect("cooldown lock");
        guard.and_then(|at| self.window.checked_sub(at.elapsed()))
    }
}

/// A produced candidate plus where it came from. `degraded` carries a
/// message when the chain had to fall back because of quota or errors.
#[derive(Debug, Clone)]
pub struct Generated {
    pub quote: Quote,
    pub provider: String,
    pub degraded: Option<String>,
}

pub struct ProviderChain {
    providers: Vec<Box<dyn QuoteProvider>>,
    cooldown: CooldownState,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn QuoteProvider>>, cooldown_window: Duration) -> Self {
        Self {
            providers,
            cooldown: CooldownState::new(cooldown_window),
        }
    }

    /// Build the chain from config: primary then secondary, when configured.
    pub fn from_config(cfg: &config::Providers) -> Self {
        let timeout = Duration::from_secs(cfg.request_timeout_seconds);
        let mut providers: Vec<Box<dyn QuoteProvider>> = Vec::new();
        if let Some(primary) = &cfg.primary {
            providers.push(Box::new(ChatCompletionsProvider::new(
                "primary", primary, timeout,
            )));
        }
        if let Some(secondary) = &cfg.secondary {
            providers.push(Box::new(ChatCompletionsProvider::new(
                "secondary",
                secondary,
                timeout,
            )));
        }
        if providers.is_empty() {
            warn!("no generation providers configured; serving pool quotes only");
        }
        Self::new(providers, Duration::from_secs(cfg.cooldown_minutes * 60))
    }

    pub fn cooldown(&self) -> &CooldownState {
        &self.cooldown
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown.is_blocked()
    }

    /// Produce a candidate. Never fails: quota marks the cooldown and the
    /// pool answers; generic failures fall through provider by provider.
    pub async fn generate(&self, exclusions: &Exclusions) -> Generated {
        if self.cooldown.is_blocked() {
            return Generated {
                quote: fallback::pick(exclusions),
                provider: "pool".into(),
                degraded: Some("provider cooling down after a quota error".into()),
            };
        }

        let mut last_failure: Option<String> = None;
        for provider in &self.providers {
            match provider.generate(exclusions).await {
                Ok(quote) => {
                    info!(provider = provider.name(), "provider produced candidate");
                    return Generated {
                        quote,
                        provider: provider.name().to_string(),
                        degraded: None,
                    };
                }
                Err(ProviderError::Quota(message)) => {
                    warn!(provider = provider.name(), %message, "quota exhausted; cooling down");
                    self.cooldown.mark();
                    return Generated {
                        quote: fallback::pick(exclusions),
                        provider: "pool".into(),
                        degraded: Some(message),
                    };
                }
                Err(ProviderError::Failed(message)) => {
                    warn!(provider = provider.name(), %message, "provider failed; trying next");
                    last_failure = Some(message);
                }
            }
        }

        Generated {
            quote: fallback::pick(exclusions),
            provider: "pool".into(),
            degraded: Some(
                last_failure.unwrap_or_else(|| "no generation providers configured".into()),
            ),
        }
    }
}
