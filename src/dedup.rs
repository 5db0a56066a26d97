//! Deduplication index: normalized exclusion lists derived from the queue.
//!
//! The index is a read-only projection over the store plus whatever the
//! current generation round has already seen in memory. It owns no
//! persisted state of its own.

use std::collections::{HashSet, VecDeque};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::db::{self, StoreError};
use crate::model::{Quote, PLACEHOLDER_AUTHOR};

/// Upper bound on each exclusion list sent to providers. Oldest entries are
/// dropped first, so the lists track the most recently used content.
pub const MAX_EXCLUSIONS: usize = 200;

/// Normalized comparison form: lowercase, diacritics stripped (NFD, combining
/// marks removed), whitespace collapsed, trimmed. Never displayed.
pub fn normalize(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A bounded, order-preserving list of raw strings, deduplicated by
/// normalized form.
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    entries: VecDeque<String>,
    norms: HashSet<String>,
}

impl ExclusionList {
    pub fn push(&mut self, raw: &str) {
        let norm = normalize(raw);
        if norm.is_empty() || self.norms.contains(&norm) {
            return;
        }
        self.entries.push_back(raw.trim().to_string());
        self.norms.insert(norm);
        if self.entries.len() > MAX_EXCLUSIONS {
            if let Some(oldest) = self.entries.pop_front() {
                self.norms.remove(&normalize(&oldest));
            }
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.norms.contains(&normalize(raw))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Author and quote-text exclusions for one generation round.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    pub authors: ExclusionList,
    pub quotes: ExclusionList,
}

impl Exclusions {
    /// Record a quote so later candidates cannot repeat it. The placeholder
    /// author is skipped: it must never block itself from being reused.
    pub fn note(&mut self, quote: &Quote) {
        self.quotes.push(&quote.text);
        if normalize(&quote.author_name) != normalize(PLACEHOLDER_AUTHOR) {
            self.authors.push(&quote.author_name);
        }
    }

    /// True when the candidate's normalized text or author collides with the
    /// lists. The placeholder author never counts as a collision.
    pub fn is_duplicate(&self, quote: &Quote) -> bool {
        if self.quotes.contains(&quote.text) {
            return true;
        }
        let author_is_placeholder =
            normalize(&quote.author_name) == normalize(PLACEHOLDER_AUTHOR);
        !author_is_placeholder && self.authors.contains(&quote.author_name)
    }
}

/// Build the exclusion lists from the full queue history, oldest date first
/// so capping keeps the most recent entries.
pub async fn build_exclusions(pool: &db::Pool) -> Result<Exclusions, StoreError> {
    let items = db::get_all(pool).await?;
    let mut exclusions = Exclusions::default();
    for item in items.values() {
        if let Some(quote) = &item.content {
            exclusions.note(quote);
        }
    }
    Ok(exclusions)
}
