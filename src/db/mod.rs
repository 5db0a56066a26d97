//! Database module: the queue store and reaction tally.
//!
//! This module is split into two submodules:
//! - `model`: typed row views and decode helpers.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `tg_quotebot::db` — we re-export the
//! repository API and the store error type for convenience.

use thiserror::Error;

pub mod model;
pub mod repo;

pub use repo::*;

/// Errors raised by the queue store.
///
/// `Duplicate` is the authoritative last-line duplicate guard: an upsert is
/// rejected when the normalized quote text already lives under a different
/// date. It drives the orchestrator's retry loop and is not fatal there.
/// Everything else is a persistence failure the caller must surface.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate content already scheduled for {date}")]
    Duplicate { date: String },
    #[error("approved item requires content")]
    MissingContent,
    #[error("corrupt row for {date}: {source}")]
    Decode {
        date: String,
        source: serde_json::Error,
    },
    #[error("store error: {0}")]
    Db(#[from] sqlx::Error),
}
