use super::model::QueueRow;
use super::StoreError;
use crate::dedup;
use crate::model::{QueueItem, QueueStatus, Quote, ReactionCounts, ReactionKind};
use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and make sure the
/// parent directory exists. In-memory URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }
    let rest = url["sqlite:".len()..].trim_start_matches("//");
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }
    let expanded = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    match query_part {
        Some(q) => format!("sqlite://{expanded}?{q}"),
        None => format!("sqlite://{expanded}"),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Full queue keyed by date, in date order.
#[instrument(skip_all)]
pub async fn get_all(pool: &Pool) -> Result<BTreeMap<String, QueueItem>, StoreError> {
    let rows = sqlx::query(
        "SELECT date_key, status, content, reactions FROM queue ORDER BY date_key ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut items = BTreeMap::new();
    for row in rows {
        let queue_row = QueueRow {
            date_key: row.get("date_key"),
            status: row.get("status"),
            content: row.try_get::<Option<String>, _>("content").ok().flatten(),
            reactions: row.get("reactions"),
        };
        let item = queue_row.decode()?;
        items.insert(item.date.clone(), item);
    }
    Ok(items)
}

#[instrument(skip_all, fields(date = %date_key))]
pub async fn get(pool: &Pool, date_key: &str) -> Result<Option<QueueItem>, StoreError> {
    let row = sqlx::query("SELECT date_key, status, content, reactions FROM queue WHERE date_key = ?")
        .bind(date_key)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let queue_row = QueueRow {
        date_key: row.get("date_key"),
        status: row.get("status"),
        content: row.try_get::<Option<String>, _>("content").ok().flatten(),
        reactions: row.get("reactions"),
    };
    Ok(Some(queue_row.decode()?))
}

/// Write one day's editorial state. Keyed on date: one row per day,
/// idempotent overwrite. Existing reactions are preserved.
///
/// Rejects with [`StoreError::Duplicate`] when the normalized quote text
/// already exists under a different date — the last-line duplicate guard,
/// independent of the generation-time exclusion lists.
#[instrument(skip_all, fields(date = %date_key, status = status.as_str()))]
pub async fn upsert(
    pool: &Pool,
    date_key: &str,
    status: QueueStatus,
    content: Option<&Quote>,
) -> Result<(), StoreError> {
    if status == QueueStatus::Approved && content.is_none() {
        return Err(StoreError::MissingContent);
    }

    let (content_json, norm_text) = match content {
        Some(quote) => {
            let json = serde_json::to_string(quote).map_err(|source| StoreError::Decode {
                date: date_key.to_string(),
                source,
            })?;
            (Some(json), Some(dedup::normalize(&quote.text)))
        }
        None => (None, None),
    };

    let mut tx = pool.begin().await?;

    if let Some(norm) = &norm_text {
        let clash: Option<String> =
            sqlx::query_scalar("SELECT date_key FROM queue WHERE norm_text = ? AND date_key != ?")
                .bind(norm)
                .bind(date_key)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(date) = clash {
            return Err(StoreError::Duplicate { date });
        }
    }

    sqlx::query(
        "INSERT INTO queue (date_key, status, content, norm_text) VALUES (?, ?, ?, ?) \
         ON CONFLICT(date_key) DO UPDATE SET \
             status = excluded.status, \
             content = excluded.content, \
             norm_text = excluded.norm_text, \
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(date_key)
    .bind(status.as_str())
    .bind(&content_json)
    .bind(&norm_text)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Content for a date, only when that date is approved.
#[instrument(skip_all, fields(date = %date_key))]
pub async fn get_approved_content(
    pool: &Pool,
    date_key: &str,
) -> Result<Option<Quote>, StoreError> {
    let json: Option<String> =
        sqlx::query_scalar("SELECT content FROM queue WHERE date_key = ? AND status = 'approved'")
            .bind(date_key)
            .fetch_optional(pool)
            .await?
            .flatten();
    let Some(json) = json else {
        return Ok(None);
    };
    let quote = serde_json::from_str(&json).map_err(|source| StoreError::Decode {
        date: date_key.to_string(),
        source,
    })?;
    Ok(Some(quote))
}

/// Reaction tally for a date. Days without a row report zeroes.
#[instrument(skip_all, fields(date = %date_key))]
pub async fn get_reactions(pool: &Pool, date_key: &str) -> Result<ReactionCounts, StoreError> {
    let json: Option<String> = sqlx::query_scalar("SELECT reactions FROM queue WHERE date_key = ?")
        .bind(date_key)
        .fetch_optional(pool)
        .await?;
    let Some(json) = json else {
        return Ok(ReactionCounts::default());
    };
    serde_json::from_str(&json).map_err(|source| StoreError::Decode {
        date: date_key.to_string(),
        source,
    })
}

/// The reaction the voter currently holds for a date, if any.
#[instrument(skip_all, fields(date = %date_key, voter = voter_id))]
pub async fn get_user_vote(
    pool: &Pool,
    date_key: &str,
    voter_id: i64,
) -> Result<Option<ReactionKind>, StoreError> {
    let kind: Option<String> =
        sqlx::query_scalar("SELECT kind FROM reaction_votes WHERE date_key = ? AND voter_id = ?")
            .bind(date_key)
            .bind(voter_id)
            .fetch_optional(pool)
            .await?;
    Ok(kind.as_deref().and_then(ReactionKind::parse_kind))
}

/// Cast a reaction for a date, exclusive per voter: switching kinds moves the
/// vote (old counter floored at zero), re-casting the same kind is a no-op.
/// Read-modify-write runs inside one transaction.
#[instrument(skip_all, fields(date = %date_key, voter = voter_id, kind = kind.as_str()))]
pub async fn register_reaction(
    pool: &Pool,
    date_key: &str,
    voter_id: i64,
    kind: ReactionKind,
) -> Result<ReactionCounts, StoreError> {
    let mut tx = pool.begin().await?;

    let previous: Option<String> =
        sqlx::query_scalar("SELECT kind FROM reaction_votes WHERE date_key = ? AND voter_id = ?")
            .bind(date_key)
            .bind(voter_id)
            .fetch_optional(&mut *tx)
            .await?;
    let previous = previous.as_deref().and_then(ReactionKind::parse_kind);

    let stored: Option<String> = sqlx::query_scalar("SELECT reactions FROM queue WHERE date_key = ?")
        .bind(date_key)
        .fetch_optional(&mut *tx)
        .await?;
    let mut counts = match stored {
        Some(json) => serde_json::from_str(&json).map_err(|source| StoreError::Decode {
            date: date_key.to_string(),
            source,
        })?,
        None => ReactionCounts::default(),
    };

    if previous == Some(kind) {
        return Ok(counts);
    }

    if let Some(prev) = previous {
        counts.decrement(prev);
    }
    counts.increment(kind);

    let json = serde_json::to_string(&counts).map_err(|source| StoreError::Decode {
        date: date_key.to_string(),
        source,
    })?;

    // The row is created implicitly on a first vote against an empty day.
    sqlx::query(
        "INSERT INTO queue (date_key, status, reactions) VALUES (?, 'empty', ?) \
         ON CONFLICT(date_key) DO UPDATE SET \
             reactions = excluded.reactions, \
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(date_key)
    .bind(&json)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO reaction_votes (date_key, voter_id, kind) VALUES (?, ?, ?) \
         ON CONFLICT(date_key, voter_id) DO UPDATE SET \
             kind = excluded.kind, \
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(date_key)
    .bind(voter_id)
    .bind(kind.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(counts)
}
