use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tg_quotebot::autofill::{AutoFill, InFlight};
use tg_quotebot::db;
use tg_quotebot::dedup::Exclusions;
use tg_quotebot::model::{horizon_keys, QueueStatus, Quote, HORIZON_DAYS};
use tg_quotebot::provider::{ProviderChain, ProviderError, QuoteProvider};

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

/// Emits a unique quote per call and records the author exclusions it saw.
struct CountingProvider {
    calls: AtomicUsize,
    seen_authors: Arc<Mutex<Vec<Vec<String>>>>,
}

impl CountingProvider {
    fn new() -> (Box<dyn QuoteProvider>, Arc<Mutex<Vec<Vec<String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Self {
                calls: AtomicUsize::new(0),
                seen_authors: seen.clone(),
            }),
            seen,
        )
    }
}

#[async_trait]
impl QuoteProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, exclusions: &Exclusions) -> Result<Quote, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_authors.lock().unwrap().push(
            exclusions.authors.iter().map(str::to_string).collect(),
        );
        Ok(Quote {
            text: format!("Original thought number {n}."),
            author_name: format!("Author {n}"),
            author_role: "Writer".into(),
            author_country: "Chile".into(),
        })
    }
}

/// Poll until the queue holds `want` rows, failing after a bounded wait.
async fn wait_for_rows(pool: &sqlx::SqlitePool, want: usize) {
    for _ in 0..500 {
        if db::get_all(pool).await.unwrap().len() >= want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("queue never reached {want} rows");
}

#[tokio::test]
async fn worker_fills_the_whole_horizon_then_idles() {
    let pool = setup_pool().await;
    let (provider, _) = CountingProvider::new();
    let chain = Arc::new(ProviderChain::new(vec![provider], Duration::from_secs(600)));
    let in_flight = Arc::new(InFlight::default());

    let (autofill, changed) = AutoFill::new(
        pool.clone(),
        chain,
        in_flight,
        Duration::from_millis(10),
    );
    let worker = tokio::spawn(autofill.run());
    changed.notify();

    wait_for_rows(&pool, HORIZON_DAYS as usize).await;

    let items = db::get_all(&pool).await.unwrap();
    for key in horizon_keys() {
        let item = items.get(&key).unwrap_or_else(|| panic!("missing {key}"));
        assert_eq!(item.status, QueueStatus::Draft);
        assert!(item.content.is_some());
    }

    // Horizon complete: an extra signal must not add rows.
    changed.notify();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(db::get_all(&pool).await.unwrap().len(), HORIZON_DAYS as usize);

    drop(changed);
    worker.await.unwrap();
}

#[tokio::test]
async fn earlier_fills_are_excluded_from_later_requests() {
    let pool = setup_pool().await;
    let (provider, seen) = CountingProvider::new();
    let chain = Arc::new(ProviderChain::new(vec![provider], Duration::from_secs(600)));
    let in_flight = Arc::new(InFlight::default());

    let (autofill, changed) = AutoFill::new(
        pool.clone(),
        chain,
        in_flight,
        Duration::from_millis(10),
    );
    let worker = tokio::spawn(autofill.run());
    changed.notify();

    wait_for_rows(&pool, HORIZON_DAYS as usize).await;

    let seen = seen.lock().unwrap();
    assert!(seen[0].is_empty());
    // Each later request carries every author accepted before it.
    assert!(seen[1].contains(&"Author 0".to_string()));
    let last = seen.last().unwrap();
    for n in 0..seen.len() - 1 {
        assert!(last.contains(&format!("Author {n}")));
    }
    drop(seen);

    // No author was ever reused across the horizon.
    let items = db::get_all(&pool).await.unwrap();
    let mut authors: Vec<String> = items
        .values()
        .map(|i| i.content.as_ref().unwrap().author_name.clone())
        .collect();
    authors.sort();
    authors.dedup();
    assert_eq!(authors.len(), HORIZON_DAYS as usize);

    drop(changed);
    worker.await.unwrap();
}
