use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tg_quotebot::db;
use tg_quotebot::dedup::Exclusions;
use tg_quotebot::generate::{generate_for_date, GenerateError, MAX_ATTEMPTS};
use tg_quotebot::model::{QueueStatus, Quote};
use tg_quotebot::provider::{ProviderChain, ProviderError, QuoteProvider};

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn quote(text: &str, author: &str) -> Quote {
    Quote {
        text: text.into(),
        author_name: author.into(),
        author_role: "Writer".into(),
        author_country: "Mexico".into(),
    }
}

/// Snapshot of the exclusion lists a provider call received.
#[derive(Debug, Clone)]
struct SeenExclusions {
    authors: Vec<String>,
    quotes: Vec<String>,
}

/// Plays back a script of responses and records every call's exclusions.
struct RecordingProvider {
    responses: Mutex<VecDeque<Result<Quote, ProviderError>>>,
    seen: Arc<Mutex<Vec<SeenExclusions>>>,
}

impl RecordingProvider {
    fn new(
        responses: Vec<Result<Quote, ProviderError>>,
    ) -> (Box<dyn QuoteProvider>, Arc<Mutex<Vec<SeenExclusions>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Self {
                responses: Mutex::new(responses.into()),
                seen: seen.clone(),
            }),
            seen,
        )
    }
}

#[async_trait]
impl QuoteProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, exclusions: &Exclusions) -> Result<Quote, ProviderError> {
        self.seen.lock().unwrap().push(SeenExclusions {
            authors: exclusions.authors.iter().map(str::to_string).collect(),
            quotes: exclusions.quotes.iter().map(str::to_string).collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Failed("script exhausted".into())))
    }
}

fn chain_of(provider: Box<dyn QuoteProvider>) -> ProviderChain {
    ProviderChain::new(vec![provider], Duration::from_secs(600))
}

#[tokio::test]
async fn duplicate_candidate_is_retried_with_grown_exclusions() {
    let pool = setup_pool().await;
    let stored = quote("Wings beat fear.", "Frida Kahlo");
    db::upsert(&pool, "2026-09-01", QueueStatus::Approved, Some(&stored))
        .await
        .unwrap();

    // First candidate repeats the stored text, second is fresh.
    let (provider, seen) = RecordingProvider::new(vec![
        Ok(quote("wings   BEAT fear.", "Someone Else")),
        Ok(quote("Brand new words.", "Angela Davis")),
    ]);
    let chain = chain_of(provider);

    let outcome = generate_for_date(&pool, &chain, "2026-09-02", false)
        .await
        .unwrap();
    assert_eq!(outcome.quote.text, "Brand new words.");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    // The stored quote was excluded from the start.
    assert!(seen[0].quotes.contains(&"Wings beat fear.".to_string()));
    assert!(seen[0].authors.contains(&"Frida Kahlo".to_string()));
    // The rejected candidate's author joined the lists for the retry.
    assert!(seen[1].authors.contains(&"Someone Else".to_string()));

    let item = db::get(&pool, "2026-09-02").await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Draft);
    assert_eq!(item.content.unwrap().text, "Brand new words.");
}

#[tokio::test]
async fn exhaustion_after_bounded_attempts_leaves_date_empty() {
    let pool = setup_pool().await;
    db::upsert(
        &pool,
        "2026-09-01",
        QueueStatus::Draft,
        Some(&quote("Only one idea.", "Maya Angelou")),
    )
    .await
    .unwrap();

    // The provider can only ever repeat the stored quote.
    let responses = (0..MAX_ATTEMPTS + 2)
        .map(|_| Ok(quote("Only one idea.", "Maya Angelou")))
        .collect();
    let (provider, seen) = RecordingProvider::new(responses);
    let chain = chain_of(provider);

    let err = generate_for_date(&pool, &chain, "2026-09-02", true)
        .await
        .unwrap_err();
    match err {
        GenerateError::Exhausted { date, attempts } => {
            assert_eq!(date, "2026-09-02");
            assert_eq!(attempts, MAX_ATTEMPTS);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(seen.lock().unwrap().len(), MAX_ATTEMPTS);
    assert!(db::get(&pool, "2026-09-02").await.unwrap().is_none());
}

#[tokio::test]
async fn quota_falls_back_to_pool_and_still_persists_a_draft() {
    let pool = setup_pool().await;
    let (provider, _) =
        RecordingProvider::new(vec![Err(ProviderError::Quota("insufficient_quota".into()))]);
    let chain = chain_of(provider);

    let outcome = generate_for_date(&pool, &chain, "2026-09-03", true)
        .await
        .unwrap();
    assert_eq!(outcome.provider, "pool");
    assert!(outcome.degraded.unwrap().contains("insufficient_quota"));
    assert!(chain.is_cooling_down());

    let item = db::get(&pool, "2026-09-03").await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Draft);
    assert_eq!(item.content.unwrap(), outcome.quote);
}

#[tokio::test]
async fn accepted_quote_excludes_itself_from_later_rounds() {
    let pool = setup_pool().await;
    let (provider, seen) = RecordingProvider::new(vec![
        Ok(quote("First day.", "Marie Curie")),
        Ok(quote("Second day.", "Malala Yousafzai")),
    ]);
    let chain = chain_of(provider);

    generate_for_date(&pool, &chain, "2026-09-04", false)
        .await
        .unwrap();
    generate_for_date(&pool, &chain, "2026-09-05", false)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen[0].quotes.is_empty());
    assert!(seen[1].quotes.contains(&"First day.".to_string()));
    assert!(seen[1].authors.contains(&"Marie Curie".to_string()));
}
