//! Catalog ingestion: fetch → parse → persist each card.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use welfarebridge_catalog::{ListingClient, ListingPayload, ListingQuery};
use welfarebridge_shared::{IngestPolicy, Result, WelfareBridgeError, WelfareCard};
use welfarebridge_storage::WelfareStore;

/// Options for one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Value injected into the `city` column of every row.
    pub city: String,
    pub policy: IngestPolicy,
    /// Parse and report without writing anything.
    pub dry_run: bool,
}

/// One card that failed to persist under [`IngestPolicy::ContinueOnError`].
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Position of the card in the payload.
    pub index: usize,
    pub title: String,
    pub error: String,
}

/// What happened to one card.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Persisted { index: usize, id: i64 },
    Skipped { index: usize },
    Failed(ItemFailure),
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Hex SHA-256 of the XML payload the cards came from.
    pub payload_sha256: String,
    pub city: String,
    pub dry_run: bool,
    pub parsed: usize,
    /// Row ids in card order.
    pub persisted: Vec<i64>,
    pub failures: Vec<ItemFailure>,
    pub elapsed_ms: u64,
}

impl IngestReport {
    pub fn persisted_count(&self) -> usize {
        self.persisted.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Progress callback for reporting ingestion status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each card, persisted or not.
    fn card(&self, outcome: &ItemOutcome, current: usize, total: usize);
    /// Called when the run completes without aborting.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn card(&self, _outcome: &ItemOutcome, _current: usize, _total: usize) {}
    fn done(&self, _report: &IngestReport) {}
}

/// Fetch one listing page and ingest it.
///
/// A fetch failure or malformed payload fails the whole run before any
/// card is written.
#[instrument(skip_all, fields(city = %options.city))]
pub async fn ingest_catalog(
    client: &ListingClient,
    query: &ListingQuery,
    store: &WelfareStore,
    options: &IngestOptions,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    progress.phase("Fetching welfare listing");
    let payload = client.fetch(query).await?;
    ingest_payload(&payload, store, options, progress).await
}

/// Parse `payload` and persist each card in order.
///
/// Under [`IngestPolicy::AbortOnFirstError`] the first failing card's
/// error is returned and the remaining cards are not attempted; cards
/// already written stay written. Under [`IngestPolicy::ContinueOnError`]
/// failures are collected into the report.
#[instrument(skip_all, fields(city = %options.city, policy = ?options.policy))]
pub async fn ingest_payload(
    payload: &ListingPayload,
    store: &WelfareStore,
    options: &IngestOptions,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = Uuid::now_v7();
    let payload_sha256 = payload.sha256();

    info!(%run_id, sha256 = %payload_sha256, "starting ingestion");

    progress.phase("Parsing listing");
    let cards = payload.cards()?;

    let mut report = IngestReport {
        run_id,
        started_at,
        payload_sha256,
        city: options.city.clone(),
        dry_run: options.dry_run,
        parsed: cards.len(),
        persisted: Vec::new(),
        failures: Vec::new(),
        elapsed_ms: 0,
    };

    progress.phase(if options.dry_run {
        "Checking cards"
    } else {
        "Persisting cards"
    });
    persist_cards(&cards, store, options, progress, &mut report).await?;

    report.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        %run_id,
        parsed = report.parsed,
        persisted = report.persisted.len(),
        failed = report.failures.len(),
        elapsed_ms = report.elapsed_ms,
        "ingestion finished"
    );
    progress.done(&report);
    Ok(report)
}

async fn persist_cards(
    cards: &[WelfareCard],
    store: &WelfareStore,
    options: &IngestOptions,
    progress: &dyn ProgressReporter,
    report: &mut IngestReport,
) -> Result<()> {
    let total = cards.len();

    for (index, card) in cards.iter().enumerate() {
        let result = if options.dry_run {
            check_card(card).map(|()| None)
        } else {
            store.save(card, &options.city).await.map(Some)
        };

        let outcome = match result {
            Ok(Some(id)) => {
                report.persisted.push(id);
                ItemOutcome::Persisted { index, id }
            }
            Ok(None) => ItemOutcome::Skipped { index },
            Err(e) => match options.policy {
                IngestPolicy::AbortOnFirstError => {
                    warn!(
                        index,
                        title = %card.title,
                        persisted = report.persisted.len(),
                        error = %e,
                        "aborting batch"
                    );
                    return Err(e);
                }
                IngestPolicy::ContinueOnError => {
                    warn!(index, title = %card.title, error = %e, "card failed, continuing");
                    let failure = ItemFailure {
                        index,
                        title: card.title.clone(),
                        error: e.to_string(),
                    };
                    report.failures.push(failure.clone());
                    ItemOutcome::Failed(failure)
                }
            },
        };
        progress.card(&outcome, index + 1, total);
    }
    Ok(())
}

/// The precondition the writer enforces, checked without a database.
fn check_card(card: &WelfareCard) -> Result<()> {
    if card.has_title() {
        Ok(())
    } else {
        Err(WelfareBridgeError::validation("title is required"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use welfarebridge_shared::AppConfig;
    use welfarebridge_storage::Storage;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const DDL: &str = "CREATE TABLE welfare_item (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL, summary TEXT, period TEXT, agency TEXT,
        contact TEXT, eligibility TEXT, link TEXT, city TEXT
    );";

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/xml/lcgv-welfare-list.xml")
            .expect("read listing fixture")
    }

    /// Fixture with the second record's title blanked out.
    fn fixture_with_untitled_middle() -> ListingPayload {
        ListingPayload {
            body: fixture().replace(
                "<servNm>청년 월세 한시 특별지원</servNm>",
                "<servNm>  </servNm>",
            ),
        }
    }

    async fn store() -> (Storage, WelfareStore) {
        let tmp = std::env::temp_dir().join(format!("wb_core_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        storage
            .connect()
            .unwrap()
            .execute_batch(DDL)
            .await
            .expect("create table");
        let store = WelfareStore::new(storage.clone(), "welfare_item").unwrap();
        (storage, store)
    }

    async fn count(storage: &Storage) -> i64 {
        let conn = storage.connect().unwrap();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM welfare_item", ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    fn options(policy: IngestPolicy) -> IngestOptions {
        IngestOptions {
            city: "서울특별시".into(),
            policy,
            dry_run: false,
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for Recorder {
        fn phase(&self, name: &str) {
            self.events.lock().unwrap().push(format!("phase:{name}"));
        }
        fn card(&self, outcome: &ItemOutcome, current: usize, total: usize) {
            let tag = match outcome {
                ItemOutcome::Persisted { .. } => "ok",
                ItemOutcome::Skipped { .. } => "skip",
                ItemOutcome::Failed(_) => "fail",
            };
            self.events
                .lock()
                .unwrap()
                .push(format!("{tag}:{current}/{total}"));
        }
        fn done(&self, _report: &IngestReport) {
            self.events.lock().unwrap().push("done".into());
        }
    }

    #[tokio::test]
    async fn persists_every_card_in_order() {
        let (storage, store) = store().await;
        let payload = ListingPayload { body: fixture() };

        let report = ingest_payload(
            &payload,
            &store,
            &options(IngestPolicy::AbortOnFirstError),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.parsed, 3);
        assert_eq!(report.persisted_count(), 3);
        assert!(report.persisted.windows(2).all(|w| w[0] < w[1]));
        assert!(report.is_complete());
        assert_eq!(report.payload_sha256, payload.sha256());
        assert_eq!(count(&storage).await, 3);
    }

    #[tokio::test]
    async fn abort_policy_leaves_partial_result() {
        let (storage, store) = store().await;

        let err = ingest_payload(
            &fixture_with_untitled_middle(),
            &store,
            &options(IngestPolicy::AbortOnFirstError),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(err.is_validation());
        // The first card committed before the failure; the third was never tried.
        assert_eq!(count(&storage).await, 1);
    }

    #[tokio::test]
    async fn continue_policy_reports_failures() {
        let (storage, store) = store().await;
        let recorder = Recorder::default();

        let report = ingest_payload(
            &fixture_with_untitled_middle(),
            &store,
            &options(IngestPolicy::ContinueOnError),
            &recorder,
        )
        .await
        .unwrap();

        assert_eq!(report.parsed, 3);
        assert_eq!(report.persisted_count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(report.failures[0].error.contains("title"));
        assert_eq!(count(&storage).await, 2);

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "phase:Parsing listing",
                "phase:Persisting cards",
                "ok:1/3",
                "fail:2/3",
                "ok:3/3",
                "done",
            ]
        );
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let (storage, store) = store().await;
        let mut opts = options(IngestPolicy::ContinueOnError);
        opts.dry_run = true;

        let report = ingest_payload(&fixture_with_untitled_middle(), &store, &opts, &SilentProgress)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.parsed, 3);
        assert!(report.persisted.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(count(&storage).await, 0);
    }

    #[tokio::test]
    async fn malformed_payload_writes_nothing() {
        let (storage, store) = store().await;
        let payload = ListingPayload {
            body: "<wantedList><servList><servNm>x</servNm></wantedList>".into(),
        };

        let err = ingest_payload(
            &payload,
            &store,
            &options(IngestPolicy::ContinueOnError),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WelfareBridgeError::Parse { .. }));
        assert_eq!(count(&storage).await, 0);
    }

    #[tokio::test]
    async fn fetch_then_ingest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("ctpvNm", "서울특별시"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let (storage, store) = store().await;
        let client = ListingClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let query = ListingQuery::from_config(&AppConfig::default(), "k").city("서울특별시");

        let report = ingest_catalog(
            &client,
            &query,
            &store,
            &options(IngestPolicy::AbortOnFirstError),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.persisted_count(), 3);
        assert_eq!(count(&storage).await, 3);
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (storage, store) = store().await;
        let client = ListingClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let query = ListingQuery::from_config(&AppConfig::default(), "k");

        let err = ingest_catalog(
            &client,
            &query,
            &store,
            &options(IngestPolicy::AbortOnFirstError),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WelfareBridgeError::Network(_)));
        assert_eq!(count(&storage).await, 0);
    }
}
