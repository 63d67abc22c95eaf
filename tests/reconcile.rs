use async_trait::async_trait;
use chrono::NaiveDate;
use econ_panel::core::reconciler;
use econ_panel::core::registry::{IndicatorMeta, Registry};
use econ_panel::core::seeder;
use econ_panel::db;
use econ_panel::error::{AppError, Result};
use econ_panel::fetcher::SourceAdapter;
use econ_panel::models::DataPoint;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Adapter that replays pre-scripted fetch results and records the windows
/// it was asked for.
struct ScriptedAdapter {
    batches: Mutex<VecDeque<Result<Vec<DataPoint>>>>,
    seen_windows: Mutex<Vec<Option<NaiveDate>>>,
}

impl ScriptedAdapter {
    fn new(batches: Vec<Result<Vec<DataPoint>>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            seen_windows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(
        &self,
        _meta: &IndicatorMeta,
        start: Option<NaiveDate>,
        _end: Option<NaiveDate>,
    ) -> Result<Vec<DataPoint>> {
        self.seen_windows.lock().unwrap().push(start);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .expect("adapter called more times than scripted")
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn point(y: i32, m: u32, d: u32, value: f64) -> DataPoint {
    DataPoint {
        date: date(y, m, d),
        value,
    }
}

/// One connection only: each connection to `sqlite::memory:` is its own
/// database.
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    seeder::seed_registry(&pool).await.unwrap();
    pool
}

async fn stored_rows(pool: &SqlitePool, slug: &str) -> Vec<DataPoint> {
    let id = db::indicator_id(pool, slug).await.unwrap();
    db::series(pool, id, None, None).await.unwrap()
}

#[tokio::test]
async fn initial_load_populates_empty_store() {
    let pool = test_pool().await;
    let meta = Registry::get("cambio").unwrap();
    let adapter = ScriptedAdapter::new(vec![Ok(vec![
        point(2024, 1, 1, 10.0),
        point(2024, 1, 2, 10.5),
    ])]);

    let report = reconciler::reconcile(&pool, &adapter, meta).await.unwrap();

    assert_eq!(report.fetched, 2);
    assert!(report.did_work());
    assert_eq!(report.latest_before, None);
    assert_eq!(report.latest_after, Some(date(2024, 1, 2)));

    let rows = stored_rows(&pool, "cambio").await;
    assert_eq!(rows, vec![point(2024, 1, 1, 10.0), point(2024, 1, 2, 10.5)]);
}

#[tokio::test]
async fn revision_is_applied_and_new_point_added() {
    let pool = test_pool().await;
    let meta = Registry::get("cambio").unwrap();
    let id = db::indicator_id(&pool, "cambio").await.unwrap();
    db::upsert_points(&pool, id, &[point(2024, 1, 1, 10.0)])
        .await
        .unwrap();

    let adapter = ScriptedAdapter::new(vec![Ok(vec![
        point(2024, 1, 1, 10.2),
        point(2024, 1, 2, 10.5),
    ])]);
    reconciler::reconcile(&pool, &adapter, meta).await.unwrap();

    let rows = stored_rows(&pool, "cambio").await;
    assert_eq!(rows, vec![point(2024, 1, 1, 10.2), point(2024, 1, 2, 10.5)]);
}

#[tokio::test]
async fn reapplying_the_same_batch_is_idempotent() {
    let pool = test_pool().await;
    let meta = Registry::get("ipca").unwrap();
    let batch = vec![point(2024, 1, 1, 0.42), point(2024, 2, 1, 0.83)];

    let adapter = ScriptedAdapter::new(vec![Ok(batch.clone()), Ok(batch.clone())]);
    reconciler::reconcile(&pool, &adapter, meta).await.unwrap();
    let first = stored_rows(&pool, "ipca").await;

    reconciler::reconcile(&pool, &adapter, meta).await.unwrap();
    let second = stored_rows(&pool, "ipca").await;

    assert_eq!(first, second);
    assert_eq!(second.len(), 2);
}

#[tokio::test]
async fn fetch_failure_leaves_store_unchanged() {
    let pool = test_pool().await;
    let meta = Registry::get("cambio").unwrap();
    let id = db::indicator_id(&pool, "cambio").await.unwrap();
    db::upsert_points(&pool, id, &[point(2024, 1, 1, 10.0)])
        .await
        .unwrap();

    let adapter = ScriptedAdapter::new(vec![Err(AppError::Fetch(
        "timed out".to_string(),
    ))]);
    let result = reconciler::reconcile(&pool, &adapter, meta).await;

    assert!(matches!(result, Err(AppError::Fetch(_))));
    let rows = stored_rows(&pool, "cambio").await;
    assert_eq!(rows, vec![point(2024, 1, 1, 10.0)]);
}

#[tokio::test]
async fn max_stored_date_never_regresses() {
    let pool = test_pool().await;
    let meta = Registry::get("cambio").unwrap();
    let id = db::indicator_id(&pool, "cambio").await.unwrap();
    db::upsert_points(&pool, id, &[point(2024, 3, 1, 5.0)])
        .await
        .unwrap();

    // Upstream only re-serves an older revision.
    let adapter = ScriptedAdapter::new(vec![Ok(vec![point(2024, 2, 15, 4.9)])]);
    let report = reconciler::reconcile(&pool, &adapter, meta).await.unwrap();

    assert_eq!(report.latest_before, Some(date(2024, 3, 1)));
    assert_eq!(report.latest_after, Some(date(2024, 3, 1)));
}

#[tokio::test]
async fn no_two_rows_share_a_date() {
    let pool = test_pool().await;
    let meta = Registry::get("selic").unwrap();

    let adapter = ScriptedAdapter::new(vec![
        Ok(vec![point(2024, 1, 1, 11.25), point(2024, 2, 1, 11.25)]),
        Ok(vec![point(2024, 2, 1, 11.00), point(2024, 3, 1, 10.75)]),
    ]);
    reconciler::reconcile(&pool, &adapter, meta).await.unwrap();
    reconciler::reconcile(&pool, &adapter, meta).await.unwrap();

    let id = db::indicator_id(&pool, "selic").await.unwrap();
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE indicator_id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    let distinct: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT date) FROM observations WHERE indicator_id = $1",
    )
    .bind(id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(total, 3);
    assert_eq!(total, distinct);
}

#[tokio::test]
async fn incremental_fetch_starts_at_overlap_window() {
    let pool = test_pool().await;
    let meta = Registry::get("cambio").unwrap();
    let id = db::indicator_id(&pool, "cambio").await.unwrap();
    db::upsert_points(&pool, id, &[point(2024, 3, 15, 4.95)])
        .await
        .unwrap();

    let adapter = ScriptedAdapter::new(vec![Ok(vec![])]);
    reconciler::reconcile(&pool, &adapter, meta).await.unwrap();

    // 30-day lookback from the stored low-water mark.
    let windows = adapter.seen_windows.lock().unwrap();
    assert_eq!(*windows, vec![Some(date(2024, 2, 14))]);
}

#[tokio::test]
async fn empty_fetch_performs_no_work() {
    let pool = test_pool().await;
    let meta = Registry::get("pib").unwrap();

    let adapter = ScriptedAdapter::new(vec![Ok(vec![])]);
    let report = reconciler::reconcile(&pool, &adapter, meta).await.unwrap();

    assert!(!report.did_work());
    assert_eq!(report.upserted, 0);
    assert!(stored_rows(&pool, "pib").await.is_empty());
}

#[tokio::test]
async fn sync_status_records_success_and_failure() {
    let pool = test_pool().await;

    db::update_sync_status(&pool, "cambio", "success", None)
        .await
        .unwrap();
    let stamp = db::last_synced_at(&pool, "cambio").await.unwrap();
    assert!(stamp.is_some());

    db::update_sync_status(&pool, "ipca", "error", Some("HTTP 500"))
        .await
        .unwrap();
    let indicators = db::list_indicators(&pool).await.unwrap();
    let ipca = indicators.iter().find(|i| i.slug == "ipca").unwrap();
    assert_eq!(ipca.sync_status, "error");
    assert_eq!(ipca.error_message.as_deref(), Some("HTTP 500"));
    assert!(ipca.last_synced_at.is_none());
}
