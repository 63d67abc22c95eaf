use crate::core::registry::{IndicatorMeta, Source};
use crate::db;
use crate::error::Result;
use crate::fetcher::bcb::BcbAdapter;
use crate::fetcher::sidra::SidraAdapter;
use crate::fetcher::SourceAdapter;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use sqlx::SqlitePool;
use tracing::{error, info};

/// Outcome of one reconciliation run, for logs and the indicator listing.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub slug: &'static str,
    pub window_start: NaiveDate,
    pub fetched: usize,
    pub upserted: u64,
    pub latest_before: Option<NaiveDate>,
    pub latest_after: Option<NaiveDate>,
}

impl SyncReport {
    pub fn did_work(&self) -> bool {
        self.upserted > 0
    }
}

/// Merge freshly fetched data into the stored series for one indicator.
///
/// Reads the low-water mark, fetches from the overlap window (or the
/// indicator's epoch when the store is empty), and applies the batch as a
/// single transactional upsert. Re-running with the same upstream data is a
/// no-op for the stored state; a fetch error aborts before any write.
pub async fn reconcile(
    pool: &SqlitePool,
    adapter: &dyn SourceAdapter,
    meta: &IndicatorMeta,
) -> Result<SyncReport> {
    let indicator_id = db::indicator_id(pool, meta.slug).await?;
    let latest_before = db::latest_date(pool, indicator_id).await?;

    let today = Utc::now().date_naive();
    let epoch_start = meta.epoch.start(today);
    let window_start = match latest_before {
        Some(last) => meta.lookback.window_start(last, epoch_start),
        None => epoch_start,
    };

    let points = adapter.fetch(meta, Some(window_start), None).await?;

    let upserted = if points.is_empty() {
        0
    } else {
        db::upsert_points(pool, indicator_id, &points).await?
    };

    let latest_after = db::latest_date(pool, indicator_id).await?;

    Ok(SyncReport {
        slug: meta.slug,
        window_start,
        fetched: points.len(),
        upserted,
        latest_before,
        latest_after,
    })
}

pub fn adapter_for(meta: &IndicatorMeta, client: &Client) -> Box<dyn SourceAdapter> {
    match &meta.source {
        Source::Sgs { .. } => Box::new(BcbAdapter::new(client.clone())),
        Source::Sidra { .. } => Box::new(SidraAdapter::new(client.clone())),
    }
}

/// Reconcile one indicator and record the outcome in the indicators table.
/// Errors are returned to the caller but never leave a half-applied batch.
pub async fn run(pool: &SqlitePool, client: &Client, meta: &IndicatorMeta) -> Result<SyncReport> {
    let adapter = adapter_for(meta, client);

    let _ = db::update_sync_status(pool, meta.slug, "updating", None).await;

    match reconcile(pool, adapter.as_ref(), meta).await {
        Ok(report) => {
            db::update_sync_status(pool, meta.slug, "success", None).await?;
            info!(
                slug = meta.slug,
                window_start = %report.window_start,
                fetched = report.fetched,
                upserted = report.upserted,
                latest = ?report.latest_after,
                "Reconciliation complete"
            );
            Ok(report)
        }
        Err(e) => {
            error!(
                slug = meta.slug,
                source = meta.source.provider_name(),
                error = %e,
                "Reconciliation failed"
            );
            let _ = db::update_sync_status(pool, meta.slug, "error", Some(&e.to_string())).await;
            Err(e)
        }
    }
}
