use crate::core::reconciler;
use crate::core::registry::{Cadence, IndicatorMeta, Registry};
use crate::db;
use rand::Rng;
use reqwest::Client;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::time::sleep;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

/// Run every indicator once, sequentially, with jittered pacing between
/// upstream calls. Failures are isolated per indicator. Returns
/// (succeeded, failed).
pub async fn sync_all(pool: &SqlitePool, client: &Client) -> (usize, usize) {
    let mut succeeded = 0;
    let mut failed = 0;

    for meta in Registry::all() {
        match reconciler::run(pool, client, meta).await {
            Ok(_) => succeeded += 1,
            Err(_) => failed += 1,
        }

        // Both providers sit behind WAFs; pace the requests.
        let delay = rand::thread_rng().gen_range(500..1500);
        sleep(Duration::from_millis(delay)).await;
    }

    info!(succeeded, failed, "Full sync pass finished");
    (succeeded, failed)
}

/// Register one cron job per indicator. Daily series run at 03:00, monthly
/// series on the first day of the month at 03:xx, each with its registry
/// minute offset so runs never hit the providers simultaneously. Cadences
/// are spaced far enough apart that a run always finishes before the next
/// trigger for the same indicator.
pub async fn init(pool: SqlitePool, client: Client) -> Result<JobScheduler, anyhow::Error> {
    let sched = JobScheduler::new().await?;

    for meta in Registry::all() {
        let cron = match meta.cadence {
            Cadence::Daily => format!("0 {} 3 * * *", meta.offset_minutes),
            Cadence::Monthly => format!("0 {} 3 1 * *", meta.offset_minutes),
        };

        let pool_job = pool.clone();
        let client_job = client.clone();

        sched
            .add(Job::new_async(cron.as_str(), move |_uuid, _l| {
                let pool = pool_job.clone();
                let client = client_job.clone();
                Box::pin(async move {
                    if meta.cadence == Cadence::Daily && synced_today(&pool, meta).await {
                        info!(slug = meta.slug, "Already synced today, skipping");
                        return;
                    }

                    // Errors are already logged and recorded; the next
                    // cadence retries.
                    let _ = reconciler::run(&pool, &client, meta).await;
                })
            })?)
            .await?;

        info!(slug = meta.slug, cron = %cron, "Scheduled indicator");
    }

    sched.start().await?;
    Ok(sched)
}

/// True only when the indicator was successfully stamped earlier today. A
/// failed run never stamps `last_synced_at`, so it is retried by the next
/// trigger.
pub(crate) async fn synced_today(pool: &SqlitePool, meta: &IndicatorMeta) -> bool {
    match db::last_synced_at(pool, meta.slug).await {
        Ok(Some(stamp)) => stamp.date_naive() == chrono::Utc::now().date_naive(),
        Ok(None) => false,
        Err(e) => {
            warn!(slug = meta.slug, error = %e, "Staleness check failed");
            false
        }
    }
}
