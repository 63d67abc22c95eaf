use crate::error::{AppError, Result};
use crate::models::{DataPoint, Indicator};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Open (or create) the database under `data_dir` and run migrations.
pub async fn init(data_dir: &Path) -> Result<SqlitePool> {
    let db_path = data_dir.join("indicadores.db");
    let database_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
    info!(url = %database_url, "Connecting to SQLite database");
    connect(&database_url).await
}

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn indicator_id(pool: &SqlitePool, slug: &str) -> Result<i64> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM indicators WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    id.ok_or_else(|| AppError::UnknownIndicator(slug.to_string()))
}

/// The low-water mark: latest stored date for the indicator, or None when the
/// table holds no rows for it yet.
pub async fn latest_date(pool: &SqlitePool, indicator_id: i64) -> Result<Option<NaiveDate>> {
    let max: Option<NaiveDate> =
        sqlx::query_scalar("SELECT MAX(date) FROM observations WHERE indicator_id = $1")
            .bind(indicator_id)
            .fetch_one(pool)
            .await?;

    Ok(max)
}

pub async fn count_points(pool: &SqlitePool, indicator_id: i64) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE indicator_id = $1")
            .bind(indicator_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

/// Insert-or-update the batch inside a single transaction. A write failure
/// partway through rolls the whole batch back, leaving the stored series
/// exactly as it was before the run.
pub async fn upsert_points(
    pool: &SqlitePool,
    indicator_id: i64,
    points: &[DataPoint],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut upserted = 0u64;

    for point in points {
        let result = sqlx::query(
            "INSERT INTO observations (indicator_id, date, value)
             VALUES ($1, $2, $3)
             ON CONFLICT (indicator_id, date) DO UPDATE
             SET value = EXCLUDED.value",
        )
        .bind(indicator_id)
        .bind(point.date)
        .bind(point.value)
        .execute(&mut *tx)
        .await?;

        upserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(upserted)
}

/// Stored series ordered by date, optionally restricted to a window.
pub async fn series(
    pool: &SqlitePool,
    indicator_id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<DataPoint>> {
    let rows = sqlx::query_as::<_, DataPoint>(
        "SELECT date, value FROM observations
         WHERE indicator_id = $1
           AND ($2 IS NULL OR date >= $2)
           AND ($3 IS NULL OR date <= $3)
         ORDER BY date ASC",
    )
    .bind(indicator_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Read path for the query API. Distinguishes a never-populated series
/// (`NoData`) from a populated series whose requested window happens to be
/// empty (`Ok(vec![])`).
pub async fn read_series(
    pool: &SqlitePool,
    slug: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<DataPoint>> {
    let id = indicator_id(pool, slug).await?;
    if count_points(pool, id).await? == 0 {
        return Err(AppError::NoData(slug.to_string()));
    }
    series(pool, id, start, end).await
}

pub async fn list_indicators(pool: &SqlitePool) -> Result<Vec<Indicator>> {
    let rows = sqlx::query_as::<_, Indicator>(
        "SELECT id, slug, name, unit, source, cadence,
                last_synced_at, sync_status, error_message
         FROM indicators
         ORDER BY slug",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Record the outcome of a reconciliation run. Success stamps
/// `last_synced_at`; failures keep the previous stamp so staleness checks
/// still see when data was last refreshed.
pub async fn update_sync_status(
    pool: &SqlitePool,
    slug: &str,
    status: &str,
    error: Option<&str>,
) -> Result<()> {
    if status == "success" {
        sqlx::query(
            "UPDATE indicators
             SET sync_status = $1, error_message = NULL, last_synced_at = $2
             WHERE slug = $3",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(slug)
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            "UPDATE indicators
             SET sync_status = $1, error_message = $2
             WHERE slug = $3",
        )
        .bind(status)
        .bind(error)
        .bind(slug)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn last_synced_at(pool: &SqlitePool, slug: &str) -> Result<Option<DateTime<Utc>>> {
    let stamp: Option<Option<DateTime<Utc>>> =
        sqlx::query_scalar("SELECT last_synced_at FROM indicators WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await?;

    Ok(stamp.flatten())
}
