use crate::core::registry::{Registry, Source};
use crate::error::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Seed the indicators table from the static registry. Metadata is
/// upserted so label/unit edits in the registry propagate on restart, and
/// rows whose slug left the registry are removed together with their
/// observations.
pub async fn seed_registry(pool: &SqlitePool) -> Result<()> {
    let metas = Registry::all();
    info!(count = metas.len(), "Seeding indicators from registry");

    for meta in metas {
        let source = match &meta.source {
            Source::Sgs { series } => format!("sgs:{}", series),
            Source::Sidra { path } => format!("sidra:{}", path),
        };

        sqlx::query(
            "INSERT INTO indicators (slug, name, unit, source, cadence)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (slug) DO UPDATE
             SET name = EXCLUDED.name,
                 unit = EXCLUDED.unit,
                 source = EXCLUDED.source,
                 cadence = EXCLUDED.cadence",
        )
        .bind(meta.slug)
        .bind(meta.name)
        .bind(meta.unit)
        .bind(&source)
        .bind(meta.cadence.as_str())
        .execute(pool)
        .await?;
    }

    let known: Vec<&str> = metas.iter().map(|m| m.slug).collect();
    let stored: Vec<String> = sqlx::query_scalar("SELECT slug FROM indicators")
        .fetch_all(pool)
        .await?;

    for slug in stored {
        if !known.contains(&slug.as_str()) {
            sqlx::query("DELETE FROM indicators WHERE slug = $1")
                .bind(&slug)
                .execute(pool)
                .await?;
            info!(slug = %slug, "Removed indicator no longer in registry");
        }
    }

    Ok(())
}
