use super::{ApiError, AppState};
use crate::core::registry::Registry;
use crate::db;
use crate::error::AppError;
use crate::models::{Indicator, SeriesPayload};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize, Default)]
pub struct SeriesQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Trailing window shortcut used by the daily exchange-rate panel.
    pub window_days: Option<u64>,
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_indicators_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Indicator>>, ApiError> {
    db::list_indicators(&state.pool)
        .await
        .map(Json)
        .map_err(|e| ApiError::internal("indicators", "", e.to_string()))
}

/// Read-only series endpoint. Never touches the upstream providers; a table
/// that has never been populated yields the structured error payload the
/// dashboard renders as an error state, distinct from an empty window on a
/// populated series.
pub async fn series_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesPayload>, ApiError> {
    let meta = Registry::get(&slug).ok_or_else(|| ApiError::unknown_indicator(&slug))?;

    let start = match (query.start, query.window_days) {
        (Some(start), _) => Some(start),
        (None, Some(days)) => Utc::now().date_naive().checked_sub_days(Days::new(days)),
        (None, None) => None,
    };

    let points = match db::read_series(&state.pool, meta.slug, start, query.end).await {
        Ok(points) => points,
        Err(AppError::NoData(_)) => return Err(ApiError::no_data(meta.name, meta.unit)),
        Err(e) => return Err(ApiError::internal(meta.name, meta.unit, e.to_string())),
    };

    Ok(Json(SeriesPayload::from_points(&points, meta.name, meta.unit)))
}
