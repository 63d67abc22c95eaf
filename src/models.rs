use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One observation of an indicator: a calendar date and a numeric value.
/// Each indicator holds at most one point per date.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct DataPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Indicator {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub unit: String,
    pub source: String,
    pub cadence: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: String,
    pub error_message: Option<String>,
}

/// Wire shape consumed by the dashboard charts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeriesPayload {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
    pub label: String,
    pub unit: String,
}

impl SeriesPayload {
    pub fn from_points(points: &[DataPoint], label: &str, unit: &str) -> Self {
        Self {
            dates: points
                .iter()
                .map(|p| p.date.format("%Y-%m-%d").to_string())
                .collect(),
            values: points.iter().map(|p| p.value).collect(),
            label: label.to_string(),
            unit: unit.to_string(),
        }
    }
}
