use crate::core::registry::IndicatorMeta;
use crate::error::{AppError, Result};
use crate::models::DataPoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub mod bcb;
pub mod sidra;

const REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// One adapter per upstream provider. Implementations must hand the
/// reconciler a clean series: deduplicated by date, sorted ascending, with
/// malformed values dropped. A failed fetch yields an error, never a partial
/// series.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        meta: &IndicatorMeta,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DataPoint>>;
}

/// Shared HTTP client. The BCB API blocks default library user agents.
pub fn build_client() -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("econ-panel/0.1"));

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET with bounded exponential backoff. Transport errors, timeouts, 429 and
/// 5xx are retried; any other non-success status fails immediately.
pub(crate) async fn get_with_retry(client: &Client, url: &str) -> Result<String> {
    let mut last_error = String::new();

    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            let jitter = rand::thread_rng().gen_range(0..250);
            let delay = BACKOFF_BASE_MS * (1 << (attempt - 1)) + jitter;
            warn!(url, attempt, delay_ms = delay, "Retrying upstream request");
            sleep(Duration::from_millis(delay)).await;
        }

        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let body = resp.text().await?;
                    if body.trim().is_empty() {
                        return Err(AppError::Fetch(format!("Empty response body from {}", url)));
                    }
                    return Ok(body);
                }

                let retryable = status.as_u16() == 429 || status.is_server_error();
                let body_head: String = resp
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(200)
                    .collect();
                last_error = format!("HTTP {} from {}: {}", status, url, body_head);
                if !retryable {
                    return Err(AppError::Fetch(last_error));
                }
            }
            Err(e) => {
                last_error = format!("Request to {} failed: {}", url, e);
            }
        }
    }

    Err(AppError::Fetch(format!(
        "{} (gave up after {} attempts)",
        last_error, MAX_ATTEMPTS
    )))
}

/// Deduplicate by date (last occurrence wins, matching upsert semantics) and
/// sort ascending.
pub(crate) fn normalize(points: Vec<DataPoint>) -> Vec<DataPoint> {
    let map: BTreeMap<NaiveDate, f64> = points.into_iter().map(|p| (p.date, p.value)).collect();
    map.into_iter()
        .map(|(date, value)| DataPoint { date, value })
        .collect()
}

/// Parse a provider decimal that may use a comma separator ("4,32") or a
/// point ("4.32"). Returns None for placeholders like "...", "-" or empty
/// strings, which both providers use for missing observations.
pub(crate) fn parse_locale_decimal(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() || cleaned == "." || cleaned.chars().all(|c| c == '.' || c == '-') {
        return None;
    }
    cleaned.parse::<f64>().ok()
}
