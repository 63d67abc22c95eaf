use super::{get_with_retry, normalize, parse_locale_decimal, SourceAdapter};
use crate::core::registry::{IndicatorMeta, Source};
use crate::error::{AppError, Result};
use crate::models::DataPoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// Banco Central do Brasil SGS time-series API.
///
/// Payload is a JSON array of `{"data": "dd/mm/yyyy", "valor": "1.23"}`;
/// values occasionally arrive with a comma decimal separator, and missing
/// observations as "-" or an empty string.
pub struct BcbAdapter {
    client: Client,
}

impl BcbAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse_series(json: &Value) -> Result<Vec<DataPoint>> {
        let rows = json
            .as_array()
            .ok_or_else(|| AppError::Parse("SGS response is not an array".to_string()))?;

        let mut points = Vec::new();

        for row in rows {
            let (Some(date_str), Some(value_raw)) = (row["data"].as_str(), row["valor"].as_str())
            else {
                continue;
            };

            let Ok(date) = NaiveDate::parse_from_str(date_str, "%d/%m/%Y") else {
                continue;
            };

            if let Some(value) = parse_locale_decimal(value_raw) {
                points.push(DataPoint { date, value });
            }
        }

        Ok(normalize(points))
    }
}

#[async_trait]
impl SourceAdapter for BcbAdapter {
    fn name(&self) -> &str {
        "bcb-sgs"
    }

    async fn fetch(
        &self,
        meta: &IndicatorMeta,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DataPoint>> {
        let Source::Sgs { series } = &meta.source else {
            return Err(AppError::Config(format!(
                "Indicator '{}' is not an SGS series",
                meta.slug
            )));
        };

        let mut url = format!(
            "https://api.bcb.gov.br/dados/serie/bcdata.sgs.{}/dados?formato=json",
            series
        );
        if let Some(start) = start {
            url.push_str(&format!("&dataInicial={}", start.format("%d/%m/%Y")));
        }
        if let Some(end) = end {
            url.push_str(&format!("&dataFinal={}", end.format("%d/%m/%Y")));
        }

        debug!(slug = meta.slug, %url, "Fetching SGS series");

        let body = get_with_retry(&self.client, &url).await?;
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("SGS series {}: {}", series, e)))?;

        Self::parse_series(&json)
    }
}
