use super::{get_with_retry, normalize, parse_locale_decimal, SourceAdapter};
use crate::core::registry::{IndicatorMeta, Source};
use crate::error::{AppError, Result};
use crate::models::DataPoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// IBGE SIDRA aggregate API.
///
/// The wide JSON format returns an array whose first element is a header row
/// mapping short column keys to display names ("D3C" -> "Trimestre (Código)",
/// "V" -> "Valor"). Period codes come as YYYYQQ for quarterly tables and
/// YYYY for annual ones; values use a comma decimal separator and "..." for
/// observations not yet published.
///
/// SIDRA has no server-side date window, so the requested window is applied
/// locally after parsing.
pub struct SidraAdapter {
    client: Client,
}

impl SidraAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse_table(json: &Value) -> Result<Vec<DataPoint>> {
        let rows = json
            .as_array()
            .ok_or_else(|| AppError::Parse("SIDRA response is not an array".to_string()))?;

        let (header, data) = rows
            .split_first()
            .ok_or_else(|| AppError::Parse("SIDRA response is empty".to_string()))?;

        let header_obj = header
            .as_object()
            .ok_or_else(|| AppError::Parse("SIDRA header row is not an object".to_string()))?;

        // The period dimension varies by table (Trimestre, Ano, Mês); its
        // coded column is the one whose display name carries "(Código)".
        // The dimension name decides how the code is read: "202402" is the
        // second quarter of a quarterly table but February of a monthly one.
        let (period_key, period_kind) = header_obj
            .iter()
            .find_map(|(key, name)| {
                let name = name.as_str()?;
                if !name.ends_with("(Código)") {
                    return None;
                }
                let kind = if name.starts_with("Trimestre") {
                    PeriodKind::Quarterly
                } else if name.starts_with("Ano") {
                    PeriodKind::Annual
                } else if name.starts_with("Mês") {
                    PeriodKind::Monthly
                } else {
                    return None;
                };
                Some((key.clone(), kind))
            })
            .ok_or_else(|| AppError::Parse("SIDRA header has no period column".to_string()))?;

        let mut points = Vec::new();

        for row in data {
            let (Some(code), Some(value_raw)) = (row[&period_key].as_str(), row["V"].as_str())
            else {
                continue;
            };

            let Some(date) = parse_period_code(code, period_kind) else {
                continue;
            };

            if let Some(value) = parse_locale_decimal(value_raw) {
                points.push(DataPoint { date, value });
            }
        }

        Ok(normalize(points))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PeriodKind {
    Quarterly,
    Monthly,
    Annual,
}

/// Convert a SIDRA period code to the first calendar day it covers.
/// Annual "2023" -> 2023-01-01; quarterly "202303" -> 2023-07-01;
/// monthly "202303" -> 2023-03-01.
fn parse_period_code(code: &str, kind: PeriodKind) -> Option<NaiveDate> {
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    match kind {
        PeriodKind::Annual => {
            if code.len() != 4 {
                return None;
            }
            let year: i32 = code.parse().ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1)
        }
        PeriodKind::Quarterly | PeriodKind::Monthly => {
            if code.len() != 6 {
                return None;
            }
            let year: i32 = code[..4].parse().ok()?;
            let period: u32 = code[4..].parse().ok()?;
            let month = match kind {
                PeriodKind::Quarterly if (1..=4).contains(&period) => (period - 1) * 3 + 1,
                PeriodKind::Monthly if (1..=12).contains(&period) => period,
                _ => return None,
            };
            NaiveDate::from_ymd_opt(year, month, 1)
        }
    }
}

#[async_trait]
impl SourceAdapter for SidraAdapter {
    fn name(&self) -> &str {
        "ibge-sidra"
    }

    async fn fetch(
        &self,
        meta: &IndicatorMeta,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DataPoint>> {
        let Source::Sidra { path } = &meta.source else {
            return Err(AppError::Config(format!(
                "Indicator '{}' is not a SIDRA table",
                meta.slug
            )));
        };

        let url = format!("https://apisidra.ibge.gov.br/values/{}?formato=json", path);
        debug!(slug = meta.slug, %url, "Fetching SIDRA table");

        let body = get_with_retry(&self.client, &url).await?;
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("SIDRA table {}: {}", path, e)))?;

        let points = Self::parse_table(&json)?;
        Ok(points
            .into_iter()
            .filter(|p| start.map_or(true, |s| p.date >= s))
            .filter(|p| end.map_or(true, |e| p.date <= e))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quarterly_payload() -> Value {
        json!([
            { "NC": "Nível Territorial (Código)", "D3C": "Trimestre (Código)", "D3N": "Trimestre", "V": "Valor" },
            { "NC": "1", "D3C": "202301", "D3N": "1º trimestre 2023", "V": "8,3" },
            { "NC": "1", "D3C": "202302", "D3N": "2º trimestre 2023", "V": "8,0" },
            { "NC": "1", "D3C": "202303", "D3N": "3º trimestre 2023", "V": "..." }
        ])
    }

    #[test]
    fn test_parse_quarterly_table() {
        let points = SidraAdapter::parse_table(&quarterly_payload()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[0].date,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert_eq!(points[0].value, 8.3);
        assert_eq!(
            points[1].date,
            NaiveDate::from_ymd_opt(2023, 4, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_annual_table() {
        let json_data = json!([
            { "NC": "Nível Territorial (Código)", "D2C": "Ano (Código)", "V": "Valor" },
            { "NC": "3", "D2C": "2020", "V": "64.373" },
            { "NC": "3", "D2C": "2021", "V": "77.470" }
        ]);

        let points = SidraAdapter::parse_table(&json_data).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[0].date,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_monthly_table() {
        // The same 6-digit code means different months depending on the
        // period dimension; a monthly table must not be read as quarters.
        let json_data = json!([
            { "NC": "Nível Territorial (Código)", "D2C": "Mês (Código)", "V": "Valor" },
            { "NC": "1", "D2C": "202402", "V": "0,83" },
            { "NC": "1", "D2C": "202411", "V": "0,39" }
        ]);

        let points = SidraAdapter::parse_table(&json_data).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[0].date,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert_eq!(
            points[1].date,
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_period_codes() {
        assert_eq!(
            parse_period_code("202304", PeriodKind::Quarterly),
            NaiveDate::from_ymd_opt(2023, 10, 1)
        );
        assert_eq!(
            parse_period_code("202302", PeriodKind::Monthly),
            NaiveDate::from_ymd_opt(2023, 2, 1)
        );
        assert_eq!(
            parse_period_code("202312", PeriodKind::Monthly),
            NaiveDate::from_ymd_opt(2023, 12, 1)
        );
        assert_eq!(
            parse_period_code("2023", PeriodKind::Annual),
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );
        assert_eq!(parse_period_code("abcd", PeriodKind::Annual), None);
        assert_eq!(parse_period_code("202312", PeriodKind::Quarterly), None);
        assert_eq!(parse_period_code("202399", PeriodKind::Monthly), None);
        assert_eq!(parse_period_code("202303", PeriodKind::Annual), None);
    }

    #[test]
    fn test_parse_missing_header() {
        let json_data = json!([
            { "X": "whatever" },
            { "X": "1" }
        ]);
        assert!(SidraAdapter::parse_table(&json_data).is_err());
    }
}
