use chrono::{Days, Months, NaiveDate};
use once_cell::sync::Lazy;
use serde::Serialize;

// ============================================================================
// ENUMS
// ============================================================================

/// Which upstream provider serves the series, and how to address it there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Source {
    /// Banco Central do Brasil SGS time-series API (numeric series code).
    Sgs { series: u32 },
    /// IBGE SIDRA aggregate API (table/variable path, e.g. "t/4099/n1/all/v/4099/p/all").
    Sidra { path: &'static str },
}

impl Source {
    pub fn provider_name(&self) -> &'static str {
        match self {
            Source::Sgs { .. } => "BCB/SGS",
            Source::Sidra { .. } => "IBGE/SIDRA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Cadence {
    /// Fast-moving series, refreshed every day.
    Daily,
    /// Slow-moving series, refreshed on the first day of each month.
    Monthly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Monthly => "monthly",
        }
    }
}

/// How far behind the last stored date an incremental fetch starts. The
/// overlap deliberately re-fetches the tail of the stored series so upstream
/// revisions near the boundary are picked up by the upsert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Lookback {
    Days(u64),
    Months(u32),
    /// Re-fetch the whole series from its epoch every run. Used for SIDRA
    /// tables, which are small and have no server-side window parameter.
    Epoch,
}

impl Lookback {
    /// Start of the fetch window given the low-water mark.
    pub fn window_start(&self, last: NaiveDate, epoch: NaiveDate) -> NaiveDate {
        let start = match self {
            Lookback::Days(n) => last.checked_sub_days(Days::new(*n)),
            Lookback::Months(n) => last.checked_sub_months(Months::new(*n)),
            Lookback::Epoch => Some(epoch),
        };
        start.unwrap_or(epoch)
    }
}

/// First-fetch window used when the store holds no rows for the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Epoch {
    Since(NaiveDate),
    /// Providers like the PTAX daily series keep decades of history; the
    /// dashboard only ever shows the recent window, so the initial load is
    /// bounded to the last N days.
    LastDays(u64),
}

impl Epoch {
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Epoch::Since(date) => *date,
            Epoch::LastDays(n) => today.checked_sub_days(Days::new(*n)).unwrap_or(today),
        }
    }
}

// ============================================================================
// METADATA STRUCT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorMeta {
    pub slug: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub source: Source,
    pub cadence: Cadence,
    /// Minute offset within the scheduled hour, staggering runs so the
    /// upstream providers never see all indicators at once.
    pub offset_minutes: u32,
    pub lookback: Lookback,
    pub epoch: Epoch,
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid registry date")
}

// ============================================================================
// STATIC INDICATOR REGISTRY
// ============================================================================

static INDICATORS: Lazy<Vec<IndicatorMeta>> = Lazy::new(|| {
    vec![
        IndicatorMeta {
            slug: "cambio",
            name: "Taxa de Câmbio Livre - PTAX, diária (venda)",
            unit: "R$/US$",
            source: Source::Sgs { series: 1 },
            cadence: Cadence::Daily,
            offset_minutes: 0,
            lookback: Lookback::Days(30),
            epoch: Epoch::LastDays(30),
        },
        IndicatorMeta {
            slug: "ipca",
            name: "IPCA - Variação Mensal",
            unit: "%",
            source: Source::Sgs { series: 433 },
            cadence: Cadence::Monthly,
            offset_minutes: 10,
            lookback: Lookback::Months(6),
            epoch: Epoch::Since(ymd(2012, 1, 1)),
        },
        IndicatorMeta {
            slug: "selic",
            name: "Taxa SELIC Mensal",
            unit: "%",
            source: Source::Sgs { series: 4390 },
            cadence: Cadence::Monthly,
            offset_minutes: 15,
            lookback: Lookback::Months(6),
            epoch: Epoch::Since(ymd(2012, 1, 1)),
        },
        IndicatorMeta {
            slug: "balanca_comercial_pb",
            name: "Saldo da Balança Comercial da Paraíba",
            unit: "Milhões de Reais",
            source: Source::Sgs { series: 13352 },
            cadence: Cadence::Monthly,
            offset_minutes: 30,
            lookback: Lookback::Months(6),
            epoch: Epoch::Since(ymd(2002, 1, 1)),
        },
        IndicatorMeta {
            slug: "divida_liquida_pb",
            name: "Dívida Líquida do Governo do Estado da Paraíba",
            unit: "Milhões de Reais",
            source: Source::Sgs { series: 15547 },
            cadence: Cadence::Monthly,
            offset_minutes: 45,
            lookback: Lookback::Months(6),
            epoch: Epoch::Since(ymd(2002, 1, 1)),
        },
        IndicatorMeta {
            slug: "pib",
            name: "PIB do Brasil",
            unit: "%",
            source: Source::Sidra {
                path: "t/5932/n1/all/v/6561/p/all/c11255/90707/d/v6561%201",
            },
            cadence: Cadence::Monthly,
            offset_minutes: 5,
            lookback: Lookback::Epoch,
            epoch: Epoch::Since(ymd(2011, 10, 1)),
        },
        IndicatorMeta {
            slug: "pib_pb",
            name: "PIB da Paraíba",
            unit: "Milhões de Reais",
            source: Source::Sidra {
                path: "t/5938/n3/25/v/37/p/all",
            },
            cadence: Cadence::Monthly,
            offset_minutes: 20,
            lookback: Lookback::Epoch,
            epoch: Epoch::Since(ymd(2011, 1, 1)),
        },
        IndicatorMeta {
            slug: "desocupacao",
            name: "Taxa de Desocupação",
            unit: "%",
            source: Source::Sidra {
                path: "t/4099/n1/all/v/4099/p/all",
            },
            cadence: Cadence::Monthly,
            offset_minutes: 35,
            lookback: Lookback::Epoch,
            epoch: Epoch::Since(ymd(2011, 10, 1)),
        },
        IndicatorMeta {
            slug: "desocupacao_pb",
            name: "Taxa de Desocupação da Paraíba",
            unit: "%",
            source: Source::Sidra {
                path: "t/4099/n3/25/v/4099/p/all",
            },
            cadence: Cadence::Monthly,
            offset_minutes: 50,
            lookback: Lookback::Epoch,
            epoch: Epoch::Since(ymd(2011, 10, 1)),
        },
    ]
});

pub struct Registry;

impl Registry {
    pub fn all() -> &'static [IndicatorMeta] {
        &INDICATORS
    }

    pub fn get(slug: &str) -> Option<&'static IndicatorMeta> {
        INDICATORS.iter().find(|meta| meta.slug == slug)
    }
}
