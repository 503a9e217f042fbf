use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// End of an entity's effective link range. `Current` rows stay open-ended
/// until clamped to the variant end date at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveEnd {
    On(NaiveDate),
    Current,
}

impl EffectiveEnd {
    pub fn resolve(&self, fallback: NaiveDate) -> NaiveDate {
        match self {
            EffectiveEnd::On(date) => *date,
            EffectiveEnd::Current => fallback,
        }
    }
}

/// Effective date range from the curated dealer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectiveRange {
    pub start: NaiveDate,
    pub end: EffectiveEnd,
}

/// One linked entity from the reference tables. Immutable after loading.
///
/// `effective` is only populated for target-group entities; comparison
/// groups are fetched over a shared date range and carry no per-entity dates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRecord {
    pub gvkey: i64,
    pub name: String,
    pub sic: Option<u32>,
    pub effective: Option<EffectiveRange>,
}

/// Entity groups of the ratio table. `PrimaryDealers` is the target group;
/// the other three are comparison groups, `Compustat` being "all others".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupName {
    PrimaryDealers,
    BrokerDealers,
    Banks,
    Compustat,
}

impl GroupName {
    /// Comparison groups in presentation order.
    pub const COMPARISON: [GroupName; 3] =
        [GroupName::BrokerDealers, GroupName::Banks, GroupName::Compustat];

    pub fn label(&self) -> &'static str {
        match self {
            GroupName::PrimaryDealers => "PD",
            GroupName::BrokerDealers => "BD",
            GroupName::Banks => "Banks",
            GroupName::Compustat => "Cmpust.",
        }
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The four balance-sheet metrics of the table, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    TotalAssets,
    BookDebt,
    BookEquity,
    MarketEquity,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TotalAssets,
        Metric::BookDebt,
        Metric::BookEquity,
        Metric::MarketEquity,
    ];

    /// Column header used in the rendered table.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::TotalAssets => "Total assets",
            Metric::BookDebt => "Book debt",
            Metric::BookEquity => "Book equity",
            Metric::MarketEquity => "Market equity",
        }
    }

    /// Snake-case key used in snapshots and diagnostics.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::TotalAssets => "total_assets",
            Metric::BookDebt => "book_debt",
            Metric::BookEquity => "book_equity",
            Metric::MarketEquity => "market_equity",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One dated observation with sentinel fallbacks already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRow {
    pub datadate: NaiveDate,
    pub total_assets: Option<f64>,
    pub book_debt: Option<f64>,
    pub book_equity: Option<f64>,
    pub market_equity: Option<f64>,
    pub gvkey: i64,
    pub conm: String,
}

impl FundamentalsRow {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TotalAssets => self.total_assets,
            Metric::BookDebt => self.book_debt,
            Metric::BookEquity => self.book_equity,
            Metric::MarketEquity => self.market_equity,
        }
    }
}

/// Aggregated quarter. Invariant: at most one row per (group, quarter).
#[derive(Debug, Clone, PartialEq)]
pub struct QuarterlyRow {
    pub quarter: NaiveDate,
    pub total_assets: f64,
    pub book_debt: f64,
    pub book_equity: f64,
    pub market_equity: f64,
}

impl QuarterlyRow {
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TotalAssets => self.total_assets,
            Metric::BookDebt => self.book_debt,
            Metric::BookEquity => self.book_equity,
            Metric::MarketEquity => self.market_equity,
        }
    }
}

/// Closed sample interval with its canonical "YYYY-YYYY" label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SampleWindow {
    pub fn label(&self) -> String {
        use chrono::Datelike;
        format!("{}-{}", self.start.year(), self.end.year())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Quarterly ratio cells: metric-major 4x3 grid over the comparison groups.
/// `None` marks a zero combined denominator or a missing comparison quarter.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioRow {
    pub quarter: NaiveDate,
    pub period: String,
    pub cells: [[Option<f64>; 3]; 4],
}

impl RatioRow {
    pub fn new(quarter: NaiveDate, period: String) -> Self {
        Self {
            quarter,
            period,
            cells: [[None; 3]; 4],
        }
    }

    pub fn cell(&self, metric: Metric, group: GroupName) -> Option<f64> {
        let mi = Metric::ALL.iter().position(|m| *m == metric)?;
        let gi = GroupName::COMPARISON.iter().position(|g| *g == group)?;
        self.cells[mi][gi]
    }
}

/// Runtime configuration, materialized once and passed into each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub wrds_username: String,
    pub wrds_base_url: String,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub updated_end_date: NaiveDate,
    pub use_extended_range: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            wrds_username: std::env::var("WRDS_USERNAME").unwrap_or_default(),
            wrds_base_url: std::env::var("WRDS_BASE_URL")
                .unwrap_or_else(|_| "https://wrds-api.wharton.upenn.edu".to_string()),
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "output".to_string())
                .into(),
            start_date: parse_env_date("START_DATE", "1960-01-01")?,
            end_date: parse_env_date("END_DATE", "2012-12-31")?,
            updated_end_date: parse_env_date("UPDATED_END_DATE", "2025-01-01")?,
            use_extended_range: false,
        })
    }

    /// End date for the active variant. The extended cutoff never runs past
    /// today.
    pub fn variant_end(&self) -> NaiveDate {
        if self.use_extended_range {
            self.updated_end_date.min(Utc::now().date_naive())
        } else {
            self.end_date
        }
    }

    /// Directory holding the curated reference tables.
    pub fn manual_dir(&self) -> PathBuf {
        self.data_dir.join("manual")
    }

    /// Directory holding fetched dataset snapshots.
    pub fn pulled_dir(&self) -> PathBuf {
        self.data_dir.join("pulled")
    }
}

fn parse_env_date(var: &str, default: &str) -> Result<NaiveDate> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("{} must be YYYY-MM-DD, got {:?}: {}", var, raw, e))
}
