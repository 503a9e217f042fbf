//! Curated reference inputs: the primary-dealer ticker list and the gvkey
//! link table. Parsing is lenient by design: malformed rows are skipped with
//! a warning so one bad line never sinks the whole load.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{EffectiveEnd, EffectiveRange, EntityRecord};

/// Date formats the curated tables are allowed to use. Anything else is an
/// error, never a guess.
const KNOWN_DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%m/%d/%y", "%Y-%m-%d"];

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path} is missing required column {column:?}")]
    MissingColumn { path: String, column: &'static str },
    #[error("unrecognized date {0:?} (expected m/d/YYYY, m/d/YY or YYYY-MM-DD)")]
    Date(String),
}

/// Parse a date from the curated tables against the enumerated format set.
pub fn parse_reference_date(raw: &str) -> Result<NaiveDate, ReferenceError> {
    let trimmed = raw.trim();
    for format in KNOWN_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    Err(ReferenceError::Date(trimmed.to_string()))
}

fn parse_effective_end(raw: &str) -> Result<EffectiveEnd, ReferenceError> {
    if raw.trim().eq_ignore_ascii_case("current") {
        Ok(EffectiveEnd::Current)
    } else {
        parse_reference_date(raw).map(EffectiveEnd::On)
    }
}

/// One row of the curated dealer ticker list.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRow {
    pub ticker: String,
    pub gvkey: i64,
    pub permco: i64,
    pub effective: EffectiveRange,
}

/// One row of the gvkey link table.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRow {
    pub gvkey: i64,
    pub name: String,
    pub sic: Option<u32>,
    pub fyear: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub ticks: Vec<TickRow>,
    pub links: Vec<LinkRow>,
}

/// Column lookup over a CSV header row.
struct Columns {
    header: StringRecord,
}

impl Columns {
    fn new(path: &Path, header: StringRecord, required: &[&'static str]) -> Result<Self, ReferenceError> {
        for column in required {
            if !header.iter().any(|h| h.trim() == *column) {
                return Err(ReferenceError::MissingColumn {
                    path: path.display().to_string(),
                    column,
                });
            }
        }
        Ok(Self { header })
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        let index = self.header.iter().position(|h| h.trim() == column)?;
        record.get(index).map(str::trim)
    }
}

fn parse_int_field(raw: Option<&str>) -> i64 {
    // empty or fractional keys collapse to 0, meaning "unlinked"
    raw.and_then(|s| s.parse::<f64>().ok())
        .map(|v| v as i64)
        .unwrap_or(0)
}

/// Load both curated tables from `manual_dir`.
pub fn load_reference_tables(manual_dir: &Path) -> Result<ReferenceTables, ReferenceError> {
    let ticks = load_ticks(&manual_dir.join("ticks.csv"))?;
    let links = load_linktable(&manual_dir.join("updated_linktable.csv"))?;
    info!(
        "loaded {} dealer tickers and {} link rows",
        ticks.len(),
        links.len()
    );
    Ok(ReferenceTables { ticks, links })
}

/// The dealer list is pipe-delimited and hand-maintained; rows with broken
/// dates or no gvkey are skipped, not fatal.
pub fn load_ticks(path: &Path) -> Result<Vec<TickRow>, ReferenceError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    let header = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let columns = Columns::new(path, header, &["gvkey", "Start Date", "End Date"])?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed line in {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };
        match parse_tick_row(&columns, &record) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {} // unlinked ticker, nothing to fetch
            Err(e) => {
                warn!("skipping row in {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("{}: skipped {} unusable rows", path.display(), skipped);
    }
    Ok(rows)
}

fn parse_tick_row(
    columns: &Columns,
    record: &StringRecord,
) -> Result<Option<TickRow>, ReferenceError> {
    let gvkey = parse_int_field(columns.get(record, "gvkey"));
    if gvkey == 0 {
        return Ok(None);
    }
    let start = parse_reference_date(columns.get(record, "Start Date").unwrap_or_default())?;
    let end = parse_effective_end(columns.get(record, "End Date").unwrap_or_default())?;
    Ok(Some(TickRow {
        ticker: columns
            .get(record, "Ticker")
            .unwrap_or_default()
            .to_string(),
        gvkey,
        permco: parse_int_field(columns.get(record, "Permco")),
        effective: EffectiveRange { start, end },
    }))
}

pub fn load_linktable(path: &Path) -> Result<Vec<LinkRow>, ReferenceError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    let header = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let columns = Columns::new(path, header, &["GVKEY", "conm"])?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed line in {}: {}", path.display(), e);
                continue;
            }
        };
        let gvkey = parse_int_field(columns.get(&record, "GVKEY"));
        if gvkey == 0 {
            continue;
        }
        rows.push(LinkRow {
            gvkey,
            name: columns
                .get(&record, "conm")
                .unwrap_or_default()
                .to_string(),
            sic: columns
                .get(&record, "sic")
                .and_then(|s| s.parse::<u32>().ok()),
            fyear: columns
                .get(&record, "fyear")
                .and_then(|s| s.parse::<i32>().ok()),
        });
    }
    Ok(rows)
}

fn csv_error(path: &Path, source: csv::Error) -> ReferenceError {
    ReferenceError::Csv {
        path: path.display().to_string(),
        source,
    }
}

/// Merge the dealer list with the link table into the target group, and lift
/// the (optionally fiscal-year-restricted) link universe into entity records.
///
/// A link row with no ticker match is retained for comparison-group
/// membership; a ticker with no link match contributes nothing.
pub fn merge_target_group(
    tables: &ReferenceTables,
    fyear_cutoff: Option<i32>,
) -> (Vec<EntityRecord>, Vec<EntityRecord>) {
    let links: Vec<&LinkRow> = tables
        .links
        .iter()
        .filter(|link| match (fyear_cutoff, link.fyear) {
            (Some(cutoff), Some(fyear)) => fyear <= cutoff,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect();

    let mut target = Vec::new();
    let mut seen = HashSet::new();
    for tick in &tables.ticks {
        for link in links.iter().filter(|l| l.gvkey == tick.gvkey) {
            let record = EntityRecord {
                gvkey: link.gvkey,
                name: link.name.clone(),
                sic: link.sic,
                effective: Some(tick.effective),
            };
            if seen.insert(record.clone()) {
                target.push(record);
            }
        }
    }

    let mut universe = Vec::new();
    let mut seen_links = HashSet::new();
    for link in &links {
        let record = EntityRecord {
            gvkey: link.gvkey,
            name: link.name.clone(),
            sic: link.sic,
            effective: None,
        };
        if seen_links.insert((record.gvkey, record.name.clone(), record.sic)) {
            universe.push(record);
        }
    }

    (target, universe)
}
