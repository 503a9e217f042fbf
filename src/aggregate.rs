//! Quarterly aggregation: dedup, quarter-end alignment, mean imputation and
//! per-quarter sums.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashSet};

use crate::models::{FundamentalsRow, GroupName, Metric, QuarterlyRow};

/// Last calendar day of the quarter containing `date`.
pub fn quarter_end(date: NaiveDate) -> NaiveDate {
    let (month, day) = match date.month0() / 3 {
        0 => (3, 31),
        1 => (6, 30),
        2 => (9, 30),
        _ => (12, 31),
    };
    NaiveDate::from_ymd_opt(date.year(), month, day).expect("quarter ends are valid dates")
}

// Exact-duplicate key; metric values are compared bit-for-bit so that
// identical rows from overlapping fetch windows collapse to one.
fn row_key(row: &FundamentalsRow) -> (NaiveDate, i64, String, [Option<u64>; 4]) {
    let bits = |v: Option<f64>| v.map(f64::to_bits);
    (
        row.datadate,
        row.gvkey,
        row.conm.clone(),
        [
            bits(row.total_assets),
            bits(row.book_debt),
            bits(row.book_equity),
            bits(row.market_equity),
        ],
    )
}

/// Aggregate one group's raw rows into one row per calendar quarter.
///
/// Missing metric values are filled with that metric's mean over the group's
/// available rows before summing. That imputation is deliberately biased
/// toward the group average and matches the published tables; keep the
/// semantics if this is ever rewritten. A metric with no observations at all
/// contributes zero to every quarter.
pub fn aggregate_group(rows: &[FundamentalsRow]) -> Vec<QuarterlyRow> {
    let mut seen = HashSet::new();
    let deduped: Vec<&FundamentalsRow> = rows
        .iter()
        .filter(|row| seen.insert(row_key(row)))
        .collect();

    // per-metric means over available rows, computed before the quarterly sum
    let mut means = [None; 4];
    for (i, metric) in Metric::ALL.iter().enumerate() {
        let values: Vec<f64> = deduped.iter().filter_map(|r| r.metric(*metric)).collect();
        if !values.is_empty() {
            means[i] = Some(values.iter().sum::<f64>() / values.len() as f64);
        }
    }

    let mut quarters: BTreeMap<NaiveDate, [f64; 4]> = BTreeMap::new();
    for row in &deduped {
        let entry = quarters.entry(quarter_end(row.datadate)).or_insert([0.0; 4]);
        for (i, metric) in Metric::ALL.iter().enumerate() {
            if let Some(value) = row.metric(*metric).or(means[i]) {
                entry[i] += value;
            }
        }
    }

    quarters
        .into_iter()
        .map(|(quarter, [total_assets, book_debt, book_equity, market_equity])| QuarterlyRow {
            quarter,
            total_assets,
            book_debt,
            book_equity,
            market_equity,
        })
        .collect()
}

/// Aggregate every group's dataset. Groups are independent: an empty dataset
/// yields an empty series, not a failure.
pub fn prep_datasets(
    datasets: &BTreeMap<GroupName, Vec<FundamentalsRow>>,
) -> BTreeMap<GroupName, Vec<QuarterlyRow>> {
    datasets
        .iter()
        .map(|(group, rows)| (*group, aggregate_group(rows)))
        .collect()
}
