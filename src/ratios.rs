//! Sample windows and the target-share ratio series.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::models::{GroupName, Metric, QuarterlyRow, RatioRow, SampleWindow};

/// The canonical windows of the table: the full period plus the 1990 split.
/// Overlap is deliberate so one pass reports both the overall and the
/// split-sample view.
pub fn sample_windows(start: NaiveDate, end: NaiveDate) -> Vec<SampleWindow> {
    let split_end = NaiveDate::from_ymd_opt(1990, 12, 31).expect("valid split date");
    let split_start = NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid split date");
    vec![
        SampleWindow { start, end },
        SampleWindow { start, end: split_end },
        SampleWindow { start: split_start, end },
    ]
}

/// For each window, compute the target group's share of the combined metric
/// against every comparison group, one row per target quarter.
///
/// A zero combined value is an undefined ratio, not a division; so is a
/// comparison group with no matching quarter. Windows are evaluated
/// independently against the full quarterly series.
pub fn build_ratios(
    prepped: &BTreeMap<GroupName, Vec<QuarterlyRow>>,
    windows: &[SampleWindow],
) -> Vec<RatioRow> {
    static EMPTY: Vec<QuarterlyRow> = Vec::new();
    let target = prepped.get(&GroupName::PrimaryDealers).unwrap_or(&EMPTY);

    let comparison_index: Vec<HashMap<NaiveDate, &QuarterlyRow>> = GroupName::COMPARISON
        .iter()
        .map(|group| {
            prepped
                .get(group)
                .map(|rows| rows.iter().map(|r| (r.quarter, r)).collect())
                .unwrap_or_default()
        })
        .collect();

    let mut out = Vec::new();
    for window in windows {
        let label = window.label();
        for target_row in target.iter().filter(|r| window.contains(r.quarter)) {
            let mut ratio = RatioRow::new(target_row.quarter, label.clone());
            for (gi, index) in comparison_index.iter().enumerate() {
                let Some(comparison) = index.get(&target_row.quarter) else {
                    continue;
                };
                for (mi, metric) in Metric::ALL.iter().enumerate() {
                    let target_value = target_row.metric(*metric);
                    let combined = target_value + comparison.metric(*metric);
                    ratio.cells[mi][gi] = if combined == 0.0 {
                        None
                    } else {
                        Some(target_value / combined)
                    };
                }
            }
            out.push(ratio);
        }
    }
    out
}
