//! Raw rows through aggregation, ratios and formatting, no I/O involved.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

use dealer_ratios::aggregate;
use dealer_ratios::models::{GroupName, Metric};
use dealer_ratios::ratios;
use dealer_ratios::table;

use crate::common::test_data::fundamentals_row;

#[test]
fn test_raw_rows_to_final_table() {
    let mut datasets = BTreeMap::new();
    // target: two gvkeys summing to 100 in Q1-2000
    datasets.insert(
        GroupName::PrimaryDealers,
        vec![
            fundamentals_row(100, "PD A", 2000, 1, 60.0),
            fundamentals_row(101, "PD B", 2000, 2, 40.0),
        ],
    );
    // comparison: 300 in the same quarter
    datasets.insert(
        GroupName::Banks,
        vec![fundamentals_row(200, "BANK CO", 2000, 3, 300.0)],
    );

    let prepped = aggregate::prep_datasets(&datasets);
    assert_eq!(prepped[&GroupName::PrimaryDealers].len(), 1);
    assert_eq!(
        prepped[&GroupName::PrimaryDealers][0].quarter,
        NaiveDate::from_ymd_opt(2000, 3, 31).unwrap()
    );
    assert_eq!(prepped[&GroupName::PrimaryDealers][0].total_assets, 100.0);

    let windows = ratios::sample_windows(
        NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2012, 12, 31).unwrap(),
    );
    let ratio_rows = ratios::build_ratios(&prepped, &windows);
    let final_table = table::format_final_table(&ratio_rows, &windows);

    // 100 / (100 + 300)
    assert_eq!(
        final_table.cell("1960-2012", Metric::TotalAssets, GroupName::Banks),
        Some(0.25)
    );
    // quarter falls after 1990, so the early window stays undefined
    assert_eq!(
        final_table.cell("1960-1990", Metric::TotalAssets, GroupName::Banks),
        None
    );
    assert_eq!(
        final_table.cell("1990-2012", Metric::TotalAssets, GroupName::Banks),
        Some(0.25)
    );

    let periods: Vec<&str> = final_table
        .rows
        .iter()
        .map(|r| r.period.as_str())
        .collect();
    assert_eq!(periods, vec!["1960-2012", "1960-1990", "1990-2012"]);
}
