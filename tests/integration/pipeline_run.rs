//! End-to-end pipeline runs against an in-memory source and a temp data dir.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use dealer_ratios::models::{Config, GroupName, Metric};
use dealer_ratios::pipeline::TablePipeline;

use crate::common::test_data::fundamentals_row;
use crate::common::{fixtures, StaticSource};

fn test_config(data_dir: &std::path::Path, output_dir: &std::path::Path) -> Config {
    Config {
        wrds_username: String::new(),
        wrds_base_url: "http://unused.invalid".to_string(),
        data_dir: data_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        start_date: NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2012, 12, 31).unwrap(),
        updated_end_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        use_extended_range: false,
    }
}

fn sample_source() -> StaticSource {
    StaticSource {
        rows: vec![
            // target group, Q1-2000
            fundamentals_row(100, "PRIMARY DEALER CO", 2000, 2, 100.0),
            // bank, same quarter
            fundamentals_row(200, "BANK CO", 2000, 3, 300.0),
            // industrial, same quarter
            fundamentals_row(300, "WIDGET CO", 2000, 1, 100.0),
            // non-dealer broker, same quarter
            fundamentals_row(400, "BROKER CO", 2000, 2, 100.0),
        ],
    }
}

#[tokio::test]
async fn test_pipeline_produces_expected_ratios_and_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let output_dir = dir.path().join("output");
    fixtures::write_reference_tables(&data_dir);

    let config = test_config(&data_dir, &output_dir);
    let pipeline = TablePipeline::new(sample_source(), config);
    let table = pipeline.run().await.unwrap();

    // PD 100 vs Banks 300: 100 / 400
    assert_eq!(
        table.cell("1960-2012", Metric::TotalAssets, GroupName::Banks),
        Some(0.25)
    );
    // BD comparison holds only gvkey 400: 100 / 200
    assert_eq!(
        table.cell("1960-2012", Metric::BookDebt, GroupName::BrokerDealers),
        Some(0.5)
    );
    // Cmpust. is everyone but the target: 100 / (100 + 500)
    let compustat = table
        .cell("1960-2012", Metric::MarketEquity, GroupName::Compustat)
        .unwrap();
    assert!((compustat - 1.0 / 6.0).abs() < 1e-12);
    // no quarters before 1990 in the fixture
    assert_eq!(
        table.cell("1960-1990", Metric::TotalAssets, GroupName::Banks),
        None
    );

    let periods: Vec<&str> = table.rows.iter().map(|r| r.period.as_str()).collect();
    assert_eq!(periods, vec!["1960-2012", "1960-1990", "1990-2012"]);

    // rendered outputs for the baseline variant
    assert!(output_dir.join("table02.tex").exists());
    assert!(output_dir.join("table02_sstable.tex").exists());
    assert!(output_dir.join("table02_corr.tex").exists());
    let latex = std::fs::read_to_string(output_dir.join("table02.tex")).unwrap();
    assert!(latex.contains("\\begin{tabular}{lcccccccccccc}"));
    assert!(latex.contains("0.250"));

    // snapshots were cached per group
    for name in ["fundq_pd_baseline", "fundq_bd_baseline", "fundq_banks_baseline", "fundq_cmpust_baseline"] {
        assert!(data_dir.join("pulled").join(format!("{name}.csv")).exists());
    }
}

#[tokio::test]
async fn test_second_run_reuses_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let output_dir = dir.path().join("output");
    fixtures::write_reference_tables(&data_dir);

    let config = test_config(&data_dir, &output_dir);
    let first = TablePipeline::new(sample_source(), config.clone())
        .run()
        .await
        .unwrap();

    // an empty source would yield an empty table, so identical output proves reuse
    let empty = StaticSource { rows: Vec::new() };
    let second = TablePipeline::new(empty, config).run().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unusable_snapshot_skips_group_but_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let output_dir = dir.path().join("output");
    fixtures::write_reference_tables(&data_dir);

    // banks snapshot without a date column: that group is skipped
    let pulled = data_dir.join("pulled");
    std::fs::create_dir_all(&pulled).unwrap();
    std::fs::write(pulled.join("fundq_banks_baseline.csv"), "gvkey,conm\n200,BANK CO\n").unwrap();

    let config = test_config(&data_dir, &output_dir);
    let table = TablePipeline::new(sample_source(), config)
        .run()
        .await
        .unwrap();

    assert_eq!(
        table.cell("1960-2012", Metric::TotalAssets, GroupName::Banks),
        None
    );
    // other groups still produce output
    assert_eq!(
        table.cell("1960-2012", Metric::TotalAssets, GroupName::BrokerDealers),
        Some(0.5)
    );
}

#[tokio::test]
async fn test_extended_variant_writes_updated_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let output_dir = dir.path().join("output");
    fixtures::write_reference_tables(&data_dir);

    let mut config = test_config(&data_dir, &output_dir);
    config.use_extended_range = true;
    let table = TablePipeline::new(sample_source(), config)
        .run()
        .await
        .unwrap();

    assert!(output_dir.join("updated_table02.tex").exists());
    let periods: Vec<&str> = table.rows.iter().map(|r| r.period.as_str()).collect();
    assert_eq!(periods, vec!["1960-2025", "1960-1990", "1990-2025"]);
}
