//! Descriptive side tables accompanying the main ratio table: per-group
//! summary statistics over the raw pulls, and cross-group correlations of
//! the quarterly aggregates.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{FundamentalsRow, GroupName, Metric, QuarterlyRow};

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Count/mean/std/min/max over a series. Sample standard deviation; zero for
/// a single observation.
pub fn series_stats(values: &[f64]) -> Option<SummaryStats> {
    if values.is_empty() {
        return None;
    }
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count as f64 - 1.0);
        variance.sqrt()
    } else {
        0.0
    };
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(SummaryStats {
        count,
        mean,
        std,
        min,
        max,
    })
}

/// Pearson correlation over two equal-length series. Undefined when either
/// side is constant or the series are empty.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Write the per-group summary-statistics side table for one variant.
pub fn write_summary_table(
    datasets: &BTreeMap<GroupName, Vec<FundamentalsRow>>,
    output_dir: &Path,
    updated: bool,
) -> Result<PathBuf> {
    let mut out = String::new();
    let _ = writeln!(out, "\\begin{{table}}[htbp]");
    let _ = writeln!(out, "\\centering");
    let _ = writeln!(
        out,
        "\\caption{{Summary statistics of fetched fundamentals}}"
    );
    let _ = writeln!(out, "\\label{{tab:table02_sstable}}");
    let _ = writeln!(out, "\\small");
    let _ = writeln!(out, "\\begin{{tabular}}{{llrrrrr}}");
    let _ = writeln!(out, "\\toprule");
    let _ = writeln!(out, "Group & Metric & Count & Mean & Std & Min & Max \\\\");
    let _ = writeln!(out, "\\midrule");

    for (group, rows) in datasets {
        for metric in Metric::ALL {
            let values: Vec<f64> = rows.iter().filter_map(|r| r.metric(metric)).collect();
            match series_stats(&values) {
                Some(stats) => {
                    let _ = writeln!(
                        out,
                        "{} & {} & {} & {:.2} & {:.2} & {:.2} & {:.2} \\\\",
                        group,
                        metric,
                        stats.count,
                        stats.mean,
                        stats.std,
                        stats.min,
                        stats.max
                    );
                }
                None => {
                    let _ = writeln!(out, "{group} & {metric} & 0 & & & & \\\\");
                }
            }
        }
    }

    let _ = writeln!(out, "\\bottomrule");
    let _ = writeln!(out, "\\end{{tabular}}");
    let _ = writeln!(out, "\\end{{table}}");

    let file_name = if updated {
        "updated_table02_sstable.tex"
    } else {
        "table02_sstable.tex"
    };
    write_output(output_dir, file_name, &out)
}

/// Write per-metric correlation matrices of the quarterly aggregates across
/// groups, over their common quarters.
pub fn write_correlation_table(
    prepped: &BTreeMap<GroupName, Vec<QuarterlyRow>>,
    output_dir: &Path,
    updated: bool,
) -> Result<PathBuf> {
    let groups: Vec<GroupName> = prepped.keys().copied().collect();
    let mut out = String::new();
    let _ = writeln!(out, "\\begin{{table}}[htbp]");
    let _ = writeln!(out, "\\centering");
    let _ = writeln!(
        out,
        "\\caption{{Cross-group correlations of quarterly aggregates}}"
    );
    let _ = writeln!(out, "\\label{{tab:table02_corr}}");
    let _ = writeln!(out, "\\small");

    for metric in Metric::ALL {
        let _ = writeln!(out, "\\medskip {}\\par", metric.label());
        let _ = writeln!(out, "\\begin{{tabular}}{{l{}}}", "r".repeat(groups.len()));
        let _ = writeln!(out, "\\toprule");
        let header = groups
            .iter()
            .map(|g| g.label())
            .collect::<Vec<_>>()
            .join(" & ");
        let _ = writeln!(out, " & {header} \\\\");
        let _ = writeln!(out, "\\midrule");
        for row_group in &groups {
            let mut line = row_group.label().to_string();
            for col_group in &groups {
                let value = correlate_groups(prepped, *row_group, *col_group, metric);
                match value {
                    Some(v) => {
                        let _ = write!(line, " & {v:.2}");
                    }
                    None => line.push_str(" & "),
                }
            }
            let _ = writeln!(out, "{line} \\\\");
        }
        let _ = writeln!(out, "\\bottomrule");
        let _ = writeln!(out, "\\end{{tabular}}");
    }

    let _ = writeln!(out, "\\end{{table}}");

    let file_name = if updated {
        "updated_table02_corr.tex"
    } else {
        "table02_corr.tex"
    };
    write_output(output_dir, file_name, &out)
}

fn correlate_groups(
    prepped: &BTreeMap<GroupName, Vec<QuarterlyRow>>,
    a: GroupName,
    b: GroupName,
    metric: Metric,
) -> Option<f64> {
    let rows_a = prepped.get(&a)?;
    let rows_b = prepped.get(&b)?;
    let by_quarter: BTreeMap<_, _> = rows_b.iter().map(|r| (r.quarter, r)).collect();
    let mut series_a = Vec::new();
    let mut series_b = Vec::new();
    for row in rows_a {
        if let Some(other) = by_quarter.get(&row.quarter) {
            series_a.push(row.metric(metric));
            series_b.push(other.metric(metric));
        }
    }
    pearson(&series_a, &series_b)
}

fn write_output(output_dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;
    let path = output_dir.join(file_name);
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    info!("side table saved to {}", path.display());
    Ok(path)
}
