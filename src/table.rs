//! Final table assembly and LaTeX rendering. Row and column order are a
//! presentation contract consumed by the report build, not incidental.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{GroupName, Metric, RatioRow, SampleWindow};

/// Fixed LaTeX column alignment: label column plus twelve centered values.
const COLUMN_FORMAT: &str = "lcccccccccccc";

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub period: String,
    pub cells: [[Option<f64>; 3]; 4],
}

/// The rendered table: one row per sample window, in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalTable {
    pub rows: Vec<TableRow>,
}

impl FinalTable {
    pub fn cell(&self, period: &str, metric: Metric, group: GroupName) -> Option<f64> {
        let row = self.rows.iter().find(|r| r.period == period)?;
        let mi = Metric::ALL.iter().position(|m| *m == metric)?;
        let gi = GroupName::COMPARISON.iter().position(|g| *g == group)?;
        row.cells[mi][gi]
    }
}

/// Average the quarterly ratio cells within each window label, then reindex
/// rows to the canonical window order regardless of input order. Cells with
/// no defined quarters stay undefined.
pub fn format_final_table(ratios: &[RatioRow], windows: &[SampleWindow]) -> FinalTable {
    let mut sums: HashMap<&str, ([[f64; 3]; 4], [[u32; 3]; 4])> = HashMap::new();
    for row in ratios {
        let (sum, count) = sums
            .entry(row.period.as_str())
            .or_insert(([[0.0; 3]; 4], [[0; 3]; 4]));
        for mi in 0..Metric::ALL.len() {
            for gi in 0..GroupName::COMPARISON.len() {
                if let Some(value) = row.cells[mi][gi] {
                    sum[mi][gi] += value;
                    count[mi][gi] += 1;
                }
            }
        }
    }

    let rows = windows
        .iter()
        .map(|window| {
            let period = window.label();
            let mut cells = [[None; 3]; 4];
            if let Some((sum, count)) = sums.get(period.as_str()) {
                for mi in 0..Metric::ALL.len() {
                    for gi in 0..GroupName::COMPARISON.len() {
                        if count[mi][gi] > 0 {
                            cells[mi][gi] = Some(sum[mi][gi] / count[mi][gi] as f64);
                        }
                    }
                }
            }
            TableRow { period, cells }
        })
        .collect();

    FinalTable { rows }
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.3}"),
        None => String::new(),
    }
}

/// Render the table body plus its `table` environment wrapper.
pub fn render_latex(table: &FinalTable, caption: &str, label: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\\begin{{table}}[htbp]");
    let _ = writeln!(out, "\\centering");
    let _ = writeln!(out, "\\caption{{{caption}}}");
    let _ = writeln!(out, "\\label{{{label}}}");
    let _ = writeln!(out, "\\small");
    let _ = writeln!(out, "\\begin{{tabular}}{{{COLUMN_FORMAT}}}");
    let _ = writeln!(out, "\\toprule");

    let metric_spans = Metric::ALL
        .iter()
        .map(|m| format!("\\multicolumn{{3}}{{c}}{{{}}}", m.label()))
        .collect::<Vec<_>>()
        .join(" & ");
    let _ = writeln!(out, " & {metric_spans} \\\\");

    let sources = GroupName::COMPARISON
        .iter()
        .map(|g| g.label())
        .collect::<Vec<_>>()
        .join(" & ");
    let _ = writeln!(out, "Period & {} \\\\", vec![sources; 4].join(" & "));
    let _ = writeln!(out, "\\midrule");

    for row in &table.rows {
        let values = row
            .cells
            .iter()
            .flatten()
            .map(|v| format_cell(*v))
            .collect::<Vec<_>>()
            .join(" & ");
        let _ = writeln!(out, "{} & {} \\\\", row.period, values);
    }

    let _ = writeln!(out, "\\bottomrule");
    let _ = writeln!(out, "\\end{{tabular}}");
    let _ = writeln!(out, "\\end{{table}}");
    out
}

/// Write the rendered table for one report variant.
pub fn write_table(table: &FinalTable, output_dir: &Path, updated: bool) -> Result<PathBuf> {
    let (caption, file_name) = if updated {
        ("Updated sample", "updated_table02.tex")
    } else {
        ("Baseline sample", "table02.tex")
    };
    let latex = render_latex(table, caption, "tab:table02");
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;
    let path = output_dir.join(file_name);
    fs::write(&path, latex).with_context(|| format!("writing {}", path.display()))?;
    info!("Table 02 LaTeX saved to {}", path.display());
    Ok(path)
}
