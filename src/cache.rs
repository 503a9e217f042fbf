//! Flat CSV snapshots of fetched datasets. Presence of the file is the whole
//! invalidation policy: exists means reuse, delete the file to refetch.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::FundamentalsRow;

pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    /// Read a snapshot if it exists. `Ok(None)` means "not cached"; an error
    /// means the file is there but unusable (e.g. no date column).
    pub fn read(&self, name: &str) -> Result<Option<Vec<FundamentalsRow>>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let rows = read_rows(&path)?;
        info!("loaded {} cached rows from {}", rows.len(), path.display());
        Ok(Some(rows))
    }

    pub fn write(&self, name: &str, rows: &[FundamentalsRow]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache dir {}", self.dir.display()))?;
        let path = self.path(name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating snapshot {}", path.display()))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!("saved {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

fn read_rows(path: &Path) -> Result<Vec<FundamentalsRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening snapshot {}", path.display()))?;
    let headers = reader.headers()?;
    if !headers.iter().any(|h| h == "datadate") {
        return Err(anyhow!(
            "snapshot {} has no 'datadate' column",
            path.display()
        ));
    }
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: FundamentalsRow =
            record.with_context(|| format!("reading snapshot {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}
