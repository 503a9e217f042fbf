//! Sequential report pipeline: reference tables, group partition, cache-first
//! fetch, quarterly aggregation, ratios, rendered tables. One run produces
//! one report variant.

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::aggregate;
use crate::analysis;
use crate::cache::SnapshotCache;
use crate::groups::{self, GroupCodes};
use crate::models::{Config, EntityRecord, FundamentalsRow, GroupName};
use crate::ratios;
use crate::reference;
use crate::table::{self, FinalTable};
use crate::wrds::FundamentalsSource;

/// Fiscal-year cutoff applied to the link table in the baseline variant.
const BASELINE_FYEAR_CUTOFF: i32 = 2012;

pub struct TablePipeline<S> {
    source: S,
    cache: SnapshotCache,
    config: Config,
    codes: GroupCodes,
}

impl<S: FundamentalsSource> TablePipeline<S> {
    pub fn new(source: S, config: Config) -> Self {
        let cache = SnapshotCache::new(config.pulled_dir());
        Self {
            source,
            cache,
            config,
            codes: GroupCodes::default(),
        }
    }

    pub fn with_codes(mut self, codes: GroupCodes) -> Self {
        self.codes = codes;
        self
    }

    /// Run the full pipeline for the configured variant and write the table
    /// plus side tables under the output directory.
    pub async fn run(&self) -> Result<FinalTable> {
        let updated = self.config.use_extended_range;
        let end = self.config.variant_end();
        info!(
            "building table 02, {} variant ({} to {})",
            if updated { "extended" } else { "baseline" },
            self.config.start_date,
            end
        );

        let tables = reference::load_reference_tables(&self.config.manual_dir())?;
        let cutoff = (!updated).then_some(BASELINE_FYEAR_CUTOFF);
        let (target, universe) = reference::merge_target_group(&tables, cutoff);
        info!(
            "{} primary dealer links, {} linked entities",
            target.len(),
            universe.len()
        );

        let groups = groups::partition(&universe, &target, &self.codes);

        let mut datasets: BTreeMap<GroupName, Vec<FundamentalsRow>> = BTreeMap::new();
        for (group, members) in &groups {
            match self.load_group(*group, members).await? {
                Some(rows) => {
                    info!("{}: {} raw rows", group, rows.len());
                    datasets.insert(*group, rows);
                }
                None => continue, // diagnosed in load_group; other groups still run
            }
        }

        let prepped = aggregate::prep_datasets(&datasets);
        analysis::write_summary_table(&datasets, &self.config.output_dir, updated)?;

        let windows = ratios::sample_windows(self.config.start_date, end);
        let ratio_rows = ratios::build_ratios(&prepped, &windows);
        analysis::write_correlation_table(&prepped, &self.config.output_dir, updated)?;

        let final_table = table::format_final_table(&ratio_rows, &windows);
        table::write_table(&final_table, &self.config.output_dir, updated)?;
        Ok(final_table)
    }

    /// Cache-first dataset load for one group. `Ok(None)` skips the group
    /// with a diagnostic (unusable snapshot); fetch failures propagate and
    /// abort the run.
    async fn load_group(
        &self,
        group: GroupName,
        members: &[EntityRecord],
    ) -> Result<Option<Vec<FundamentalsRow>>> {
        let snapshot = self.snapshot_name(group);
        match self.cache.read(&snapshot) {
            Ok(Some(rows)) => return Ok(Some(rows)),
            Ok(None) => {}
            Err(e) => {
                warn!("'datadate' not usable for group {group}, skipping: {e}");
                return Ok(None);
            }
        }

        info!("fetching {} ({} entities)", group, members.len());
        let end = self.config.variant_end();
        let rows = if group == GroupName::PrimaryDealers {
            // per-entity effective dates are mandatory for the target group
            self.source.fetch_per_entity(members, end).await?
        } else {
            self.source
                .fetch_shared_range(members, self.config.start_date, end)
                .await?
        };
        self.cache.write(&snapshot, &rows)?;
        Ok(Some(rows))
    }

    fn snapshot_name(&self, group: GroupName) -> String {
        let variant = if self.config.use_extended_range {
            "updated"
        } else {
            "baseline"
        };
        let slug = match group {
            GroupName::PrimaryDealers => "pd",
            GroupName::BrokerDealers => "bd",
            GroupName::Banks => "banks",
            GroupName::Compustat => "cmpust",
        };
        format!("fundq_{slug}_{variant}")
    }
}

