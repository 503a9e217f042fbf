//! WRDS-style fundamentals provider: the `FundamentalsSource` seam the
//! pipeline consumes, plus the reqwest-backed client that talks to the
//! Compustat quarterly endpoint.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{Config, EntityRecord, FundamentalsRow};

/// Raw Compustat quarterly fields, before sentinel resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFundqRow {
    pub datadate: NaiveDate,
    pub atq: Option<f64>,
    pub actq: Option<f64>,
    pub ltq: Option<f64>,
    pub lctq: Option<f64>,
    pub teqq: Option<f64>,
    pub ceqq: Option<f64>,
    pub pstkq: Option<f64>,
    pub mibnq: Option<f64>,
    pub cshoq: Option<f64>,
    pub prccq: Option<f64>,
    pub gvkey: i64,
    pub conm: String,
}

/// Resolve missing/zero sentinels into the four table metrics.
///
/// Total assets and book debt fall back to their current-scope counterparts
/// when the primary field is null or zero; book equity falls back to common
/// equity plus preferred stock and minority interest; market equity needs
/// both shares and price. This is a data rule of the source, not null-fill.
pub fn resolve_metrics(raw: &RawFundqRow) -> FundamentalsRow {
    let primary_or = |primary: Option<f64>, fallback: Option<f64>| match primary {
        Some(v) if v != 0.0 => Some(v),
        _ => fallback,
    };
    let book_equity = raw.teqq.or_else(|| {
        raw.ceqq
            .map(|ceqq| ceqq + raw.pstkq.unwrap_or(0.0) + raw.mibnq.unwrap_or(0.0))
    });
    let market_equity = match (raw.cshoq, raw.prccq) {
        (Some(shares), Some(price)) => Some(shares * price),
        _ => None,
    };
    FundamentalsRow {
        datadate: raw.datadate,
        total_assets: primary_or(raw.atq, raw.actq),
        book_debt: primary_or(raw.ltq, raw.lctq),
        book_equity,
        market_equity,
        gvkey: raw.gvkey,
        conm: raw.conm.clone(),
    }
}

/// Source of quarterly fundamentals for a set of entities.
#[async_trait]
pub trait FundamentalsSource {
    /// One shared date range applied to a batch of keys.
    async fn fetch_shared_range(
        &self,
        entities: &[EntityRecord],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FundamentalsRow>>;

    /// One range per entity, honoring each entity's effective link dates.
    /// Used for the target group, where per-entity dates are mandatory.
    /// `Current` end dates clamp to `fallback_end`.
    async fn fetch_per_entity(
        &self,
        entities: &[EntityRecord],
        fallback_end: NaiveDate,
    ) -> Result<Vec<FundamentalsRow>>;
}

/// Client for a WRDS-style web query endpoint returning CSV.
pub struct WrdsClient {
    client: Client,
    base_url: String,
    username: String,
}

impl WrdsClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.wrds_base_url, &config.wrds_username)
    }

    pub fn with_base_url(base_url: &str, username: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("dealer-ratios/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
        })
    }

    /// Query comp.fundq for a set of gvkeys over one date range. Empty result
    /// sets are fine; a non-2xx response is not.
    async fn query_fundq(
        &self,
        gvkeys: &[i64],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FundamentalsRow>> {
        if gvkeys.is_empty() || start > end {
            return Ok(Vec::new());
        }
        if self.username.is_empty() {
            return Err(anyhow!(
                "WRDS_USERNAME is not set; cannot query {} without credentials",
                self.base_url
            ));
        }

        let keys = gvkeys
            .iter()
            .map(|k| format!("{k:06}"))
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .client
            .get(format!("{}/comp/fundq", self.base_url))
            .query(&[
                ("user", self.username.as_str()),
                ("gvkeys", keys.as_str()),
                ("start", &start.to_string()),
                ("end", &end.to_string()),
                ("indfmt", "INDL"),
                ("datafmt", "STD"),
                ("popsrc", "D"),
                ("consol", "C"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("fundq query failed with status {status}: {body}"));
        }

        let body = response.text().await?;
        let mut rows = Vec::new();
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        for record in reader.deserialize::<RawFundqRow>() {
            match record {
                Ok(raw) => rows.push(resolve_metrics(&raw)),
                Err(e) => warn!("skipping malformed fundq row: {e}"),
            }
        }
        debug!(
            "fundq: {} rows for {} gvkeys, {} to {}",
            rows.len(),
            gvkeys.len(),
            start,
            end
        );
        Ok(rows)
    }
}

#[async_trait]
impl FundamentalsSource for WrdsClient {
    async fn fetch_shared_range(
        &self,
        entities: &[EntityRecord],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FundamentalsRow>> {
        let gvkeys: Vec<i64> = entities.iter().map(|e| e.gvkey).collect();
        self.query_fundq(&gvkeys, start, end).await
    }

    async fn fetch_per_entity(
        &self,
        entities: &[EntityRecord],
        fallback_end: NaiveDate,
    ) -> Result<Vec<FundamentalsRow>> {
        let mut rows = Vec::new();
        for entity in entities {
            let Some(range) = entity.effective else {
                warn!(
                    "{} (gvkey {}) has no effective link dates, skipping",
                    entity.name, entity.gvkey
                );
                continue;
            };
            let end = range.end.resolve(fallback_end);
            let fetched = self.query_fundq(&[entity.gvkey], range.start, end).await?;
            if fetched.is_empty() {
                debug!("no fundamentals for {} (gvkey {})", entity.name, entity.gvkey);
            }
            rows.extend(fetched);
        }
        Ok(rows)
    }
}
