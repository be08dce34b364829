use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::errors::{AppError, ResultExt};
use crate::models::ComparisonRecord;

/// Persistence for comparison records.
///
/// Records are keyed by vendor name (case-insensitive) and `last_updated`, so
/// each analysis run adds to a vendor's history.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends records, replacing a stored record with the same vendor and
    /// timestamp.
    async fn save(&self, records: &[ComparisonRecord]) -> Result<(), AppError>;

    /// Every stored record, oldest first.
    async fn load_all(&self) -> Result<Vec<ComparisonRecord>, AppError>;

    /// Latest record for a vendor.
    async fn find(&self, vendor: &str) -> Result<Option<ComparisonRecord>, AppError>;

    /// Records updated at or after `since`, newest first.
    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<ComparisonRecord>, AppError>;

    /// Drops a vendor's whole history. Returns the number of records removed.
    async fn remove(&self, vendor: &str) -> Result<usize, AppError>;

    /// Drops everything. Returns the number of records removed.
    async fn clear(&self) -> Result<usize, AppError>;

    async fn stats(&self) -> Result<StoreStats, AppError>;
}

/// Summary over the latest record of each vendor.
///
/// Prices are compared as stored, without currency conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub vendors: usize,
    pub records: usize,
    /// Vendors whose latest record discloses a price.
    pub priced_vendors: usize,
    pub min_price: Option<f64>,
    pub avg_price: Option<f64>,
    pub max_price: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreStats {
    pub fn from_records(records: &[ComparisonRecord]) -> Self {
        let latest = latest_per_vendor(records);
        let prices: Vec<f64> = latest
            .iter()
            .filter_map(|r| r.entry_price().amount())
            .collect();

        let (min_price, avg_price, max_price) = if prices.is_empty() {
            (None, None, None)
        } else {
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = prices.iter().sum::<f64>() / prices.len() as f64;
            (Some(min), Some(avg), Some(max))
        };

        Self {
            vendors: latest.len(),
            records: records.len(),
            priced_vendors: prices.len(),
            min_price,
            avg_price,
            max_price,
            last_updated: records.iter().map(|r| r.last_updated()).max(),
        }
    }
}

fn same_vendor(record: &ComparisonRecord, vendor: &str) -> bool {
    record.vendor().eq_ignore_ascii_case(vendor.trim())
}

fn latest_per_vendor(records: &[ComparisonRecord]) -> Vec<&ComparisonRecord> {
    let mut latest: Vec<&ComparisonRecord> = Vec::new();
    for record in records {
        match latest.iter_mut().find(|r| same_vendor(r, record.vendor())) {
            Some(existing) if existing.last_updated() <= record.last_updated() => *existing = record,
            Some(_) => {}
            None => latest.push(record),
        }
    }
    latest
}

/// Stores records as a pretty-printed JSON array in a single file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers never observe a half-written file.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<ComparisonRecord>, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    async fn write_records(&self, records: &[ComparisonRecord]) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(records).context("serializing records")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn save(&self, records: &[ComparisonRecord]) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let mut stored = self.read_records().await?;

        for record in records {
            match stored.iter_mut().find(|r| {
                same_vendor(r, record.vendor()) && r.last_updated() == record.last_updated()
            }) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        stored.sort_by_key(|r| r.last_updated());

        self.write_records(&stored).await?;
        tracing::info!(
            "✓ Saved {} records to {} ({} total)",
            records.len(),
            self.path.display(),
            stored.len()
        );
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ComparisonRecord>, AppError> {
        let _guard = self.lock.lock().await;
        self.read_records().await
    }

    async fn find(&self, vendor: &str) -> Result<Option<ComparisonRecord>, AppError> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|r| same_vendor(r, vendor))
            .max_by_key(|r| r.last_updated()))
    }

    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<ComparisonRecord>, AppError> {
        let mut records: Vec<ComparisonRecord> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|r| r.last_updated() >= since)
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.last_updated()));
        Ok(records)
    }

    async fn remove(&self, vendor: &str) -> Result<usize, AppError> {
        let _guard = self.lock.lock().await;
        let mut stored = self.read_records().await?;
        let before = stored.len();
        stored.retain(|r| !same_vendor(r, vendor));

        let removed = before - stored.len();
        if removed > 0 {
            self.write_records(&stored).await?;
            tracing::info!("Removed {} records for {}", removed, vendor.trim());
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, AppError> {
        let _guard = self.lock.lock().await;
        let removed = self.read_records().await?.len();
        self.write_records(&[]).await?;
        tracing::warn!("Cleared {} records from {}", removed, self.path.display());
        Ok(removed)
    }

    async fn stats(&self) -> Result<StoreStats, AppError> {
        Ok(StoreStats::from_records(&self.load_all().await?))
    }
}
