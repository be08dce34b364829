//! Per-vendor pipeline and batch orchestration.
//!
//! `fetch → extract → mine → normalize → assemble`, one linear run per
//! vendor. Stages short-circuit forward with degraded data; nothing here
//! aborts a batch.

use futures::stream::{self, StreamExt};
use moka::future::Cache;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::assembler::assemble;
use crate::cache_validator::{seal, unseal};
use crate::config::Config;
use crate::errors::{AppError, StageFailure};
use crate::extractor::extract;
use crate::fetcher::PageFetcher;
use crate::miner::mine;
use crate::models::{BatchReport, BatchSummary, ComparisonRecord, VendorQuery};
use crate::normalizer::AiNormalizer;
use crate::openai_client::{CompletionClient, OpenAiClient};
use crate::vendors::VendorDirectory;

/// Upper bound on vendor pipelines in flight.
pub const MAX_CONCURRENCY_LIMIT: usize = 16;

/// Per-batch knobs.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Bypass the record cache.
    pub refresh: bool,
    /// Checked before each vendor starts. Started pipelines always finish.
    pub cancel: CancellationToken,
}

pub struct Analyzer {
    fetcher: PageFetcher,
    normalizer: AiNormalizer,
    cache: Cache<String, String>,
    max_concurrency: usize,
}

impl Analyzer {
    /// # Arguments
    ///
    /// * `config` - Timeouts, concurrency, prompt size and cache TTL.
    /// * `directory` - Alias table used to resolve vendor names.
    /// * `client` - Completion backend, `None` when no API key is configured.
    pub fn new(
        config: &Config,
        directory: VendorDirectory,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> Result<Self, AppError> {
        let fetcher = PageFetcher::new(Arc::new(directory), config.fetch_timeout)?;
        let normalizer = AiNormalizer::new(client, config.max_prompt_chars, config.ai_timeout);

        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(config.record_cache_ttl)
            .build();

        Ok(Self {
            fetcher,
            normalizer,
            cache,
            max_concurrency: config.max_concurrency.clamp(1, MAX_CONCURRENCY_LIMIT),
        })
    }

    /// Builtin vendor table plus an OpenAI client when a key is configured.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client: Option<Arc<dyn CompletionClient>> = match config.openai_api_key {
            Some(_) => Some(Arc::new(OpenAiClient::new(config)?)),
            None => None,
        };

        Self::new(config, VendorDirectory::builtin(), client)
    }

    pub fn directory(&self) -> &VendorDirectory {
        self.fetcher.directory()
    }

    /// Runs every stage for one vendor. Never fails.
    pub async fn run_pipeline(&self, query: &VendorQuery) -> ComparisonRecord {
        tracing::info!("Analyzing vendor: {}", query.name());

        let doc = self.fetcher.fetch(query).await;
        let mut degradation: Vec<StageFailure> = doc.failure.iter().cloned().collect();

        let cleaned = extract(&doc);
        if doc.is_success() && cleaned.usable_text().is_none() {
            degradation.push(StageFailure::ExtractionEmpty);
        }

        let mined = mine(&cleaned);

        let ai = self.normalizer.normalize(&doc.vendor, &cleaned, &mined).await;
        if let Some(failure) = ai.failure() {
            degradation.push(failure.clone());
        }

        let record = assemble(&doc, &mined, &ai, degradation);
        if record.is_degraded() {
            tracing::warn!(
                "⚠ Degraded record for {}: {:?}",
                record.vendor(),
                record.degradation()
            );
        } else {
            tracing::info!("✓ Record complete for {}", record.vendor());
        }
        record
    }

    /// Analyzes a batch with default options.
    pub async fn analyze(&self, names: &[String]) -> BatchReport {
        self.analyze_with(names, BatchOptions::default()).await
    }

    /// Analyzes a batch, returning one record per distinct vendor in query order.
    ///
    /// Blank names and names resolving to an already queued vendor are skipped.
    pub async fn analyze_with(&self, names: &[String], options: BatchOptions) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let mut summary = BatchSummary {
            total: names.len(),
            ..BatchSummary::default()
        };

        let mut seen = HashSet::new();
        let mut queries = Vec::new();
        for name in names {
            let Ok(query) = VendorQuery::new(name) else {
                tracing::warn!("Skipping blank vendor name in batch {}", batch_id);
                summary.skipped += 1;
                continue;
            };
            let key = self.cache_key(&query);
            if seen.insert(key.clone()) {
                queries.push((key, query));
            } else {
                tracing::info!("Skipping duplicate vendor '{}'", query.name());
                summary.skipped += 1;
            }
        }

        tracing::info!(
            "Starting batch {} with {} vendors (concurrency {})",
            batch_id,
            queries.len(),
            self.max_concurrency
        );

        let refresh = options.refresh;
        let cancel = &options.cancel;
        let outcomes: Vec<Option<ComparisonRecord>> = stream::iter(queries)
            .map(|(key, query)| async move {
                if cancel.is_cancelled() {
                    tracing::info!("Batch cancelled before starting {}", query.name());
                    return None;
                }
                Some(self.analyze_one(&key, &query, refresh).await)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Some(record) => {
                    if record.is_degraded() {
                        summary.degraded += 1;
                    } else {
                        summary.complete += 1;
                    }
                    records.push(record);
                }
                None => summary.cancelled += 1,
            }
        }

        tracing::info!(
            "Batch {} finished: {} complete, {} degraded, {} skipped, {} cancelled",
            batch_id,
            summary.complete,
            summary.degraded,
            summary.skipped,
            summary.cancelled
        );

        BatchReport {
            batch_id,
            records,
            summary,
        }
    }

    async fn analyze_one(&self, key: &str, query: &VendorQuery, refresh: bool) -> ComparisonRecord {
        if !refresh {
            if let Some(sealed) = self.cache.get(key).await {
                match unseal(&sealed) {
                    Some(record) => {
                        tracing::info!("Cache hit for {}", record.vendor());
                        return record;
                    }
                    None => self.cache.invalidate(key).await,
                }
            }
        }

        let record = self.run_pipeline(query).await;

        // Only complete records are worth reusing.
        if !record.is_degraded() {
            if let Some(sealed) = seal(&record) {
                self.cache.insert(key.to_string(), sealed).await;
            }
        }
        record
    }

    /// Resolved vendors share a key across aliases.
    fn cache_key(&self, query: &VendorQuery) -> String {
        self.directory()
            .resolve(query)
            .map(|entry| entry.name.to_lowercase())
            .unwrap_or_else(|| query.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendors::VendorEntry;

    fn analyzer() -> Analyzer {
        let directory = VendorDirectory::new(vec![VendorEntry::new(
            "Acme CRM",
            "http://127.0.0.1:9/pricing",
            &["acme"],
        )]);
        Analyzer::new(&Config::default(), directory, None).unwrap()
    }

    #[test]
    fn test_aliases_share_cache_key() {
        let analyzer = analyzer();
        let by_name = VendorQuery::new("Acme CRM").unwrap();
        let by_alias = VendorQuery::new("ACME").unwrap();

        assert_eq!(analyzer.cache_key(&by_name), analyzer.cache_key(&by_alias));
        assert_eq!(
            analyzer.cache_key(&VendorQuery::new("Other Co").unwrap()),
            "other co"
        );
    }

    #[tokio::test]
    async fn test_blank_and_duplicate_names_are_skipped() {
        let analyzer = analyzer();
        let names = vec![
            "UnknownCo".to_string(),
            "  ".to_string(),
            "unknownco".to_string(),
        ];

        let report = analyzer.analyze(&names).await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.skipped, 2);
        assert_eq!(report.summary.degraded, 1);
    }

    #[tokio::test]
    async fn test_cancelled_batch_starts_nothing() {
        let analyzer = analyzer();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = analyzer
            .analyze_with(
                &["UnknownCo".to_string(), "OtherCo".to_string()],
                BatchOptions {
                    refresh: false,
                    cancel,
                },
            )
            .await;

        assert!(report.records.is_empty());
        assert_eq!(report.summary.cancelled, 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = analyzer().analyze(&[]).await;

        assert!(report.records.is_empty());
        assert_eq!(report.summary, BatchSummary::default());
    }
}
