//! Retry engine
//!
//! Re-resolves failed size records one at a time, pacing the remote calls.
//! Every outcome is written into the in-memory document as soon as it is
//! known; persistence happens once at the end of a batch, plus optional
//! checkpoints every N entries.

use crate::document::{CacheDocument, SizeRecord};
use crate::error::{ResolveError, SizeCacheResult};
use crate::hub::SizeResolver;
use crate::reconcile::{DiffReport, MissingEntry};
use crate::store::SizeCacheStore;
use std::time::Duration;

/// Prefix of the error stored after a failed retry
pub const RETRY_FAILED_PREFIX: &str = "Retry failed: ";

/// Error stored for records that have nothing to query
pub const NO_REPOSITORY_ERROR: &str = "No repository ID";

/// Outcome of processing one key
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Resolved { size_bytes: u64 },
    Failed(ResolveError),
    /// The record has no repository; the resolver was not called
    NoRepository,
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Outcome for one key, in processing order
#[derive(Debug, Clone, PartialEq)]
pub struct RetryResult {
    pub key: String,
    pub outcome: RetryOutcome,
}

/// Result of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrySummary {
    pub succeeded: usize,
    pub still_failed: usize,
    pub results: Vec<RetryResult>,
}

impl RetrySummary {
    fn push(&mut self, key: &str, outcome: RetryOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.still_failed += 1;
        }
        self.results.push(RetryResult {
            key: key.to_string(),
            outcome,
        });
    }

    /// Results that did not resolve
    pub fn failures(&self) -> impl Iterator<Item = &RetryResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    pub fn processed(&self) -> usize {
        self.results.len()
    }
}

/// One entry of a [`RetryPlan`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRetry {
    pub key: String,
    pub name: String,
    pub repo_id: Option<String>,
    pub filename: Option<String>,
    pub is_snapshot: bool,
    pub previous_error: Option<String>,
}

/// Failed keys selected for a retry batch, in report order
///
/// Building a plan has no side effects; the caller decides whether to run it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryPlan {
    pub entries: Vec<PlannedRetry>,
}

impl RetryPlan {
    /// Plan a retry of every failed key in the report
    pub fn from_report(report: &DiffReport, document: &CacheDocument) -> Self {
        Self::from_keys(&report.failed, document)
    }

    /// Plan a retry of the given keys; keys absent from the document are skipped
    pub fn from_keys(keys: &[String], document: &CacheDocument) -> Self {
        let entries = keys
            .iter()
            .filter_map(|key| {
                let record = document.get(key)?;
                Some(PlannedRetry {
                    key: key.clone(),
                    name: record.name.clone(),
                    repo_id: record.repository().map(str::to_string),
                    filename: record.filename.clone(),
                    is_snapshot: record.is_snapshot,
                    previous_error: record.error.clone(),
                })
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }
}

/// Sequential, paced re-resolution of size records
pub struct RetryEngine {
    resolver: SizeResolver,
    pacing: Duration,
    checkpoint_every: Option<usize>,
}

impl RetryEngine {
    pub fn new(resolver: SizeResolver, pacing: Duration) -> Self {
        Self {
            resolver,
            pacing,
            checkpoint_every: None,
        }
    }

    /// Save after every `n` processed entries during [`execute`](Self::execute)
    /// and [`fill_missing`](Self::fill_missing)
    pub fn with_checkpoint_every(mut self, n: Option<usize>) -> Self {
        self.checkpoint_every = n.filter(|n| *n > 0);
        self
    }

    /// Retry `failed_keys` in order, updating `document` in place
    ///
    /// Timestamps are refreshed after the pass. Nothing is persisted.
    pub async fn retry(
        &self,
        failed_keys: &[String],
        document: &mut CacheDocument,
    ) -> RetrySummary {
        let mut summary = RetrySummary::default();
        let mut pacer = Pacer::new(self.pacing);

        for key in failed_keys {
            if let Some(outcome) = self.retry_one(key, document, &mut pacer).await {
                summary.push(key, outcome);
            }
        }

        document.touch();
        log_summary("Retry batch complete", &summary);
        summary
    }

    /// Run a plan and persist the result
    ///
    /// Per-entry failures are recorded in the document; only store errors
    /// abort the batch.
    pub async fn execute(
        &self,
        plan: &RetryPlan,
        document: &mut CacheDocument,
        store: &SizeCacheStore,
    ) -> SizeCacheResult<RetrySummary> {
        let mut summary = RetrySummary::default();
        let mut pacer = Pacer::new(self.pacing);
        let total = plan.len();

        tracing::info!(entries = total, "Starting retry batch");

        for planned in &plan.entries {
            if let Some(outcome) = self.retry_one(&planned.key, document, &mut pacer).await {
                summary.push(&planned.key, outcome);
                self.checkpoint(summary.processed(), total, document, store)
                    .await?;
            }
        }

        document.touch();
        store.save(document).await?;
        log_summary("Retry batch complete", &summary);

        Ok(summary)
    }

    /// Resolve catalog entries that have no record yet and add them
    ///
    /// Existing records are never modified.
    pub async fn fill_missing(
        &self,
        missing: &[MissingEntry],
        document: &mut CacheDocument,
        store: &SizeCacheStore,
    ) -> SizeCacheResult<RetrySummary> {
        let mut summary = RetrySummary::default();
        let mut pacer = Pacer::new(self.pacing);
        let total = missing.len();

        tracing::info!(entries = total, "Starting fill of missing entries");

        for item in missing {
            if document.contains(&item.key) {
                tracing::debug!(key = %item.key, "Already cached, not filling");
                continue;
            }

            let mut record = SizeRecord::unresolved(&item.entry);
            let repo_id = record.repository().map(str::to_string);
            let outcome = match repo_id.as_deref() {
                None => {
                    record.record_failure(NO_REPOSITORY_ERROR);
                    RetryOutcome::NoRepository
                }
                Some(repo_id) => {
                    pacer.wait().await;
                    match self
                        .resolver
                        .resolve_size(repo_id, item.entry.target_file())
                        .await
                    {
                        Ok(size_bytes) => {
                            record.record_success(size_bytes);
                            RetryOutcome::Resolved { size_bytes }
                        }
                        Err(e) => {
                            record.record_failure(e.to_string());
                            RetryOutcome::Failed(e)
                        }
                    }
                }
            };

            log_outcome(&item.key, &outcome);
            document.insert_new(item.key.clone(), record);
            summary.push(&item.key, outcome);
            self.checkpoint(summary.processed(), total, document, store)
                .await?;
        }

        document.touch();
        store.save(document).await?;
        log_summary("Fill complete", &summary);

        Ok(summary)
    }

    /// Process one key; `None` if the key is not in the document
    async fn retry_one(
        &self,
        key: &str,
        document: &mut CacheDocument,
        pacer: &mut Pacer,
    ) -> Option<RetryOutcome> {
        let Some(record) = document.get(key) else {
            tracing::warn!(key = %key, "Key not in size cache, skipping");
            return None;
        };

        let outcome = match record.repository() {
            None => RetryOutcome::NoRepository,
            Some(repo_id) => {
                let repo_id = repo_id.to_string();
                let filename = record.target_file().map(str::to_string);

                pacer.wait().await;
                tracing::debug!(key = %key, repo_id = %repo_id, filename = ?filename, "Retrying");

                match self
                    .resolver
                    .resolve_size(&repo_id, filename.as_deref())
                    .await
                {
                    Ok(size_bytes) => RetryOutcome::Resolved { size_bytes },
                    Err(e) => RetryOutcome::Failed(e),
                }
            }
        };

        if let Some(record) = document.get_mut(key) {
            match &outcome {
                RetryOutcome::Resolved { size_bytes } => record.record_success(*size_bytes),
                RetryOutcome::Failed(e) => {
                    record.record_failure(format!("{}{}", RETRY_FAILED_PREFIX, e))
                }
                RetryOutcome::NoRepository => record.record_failure(NO_REPOSITORY_ERROR),
            }
        }

        log_outcome(key, &outcome);
        Some(outcome)
    }

    async fn checkpoint(
        &self,
        processed: usize,
        total: usize,
        document: &mut CacheDocument,
        store: &SizeCacheStore,
    ) -> SizeCacheResult<()> {
        let Some(every) = self.checkpoint_every else {
            return Ok(());
        };
        // The final save follows the loop
        if processed % every != 0 || processed >= total {
            return Ok(());
        }

        document.touch();
        store.save(document).await?;
        tracing::info!(processed, total, "Checkpoint saved");
        Ok(())
    }
}

/// Sleeps between consecutive remote calls, never before the first
struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: false,
        }
    }

    async fn wait(&mut self) {
        if self.started && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.started = true;
    }
}

fn log_outcome(key: &str, outcome: &RetryOutcome) {
    match outcome {
        RetryOutcome::Resolved { size_bytes } => {
            tracing::info!(key = %key, size_bytes, "Size resolved")
        }
        RetryOutcome::Failed(e) => {
            tracing::warn!(key = %key, kind = e.kind(), error = %e, "Size resolution failed")
        }
        RetryOutcome::NoRepository => {
            tracing::warn!(key = %key, "No repository to query")
        }
    }
}

fn log_summary(message: &str, summary: &RetrySummary) {
    tracing::info!(
        succeeded = summary.succeeded,
        still_failed = summary.still_failed,
        "{}",
        message
    );
}
