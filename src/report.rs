//! Console rendering of reports, plans and summaries

use crate::error::ResolveError;
use crate::hub::Resolution;
use crate::reconcile::{DiffReport, Reconciler, SearchResults};
use crate::retry::{RetryOutcome, RetryPlan, RetrySummary};
use std::fmt::Write;
use std::path::Path;

/// Similar keys shown per missing entry
const MAX_SIMILAR_KEYS: usize = 2;

/// What an operator can do about a failure
pub fn failure_hint(error: &ResolveError) -> &'static str {
    match error {
        ResolveError::NotFound(_) => {
            "file or repository does not exist; it may have been moved or deleted"
        }
        ResolveError::AccessDenied(_) => {
            "repository is private or gated; set HF_TOKEN to an account with access"
        }
        ResolveError::Transient(_) => "network or rate limit problem; try again later",
        ResolveError::Other(_) => "unclassified error; inspect the message",
    }
}

fn outcome_reason(outcome: &RetryOutcome) -> String {
    match outcome {
        RetryOutcome::Resolved { size_bytes } => format!("{} bytes", size_bytes),
        RetryOutcome::Failed(e) => format!("{} ({})", e, failure_hint(e)),
        RetryOutcome::NoRepository => "no repository ID to query".to_string(),
    }
}

fn describe_target(filename: Option<&str>, is_snapshot: bool) -> String {
    match (filename, is_snapshot) {
        (_, true) | (None, _) => "<whole repository>".to_string(),
        (Some(file), false) => file.to_string(),
    }
}

/// Full reconciliation report
pub fn render_diff(reconciler: &Reconciler<'_>, report: &DiffReport) -> String {
    let document = reconciler.document();
    let mut out = String::new();

    let _ = writeln!(out, "=== SIZE CACHE RECONCILIATION ===");
    let _ = writeln!(out, "Expected from catalog: {}", report.expected);
    let _ = writeln!(out, "Records in cache:      {}", report.cached);
    let _ = writeln!(out, "Resolved:              {}", report.present());
    let _ = writeln!(out, "Missing from cache:    {}", report.missing.len());
    let _ = writeln!(out, "Extra in cache:        {}", report.extra.len());
    let _ = writeln!(out, "Failed:                {}", report.failed.len());
    if !report.inconsistent.is_empty() {
        let _ = writeln!(out, "Inconsistent:          {}", report.inconsistent.len());
    }

    if !report.missing.is_empty() {
        let _ = writeln!(out, "\n=== MISSING KEYS ===");
        for item in &report.missing {
            let entry = &item.entry;
            let _ = writeln!(out, "Key: {}", item.key);
            let _ = writeln!(out, "  Model: {}", entry.name);
            let _ = writeln!(
                out,
                "  Category: {} -> {}",
                entry.category, entry.sub_category
            );
            let _ = writeln!(out, "  Repo: {}", entry.repo_id);
            let _ = writeln!(
                out,
                "  File: {}",
                describe_target(entry.filename.as_deref(), entry.is_snapshot)
            );
            let similar = reconciler.similar_keys(entry);
            if !similar.is_empty() {
                let shown: Vec<_> = similar.iter().take(MAX_SIMILAR_KEYS).collect();
                let _ = writeln!(out, "  Similar cached keys: {:?}", shown);
            }
        }
    }

    if !report.extra.is_empty() {
        let _ = writeln!(out, "\n=== EXTRA KEYS ===");
        for key in &report.extra {
            let _ = writeln!(out, "Key: {}", key);
            if let Some(record) = document.get(key) {
                let _ = writeln!(out, "  Size: {:.2} GB", record.size_gb);
                if let Some(error) = &record.error {
                    let _ = writeln!(out, "  Error: {}", error);
                }
            }
        }
    }

    if !report.failed.is_empty() {
        let _ = writeln!(out, "\n=== FAILED RECORDS ===");
        for key in &report.failed {
            let error = document
                .get(key)
                .and_then(|r| r.error.as_deref())
                .unwrap_or("zero size");
            let _ = writeln!(out, "{}: {}", key, error);
        }
    }

    if !report.inconsistent.is_empty() {
        let _ = writeln!(out, "\n=== INCONSISTENT RECORDS ===");
        for record in &report.inconsistent {
            let _ = writeln!(out, "{}: {}", record.key, record.kind);
        }
    }

    if report.is_clean() {
        let _ = writeln!(out, "\nCache matches the catalog.");
    }

    out
}

/// Entries a retry batch is about to process
pub fn render_plan(plan: &RetryPlan) -> String {
    let mut out = String::new();

    if plan.is_empty() {
        let _ = writeln!(out, "No failed models to retry.");
        return out;
    }

    let _ = writeln!(out, "Found {} failed models:", plan.len());
    for (i, entry) in plan.entries.iter().enumerate() {
        let _ = writeln!(out, "{:>4}. {}", i + 1, entry.name);
        let _ = writeln!(
            out,
            "      Repo: {}",
            entry.repo_id.as_deref().unwrap_or("<none>")
        );
        let _ = writeln!(
            out,
            "      File: {}",
            describe_target(entry.filename.as_deref(), entry.is_snapshot)
        );
        if let Some(error) = &entry.previous_error {
            let _ = writeln!(out, "      Error: {}", error);
        }
    }

    out
}

/// Result of a retry or fill batch, with reasons for every failure
pub fn render_summary(summary: &RetrySummary, cache_file: &Path) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== RETRY SUMMARY ===");
    let _ = writeln!(out, "Successfully fixed: {}", summary.succeeded);
    let _ = writeln!(out, "Still failed:       {}", summary.still_failed);
    let _ = writeln!(out, "Saved to:           {}", cache_file.display());

    if summary.still_failed > 0 {
        let _ = writeln!(out, "\nStill failing:");
        for result in summary.failures() {
            let _ = writeln!(out, "  {}: {}", result.key, outcome_reason(&result.outcome));
        }

        let transient = summary
            .failures()
            .filter(|r| matches!(&r.outcome, RetryOutcome::Failed(e) if e.is_transient()))
            .count();
        if transient > 0 {
            let _ = writeln!(
                out,
                "\n{} failures look transient; running retry again later may fix them.",
                transient
            );
        }
    }

    out
}

/// Diagnostic key lookup
pub fn render_search(term: &str, results: &SearchResults) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== SEARCHING FOR '{}' ===", term);
    let _ = writeln!(out, "Found {} matches in catalog:", results.expected.len());
    for (key, cached) in &results.expected {
        let _ = writeln!(
            out,
            "  - {} (in cache: {})",
            key,
            if *cached { "YES" } else { "NO" }
        );
    }
    let _ = writeln!(out, "Found {} matches in cache:", results.cached.len());
    for key in &results.cached {
        let _ = writeln!(out, "  - {}", key);
    }

    out
}

/// Ad-hoc single lookup
pub fn render_check(repo_id: &str, filename: Option<&str>, resolution: &Resolution) -> String {
    let target = describe_target(filename, filename.is_none());
    match resolution {
        Ok(size_bytes) => format!(
            "{} / {}: {} bytes ({} GB)\n",
            repo_id,
            target,
            size_bytes,
            crate::document::bytes_to_gb(*size_bytes)
        ),
        Err(e) => format!("{} / {}: {}\n  hint: {}\n", repo_id, target, e, failure_hint(e)),
    }
}
