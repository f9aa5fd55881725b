pub mod cleaner;
pub mod extract;
pub mod extras;
pub mod inject;
pub mod matcher;
pub mod media;
pub mod scan;
pub mod sidecar;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Takeout folder, or a folder of Takeout zip archives with --extract.
    pub input: PathBuf,
    /// Destination for extracted files (defaults to input).
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub extract_zips: bool,
    #[serde(default)]
    pub delete_zips: bool,
    /// Keep sidecar JSON files after processing.
    #[serde(default)]
    pub keep_json: bool,
    #[serde(default = "default_true")]
    pub update_file_dates: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub exiftool_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessResult {
    pub archives_extracted: u64,
    pub media_found: u64,
    pub media_matched: u64,
    pub media_unmatched: u64,
    pub sidecars_unclaimed: u64,
    pub metadata_written: u64,
    pub injection_failed: u64,
    pub sidecars_deleted: u64,
    /// Matches per heuristic, keyed by strategy name, sorted.
    #[serde(default)]
    pub matched_by_strategy: Vec<(String, u64)>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Type alias for progress callback
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter — emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: std::sync::Mutex::new(Instant::now() - std::time::Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap();
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Run the full restoration pipeline: extract, scan, match, inject, clean.
pub fn process(
    options: &ProcessOptions,
    progress_callback: &ProgressCallback,
) -> anyhow::Result<ProcessResult> {
    let tp = ThrottledProgress::new(progress_callback);
    let mut result = ProcessResult::default();
    let config = matcher::MatcherConfig::default();

    // Stage 1: Extract archives
    let working = if options.extract_zips {
        let out = options
            .output
            .clone()
            .unwrap_or_else(|| options.input.clone());
        let delete_after = options.delete_zips && !options.dry_run;
        let extracted = extract::extract_all(&options.input, &out, delete_after, &tp)?;
        result.archives_extracted = extracted.archives_extracted;
        result.warnings.extend(extracted.warnings);
        out
    } else {
        options.input.clone()
    };

    // Stage 2: Scan the tree into per-album batches
    let batches = scan::scan_tree(&working, &config)?;
    let total_batches = batches.len() as u64;

    // Stage 3: Match media with sidecars. Album directories are independent,
    // so matching runs in parallel; collect() keeps deterministic order.
    let pairing = matcher::Matcher::new(config);
    let counter = AtomicU64::new(0);
    let matched: Vec<(scan::AlbumBatch, Vec<sidecar::SidecarEntry>, matcher::MatchReport)> =
        batches
            .into_par_iter()
            .map(|batch| {
                let (entries, diagnostics) =
                    sidecar::load_sidecars(&batch.sidecar_paths, pairing.config());
                let mut report = pairing.match_batch(&batch.media, &entries);
                report.diagnostics.extend(diagnostics);
                let current = counter.fetch_add(1, Ordering::Relaxed);
                tp.report("match", current, total_batches, "Matching sidecars");
                (batch, entries, report)
            })
            .collect();

    let mut by_strategy: BTreeMap<&'static str, u64> = BTreeMap::new();
    for (batch, entries, report) in &matched {
        result.media_found += batch.media.len() as u64;
        result.media_matched += report.matched_count() as u64;
        for r in &report.results {
            if let Some(strategy) = r.strategy {
                *by_strategy.entry(strategy.as_str()).or_default() += 1;
            }
        }
        for r in report.unmatched_media() {
            result.warnings.push(format!(
                "no sidecar match: {}",
                batch.media[r.media_index].path.display()
            ));
        }
        for &i in &report.unclaimed_sidecars {
            result.sidecars_unclaimed += 1;
            result
                .warnings
                .push(format!("unclaimed sidecar: {}", entries[i].path.display()));
        }
        result.warnings.extend(report.diagnostics.iter().cloned());
    }
    result.matched_by_strategy = by_strategy
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    result.media_unmatched = result.media_found - result.media_matched;

    // Stage 4: Inject metadata
    let exiftool = inject::find_exiftool(options.exiftool_path.as_deref());
    if exiftool.is_none() {
        if options.exiftool_path.is_some() {
            return Err(inject::ExifToolNotFound.into());
        }
        result
            .warnings
            .push("exiftool not found; falling back to filesystem dates only".to_string());
    }
    let injector = inject::Injector::new(exiftool, options.update_file_dates, options.dry_run);

    let total_matched = result.media_matched;
    let mut consumed: Vec<PathBuf> = Vec::new();
    let mut attempted = 0u64;
    for (batch, entries, report) in &matched {
        for r in &report.results {
            let Some(si) = r.sidecar_index else {
                continue;
            };
            let media_entry = &batch.media[r.media_index];
            let sc = &entries[si];
            attempted += 1;
            tp.report("inject", attempted - 1, total_matched, "Writing metadata");

            if sc.metadata.has_useful_metadata() {
                match injector.inject(&media_entry.path, &sc.metadata) {
                    Ok(()) => result.metadata_written += 1,
                    Err(e) => {
                        // Keep the sidecar so a later run can retry.
                        result.injection_failed += 1;
                        result.warnings.push(format!("{e:#}"));
                        continue;
                    }
                }
            }
            consumed.push(sc.path.clone());
        }
    }

    // Stage 5: Clean up consumed sidecars
    if !options.keep_json && !consumed.is_empty() {
        let cleaned = cleaner::delete_sidecars(&consumed, options.dry_run);
        result.sidecars_deleted = cleaned.deleted;
        result.warnings.extend(cleaned.warnings);
    }

    Ok(result)
}
