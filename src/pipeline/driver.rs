//! Pipeline driver: raw dataset → four formatted JSONL files.
//!
//! Pipeline flow, per split:
//! RawExamples → Preference Formatter → preference-<split>.jsonl
//!                        ↓
//!               Supervised conversion → sft-<split>.jsonl
//!
//! Single-threaded and synchronous; each record is serialized and written
//! immediately. Sink failures abort the split.

use crate::dataset::{self, Split};
use crate::models::{Config, FormatStats, PreformError, Result, SplitReport};
use crate::pipeline::{supervised, PreferenceFormatter};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Formatting pipeline over the configured dataset splits.
pub struct FormatPipeline {
    formatter: PreferenceFormatter,
    train_path: PathBuf,
    validation_path: PathBuf,
    output_dir: PathBuf,
}

impl FormatPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            formatter: PreferenceFormatter::new(config.format.clone()),
            train_path: config.dataset.train.clone(),
            validation_path: config.dataset.validation.clone(),
            output_dir: config.output.dir.clone(),
        }
    }

    fn split_source(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train_path,
            Split::Validation => &self.validation_path,
        }
    }

    /// Run the pipeline over both splits.
    pub fn run(&self) -> Result<FormatStats> {
        let start = Instant::now();

        fs::create_dir_all(&self.output_dir)
            .map_err(|e| PreformError::io("creating output dir", e))?;

        let mut stats = FormatStats::default();
        for split in Split::ALL {
            let report = self.run_split(split)?;
            match split {
                Split::Train => stats.train = report,
                Split::Validation => stats.validation = report,
            }
        }
        stats.runtime_secs = start.elapsed().as_secs_f64();

        info!(
            written = stats.total_written(),
            skipped = stats.total_failed(),
            runtime_secs = format!("{:.1}", stats.runtime_secs),
            "Formatting complete"
        );

        Ok(stats)
    }

    /// Run one split: load, format both shapes, write both sinks.
    pub fn run_split(&self, split: Split) -> Result<SplitReport> {
        let source = self.split_source(split);
        let examples = dataset::load_split(source)?;

        info!(split = %split, examples = examples.len(), "Formatting split");

        let pb = ProgressBar::new(examples.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        pb.set_message(format!("{split}"));

        // Preference formatting aborts the split on the first malformed record.
        let preference = self.formatter.format_split(&examples)?;

        let preference_path = self.output_dir.join(split.preference_file());
        let preference_written =
            write_jsonl(&preference_path, &preference, Some(&pb))?;

        // The supervised conversion tolerates per-record failures.
        let conversion = supervised::derive_all(&preference);
        if !conversion.failures.is_empty() {
            warn!(
                split = %split,
                skipped = conversion.failures.len(),
                "Some records were skipped during supervised conversion"
            );
        }

        let sft_path = self.output_dir.join(split.sft_file());
        let supervised_written = write_jsonl(&sft_path, &conversion.records, None)?;

        pb.finish_with_message(format!(
            "{split}: pref {preference_written}, sft {supervised_written}"
        ));

        info!(
            split = %split,
            preference = preference_written,
            supervised = supervised_written,
            skipped = conversion.failures.len(),
            "Split complete"
        );

        Ok(SplitReport {
            raw_examples: examples.len(),
            preference_written,
            supervised_written,
            supervised_failed: conversion.failures.len(),
        })
    }

    /// The four output files this pipeline produces, in a stable order.
    pub fn output_files(&self) -> Vec<PathBuf> {
        Split::ALL
            .iter()
            .flat_map(|split| {
                [
                    self.output_dir.join(split.preference_file()),
                    self.output_dir.join(split.sft_file()),
                ]
            })
            .collect()
    }
}

/// Serialize records one JSON object per line. Returns the number written.
fn write_jsonl<T: Serialize>(
    path: &Path,
    records: &[T],
    pb: Option<&ProgressBar>,
) -> Result<usize> {
    let file = File::create(path).map_err(|e| PreformError::io("creating output file", e))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0;

    for record in records {
        let json = serde_json::to_string(record)
            .map_err(|e| PreformError::Internal(format!("Failed to serialize record: {e}")))?;
        writeln!(writer, "{json}").map_err(|e| PreformError::io("writing output", e))?;
        written += 1;

        if written % 100 == 0 {
            writer
                .flush()
                .map_err(|e| PreformError::io("flushing output", e))?;
        }
        if let Some(pb) = pb {
            pb.set_position(written as u64);
        }
    }

    writer
        .flush()
        .map_err(|e| PreformError::io("flushing output", e))?;

    Ok(written)
}
