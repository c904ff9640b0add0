//! Health-export import pipeline.
//!
//! `parse_export` drives the [`ChunkedScanner`] over the export, feeds every
//! fragment through the record extractors, and returns sorted results.
//! `merge::merge_into_store` then writes the records that are not stored yet.

pub mod extract;
pub mod merge;
pub mod model;
pub mod progress;
pub mod scanner;
pub mod source;
pub mod units;

pub use extract::ExtractionAccumulator;
pub use merge::{merge_into_store, MergeReport};
pub use model::{
    ActivityDay, BlockCategory, BodyMetric, CardioType, ExtractedWorkout, HealthImportResult,
    WorkoutBlock,
};
pub use progress::{ImportPhase, ImportProgress};
pub use scanner::{CancelFlag, ChunkedScanner};
pub use source::{DocumentSource, FileSource, MemorySource};

use std::path::Path;

use crate::error::{LiftlogError, Result};

const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".gz", ".tgz", ".tar", ".bz2", ".xz", ".7z", ".rar"];
const EXPORT_EXTENSION: &str = ".xml";

/// Knobs for one `parse_export` call
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub chunk_size: usize,
    pub max_carry_over_chunks: usize,
    pub cancel: Option<CancelFlag>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: 10 * 1024 * 1024,
            max_carry_over_chunks: 4,
            cancel: None,
        }
    }
}

/// Reject archives and anything that is not a single XML document.
pub fn validate_export_name(name: &str) -> Result<()> {
    let lower = name.to_lowercase();

    if ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(LiftlogError::UnsupportedFormat(format!(
            "{} is a compressed archive. Unzip it and choose the export.xml file inside.",
            name
        )));
    }

    if !lower.ends_with(EXPORT_EXTENSION) {
        return Err(LiftlogError::UnsupportedFormat(format!(
            "{} is not an XML health export. Choose the export.xml file from your Health export.",
            name
        )));
    }

    Ok(())
}

/// Parse a health export into workouts, body metrics and activity days.
///
/// `on_progress` is called after every fragment with phase `parsing`, then
/// once with phase `done` at 100%. Read failures and cancellation abort the
/// whole call; malformed records are dropped and counted in `skipped_records`.
pub async fn parse_export<S, F>(
    source: S,
    options: &ImportOptions,
    mut on_progress: F,
) -> Result<HealthImportResult>
where
    S: DocumentSource,
    F: FnMut(&ImportProgress),
{
    validate_export_name(source.name())?;

    let name = source.name().to_string();
    log::info!(
        "Parsing {} ({} bytes, {} byte chunks)",
        name,
        source.size(),
        options.chunk_size
    );

    let mut scanner = ChunkedScanner::new(source, options.chunk_size)
        .with_carry_over_limit(options.max_carry_over_chunks)
        .with_cancel(options.cancel.clone());
    let mut acc = ExtractionAccumulator::new();
    let mut fragments = 0usize;

    while let Some(fragment) = scanner.next_fragment().await? {
        acc.ingest_fragment(&fragment);
        fragments += 1;

        on_progress(&ImportProgress::parsing(
            scanner.bytes_consumed(),
            scanner.total_bytes(),
            format!(
                "Read {} of {}: {} workouts, {} body metrics, {} activity days",
                format_bytes(scanner.bytes_consumed()),
                format_bytes(scanner.total_bytes()),
                acc.workouts.len(),
                acc.body_metrics.len(),
                acc.activity_days.len()
            ),
        ));
    }

    let result = finalize(acc);
    log::info!(
        "Parsed {} in {} fragments: {} ({} records skipped)",
        name,
        fragments,
        result.summary(),
        result.skipped_records
    );
    on_progress(&ImportProgress::done(format!("Found {}", result.summary())));

    Ok(result)
}

/// Validate the file name, open the file, and parse it
pub async fn parse_export_file<F>(
    path: &Path,
    options: &ImportOptions,
    on_progress: F,
) -> Result<HealthImportResult>
where
    F: FnMut(&ImportProgress),
{
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    validate_export_name(&name)?;

    let source = FileSource::open(path)
        .await
        .map_err(|source| LiftlogError::SourceRead { offset: 0, source })?;
    parse_export(source, options, on_progress).await
}

/// Sort every list; body metrics come out of the date-keyed map already ordered.
fn finalize(acc: ExtractionAccumulator) -> HealthImportResult {
    let ExtractionAccumulator {
        mut workouts,
        body_metrics,
        mut activity_days,
        skipped,
    } = acc;

    workouts.sort_by_key(|w| w.start);
    activity_days.sort_by_key(|d| d.date);

    HealthImportResult {
        workouts,
        body_metrics: body_metrics.into_values().collect(),
        activity_days,
        skipped_records: skipped,
    }
}

fn format_bytes(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB)
    } else {
        format!("{} KB", bytes.div_ceil(1024))
    }
}
