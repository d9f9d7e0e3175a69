//! Per-record driver: normalize, then persist
//!
//! Applies the failure policy for one item at a time. Records that fail
//! validation are dropped and logged; records whose write fails on a healthy
//! connection are reported and skipped; a connection-level failure stops the
//! run and is returned to the caller.

use crate::error::{PersistenceError, Result, ValidationError};
use crate::normalizer::normalize;
use crate::record::RawRecord;
use crate::sink::RecordWriter;
use serde::Serialize;
use std::path::Path;
use tracing::{error, warn};

/// What happened to one record
#[derive(Debug)]
pub enum ItemOutcome {
    Stored { id: u64 },
    Dropped(ValidationError),
    Failed(PersistenceError),
}

/// Totals for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub stored: usize,
    pub dropped: usize,
    pub failed: usize,
    /// Input lines that never became a record
    pub skipped: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Stored { .. } => self.stored += 1,
            ItemOutcome::Dropped(_) => self.dropped += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.stored + self.dropped + self.failed
    }
}

/// Normalize `raw` and hand it to `writer`.
///
/// Only a fatal persistence error is returned as `Err`.
pub async fn process<W>(
    raw: &RawRecord,
    writer: &mut W,
) -> std::result::Result<ItemOutcome, PersistenceError>
where
    W: RecordWriter + ?Sized,
{
    let record = match normalize(raw) {
        Ok(record) => record,
        Err(e) => {
            warn!(
                field = e.field(),
                value = e.value().unwrap_or_default(),
                rule = e.rule().map(|r| r.as_str()).unwrap_or_default(),
                error = %e,
                "Dropping record that failed validation"
            );
            return Ok(ItemOutcome::Dropped(e));
        },
    };

    match writer.write(&record).await {
        Ok(id) => Ok(ItemOutcome::Stored { id }),
        Err(e) if e.is_fatal() => {
            error!(upc = %record.upc, error = %e, "Aborting run on sink failure");
            Err(e)
        },
        Err(e) => {
            warn!(upc = %record.upc, url = %record.url, error = %e, "Failed to store record");
            Ok(ItemOutcome::Failed(e))
        },
    }
}

/// Process every record in order, stopping at the first fatal sink error.
pub async fn run<W, I>(
    records: I,
    writer: &mut W,
) -> std::result::Result<RunStats, PersistenceError>
where
    W: RecordWriter + ?Sized,
    I: IntoIterator<Item = RawRecord>,
{
    let mut stats = RunStats::default();
    for raw in records {
        let outcome = process(&raw, writer).await?;
        stats.record(&outcome);
    }
    Ok(stats)
}

/// Read raw records from a JSON Lines file.
///
/// Lines that are not a JSON object of strings are logged and skipped.
/// Returns the records and the number of skipped lines.
pub fn load_records(path: &Path) -> bookscraper_common::Result<(Vec<RawRecord>, usize)> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for (index, line) in serde_jsonlines::json_lines::<RawRecord, _>(path)?.enumerate() {
        match line {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(path = %path.display(), line = index + 1, error = %e, "Skipping unreadable line");
            },
        }
    }

    Ok((records, skipped))
}

/// Load a JSON Lines file and run every record through `writer`.
pub async fn ingest_file<W>(path: &Path, writer: &mut W) -> Result<RunStats>
where
    W: RecordWriter + ?Sized,
{
    let (records, skipped) = load_records(path)?;
    let mut stats = run(records, writer).await?;
    stats.skipped = skipped;
    Ok(stats)
}
