//! Harvest sync cycle.
//!
//! One cycle walks the date range from the durable checkpoint (or the
//! bootstrap start) up to today in fixed-size day windows, streams each
//! window's records into bounded batches, flushes them to the partitioned
//! store, and finally persists the new checkpoint. A window whose retries
//! are exhausted is logged and skipped; the cycle keeps going. Store write
//! failures abort the cycle before the checkpoint moves.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::error::Result;
use crate::models::{ArxivRecord, Config, Paper, SelectionCriteria};
use crate::pipeline::select::select;
use crate::services::OaiClient;
use crate::storage::{CheckpointStore, PartitionStore};

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Windows attempted in this cycle
    pub windows_total: usize,
    /// Windows skipped after exhausting retries
    pub windows_failed: usize,
    /// Lines actually appended across all partitions
    pub records_appended: usize,
    /// Checkpoint value as of the end of the cycle
    pub checkpoint: Option<DateTime<Utc>>,
}

enum WindowOutcome {
    Completed(usize),
    Failed,
}

/// Run one incremental sync cycle from the durable checkpoint up to today.
pub async fn run_sync(
    config: &Config,
    client: &OaiClient,
    store: &mut PartitionStore,
    checkpoint: &CheckpointStore,
) -> Result<SyncReport> {
    let since = checkpoint.get_since().await?;
    let start = since
        .map(|ts| ts.date_naive())
        .unwrap_or(config.sync.bootstrap_start);
    let end = Utc::now().date_naive();

    if start >= end {
        log::info!("Local store is up to date ({start} >= {end}); nothing to sync");
        return Ok(SyncReport {
            checkpoint: since,
            ..SyncReport::default()
        });
    }
    sync_range(config, client, store, checkpoint, start, end).await
}

/// Run one sync cycle over an explicit inclusive date range.
pub async fn sync_range(
    config: &Config,
    client: &OaiClient,
    store: &mut PartitionStore,
    checkpoint: &CheckpointStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SyncReport> {
    log::info!("Starting sync: {start} -> {end}");
    let mut report = SyncReport::default();
    let mut max_updated: Option<NaiveDate> = None;

    let window_days = u64::from(config.sync.window_days.max(1));
    let mut cursor = start;
    while cursor <= end {
        let window_end = cursor
            .checked_add_days(Days::new(window_days - 1))
            .map(|d| d.min(end))
            .unwrap_or(end);
        report.windows_total += 1;

        match harvest_window(config, client, store, cursor, window_end, &mut max_updated).await? {
            WindowOutcome::Completed(appended) => report.records_appended += appended,
            WindowOutcome::Failed => report.windows_failed += 1,
        }

        cursor = match window_end.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    // Resume just past the newest durably stored data; when nothing new was
    // observed, fall back to the cycle's end date.
    let next = day_start_utc(max_updated.unwrap_or(end));
    checkpoint.set_since(next).await?;
    report.checkpoint = Some(next);

    log::info!(
        "Sync completed: {}/{} windows ok, {} records appended, checkpoint {next}",
        report.windows_total - report.windows_failed,
        report.windows_total,
        report.records_appended,
    );
    Ok(report)
}

/// Harvest one window, flushing bounded batches to the store.
///
/// Client failures (retries exhausted) mark the window failed without
/// touching the rest of the cycle; batches flushed before the failure stay
/// durable. Store errors propagate.
async fn harvest_window(
    config: &Config,
    client: &OaiClient,
    store: &mut PartitionStore,
    from: NaiveDate,
    until: NaiveDate,
    max_updated: &mut Option<NaiveDate>,
) -> Result<WindowOutcome> {
    log::info!("Harvesting window {from}..{until}");
    let mut stream = client.list_records(from, until, &config.oai.set_spec);
    let mut batch: Vec<ArxivRecord> = Vec::with_capacity(config.sync.flush_threshold);
    let mut appended = 0;

    while let Some(next) = stream.next_record().await {
        match next {
            Ok(record) => {
                batch.push(record);
                if batch.len() >= config.sync.flush_threshold {
                    appended += flush_batch(store, &mut batch, max_updated).await?;
                }
            }
            Err(error) => {
                log::error!("Harvest window {from}..{until} failed: {error}");
                return Ok(WindowOutcome::Failed);
            }
        }
    }

    if !batch.is_empty() {
        appended += flush_batch(store, &mut batch, max_updated).await?;
    }
    Ok(WindowOutcome::Completed(appended))
}

/// Flush a batch to the store and fold its dates into the observed maximum.
///
/// Every flushed record counts as observed, including ones the store's dedup
/// skipped; re-harvesting known data still advances the watermark.
async fn flush_batch(
    store: &mut PartitionStore,
    batch: &mut Vec<ArxivRecord>,
    max_updated: &mut Option<NaiveDate>,
) -> Result<usize> {
    let appended = store.append_records(batch).await?;
    for record in batch.iter() {
        if let Some(updated) = record.updated {
            if max_updated.is_none_or(|current| updated > current) {
                *max_updated = Some(updated);
            }
        }
    }
    batch.clear();
    Ok(appended)
}

/// Run a full sync cycle, then select and normalize papers for the caller's
/// requested output window.
pub async fn harvest_papers(
    config: &Config,
    client: &OaiClient,
    store: &mut PartitionStore,
    checkpoint: &CheckpointStore,
    criteria: &SelectionCriteria,
) -> Result<(SyncReport, Vec<Paper>)> {
    let report = run_sync(config, client, store, checkpoint).await?;
    let papers = select_papers(store, criteria).await?;
    Ok((report, papers))
}

/// Select papers from the local store without harvesting.
///
/// The output window defaults to yesterday on both ends when the criteria
/// leave the dates unset.
pub async fn select_papers(
    store: &PartitionStore,
    criteria: &SelectionCriteria,
) -> Result<Vec<Paper>> {
    let yesterday = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap_or(Utc::now().date_naive());
    let start = criteria.start_date.unwrap_or(yesterday);
    let end = criteria.end_date.unwrap_or(yesterday);

    let records = store.read_range(start, end).await?;
    let selected = select(records, criteria);
    log::info!("Selected {} papers from {start}..{end}", selected.len());

    Ok(selected
        .iter()
        .map(|record| Paper::from_record(record, end))
        .collect())
}

fn day_start_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
