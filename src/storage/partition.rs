//! Month-partitioned JSONL record store.
//!
//! ## Storage Layout
//!
//! ```text
//! {base}/
//! ├── 202401/
//! │   ├── data.jsonl    # append-only, one record per line
//! │   └── index.json    # id -> canonical updated date
//! ├── 202402/
//! │   └── ...
//! └── unknown/          # records without a usable updated date
//! ```
//!
//! A record is appended only when its id is new to the partition or its
//! `updated` is strictly newer than the indexed value. Superseded lines stay
//! in the file; the read side reapplies the dedup rule. Index values are
//! canonical date strings, so plain string comparison is chronological
//! comparison.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ArxivRecord;
use crate::utils::time;

const DATA_FILE: &str = "data.jsonl";
const INDEX_FILE: &str = "index.json";
const UNKNOWN_PARTITION: &str = "unknown";

/// Partitioned local record store with per-partition dedup indexes.
///
/// Indexes are cached in memory per instance and rewritten atomically after
/// each append that changed the partition. Like the checkpoint, a store
/// directory has single-writer discipline.
pub struct PartitionStore {
    base_dir: PathBuf,
    index_cache: HashMap<String, HashMap<String, String>>,
}

impl PartitionStore {
    /// Create a store rooted at the given directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            index_cache: HashMap::new(),
        }
    }

    /// Partition key for a record; a pure function of its `updated` date.
    fn partition_key(updated: Option<NaiveDate>) -> String {
        match updated {
            Some(date) => time::month_key(date),
            None => UNKNOWN_PARTITION.to_string(),
        }
    }

    fn data_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key).join(DATA_FILE)
    }

    fn index_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key).join(INDEX_FILE)
    }

    /// Append records, deduplicating per partition by id and `updated`.
    ///
    /// Returns the number of lines actually appended. Re-appending records
    /// that are already indexed with the same or a newer date is a no-op.
    pub async fn append_records(&mut self, records: &[ArxivRecord]) -> Result<usize> {
        let mut buckets: HashMap<String, Vec<&ArxivRecord>> = HashMap::new();
        for record in records {
            buckets
                .entry(Self::partition_key(record.updated))
                .or_default()
                .push(record);
        }

        let mut appended_total = 0;
        for (key, items) in buckets {
            appended_total += self.append_to_partition(&key, &items).await?;
        }
        Ok(appended_total)
    }

    async fn append_to_partition(&mut self, key: &str, records: &[&ArxivRecord]) -> Result<usize> {
        let mut index = self.take_index(key).await?;

        let mut lines: Vec<u8> = Vec::new();
        let mut appended = 0;
        for record in records {
            if record.id.is_empty() {
                continue;
            }
            let updated = record.updated.map(time::canonical_date).unwrap_or_default();
            if let Some(prev) = index.get(&record.id) {
                if prev.as_str() >= updated.as_str() {
                    continue;
                }
            }
            let line = serde_json::to_string(record)?;
            lines.extend_from_slice(line.as_bytes());
            lines.push(b'\n');
            index.insert(record.id.clone(), updated);
            appended += 1;
        }

        if appended > 0 {
            let data_path = self.data_path(key);
            if let Some(parent) = data_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&data_path)
                .await?;
            file.write_all(&lines).await?;
            file.flush().await?;
            drop(file);

            // Data lines are durable before the index claims them.
            self.save_index(key, &index).await?;
            log::info!("Partition {key}: appended {appended} records");
        }
        self.index_cache.insert(key.to_string(), index);
        Ok(appended)
    }

    /// Take the partition's index out of the cache, loading it from disk on
    /// first touch. An unreadable index degrades to empty (records re-append,
    /// dedup still converges on the next rewrite).
    async fn take_index(&mut self, key: &str) -> Result<HashMap<String, String>> {
        if let Some(index) = self.index_cache.remove(key) {
            return Ok(index);
        }
        match tokio::fs::read(self.index_path(key)).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(index) => Ok(index),
                Err(error) => {
                    log::warn!("Index for partition {key} failed to parse ({error}); rebuilding");
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Atomically rewrite a partition's index file.
    async fn save_index(&self, key: &str, index: &HashMap<String, String>) -> Result<()> {
        let path = self.index_path(key);
        let bytes = serde_json::to_vec(index)?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read every record whose `updated` falls within the inclusive range.
    ///
    /// Only month partitions overlapping the range are touched; records that
    /// share a boundary partition but fall outside the range are excluded,
    /// as is the whole `unknown` partition.
    pub async fn read_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ArxivRecord>> {
        let mut records = Vec::new();
        for key in time::months_covering(start, end) {
            let content = match tokio::fs::read_to_string(self.data_path(&key)).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::Io(e)),
            };
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ArxivRecord>(line) {
                    Ok(record) => {
                        if record.updated.is_some_and(|u| u >= start && u <= end) {
                            records.push(record);
                        }
                    }
                    Err(error) => {
                        log::warn!("Skipping unparsable line in partition {key}: {error}");
                    }
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(id: &str, updated: Option<NaiveDate>) -> ArxivRecord {
        ArxivRecord {
            id: id.to_string(),
            title: format!("Title {id}"),
            abstract_text: "An abstract.".to_string(),
            authors: vec!["Doe".to_string()],
            primary_category: "cs.AI".to_string(),
            categories: vec!["cs.AI".to_string()],
            created: updated,
            updated,
            comments: None,
            abs_url: format!("http://arxiv.org/abs/{id}"),
            pdf_url: format!("http://arxiv.org/pdf/{id}.pdf"),
        }
    }

    async fn line_count(path: &std::path::Path) -> usize {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => content.lines().count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_append_and_read_range() {
        let tmp = TempDir::new().unwrap();
        let mut store = PartitionStore::new(tmp.path());

        let records = vec![
            record("a", Some(date(2024, 1, 10))),
            record("b", Some(date(2024, 2, 5))),
        ];
        let appended = store.append_records(&records).await.unwrap();
        assert_eq!(appended, 2);

        let read = store
            .read_range(date(2024, 1, 1), date(2024, 2, 28))
            .await
            .unwrap();
        assert_eq!(read.len(), 2);
    }

    #[tokio::test]
    async fn test_idempotent_append() {
        let tmp = TempDir::new().unwrap();
        let mut store = PartitionStore::new(tmp.path());

        let records = vec![
            record("a", Some(date(2024, 1, 10))),
            record("b", Some(date(2024, 1, 11))),
        ];
        assert_eq!(store.append_records(&records).await.unwrap(), 2);
        assert_eq!(store.append_records(&records).await.unwrap(), 0);

        let data = tmp.path().join("202401").join(DATA_FILE);
        assert_eq!(line_count(&data).await, 2);
    }

    #[tokio::test]
    async fn test_dedup_keeps_newest_in_either_order() {
        let older = record("a", Some(date(2024, 1, 10)));
        let newer = record("a", Some(date(2024, 1, 20)));

        for batch in [
            vec![older.clone(), newer.clone()],
            vec![newer.clone(), older.clone()],
        ] {
            let tmp = TempDir::new().unwrap();
            let mut store = PartitionStore::new(tmp.path());
            store.append_records(&batch).await.unwrap();

            let index: HashMap<String, String> = serde_json::from_slice(
                &tokio::fs::read(tmp.path().join("202401").join(INDEX_FILE))
                    .await
                    .unwrap(),
            )
            .unwrap();
            assert_eq!(index.get("a"), Some(&"2024-01-20".to_string()));

            // An older version never displaces the indexed newer one.
            let mut store = PartitionStore::new(tmp.path());
            assert_eq!(store.append_records(&[older.clone()]).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_index_survives_new_instance() {
        let tmp = TempDir::new().unwrap();
        let records = vec![record("a", Some(date(2024, 1, 10)))];

        let mut store = PartitionStore::new(tmp.path());
        assert_eq!(store.append_records(&records).await.unwrap(), 1);

        // Fresh instance reloads the index from disk, not from memory.
        let mut store = PartitionStore::new(tmp.path());
        assert_eq!(store.append_records(&records).await.unwrap(), 0);
        assert_eq!(
            line_count(&tmp.path().join("202401").join(DATA_FILE)).await,
            1
        );
    }

    #[tokio::test]
    async fn test_read_range_excludes_out_of_range_in_same_partition() {
        let tmp = TempDir::new().unwrap();
        let mut store = PartitionStore::new(tmp.path());

        store
            .append_records(&[
                record("early", Some(date(2024, 1, 2))),
                record("inside", Some(date(2024, 1, 15))),
                record("late", Some(date(2024, 1, 30))),
            ])
            .await
            .unwrap();

        let read = store
            .read_range(date(2024, 1, 10), date(2024, 1, 20))
            .await
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].id, "inside");
    }

    #[tokio::test]
    async fn test_dateless_records_go_to_unknown_and_stay_out_of_reads() {
        let tmp = TempDir::new().unwrap();
        let mut store = PartitionStore::new(tmp.path());

        store
            .append_records(&[record("dateless", None)])
            .await
            .unwrap();
        assert_eq!(
            line_count(&tmp.path().join(UNKNOWN_PARTITION).join(DATA_FILE)).await,
            1
        );

        let read = store
            .read_range(date(2000, 1, 1), date(2100, 1, 1))
            .await
            .unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_line_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut store = PartitionStore::new(tmp.path());
        store
            .append_records(&[record("a", Some(date(2024, 1, 10)))])
            .await
            .unwrap();

        let data = tmp.path().join("202401").join(DATA_FILE);
        let mut content = tokio::fs::read_to_string(&data).await.unwrap();
        content.push_str("{ this is not json\n");
        tokio::fs::write(&data, content).await.unwrap();

        let read = store
            .read_range(date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        assert_eq!(read.len(), 1);
    }
}
