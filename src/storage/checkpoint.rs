//! Durable harvest-progress checkpoint.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// On-disk checkpoint contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointFile {
    last_updated_iso: DateTime<Utc>,
    last_run: DateTime<Utc>,
}

/// Single durable record of harvest progress.
///
/// One store owns one checkpoint path. Running two harvest cycles against
/// the same path concurrently is not supported; this is a documented
/// single-writer constraint, not an enforced lock.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a checkpoint store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Last durably recorded `updated` watermark.
    ///
    /// A missing or unparsable checkpoint file reads as "never harvested";
    /// the caller substitutes its bootstrap start date.
    pub async fn get_since(&self) -> Result<Option<DateTime<Utc>>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        match serde_json::from_slice::<CheckpointFile>(&bytes) {
            Ok(file) => Ok(Some(file.last_updated_iso)),
            Err(error) => {
                log::warn!(
                    "Checkpoint at {:?} failed to parse ({error}); treating as never harvested",
                    self.path
                );
                Ok(None)
            }
        }
    }

    /// Durably advance the watermark (write-to-temp, then rename).
    pub async fn set_since(&self, last_updated: DateTime<Utc>) -> Result<()> {
        let file = CheckpointFile {
            last_updated_iso: last_updated,
            last_run: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        let mut out = tokio::fs::File::create(&tmp).await?;
        out.write_all(&bytes).await?;
        out.flush().await?;
        drop(out);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path().join("checkpoint.json"));
        assert_eq!(store.get_since().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path().join("checkpoint.json"));

        let ts = "2024-01-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        store.set_since(ts).await.unwrap();
        assert_eq!(store.get_since().await.unwrap(), Some(ts));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_latest() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path().join("checkpoint.json"));

        let t1 = "2024-01-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let t2 = "2024-02-10T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        store.set_since(t1).await.unwrap();
        store.set_since(t2).await.unwrap();
        assert_eq!(store.get_since().await.unwrap(), Some(t2));
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("checkpoint.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = CheckpointStore::new(&path);
        assert_eq!(store.get_since().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path().join("nested/dir/checkpoint.json"));

        let ts = "2024-01-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        store.set_since(ts).await.unwrap();
        assert_eq!(store.get_since().await.unwrap(), Some(ts));
    }
}
