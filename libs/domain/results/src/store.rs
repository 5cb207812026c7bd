//! Two-tier result storage: a fast KV tier backed by the store, and a
//! durable filesystem tier used as a read fallback and an audit trail.

use std::path::{Path, PathBuf};

use chrono::Utc;
use task_store::KvStore;
use tokio::fs;
use tracing::{error, info, warn};

use crate::error::ResultResult;
use crate::models::{ExportedResults, PackedResults};

fn result_key(task_id: &str) -> String {
    format!("results:{task_id}")
}

pub struct ResultStore {
    kv: KvStore,
    result_dir: PathBuf,
}

impl ResultStore {
    pub fn new(kv: KvStore, result_dir: impl Into<PathBuf>) -> Self {
        Self {
            kv,
            result_dir: result_dir.into(),
        }
    }

    /// Writes `packed` to the fast store first (authoritative for the
    /// COMPLETED transition), then attempts the durable file write. A file
    /// write failure is logged but does not fail the call.
    pub async fn store(&self, task_id: &str, packed: &PackedResults) -> ResultResult<()> {
        self.kv.set_json(&result_key(task_id), packed).await?;

        if let Err(err) = self.write_file(task_id, packed).await {
            error!(task_id, %err, "failed to write durable result file");
        }

        info!(task_id, "stored task results");
        Ok(())
    }

    async fn write_file(&self, task_id: &str, packed: &PackedResults) -> ResultResult<()> {
        fs::create_dir_all(&self.result_dir).await?;

        let exported_at = Utc::now();
        let filename = format!(
            "task_{task_id}_{}.json",
            exported_at.format("%Y%m%d_%H%M%S")
        );
        let path = self.result_dir.join(filename);

        let envelope = ExportedResults {
            task_id: task_id.to_string(),
            exported_at,
            data: packed.clone(),
        };
        let payload = serde_json::to_string_pretty(&envelope)?;
        fs::write(&path, payload).await?;

        info!(task_id, path = %path.display(), "saved durable result file");
        Ok(())
    }

    /// Reads from the fast store, falling back to the most recently
    /// modified matching file on disk if the fast store has nothing.
    pub async fn get(&self, task_id: &str) -> ResultResult<Option<PackedResults>> {
        if let Some(packed) = self.kv.get_json::<PackedResults>(&result_key(task_id)).await? {
            return Ok(Some(packed));
        }

        match self.read_latest_file(task_id).await {
            Ok(Some(envelope)) => Ok(Some(envelope.data)),
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(task_id, %err, "failed reading result file fallback");
                Ok(None)
            }
        }
    }

    async fn read_latest_file(&self, task_id: &str) -> ResultResult<Option<ExportedResults>> {
        let prefix = format!("task_{task_id}_");
        let latest = latest_matching_file(&self.result_dir, &prefix).await?;

        let Some(path) = latest else {
            return Ok(None);
        };

        let raw = fs::read_to_string(&path).await?;
        let envelope: ExportedResults = serde_json::from_str(&raw)?;
        info!(task_id, path = %path.display(), "loaded results from file");
        Ok(Some(envelope))
    }
}

/// Scans `dir` for files named `{prefix}*.json` and returns the one with the
/// most recent modification time, mirroring the original `glob` + `getctime`
/// lookup without pulling in a globbing crate.
async fn latest_matching_file(dir: &Path, prefix: &str) -> ResultResult<Option<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(prefix) || !name.ends_with(".json") {
            continue;
        }

        let modified = entry.metadata().await?.modified()?;
        if best.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            best = Some((modified, entry.path()));
        }
    }

    Ok(best.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_latest_matching_file_picks_most_recent() {
        let dir = tempdir().unwrap();
        let older = dir.path().join("task_abc_20240101_000000.json");
        let newer = dir.path().join("task_abc_20240102_000000.json");
        let unrelated = dir.path().join("task_xyz_20240103_000000.json");

        tokio::fs::write(&older, "{}").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::fs::write(&newer, "{}").await.unwrap();
        tokio::fs::write(&unrelated, "{}").await.unwrap();

        let found = latest_matching_file(dir.path(), "task_abc_").await.unwrap();
        assert_eq!(found, Some(newer));
    }

    #[tokio::test]
    async fn test_latest_matching_file_missing_dir_returns_none() {
        let found = latest_matching_file(Path::new("/nonexistent/path/xyz"), "task_abc_")
            .await
            .unwrap();
        assert_eq!(found, None);
    }
}
