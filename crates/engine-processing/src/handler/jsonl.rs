use super::{Outcome, SyncHandler};
use async_trait::async_trait;
use chrono::Utc;
use model::{core::entity::Direction, records::erp::ErpRecord};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::warn;

/// Store-side handler that appends every accepted record to a JSON-lines
/// file. Readers take the last line per reference, so replays are harmless.
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn validate(record: &ErpRecord) -> Result<(), String> {
        if record.reference.trim().is_empty() {
            return Err("record has an empty reference".to_string());
        }
        if !record.payload.is_object() && !record.payload.is_null() {
            return Err(format!(
                "payload for '{}' is not an object",
                record.reference
            ));
        }
        Ok(())
    }

    async fn append(&self, line: String) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

#[async_trait]
impl SyncHandler for JsonLinesStore {
    async fn apply(&self, direction: Direction, record: &ErpRecord) -> Outcome {
        if direction == Direction::StoreToErp {
            return Outcome::Failure("JSON-lines store cannot push records to the ERP".to_string());
        }
        if let Err(reason) = Self::validate(record) {
            return Outcome::Failure(reason);
        }

        let line = json!({
            "reference": record.reference,
            "label": record.label,
            "payload": record.payload,
            "synced_at": Utc::now().to_rfc3339(),
        });

        match self.append(line.to_string()).await {
            Ok(()) => Outcome::Success(format!("stored {}", record.reference)),
            Err(e) => {
                warn!(path = %self.path.display(), reference = %record.reference, "Store write failed: {e}");
                Outcome::Failure(format!("store write failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn appends_valid_records() {
        let dir = tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("out/products.jsonl"));

        for reference in ["A", "B"] {
            let record = ErpRecord::new(reference).with_payload(json!({"qty": 1}));
            assert!(!store.apply(Direction::ErpToStore, &record).await.is_failure());
        }

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["reference"], "B");
    }

    #[tokio::test]
    async fn rejects_invalid_items() {
        let dir = tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("orders.jsonl"));

        let blank = ErpRecord::new("  ");
        assert!(store.apply(Direction::ErpToStore, &blank).await.is_failure());

        let scalar = ErpRecord::new("O-1").with_payload(json!(42));
        assert!(store.apply(Direction::ErpToStore, &scalar).await.is_failure());

        let outbound = ErpRecord::new("O-2");
        assert!(store.apply(Direction::StoreToErp, &outbound).await.is_failure());

        assert!(!store.path().exists());
    }
}
