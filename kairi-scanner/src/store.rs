//! Signal log storage.
//!
//! The log is a JSON-lines file, one webhook record per line. Older logs
//! written as a single JSON array are read as well.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use kairi_common::error::{Error, Result};

use crate::signal::{parse_log_lines, RawSignalRecord, SignalObservation};

/// Source of signal observations for a scan.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Every observation currently in the log, in log order.
    async fn load(&self) -> Result<Vec<SignalObservation>>;

    /// Append one raw record.
    async fn append(&self, record: RawSignalRecord) -> Result<()>;
}

/// Line written to the log file.
#[derive(Debug, Serialize)]
struct StoredRecord<'a> {
    #[serde(flatten)]
    record: &'a RawSignalRecord,
    received_at: DateTime<Utc>,
}

/// File-backed signal log.
pub struct JsonlSignalStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSignalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Keep the lines that are valid UTF-8; a record with bad bytes is skipped
/// like any other malformed line.
fn decode_lines(bytes: &[u8]) -> String {
    let mut content = String::with_capacity(bytes.len());
    for (index, line) in bytes.split(|&b| b == b'\n').enumerate() {
        match std::str::from_utf8(line) {
            Ok(text) => {
                content.push_str(text);
                content.push('\n');
            }
            Err(e) => {
                tracing::warn!(
                    line = index + 1,
                    error = %e,
                    "Skipping signal log line with invalid UTF-8"
                );
            }
        }
    }
    content
}

/// Parse a log body in either layout.
fn parse_content(content: &str) -> Vec<SignalObservation> {
    if content.trim_start().starts_with('[') {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(content) {
            return items
                .into_iter()
                .filter_map(RawSignalRecord::from_value)
                .map(SignalObservation::from)
                .collect();
        }
    }
    parse_log_lines(content)
}

#[async_trait]
impl SignalStore for JsonlSignalStore {
    async fn load(&self) -> Result<Vec<SignalObservation>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.path.display(),
                    "Signal log not found, treating as empty"
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::Io(e).with_context(format!(
                    "Failed to read signal log {}",
                    self.path.display()
                )))
            }
        };

        let content = decode_lines(&bytes);
        let observations = parse_content(&content);
        tracing::debug!(
            path = %self.path.display(),
            observations = observations.len(),
            "Loaded signal log"
        );
        Ok(observations)
    }

    async fn append(&self, record: RawSignalRecord) -> Result<()> {
        let mut line = serde_json::to_string(&StoredRecord {
            record: &record,
            received_at: Utc::now(),
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(
            symbol = %record.symbol,
            exchange = %record.exchange,
            "Signal appended to log"
        );
        Ok(())
    }
}

/// In-memory store, used when no log file is wanted.
#[derive(Default)]
pub struct MemorySignalStore {
    records: Mutex<Vec<RawSignalRecord>>,
}

impl MemorySignalStore {
    pub fn new(records: Vec<RawSignalRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn load(&self) -> Result<Vec<SignalObservation>> {
        let records = self.records.lock().await;
        Ok(records.iter().cloned().map(SignalObservation::from).collect())
    }

    async fn append(&self, record: RawSignalRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(symbol: &str, signal: &str, exchange: &str) -> RawSignalRecord {
        RawSignalRecord {
            symbol: symbol.into(),
            signal: signal.into(),
            exchange: exchange.into(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonlSignalStore::new(dir.path().join("nope.jsonl"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_load_preserves_order() {
        let dir = tempdir().unwrap();
        let store = JsonlSignalStore::new(dir.path().join("nested/signals.jsonl"));

        store.append(record("ABC", "KAIRI -25", "NASDAQ")).await.unwrap();
        store.append(record("XYZ", "ALIŞ SAYIMI", "BIST")).await.unwrap();

        let observations = store.load().await.unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0], SignalObservation::new("ABC", "KAIRI -25", "NASDAQ"));
        assert_eq!(observations[1].exchange, "BIST");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.lines().all(|l| l.contains("received_at")));
    }

    #[tokio::test]
    async fn test_legacy_array_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signals.json");
        std::fs::write(
            &path,
            r#"[{"symbol":"ABC","signal":"KAIRI -25","exchange":"NASDAQ"}, 7, {"symbol":"DEF"}]"#,
        )
        .unwrap();

        let observations = JsonlSignalStore::new(&path).load().await.unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[1], SignalObservation::new("DEF", "", ""));
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signals.jsonl");
        std::fs::write(
            &path,
            "{\"symbol\":\"ABC\"}\n{broken\n{\"symbol\":\"DEF\",\"exchange\":\"BIST\"}\n",
        )
        .unwrap();

        let observations = JsonlSignalStore::new(&path).load().await.unwrap();
        let symbols: Vec<&str> = observations.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ABC", "DEF"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signals.jsonl");
        let mut content =
            br#"{"symbol":"ABC","signal":"KAIRI -25","exchange":"NASDAQ"}"#.to_vec();
        content.extend_from_slice(b"\n{\"symbol\":\"X\xff\"}\n");
        content.extend_from_slice(
            r#"{"symbol":"ABC","signal":"ALIŞ SAYIMI","exchange":"NASDAQ"}"#.as_bytes(),
        );
        std::fs::write(&path, content).unwrap();

        let observations = JsonlSignalStore::new(&path).load().await.unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0], SignalObservation::new("ABC", "KAIRI -25", "NASDAQ"));
        assert_eq!(observations[1], SignalObservation::new("ABC", "ALIŞ SAYIMI", "NASDAQ"));
    }

    #[test]
    fn test_memory_store() {
        tokio_test::block_on(async {
            let store = MemorySignalStore::default();
            store.append(record("ABC", "x", "NASDAQ")).await.unwrap();
            let observations = store.load().await.unwrap();
            assert_eq!(observations.len(), 1);
        });
    }
}
