//! Persistence for harvest and enrichment outputs.
//!
//! Stage outputs are written as `{ "timestamp": ..., "data": [...] }`
//! envelopes; cache files go through the raw methods unwrapped.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::types::Envelope;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    timestamp: DateTime<Utc>,
    data: &'a [T],
}

#[async_trait]
pub trait HarvestStore: Send + Sync {
    /// Write a JSON document under `name`, replacing any previous one.
    async fn save_raw(&self, name: &str, value: &Value) -> Result<()>;

    /// Read the document stored under `name`. `None` if it was never written.
    async fn load_raw(&self, name: &str) -> Result<Option<Value>>;

    /// Write `records` wrapped in an envelope stamped with the current time.
    async fn save<T>(&self, name: &str, records: &[T]) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(EnvelopeRef {
            timestamp: Utc::now(),
            data: records,
        })?;
        self.save_raw(name, &value).await
    }

    async fn load<T>(&self, name: &str) -> Result<Option<Envelope<T>>>
    where
        T: DeserializeOwned + Send,
    {
        match self.load_raw(name).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

/// One pretty-printed JSON file per name under an output directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

fn to_pretty(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[async_trait]
impl HarvestStore for JsonFileStore {
    async fn save_raw(&self, name: &str, value: &Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(name);
        tokio::fs::write(&path, to_pretty(value)?).await?;
        info!(path = %path.display(), "Saved");
        Ok(())
    }

    async fn load_raw(&self, name: &str) -> Result<Option<Value>> {
        match tokio::fs::read(self.path(name)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HashtagRecord;
    use serde_json::json;

    #[tokio::test]
    async fn envelope_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let records = vec![
            HashtagRecord { text: "#one".into() },
            HashtagRecord { text: "#two".into() },
        ];

        store.save("trending_hashtags.json", &records).await.unwrap();
        let loaded: Envelope<HashtagRecord> = store
            .load("trending_hashtags.json")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded.data, records);
        assert!(loaded.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn files_use_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));

        store
            .save_raw("cache.json", &json!({ "a": true }))
            .await
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join("nested/cache.json")).unwrap();
        assert_eq!(text, "{\n    \"a\": true\n}");
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(store.load_raw("nope.json").await.unwrap().is_none());
        let env: Option<Envelope<HashtagRecord>> = store.load("nope.json").await.unwrap();
        assert!(env.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(store.load_raw("bad.json").await.is_err());
    }
}
