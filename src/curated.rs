//! Curated record store
//!
//! A curated record is a previously persisted, trusted resolution for one
//! (publisher, date). The curated harvester reads it once at the start of a
//! resolution; the resolver writes it once after a successful download.

use crate::error::Result;
use crate::types::CuratedRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

/// Keyed (publisher id, date) record storage
#[async_trait]
pub trait CuratedStore: Send + Sync {
    /// Record for an exact (publisher, date), if any
    async fn lookup(&self, publisher_id: &str, date: NaiveDate) -> Result<Option<CuratedRecord>>;

    /// Insert or replace the record for `record.publisher_id` and `record.date`
    async fn record(&self, record: CuratedRecord) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CuratedFile {
    #[serde(default)]
    records: Vec<CuratedRecord>,
}

/// Curated records kept in one JSON file
///
/// Writes go through a temporary sibling file and a rename, so readers see
/// either the old or the new document.
#[derive(Debug)]
pub struct JsonCuratedStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCuratedStore {
    /// Open (or lazily create) a store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<CuratedFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(CuratedFile::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CuratedFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, file: &CuratedFile) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(file)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl CuratedStore for JsonCuratedStore {
    async fn lookup(&self, publisher_id: &str, date: NaiveDate) -> Result<Option<CuratedRecord>> {
        let file = self.load().await?;
        Ok(file
            .records
            .into_iter()
            .rev()
            .find(|r| r.publisher_id == publisher_id && r.date == date))
    }

    async fn record(&self, record: CuratedRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        file.records
            .retain(|r| !(r.publisher_id == record.publisher_id && r.date == record.date));
        tracing::debug!(
            publisher = %record.publisher_id,
            date = %record.date,
            url = %record.source_url,
            "Writing curated record"
        );
        file.records.push(record);
        self.save(&file).await
    }
}

/// Process-local store, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryCuratedStore {
    records: RwLock<HashMap<(String, NaiveDate), CuratedRecord>>,
}

impl MemoryCuratedStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CuratedStore for MemoryCuratedStore {
    async fn lookup(&self, publisher_id: &str, date: NaiveDate) -> Result<Option<CuratedRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(publisher_id.to_string(), date))
            .cloned())
    }

    async fn record(&self, record: CuratedRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert((record.publisher_id.clone(), record.date), record);
        Ok(())
    }
}
