use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, CorruptPolicy, StorageOptions};
use crate::error::{StoreError, StoreResult};
use crate::records::{seed, DailySummary, Incident};

mod schema;

pub use schema::CURRENT_VERSION;

pub const INCIDENTS_KEY: &str = "pmma_incidents";
pub const DAILY_SUMMARIES_KEY: &str = "pmma_daily_summaries";

const DOCUMENT_EXTENSION: &str = "json";
const DOCUMENT_TMP_EXTENSION: &str = "json.tmp";

/// Collections as they were found on disk (or their first-run defaults).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub incidents: Vec<Incident>,
    pub summaries: Vec<DailySummary>,
    /// Keys whose documents were unreadable and replaced by defaults.
    pub recovered: Vec<&'static str>,
}

/// File-backed key-value store: one JSON document per key.
#[derive(Clone)]
pub struct StorageHandle {
    store_dir: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn document_path(&self, key: &str) -> PathBuf {
        self.store_dir
            .join(format!("{key}.{}", DOCUMENT_EXTENSION))
    }

    pub fn load(&self) -> StoreResult<Snapshot> {
        let mut recovered = Vec::new();
        let seed_on_first_run = self.options.seed_on_first_run;
        let incidents = self.load_collection(INCIDENTS_KEY, &mut recovered, || {
            if seed_on_first_run {
                let mut seeded = seed::incidents();
                crate::records::sort_incidents(&mut seeded);
                seeded
            } else {
                Vec::new()
            }
        })?;
        let summaries = self.load_collection(DAILY_SUMMARIES_KEY, &mut recovered, Vec::new)?;
        tracing::debug!(
            incidents = incidents.len(),
            summaries = summaries.len(),
            recovered = recovered.len(),
            "loaded record snapshot"
        );
        Ok(Snapshot {
            incidents,
            summaries,
            recovered,
        })
    }

    pub fn save_incidents(&self, incidents: &[Incident]) -> StoreResult<()> {
        self.save(INCIDENTS_KEY, incidents)
    }

    pub fn save_summaries(&self, summaries: &[DailySummary]) -> StoreResult<()> {
        self.save(DAILY_SUMMARIES_KEY, summaries)
    }

    /// Overwrites the whole document for `key`.
    pub fn save<T: Serialize>(&self, key: &str, records: &[T]) -> StoreResult<()> {
        let bytes = schema::encode(key, records)?;
        fs::create_dir_all(&*self.store_dir)
            .map_err(|err| StoreError::io(&*self.store_dir, err))?;
        let final_path = self.document_path(key);
        let tmp_path = final_path.with_extension(DOCUMENT_TMP_EXTENSION);
        fs::write(&tmp_path, &bytes).map_err(|err| StoreError::io(&tmp_path, err))?;
        fs::rename(&tmp_path, &final_path).map_err(|err| StoreError::io(&final_path, err))?;
        tracing::debug!(key, records = records.len(), "persisted collection");
        Ok(())
    }

    /// `Ok(None)` when nothing has been persisted under `key` yet.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<Vec<T>>> {
        let path = self.document_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        schema::decode(key, &raw).map(Some)
    }

    fn load_collection<T, F>(
        &self,
        key: &'static str,
        recovered: &mut Vec<&'static str>,
        fallback: F,
    ) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Vec<T>,
    {
        match self.read(key) {
            Ok(Some(records)) => Ok(records),
            Ok(None) => Ok(fallback()),
            Err(err) if err.is_corruption() && self.options.on_corrupt == CorruptPolicy::Fallback => {
                tracing::warn!(key, error = %err, "persisted document is unreadable, using defaults");
                if self.options.backup_corrupt {
                    if let Err(backup_err) = self.backup_document(key) {
                        tracing::error!(key, error = %backup_err, "failed to back up corrupt document");
                    }
                }
                recovered.push(key);
                Ok(fallback())
            }
            Err(err) => Err(err),
        }
    }

    fn backup_document(&self, key: &str) -> StoreResult<PathBuf> {
        let dir = &self.options.backup_dir;
        fs::create_dir_all(dir).map_err(|err| StoreError::io(dir, err))?;
        let stamp = OffsetDateTime::now_utc().unix_timestamp();
        let target = dir.join(format!("{key}-corrupt-{stamp}.{}", DOCUMENT_EXTENSION));
        let source = self.document_path(key);
        fs::copy(&source, &target).map_err(|err| StoreError::io(&target, err))?;
        tracing::info!(path = %target.display(), "backed up corrupt document");
        Ok(target)
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let store_dir = if storage.store_dir.as_os_str().is_empty() {
        paths.store_dir.clone()
    } else {
        storage.store_dir.clone()
    };
    fs::create_dir_all(&store_dir)
        .with_context(|| format!("creating store directory {}", store_dir.display()))?;
    let mut options = storage.clone();
    if options.backup_dir.as_os_str().is_empty() {
        options.backup_dir = paths.backup_dir.clone();
    }
    Ok(StorageHandle {
        store_dir: Arc::new(store_dir),
        options: Arc::new(options),
    })
}
