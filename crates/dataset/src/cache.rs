//! Run-once dataset cache.
//!
//! The cache is an owned handle, not a global: whoever constructs it decides
//! its lifetime, and tests get a fresh one per case. The expensive
//! fetch+load path runs under a single async mutex, so N concurrent callers
//! produce one download and N clones of the same `Arc<Dataset>`.

use crate::error::Result;
use crate::snapshot::{self, SnapshotMeta, SNAPSHOT_COLUMNS};
use crate::Dataset;
use reqwest::header::{ETAG, LAST_MODIFIED};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/workout-tools/gym-exercise-data/main/gym_exercises.csv";
const DATA_DIR_NAME: &str = ".workout-mcp";

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub source_url: String,
    pub data_dir: PathBuf,
}

impl DatasetConfig {
    pub fn new(source_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Reads `WORKOUT_DATASET_URL` / `WORKOUT_DATA_DIR`, falling back to the
    /// bundled origin and `~/.workout-mcp`.
    pub fn from_env() -> Self {
        let source_url = std::env::var("WORKOUT_DATASET_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DATASET_URL.to_string());
        let data_dir = std::env::var("WORKOUT_DATA_DIR")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(DATA_DIR_NAME)
            });
        Self {
            source_url,
            data_dir,
        }
    }
}

/// Outcome of an explicit `download_dataset` call.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub status: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub snapshot_path: PathBuf,
    pub revision: String,
}

pub struct DatasetCache {
    config: DatasetConfig,
    client: reqwest::Client,
    slot: Mutex<Option<Arc<Dataset>>>,
}

impl DatasetCache {
    pub fn new(config: DatasetConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            slot: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Returns the loaded dataset, fetching and persisting the snapshot on
    /// first use. Idempotent: later calls reuse the in-memory dataset, and
    /// concurrent first calls block on the in-flight load instead of
    /// downloading twice.
    pub async fn ensure_loaded(&self) -> Result<Arc<Dataset>> {
        let mut slot = self.slot.lock().await;
        if let Some(dataset) = slot.as_ref() {
            return Ok(Arc::clone(dataset));
        }
        let dataset = Arc::new(self.load_or_fetch().await?);
        log::info!(
            "dataset loaded: {} records, revision {}",
            dataset.len(),
            dataset.revision()
        );
        *slot = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Explicit download. `force` invalidates the current snapshot and
    /// refetches; otherwise an existing snapshot is reused. On a failed
    /// forced refresh the previously loaded dataset stays in service.
    pub async fn refresh(&self, force: bool) -> Result<DownloadReport> {
        let mut slot = self.slot.lock().await;

        if !force {
            if let Some(existing) = snapshot::load(&self.config.data_dir)? {
                let dataset = Arc::new(Dataset::from_records(
                    existing.records,
                    existing.meta.revision.clone(),
                ));
                let report = DownloadReport {
                    status: "cached".into(),
                    rows: dataset.len(),
                    columns: SNAPSHOT_COLUMNS.iter().map(|c| c.to_string()).collect(),
                    snapshot_path: existing.csv_path,
                    revision: existing.meta.revision,
                };
                *slot = Some(dataset);
                return Ok(report);
            }
        }

        let fetched = self.fetch_and_persist().await?;
        let dataset = Arc::new(Dataset::from_records(
            fetched.records,
            fetched.meta.revision.clone(),
        ));
        let report = DownloadReport {
            status: "downloaded".into(),
            rows: dataset.len(),
            columns: SNAPSHOT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            snapshot_path: fetched.csv_path,
            revision: fetched.meta.revision,
        };
        *slot = Some(dataset);
        Ok(report)
    }

    async fn load_or_fetch(&self) -> Result<Dataset> {
        // Disk first: a persisted snapshot means no network touch at all.
        if let Some(existing) = snapshot::load(&self.config.data_dir)? {
            let revision = existing.meta.revision.clone();
            return Ok(Dataset::from_records(existing.records, revision));
        }
        let fetched = self.fetch_and_persist().await?;
        let revision = fetched.meta.revision.clone();
        Ok(Dataset::from_records(fetched.records, revision))
    }

    async fn fetch_and_persist(&self) -> Result<snapshot::Snapshot> {
        log::info!("downloading dataset snapshot from {}", self.config.source_url);
        let response = self
            .client
            .get(&self.config.source_url)
            .send()
            .await?
            .error_for_status()?;

        let validator = [ETAG, LAST_MODIFIED]
            .iter()
            .find_map(|h| response.headers().get(h))
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        let body = response.text().await?;
        // Validate before persisting: a bad origin response must not
        // clobber a good prior snapshot.
        let records = snapshot::parse_csv(&body)?;
        let revision = validator.unwrap_or_else(|| snapshot::content_revision(body.as_bytes()));
        let meta = SnapshotMeta::new(revision, self.config.source_url.clone());
        let csv_path = snapshot::persist(&self.config.data_dir, &body, &meta)?;
        log::info!("persisted snapshot: {} rows at {}", records.len(), csv_path.display());

        Ok(snapshot::Snapshot {
            records,
            meta,
            csv_path,
        })
    }
}

impl std::fmt::Debug for DatasetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
