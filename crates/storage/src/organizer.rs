//! Writes batches and files into the partitioned layout.
//!
//! Every stored object gets a sidecar `<stem>.metadata.json` and refreshes the
//! tier's `<data_type>_latest.<ext>` pointer. The pointer is replaced through a
//! temp copy plus rename, so readers never see a half-written pointer.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lakeshore_core::{Batch, Tier};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::WriteStage;
use crate::parquet::{read_parquet, write_parquet};
use crate::partition::{build_path, extract_timestamp, file_stem, latest_pointer_path};
use crate::StorageError;

/// Sidecar document written next to each stored Parquet file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    pub file_info: FileInfo,
    pub data_info: DataInfo,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataInfo {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub data_type: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct StorageOrganizer {
    base_dir: PathBuf,
    tier: Tier,
}

impl StorageOrganizer {
    /// Organizer writing into the `raw` tier below `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            tier: Tier::Raw,
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Absolute path of the Parquet latest pointer for `data_type`.
    pub fn latest_path(&self, data_type: &str) -> PathBuf {
        self.base_dir
            .join(latest_pointer_path(self.tier, data_type, "parquet"))
    }

    /// Persist `batch` under its partition, write the sidecar, then move the
    /// latest pointer.
    ///
    /// A failure before the data file exists is a plain error. Once the data
    /// file is written, sidecar or pointer failures surface as
    /// [`StorageError::PartialWrite`] carrying the durable path.
    pub fn organize(
        &self,
        batch: &Batch,
        data_type: &str,
        source: &str,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Result<PathBuf, StorageError> {
        if batch.num_columns() == 0 {
            return Err(StorageError::InvalidBatch(format!(
                "batch for '{data_type}' has no columns"
            )));
        }

        let partition = self.base_dir.join(build_path(self.tier, data_type, source, timestamp)?);
        fs::create_dir_all(&partition)?;

        let stem = file_stem(data_type, source, timestamp);
        let data_path = partition.join(format!("{stem}.parquet"));
        write_parquet(
            batch,
            &data_path,
            &[
                ("lakeshore.data_type", data_type.to_string()),
                ("lakeshore.source", source.to_string()),
            ],
        )?;

        let sidecar_path = partition.join(format!("{stem}.metadata.json"));
        if let Err(e) = self.write_sidecar(&sidecar_path, &data_path, batch, data_type, source, timestamp, metadata) {
            warn!(path = %data_path.display(), error = %e, "Sidecar write failed, latest pointer left unchanged");
            return Err(StorageError::PartialWrite {
                data_path,
                stage: WriteStage::Sidecar,
                reason: e.to_string(),
            });
        }

        if let Err(e) = self.replace_pointer(&data_path, &self.latest_path(data_type)) {
            warn!(path = %data_path.display(), error = %e, "Latest pointer update failed");
            return Err(StorageError::PartialWrite {
                data_path,
                stage: WriteStage::LatestPointer,
                reason: e.to_string(),
            });
        }

        info!(
            data_type,
            source,
            rows = batch.num_rows(),
            path = %data_path.display(),
            "Organized batch"
        );
        Ok(data_path)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_sidecar(
        &self,
        sidecar_path: &Path,
        data_path: &Path,
        batch: &Batch,
        data_type: &str,
        source: &str,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Result<(), StorageError> {
        let sidecar = Sidecar {
            file_info: FileInfo {
                filename: data_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: data_path.to_path_buf(),
                size_bytes: fs::metadata(data_path)?.len(),
                created_at: timestamp,
            },
            data_info: DataInfo {
                rows: batch.num_rows(),
                columns: batch.num_columns(),
                column_names: batch.columns().to_vec(),
                data_type: data_type.to_string(),
                source: source.to_string(),
            },
            metadata,
        };
        let json = serde_json::to_vec_pretty(&sidecar)?;
        fs::write(sidecar_path, json)?;
        Ok(())
    }

    /// Copy `data_path` next to `pointer`, then rename over it.
    fn replace_pointer(&self, data_path: &Path, pointer: &Path) -> Result<(), StorageError> {
        let parent = pointer
            .parent()
            .ok_or_else(|| StorageError::NotFound(pointer.to_path_buf()))?;
        fs::create_dir_all(parent)?;

        let file_name = pointer
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = fs::copy(data_path, &tmp).and_then(|_| fs::rename(&tmp, pointer));
        if result.is_err() {
            fs::remove_file(&tmp).ok();
        }
        result?;
        Ok(())
    }

    /// Copy an existing file into the partitioned layout of `tier`.
    ///
    /// The partition timestamp comes from a `YYYYMMDD_HHMMSS` stamp in the file
    /// name, or the current time. The tier's latest pointer keeps the file's
    /// own extension.
    pub fn organize_file(
        &self,
        source_path: &Path,
        data_type: &str,
        source: &str,
        tier: Tier,
    ) -> Result<PathBuf, StorageError> {
        if !source_path.is_file() {
            return Err(StorageError::NotFound(source_path.to_path_buf()));
        }
        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::NotFound(source_path.to_path_buf()))?;
        let timestamp = extract_timestamp(&file_name).unwrap_or_else(Utc::now);

        let partition = self.base_dir.join(build_path(tier, data_type, source, timestamp)?);
        fs::create_dir_all(&partition)?;
        let target = partition.join(&file_name);
        fs::copy(source_path, &target)?;

        let extension = source_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dat".to_string());
        let pointer = self
            .base_dir
            .join(latest_pointer_path(tier, data_type, &extension));
        self.replace_pointer(&target, &pointer)
            .map_err(|e| StorageError::PartialWrite {
                data_path: target.clone(),
                stage: WriteStage::LatestPointer,
                reason: e.to_string(),
            })?;

        info!(from = %source_path.display(), to = %target.display(), "Organized file");
        Ok(target)
    }

    /// Copy an original input file into the archive tier, without touching
    /// any latest pointer.
    pub fn archive_file(
        &self,
        source_path: &Path,
        data_type: &str,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<PathBuf, StorageError> {
        let file_name = source_path
            .file_name()
            .ok_or_else(|| StorageError::NotFound(source_path.to_path_buf()))?;
        let partition = self
            .base_dir
            .join(build_path(Tier::Archive, data_type, source, timestamp)?);
        fs::create_dir_all(&partition)?;
        let target = partition.join(file_name);
        fs::copy(source_path, &target)?;
        Ok(target)
    }

    /// Store a JSON document in the archive tier as `<file_name>`.
    pub fn archive_json(
        &self,
        value: &serde_json::Value,
        data_type: &str,
        source: &str,
        timestamp: DateTime<Utc>,
        file_name: &str,
    ) -> Result<PathBuf, StorageError> {
        let partition = self
            .base_dir
            .join(build_path(Tier::Archive, data_type, source, timestamp)?);
        fs::create_dir_all(&partition)?;
        let target = partition.join(file_name);
        fs::write(&target, serde_json::to_vec_pretty(value)?)?;
        Ok(target)
    }

    pub fn read_parquet(&self, path: &Path) -> Result<Batch, StorageError> {
        Ok(read_parquet(path)?)
    }

    pub fn read_sidecar(&self, data_path: &Path) -> Result<Sidecar, StorageError> {
        let sidecar_path = sidecar_path_for(data_path);
        let content = fs::read(&sidecar_path)?;
        Ok(serde_json::from_slice(&content)?)
    }
}

/// `<stem>.metadata.json` next to a `<stem>.parquet` data file.
pub fn sidecar_path_for(data_path: &Path) -> PathBuf {
    let stem = data_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    data_path.with_file_name(format!("{stem}.metadata.json"))
}
