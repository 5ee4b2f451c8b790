//! On-disk metadata and blob stores
//!
//! Each store is a flat directory of records. A record file is named by the
//! SHA-256 hex digest of its store key, so raw-URL keys of any length map to
//! valid file names. Individual record writes go through a temp file and a
//! rename, but a `put` spans two stores and is not atomic across them: a crash
//! between the writes leaves a single-sided entry that reads treat as absent.

use crate::error::{CacheError, Result};
use crate::types::MetadataRecord;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory name of the metadata store (key -> creation time)
pub const METADATA_STORE: &str = "image_metadata";
/// Directory name of the blob store (key -> bytes)
pub const BLOB_STORE: &str = "image_blobs";

const TMP_SUFFIX: &str = ".tmp";

/// The pair of persistent stores backing the cache
#[derive(Debug)]
pub struct DualStore {
    metadata_dir: PathBuf,
    blob_dir: PathBuf,
}

impl DualStore {
    /// Open both stores under `root`, creating them when missing.
    ///
    /// With `already_initialized` the root itself is not created and must exist.
    pub async fn open(root: &Path, already_initialized: bool) -> Result<Self> {
        if already_initialized {
            let meta = fs::metadata(root).await?;
            if !meta.is_dir() {
                return Err(CacheError::Io(Box::new(std::io::Error::other(format!(
                    "{} is not a directory",
                    root.display()
                )))));
            }
        } else {
            fs::create_dir_all(root).await?;
        }

        let store = Self {
            metadata_dir: root.join(METADATA_STORE),
            blob_dir: root.join(BLOB_STORE),
        };
        store.create_dirs().await?;

        info!(root = ?root, "Opened image stores");
        Ok(store)
    }

    async fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.metadata_dir).await?;
        fs::create_dir_all(&self.blob_dir).await?;
        Ok(())
    }

    fn record_name(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.metadata_dir.join(Self::record_name(key))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.blob_dir.join(Self::record_name(key))
    }

    pub async fn has_metadata(&self, key: &str) -> bool {
        path_exists(&self.metadata_path(key)).await
    }

    pub async fn has_blob(&self, key: &str) -> bool {
        path_exists(&self.blob_path(key)).await
    }

    /// True only when both stores hold `key` and the blob is not empty
    pub async fn contains(&self, key: &str) -> bool {
        if !self.has_metadata(key).await {
            return false;
        }
        fs::metadata(self.blob_path(key))
            .await
            .is_ok_and(|meta| meta.len() > 0)
    }

    /// Read the metadata record for `key`, `None` if it does not exist
    pub async fn read_metadata(&self, key: &str) -> Result<Option<MetadataRecord>> {
        match read_metadata_file(&self.metadata_path(key)).await {
            Ok(record) => Ok(Some(record)),
            Err(CacheError::Io(err)) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Read the raw blob for `key`, `None` if it does not exist
    pub async fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Get the payload for `key` if both stores hold it.
    ///
    /// Any miss yields `None`, including a single-sided entry, an empty blob
    /// or a blob that cannot be read.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.has_metadata(key).await {
            return None;
        }

        match self.read_blob(key).await {
            Ok(Some(data)) if !data.is_empty() => Some(data),
            Ok(Some(_)) => {
                debug!(key, "Empty blob treated as absent");
                None
            }
            Ok(None) => {
                debug!(key, "Metadata without blob treated as absent");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read cached blob");
                None
            }
        }
    }

    /// Store `payload` under `key` stamped with the current time
    pub async fn put(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.put_at(key, payload, Utc::now()).await
    }

    /// Store `payload` under `key` with an explicit creation time, overwriting
    /// any previous values in both stores
    pub async fn put_at(
        &self,
        key: &str,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let record = MetadataRecord {
            key: key.to_string(),
            created_at,
        };
        let encoded = serde_json::to_vec(&record)?;

        write_atomic(&self.metadata_path(key), &encoded).await?;
        write_atomic(&self.blob_path(key), payload).await?;

        debug!(key, size = payload.len(), "Stored blob");
        Ok(())
    }

    /// Remove `key` from both stores; absent records are not an error
    pub async fn delete(&self, key: &str) -> Result<()> {
        remove_if_exists(&self.metadata_path(key)).await?;
        remove_if_exists(&self.blob_path(key)).await?;
        debug!(key, "Deleted entry");
        Ok(())
    }

    /// Paths of every record currently in the metadata store
    pub async fn metadata_files(&self) -> Result<Vec<PathBuf>> {
        record_files(&self.metadata_dir).await
    }

    /// Decode the metadata record stored at `path`
    pub async fn read_metadata_file(&self, path: &Path) -> Result<MetadataRecord> {
        read_metadata_file(path).await
    }

    /// Number of non-empty blobs and their combined size in bytes
    pub async fn blob_usage(&self) -> Result<(usize, u64)> {
        let mut entries = 0;
        let mut total_size = 0;
        for path in record_files(&self.blob_dir).await? {
            match fs::metadata(&path).await {
                // Empty blobs read as absent
                Ok(meta) if meta.len() == 0 => {}
                Ok(meta) => {
                    entries += 1;
                    total_size += meta.len();
                }
                // Deleted between listing and stat
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok((entries, total_size))
    }

    /// Delete temp files left in either store by writes that never reached
    /// their rename, returning how many were removed
    pub async fn remove_temp_files(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in [&self.metadata_dir, &self.blob_dir] {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if is_temp_file(&path) {
                    remove_if_exists(&path).await?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "Removed leftover temp files");
        }
        Ok(removed)
    }

    /// Destroy both stores and recreate them empty
    pub async fn wipe_all(&self) -> Result<()> {
        for dir in [&self.metadata_dir, &self.blob_dir] {
            match fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.create_dirs().await?;
        info!("Wiped image stores");
        Ok(())
    }
}

async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn read_metadata_file(path: &Path) -> Result<MetadataRecord> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}{}", Uuid::new_v4().simple(), TMP_SUFFIX));
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data).await?;
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(TMP_SUFFIX))
}

async fn record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_temp_file(&path) {
            files.push(path);
        }
    }
    Ok(files)
}
