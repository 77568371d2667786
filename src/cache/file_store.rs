//! Store that keeps one JSON file per lecture in a directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::entry::{CacheEntry, CacheKey};
use super::store::CacheStore;
use crate::error::{Result, SubtitleError};

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

pub struct FileStore {
    dir: PathBuf,
    /// Serializes writers so read-modify-write updates see each other
    writes: Mutex<()>,
}

impl FileStore {
    /// Open a store in `dir`, creating the directory if needed
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SubtitleError::Storage(format!("Cannot create cache dir {}: {}", dir.display(), e)))?;
        debug!("Translation cache directory: {}", dir.display());
        Ok(Self {
            dir,
            writes: Mutex::new(()),
        })
    }

    /// Default location under the system temp dir
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("lecture-subs-cache")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.storage_id(), ENTRY_EXTENSION))
    }

    async fn read_entry(path: &Path) -> Result<Option<CacheEntry>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entry(&self, entry: &CacheEntry) -> Result<()> {
        let key = entry.key();
        let path = self.entry_path(&key);
        let temp = self
            .dir
            .join(format!("{}.{}.{}", key.storage_id(), Uuid::new_v4().simple(), TEMP_EXTENSION));
        let content = serde_json::to_vec(entry)?;

        fs::write(&temp, &content).await?;
        // Readers see either the old file or the new one
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Self::read_entry(&self.entry_path(key)).await
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let _guard = self.writes.lock().await;
        self.write_entry(entry).await
    }

    async fn touch(&self, key: &CacheKey, accessed_at: i64) -> Result<bool> {
        let _guard = self.writes.lock().await;
        let Some(mut entry) = Self::read_entry(&self.entry_path(key)).await? else {
            return Ok(false);
        };
        entry.last_accessed_at = entry.last_accessed_at.max(accessed_at);
        self.write_entry(&entry).await?;
        Ok(true)
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let _guard = self.writes.lock().await;
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for path in self.entry_files().await? {
            match Self::read_entry(&path).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable cache file {}: {}", path.display(), e),
            }
        }
        Ok(entries)
    }

    async fn clear(&self) -> Result<usize> {
        let _guard = self.writes.lock().await;
        let files = self.entry_files().await?;
        for path in &files {
            fs::remove_file(path).await?;
        }
        Ok(files.len())
    }
}
