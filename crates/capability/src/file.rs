//! JSON-file key/value store
//!
//! Persists the storage area as a single JSON object on disk. All writes go
//! through temp-file + rename so a crash mid-write never leaves a truncated
//! file behind. A tokio Mutex serializes writers; readers clone out of the
//! in-memory copy.
//!
//! The file may hold bearer tokens, so it is created with 0600 permissions
//! on unix.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::memory::select_keys;
use crate::{CapabilityError, KeyValueStore, Result, StorageMap};

pub struct FileStore {
    path: PathBuf,
    state: Mutex<StorageMap>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is created as `{}` so later opens skip the cold-start
    /// path.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
                CapabilityError::Storage(format!("reading {}: {e}", path.display()))
            })?;
            let entries: StorageMap = serde_json::from_str(&contents).map_err(|e| {
                CapabilityError::Storage(format!("parsing {}: {e}", path.display()))
            })?;
            info!(path = %path.display(), keys = entries.len(), "opened storage file");
            entries
        } else {
            info!(path = %path.display(), "storage file not found, starting empty");
            let entries = StorageMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

}

impl KeyValueStore for FileStore {
    fn get<'a>(
        &'a self,
        keys: &'a [&'a str],
    ) -> Pin<Box<dyn Future<Output = Result<StorageMap>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(select_keys(&state, keys))
        })
    }

    fn set(&self, items: StorageMap) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut next = state.clone();
            next.extend(items);
            write_atomic(&self.path, &next).await?;
            *state = next;
            Ok(())
        })
    }

    fn remove<'a>(
        &'a self,
        keys: &'a [&'a str],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if !keys.iter().any(|key| state.contains_key(*key)) {
                return Ok(());
            }
            let mut next = state.clone();
            for key in keys {
                next.remove(*key);
            }
            write_atomic(&self.path, &next).await?;
            *state = next;
            Ok(())
        })
    }
}

/// Write the storage area to `path` atomically.
///
/// Writes a uniquely named temp file in the same directory, then renames it
/// over the target. The temp file is created 0600 on unix, so the contents
/// are never readable by other users.
async fn write_atomic(path: &Path, data: &StorageMap) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| CapabilityError::Storage(format!("serializing storage: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        Some(_) => PathBuf::from("."),
        None => {
            return Err(CapabilityError::Storage(
                "storage path has no parent directory".into(),
            ));
        }
    };

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || persist_blocking(&dir, &target, json.as_bytes()))
        .await
        .map_err(|e| CapabilityError::Storage(format!("storage write task failed: {e}")))??;

    debug!(path = %path.display(), "persisted storage file");
    Ok(())
}

fn persist_blocking(dir: &Path, target: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".storage.")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| CapabilityError::Storage(format!("creating temp storage file: {e}")))?;

    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| CapabilityError::Storage(format!("writing temp storage file: {e}")))?;

    tmp.persist(target)
        .map_err(|e| CapabilityError::Storage(format!("renaming temp storage file: {}", e.error)))?;
    Ok(())
}
