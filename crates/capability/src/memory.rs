//! In-process key/value store
//!
//! Holds values for the lifetime of the process only. Used when nothing
//! needs to survive a restart, and as the storage double in tests.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;

use crate::{KeyValueStore, Result, StorageMap};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StorageMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry.
    pub async fn snapshot(&self) -> StorageMap {
        self.state.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl KeyValueStore for MemoryStore {
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
            state.extend(items);
            Ok(())
        })
    }

    fn remove<'a>(
        &'a self,
        keys: &'a [&'a str],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            for key in keys {
                state.remove(*key);
            }
            Ok(())
        })
    }
}

/// Copy the requested keys that exist in `state`.
pub(crate) fn select_keys(state: &StorageMap, keys: &[&str]) -> StorageMap {
    keys.iter()
        .filter_map(|key| state.get(*key).map(|v| ((*key).to_string(), v.clone())))
        .collect()
}
