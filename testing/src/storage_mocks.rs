//! In-memory state storage for tests
//!
//! [`InMemoryStorage`] is a single byte slot that records every write and can
//! be told to fail, so tests can exercise the store's save triggers and its
//! restore-failure policy without touching the filesystem.

#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use mvi_core::persistence::{StateStorage, StorageError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Slot {
    current: Option<Vec<u8>>,
    writes: Vec<Vec<u8>>,
}

/// In-memory state slot for fast, deterministic testing.
///
/// Clones share the same slot, so a test can keep one handle for inspection
/// and give another to the store.
///
/// # Example
///
/// ```
/// use mvi_testing::InMemoryStorage;
/// use mvi_core::persistence::StateStorage;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = InMemoryStorage::new();
/// storage.save(b"{\"value\":1}".to_vec()).await?;
///
/// assert_eq!(storage.load().await?, Some(b"{\"value\":1}".to_vec()));
/// assert_eq!(storage.save_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    slot: Arc<Mutex<Slot>>,
    fail_saves: Arc<AtomicBool>,
    fail_loads: Arc<AtomicBool>,
}

impl InMemoryStorage {
    /// Create an empty slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot that already holds `bytes`
    #[must_use]
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        let storage = Self::new();
        storage.lock().current = Some(bytes.into());
        storage
    }

    /// Make every following `save` fail with an I/O error
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every following `load` fail with an I/O error
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// The bytes currently in the slot
    #[must_use]
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.lock().current.clone()
    }

    /// The slot contents as UTF-8, for asserting on JSON snapshots
    #[must_use]
    pub fn contents_string(&self) -> Option<String> {
        self.contents().map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Number of successful saves so far
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Every successfully saved payload, oldest first
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Poll until at least `count` saves happened or `timeout` elapses
    ///
    /// Returns whether the count was reached.
    pub async fn wait_for_saves(&self, count: usize, timeout: Duration) -> bool {
        let poll = async {
            while self.save_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStorage for InMemoryStorage {
    fn save(&self, bytes: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(StorageError::Io("simulated save failure".to_string()));
            }
            let mut slot = self.lock();
            slot.writes.push(bytes.clone());
            slot.current = Some(bytes);
            Ok(())
        })
    }

    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(StorageError::Io("simulated load failure".to_string()));
            }
            Ok(self.lock().current.clone())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_the_slot() {
        let storage = InMemoryStorage::new();
        let handle = storage.clone();

        storage.save(b"a".to_vec()).await.unwrap();
        storage.save(b"b".to_vec()).await.unwrap();

        assert_eq!(handle.contents(), Some(b"b".to_vec()));
        assert_eq!(handle.writes(), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn simulated_failures() {
        let storage = InMemoryStorage::with_contents("x");
        storage.fail_loads(true);
        storage.fail_saves(true);

        assert!(matches!(storage.load().await, Err(StorageError::Io(_))));
        assert!(storage.save(b"y".to_vec()).await.is_err());
        assert_eq!(storage.save_count(), 0);

        storage.fail_loads(false);
        assert_eq!(storage.load().await.unwrap(), Some(b"x".to_vec()));
    }
}
