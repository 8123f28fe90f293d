//! Persistence wiring for the Store.
//!
//! [`Persistence`] binds a [`StateStorage`] slot to a [`Persistable`] state
//! type and a [`SavePolicy`]. The processing loop encodes a snapshot on its
//! own task and hands the bytes to a save worker, so a slow disk never delays
//! a state commit. The worker writes in order and only ever writes the most
//! recent snapshot it has been handed.

use crate::config::SavePolicy;
use mvi_core::persistence::{Persistable, StateStorage, StorageError, decode_snapshot, encode_snapshot};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Encoder<S> = fn(&S) -> Result<Option<Vec<u8>>, StorageError>;
type Decoder<S> = fn(&[u8]) -> Result<S, StorageError>;

/// Where and when a store saves its state
pub struct Persistence<S> {
    storage: Arc<dyn StateStorage>,
    policy: SavePolicy,
    encode: Encoder<S>,
    decode: Decoder<S>,
}

impl<S: Persistable> Persistence<S> {
    /// Persist `S` snapshots into `storage` according to `policy`
    #[must_use]
    pub fn new(storage: Arc<dyn StateStorage>, policy: SavePolicy) -> Self {
        Self {
            storage,
            policy,
            encode: encode_snapshot::<S>,
            decode: decode_snapshot::<S>,
        }
    }
}

impl<S> Persistence<S> {
    /// The configured save policy
    #[must_use]
    pub const fn policy(&self) -> &SavePolicy {
        &self.policy
    }

    /// Load and decode the saved state
    ///
    /// `Ok(None)` means nothing was saved yet.
    pub(crate) async fn restore(&self) -> Result<Option<S>, StorageError> {
        match self.storage.load().await? {
            Some(bytes) => (self.decode)(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn encode(&self, state: &S) -> Result<Option<Vec<u8>>, StorageError> {
        (self.encode)(state)
    }

    pub(crate) fn spawn_worker(&self, store: String) -> (mpsc::UnboundedSender<Vec<u8>>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(save_worker(Arc::clone(&self.storage), store, rx));
        (tx, handle)
    }
}

impl<S> std::fmt::Debug for Persistence<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Writes snapshots until every sender is dropped.
///
/// Snapshots queued while a write is in flight are collapsed to the newest.
async fn save_worker(storage: Arc<dyn StateStorage>, store: String, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(mut bytes) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            bytes = newer;
        }

        let size = bytes.len();
        match storage.save(bytes).await {
            Ok(()) => {
                metrics::counter!("store.saves.total").increment(1);
                tracing::debug!(store = %store, bytes = size, "Saved state snapshot");
            },
            Err(error) => {
                metrics::counter!("store.saves.failed").increment(1);
                tracing::warn!(store = %store, error = %error, "Failed to save state snapshot");
            },
        }
    }
    tracing::trace!(store = %store, "Save worker finished");
}

/// A state slot backed by a single file.
///
/// Writes go to a sibling `.tmp` file first and are then renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact. Missing
/// parent directories are created on the first save.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Store snapshots at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl StateStorage for FileStorage {
    fn save(&self, bytes: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            let temp = self.temp_path();
            tokio::fs::write(&temp, &bytes).await?;
            tokio::fs::rename(&temp, &self.path).await?;
            Ok(())
        })
    }

    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send + '_>> {
        Box::pin(async move {
            match tokio::fs::read(&self.path).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(error) => Err(error.into()),
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("absent.json"));
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/cache/state.json"));

        storage.save(b"{\"value\":3}".to_vec()).await.unwrap();

        assert_eq!(storage.load().await.unwrap().unwrap(), b"{\"value\":3}".to_vec());
        assert!(!storage.temp_path().exists());
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));

        storage.save(b"first".to_vec()).await.unwrap();
        storage.save(b"second".to_vec()).await.unwrap();

        assert_eq!(storage.load().await.unwrap().unwrap(), b"second".to_vec());
    }

    #[tokio::test]
    async fn unreadable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where a file is expected
        let storage = FileStorage::new(dir.path());
        let error = storage.load().await.unwrap_err();
        assert!(matches!(error, StorageError::Io(_)));
    }
}
