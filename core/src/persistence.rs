//! State persistence traits.
//!
//! Two abstractions split the concern:
//!
//! - [`Persistable`] says *which part* of a state is saved. A state may have
//!   variants that are never written (transient loading or error states), in
//!   which case `snapshot` returns `None`.
//! - [`StateStorage`] says *where* the bytes go. It is a single slot: `save`
//!   overwrites, `load` returns whatever was last written.
//!
//! Snapshots are encoded as JSON, a self-describing format that stays
//! readable in the cache directory.
//!
//! # Implementations
//!
//! - `FileStorage` (in `mvi-runtime`): one file on disk, written atomically
//! - `InMemoryStorage` (in `mvi-testing`): fast, inspectable, can simulate failures
//!
//! # Example
//!
//! ```
//! use mvi_core::persistence::{decode_snapshot, encode_snapshot, Persistable};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq)]
//! enum Screen {
//!     Ready(u32),
//!     Busy,
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! struct ReadySnapshot {
//!     value: u32,
//! }
//!
//! impl Persistable for Screen {
//!     type Snapshot = ReadySnapshot;
//!
//!     fn snapshot(&self) -> Option<ReadySnapshot> {
//!         match self {
//!             Screen::Ready(value) => Some(ReadySnapshot { value: *value }),
//!             Screen::Busy => None,
//!         }
//!     }
//!
//!     fn restore(snapshot: ReadySnapshot) -> Self {
//!         Screen::Ready(snapshot.value)
//!     }
//! }
//!
//! let bytes = encode_snapshot(&Screen::Ready(7)).unwrap().unwrap();
//! assert_eq!(decode_snapshot::<Screen>(&bytes).unwrap(), Screen::Ready(7));
//! assert!(encode_snapshot(&Screen::Busy).unwrap().is_none());
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while saving or loading state.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying medium could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),

    /// The snapshot could not be encoded, or the stored bytes do not decode.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// A state with a savable projection.
pub trait Persistable: Sized {
    /// The record written to storage
    type Snapshot: Serialize + DeserializeOwned + Send;

    /// The savable part of this state, or `None` if this state is not saved
    fn snapshot(&self) -> Option<Self::Snapshot>;

    /// Rebuild a state from a previously saved snapshot
    fn restore(snapshot: Self::Snapshot) -> Self;
}

/// A single-slot byte store for state snapshots.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so that the runtime can hold it as `Arc<dyn StateStorage>` and move it into
/// spawned save tasks.
pub trait StateStorage: Send + Sync {
    /// Overwrite the slot with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the write fails.
    fn save(&self, bytes: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>>;

    /// Read the slot.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the medium exists but cannot be read.
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send + '_>>;
}

/// Encode the savable part of `state` as JSON.
///
/// Returns `Ok(None)` when the state has nothing to save.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the snapshot cannot be encoded.
pub fn encode_snapshot<S: Persistable>(state: &S) -> Result<Option<Vec<u8>>, StorageError> {
    state
        .snapshot()
        .map(|snapshot| serde_json::to_vec(&snapshot))
        .transpose()
        .map_err(StorageError::from)
}

/// Decode a JSON snapshot and restore the state it describes.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the bytes are not a valid snapshot.
pub fn decode_snapshot<S: Persistable>(bytes: &[u8]) -> Result<S, StorageError> {
    let snapshot: S::Snapshot = serde_json::from_slice(bytes)?;
    Ok(S::restore(snapshot))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq)]
    enum Light {
        On { level: i64 },
        Flickering,
    }

    #[derive(Serialize, Deserialize)]
    struct OnSnapshot {
        level: i64,
    }

    impl Persistable for Light {
        type Snapshot = OnSnapshot;

        fn snapshot(&self) -> Option<OnSnapshot> {
            match self {
                Light::On { level } => Some(OnSnapshot { level: *level }),
                Light::Flickering => None,
            }
        }

        fn restore(snapshot: OnSnapshot) -> Self {
            Light::On { level: snapshot.level }
        }
    }

    #[test]
    fn encodes_as_json() {
        let bytes = encode_snapshot(&Light::On { level: 3 }).unwrap().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"level":3}"#);
    }

    #[test]
    fn skips_unsaved_variants() {
        assert!(encode_snapshot(&Light::Flickering).unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let error = decode_snapshot::<Light>(b"{not json").unwrap_err();
        assert!(matches!(error, StorageError::Serialization(_)));
        assert!(error.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn io_errors_convert() {
        let error: StorageError = std::io::Error::other("disk gone").into();
        assert_eq!(error.to_string(), "I/O error: disk gone");
    }
}
