//! Unhandled processing faults.
//!
//! There is exactly one fault kind at the store boundary: something went
//! wrong while an action was being reduced. A fault carries a human-readable
//! message and nothing else. Reducers return it as an `Err`; the runtime also
//! builds one from a caught panic so that neither path can terminate a store.

use std::any::Any;
use thiserror::Error;

/// A failure raised while processing an action.
///
/// `Display` yields the message unchanged, so it can be shown to a user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Fault {
    message: String,
}

impl Fault {
    /// Create a fault with the given message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build a fault from a panic payload returned by `catch_unwind`
    ///
    /// `&str` and `String` payloads keep their text; anything else gets a
    /// generic message.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "reducer panicked".to_string());
        Self { message }
    }

    /// The human-readable description of the fault
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
