//! # cipherlog
//!
//! Client-side state for an RSA encrypt/decrypt utility: a persisted,
//! per-operation history of past results and the short-lived "copied"
//! feedback shown when a result is copied to the clipboard.
//!
//! History lives in a [`storage::Substrate`], a flat string key-value
//! store. Each [`history::HistoryStore`] owns one namespace of that
//! substrate (encrypt or decrypt) and keeps a newest-first view of it.

pub mod cli;
pub mod clipboard;
pub mod config;
pub mod feedback;
pub mod history;
pub mod storage;

pub use config::Config;
pub use feedback::FeedbackTimer;
pub use history::{HistoryItem, HistoryStore, NewHistoryItem, OperationKind, RecordField};

/// Result type alias for cipherlog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cipherlog operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage substrate error
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    /// Record encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
