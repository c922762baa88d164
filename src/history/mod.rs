//! Encrypt/decrypt operation history and persistence

pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use store::HistoryStore;

/// Operation category that namespaces a history collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Plaintext in, ciphertext out
    Encrypt,
    /// Ciphertext in, plaintext out
    Decrypt,
}

impl OperationKind {
    /// Key prefix used for every substrate entry of this kind
    pub fn prefix(self) -> &'static str {
        match self {
            OperationKind::Encrypt => "encryptedText-",
            OperationKind::Decrypt => "decryptedText-",
        }
    }

    /// Substrate key for the `(text, cipher)` identity under this kind
    pub fn key_for(self, text: &str, cipher: &str) -> String {
        format!("{}{}-{}", self.prefix(), text, cipher)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Encrypt => write!(f, "encrypt"),
            OperationKind::Decrypt => write!(f, "decrypt"),
        }
    }
}

/// Transient "just copied" marker shared between clones of one item
#[derive(Debug, Clone, Default)]
pub struct CopiedFlag(Arc<AtomicBool>);

impl CopiedFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }
}

/// Operation output to be recorded; the store assigns the timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryItem {
    /// Original input
    pub text: String,
    /// Output of the paired operation
    pub cipher: String,
}

impl NewHistoryItem {
    pub fn new(text: impl Into<String>, cipher: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cipher: cipher.into(),
        }
    }
}

/// One recorded encrypt/decrypt operation
///
/// Serialized as `{"text", "cipher", "timestamp"}`. The copied flag is
/// never persisted and does not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    text: String,
    cipher: String,
    /// Unix timestamp in milliseconds
    timestamp: i64,
    #[serde(skip)]
    copied: CopiedFlag,
}

impl HistoryItem {
    pub fn new(text: impl Into<String>, cipher: impl Into<String>, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            cipher: cipher.into(),
            timestamp,
            copied: CopiedFlag::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Whether the copy feedback window is currently open
    pub fn is_copied(&self) -> bool {
        self.copied.get()
    }

    pub(crate) fn copied_flag(&self) -> &CopiedFlag {
        &self.copied
    }

    /// Same `(text, cipher)` identity, timestamps ignored
    pub fn same_identity(&self, other: &HistoryItem) -> bool {
        self.text == other.text && self.cipher == other.cipher
    }

    /// Render one field as clipboard text
    pub fn field_text(&self, field: RecordField) -> String {
        match field {
            RecordField::Text => self.text.clone(),
            RecordField::Cipher => self.cipher.clone(),
            RecordField::Timestamp => self.timestamp.to_string(),
        }
    }
}

impl PartialEq for HistoryItem {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.cipher == other.cipher && self.timestamp == other.timestamp
    }
}

impl Eq for HistoryItem {}

/// Item field that can be copied out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordField {
    Text,
    #[default]
    Cipher,
    Timestamp,
}
