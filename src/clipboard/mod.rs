//! Clipboard abstraction used by copy feedback
//!
//! Only the write half of a clipboard is needed here: copying a history
//! field out. [`SystemClipboard`] talks to the desktop clipboard through
//! `arboard` and refuses payloads over [`MAX_CLIPBOARD_SIZE`];
//! [`MemoryClipboard`] keeps copies in memory for headless runs.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

/// Maximum clipboard content size (5MB)
pub const MAX_CLIPBOARD_SIZE: usize = 5 * 1024 * 1024;

/// Clipboard provider trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipboardProvider: Send + Sync {
    /// Replace the clipboard content with `text`
    async fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Platform-specific error
    #[error("Platform error: {0}")]
    Platform(String),

    /// Content too large
    #[error("Content too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },
}

fn check_size(text: &str) -> Result<(), ClipboardError> {
    if text.len() > MAX_CLIPBOARD_SIZE {
        return Err(ClipboardError::TooLarge {
            size: text.len(),
            max: MAX_CLIPBOARD_SIZE,
        });
    }
    Ok(())
}

/// Desktop clipboard
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClipboardProvider for SystemClipboard {
    async fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        check_size(text)?;

        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut clipboard =
                arboard::Clipboard::new().map_err(|e| ClipboardError::Platform(e.to_string()))?;
            clipboard
                .set_text(text)
                .map_err(|e| ClipboardError::Platform(e.to_string()))
        })
        .await
        .map_err(|e| ClipboardError::Platform(format!("Clipboard task failed: {}", e)))?
    }
}

/// In-process clipboard that remembers everything copied to it
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    copies: Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently copied text
    pub fn last(&self) -> Option<String> {
        self.copies.lock().ok().and_then(|c| c.last().cloned())
    }

    /// Every copy in order
    pub fn history(&self) -> Vec<String> {
        self.copies.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ClipboardProvider for MemoryClipboard {
    async fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        let mut copies = self
            .copies
            .lock()
            .map_err(|_| ClipboardError::Platform("clipboard lock poisoned".to_string()))?;
        copies.push(text.to_string());
        Ok(())
    }
}
