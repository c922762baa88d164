//! Copy-to-clipboard with a self-clearing "copied" marker

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clipboard::ClipboardProvider;
use crate::history::{HistoryItem, RecordField};

/// How long an item stays marked as copied
pub const COPY_FEEDBACK_WINDOW: Duration = Duration::from_millis(1500);

/// Copies item fields out and flips their copied flag for a fixed window
///
/// Every trigger schedules its own reset. Earlier resets are not cancelled,
/// so when triggers overlap on one item the first pending reset clears the
/// flag.
#[derive(Clone)]
pub struct FeedbackTimer {
    clipboard: Arc<dyn ClipboardProvider>,
}

impl FeedbackTimer {
    pub fn new(clipboard: Arc<dyn ClipboardProvider>) -> Self {
        Self { clipboard }
    }

    /// Copy `field` of `item`, mark it copied, and schedule the reset.
    ///
    /// Returns the reset task. A failed copy is logged and the feedback
    /// still runs. Must be called within a tokio runtime.
    pub async fn trigger(&self, item: &HistoryItem, field: RecordField) -> JoinHandle<()> {
        let value = item.field_text(field);
        match self.clipboard.copy(&value).await {
            Ok(()) => debug!(?field, "Copied history field"),
            Err(e) => warn!(?field, error = %e, "Clipboard copy failed"),
        }

        let flag = item.copied_flag().clone();
        flag.set(true);

        let reset = tokio::time::sleep(COPY_FEEDBACK_WINDOW);
        tokio::spawn(async move {
            reset.await;
            flag.set(false);
        })
    }
}
