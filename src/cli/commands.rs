use chrono::{Local, TimeZone};

use crate::history::HistoryItem;

const PREVIEW_CHARS: usize = 40;

/// Render an epoch-millisecond timestamp in local time
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

/// Shorten long values for one-line display
pub fn preview(value: &str) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// One `list` row
pub fn format_item(index: usize, item: &HistoryItem) -> String {
    format!(
        "{:>3}  {}  {} -> {}",
        index,
        format_timestamp(item.timestamp()),
        preview(item.text()),
        preview(item.cipher())
    )
}
