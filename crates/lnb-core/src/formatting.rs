//! Formatting utilities for Telegram HTML replies.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Unix seconds as `YYYY-MM-DD HH:MM UTC`; `-` for zero/invalid values.
pub fn format_unix_time(secs: i64) -> String {
    if secs <= 0 {
        return "-".to_string();
    }
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "-".to_string(),
    }
}

pub fn format_duration(d: Duration) -> String {
    let seconds = d.as_secs();
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h {mins}m");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

/// Byte counts in binary units with one decimal (`1.5 GiB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        return format!("{bytes} B");
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// First and last `keep` characters of long identifiers (`abcd…wxyz`).
pub fn shorten(id: &str, keep: usize) -> String {
    let count = id.chars().count();
    if count <= keep * 2 + 1 {
        return id.to_string();
    }
    let head: String = id.chars().take(keep).collect();
    let tail: String = id.chars().skip(count - keep).collect();
    format!("{head}…{tail}")
}

/// Split a reply into chunks no longer than `limit` bytes, on line boundaries.
///
/// Lines longer than `limit` are hard-split on char boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(16);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split('\n') {
        let needed = if chunk.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if chunk.len() + needed > limit && !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }

        if line.len() > limit {
            let mut piece = String::new();
            for ch in line.chars() {
                if piece.len() + ch.len_utf8() > limit {
                    out.push(std::mem::take(&mut piece));
                }
                piece.push(ch);
            }
            chunk = piece;
            continue;
        }

        if !chunk.is_empty() {
            chunk.push('\n');
        }
        chunk.push_str(line);
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}
