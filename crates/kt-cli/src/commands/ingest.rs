//! Ingest command: records keystrokes read as JSONL.
//!
//! Each non-empty line is `{"timestamp": "<RFC 3339>", "key": "<label>"}`.
//! Every line is validated before anything is recorded, so a malformed
//! input leaves the store untouched.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use kt_core::KeyEvent;
use kt_engine::Engine;

#[derive(Debug, Deserialize)]
struct IngestLine {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    key: String,
}

/// Records every event from `reader` and returns how many were recorded.
pub fn run<R: BufRead, W: Write>(reader: R, writer: &mut W, engine: &Engine) -> Result<usize> {
    let events = parse_events(reader)?;
    let count = events.len();

    let sender = engine.sender();
    for event in events {
        sender.append(event);
    }
    engine
        .flush_pending()
        .context("failed to flush ingested keystrokes")?;

    tracing::debug!(count, "keystrokes ingested");
    writeln!(writer, "Ingested {count} keystrokes")?;
    Ok(count)
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<KeyEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: IngestLine = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        events.push(KeyEvent::new(parsed.timestamp, parsed.key));
    }
    Ok(events)
}
