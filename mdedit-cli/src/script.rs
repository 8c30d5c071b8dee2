//! JSON-lines session scripts

use anyhow::{Context, Result};
use mdedit_core::event::serialization::event_from_parts;
use mdedit_core::ClientEvent;
use mdedit_editor::{KeyEvent, Selection};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// One scripted step of a client session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Inbound server event, e.g. `{"step":"server","event":"sync_content","payload":{"content":"x"}}`
    Server {
        event: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    /// Key press as a chord, e.g. `ctrl+s` or `tab`
    Key { chord: String },
    /// User typing: the full new text, caret at the end unless given
    Input {
        text: String,
        #[serde(default)]
        selection: Option<(usize, usize)>,
    },
    /// Move the selection
    Select { start: usize, end: usize },
    /// Client-side navigation
    Navigate { path: String },
    Reconnect,
    FlashMount { id: String },
    FlashUnmount { id: String },
    SleepMs { ms: u64 },
}

impl ScriptStep {
    /// Decode the inbound event of a `server` step
    pub fn client_event(&self) -> Result<Option<ClientEvent>> {
        match self {
            ScriptStep::Server { event, payload } => event_from_parts(event, payload.clone())
                .map(Some)
                .with_context(|| format!("Invalid payload for server event {}", event)),
            _ => Ok(None),
        }
    }

    /// Decode the chord of a `key` step
    pub fn key_event(&self) -> Result<Option<KeyEvent>> {
        match self {
            ScriptStep::Key { chord } => Ok(Some(chord.parse()?)),
            _ => Ok(None),
        }
    }

    /// Selection of an `input` step for text of the given content
    pub fn input_selection(text: &str, selection: Option<(usize, usize)>) -> Selection {
        match selection {
            Some((start, end)) => Selection::new(start, end),
            None => Selection::caret(text.chars().count()),
        }
    }
}

/// Parse a script, skipping blank lines and `#` comments
pub fn parse_script<R: BufRead>(reader: R) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read script line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let step: ScriptStep = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid script step on line {}", index + 1))?;
        steps.push(step);
    }

    Ok(steps)
}
