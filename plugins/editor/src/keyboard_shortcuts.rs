//! Key bindings of the editing surface: the save combo and tab insertion

use mdedit_core::{EditorConfig, SaveModifier};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::editor_state::EditorBuffer;
use crate::EditorError;

/// Key identity as reported by a key-down event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// A printable key; case is significant
    Char(char),
    Tab,
    Enter,
    Escape,
    Backspace,
    /// Any other named key
    Named(String),
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_dom(key: &str) -> Self {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Key::Char(c),
            _ => match key {
                "Tab" => Key::Tab,
                "Enter" => Key::Enter,
                "Escape" => Key::Escape,
                "Backspace" => Key::Backspace,
                other => Key::Named(other.to_string()),
            },
        }
    }
}

/// Modifier keys held during a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        meta: false,
        shift: false,
        alt: false,
    };

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn meta() -> Self {
        Self {
            meta: true,
            ..Self::NONE
        }
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }
}

/// A key-down event on the editing surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Key press without modifiers
    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::NONE)
    }
}

/// Parses chords such as `ctrl+s`, `cmd+s`, `shift+tab` or `x`.
///
/// Modifier and named-key names are case-insensitive; a single-character key
/// is taken verbatim, so `ctrl+S` is a different chord from `ctrl+s`.
impl FromStr for KeyEvent {
    type Err = EditorError;

    fn from_str(chord: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if chord == "+" {
            vec!["+"]
        } else {
            chord.split('+').collect()
        };

        let Some((key, modifiers)) = parts.split_last() else {
            return Err(EditorError::InvalidKeyChord(chord.to_string()));
        };

        let mut parsed = Modifiers::NONE;
        for modifier in modifiers {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => parsed.ctrl = true,
                "meta" | "cmd" | "command" | "super" => parsed.meta = true,
                "shift" => parsed.shift = true,
                "alt" | "option" => parsed.alt = true,
                _ => return Err(EditorError::InvalidKeyChord(chord.to_string())),
            }
        }

        let key = match key.to_ascii_lowercase().as_str() {
            "" => return Err(EditorError::InvalidKeyChord(chord.to_string())),
            "tab" => Key::Tab,
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            "backspace" => Key::Backspace,
            _ => Key::from_dom(key),
        };

        Ok(KeyEvent::new(key, parsed))
    }
}

/// Result of routing one key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOutcome {
    /// Not ours; the default action proceeds
    PassThrough,
    /// Save combo; the save action must be triggered once
    Save,
    /// A tab replaced the selection; the caret sits after it
    InsertedTab { caret: usize },
}

impl KeyOutcome {
    /// Whether the platform default for the key must be suppressed
    pub fn prevents_default(&self) -> bool {
        !matches!(self, KeyOutcome::PassThrough)
    }
}

/// Routes key-down events to the two editor bindings
#[derive(Debug, Clone)]
pub struct KeyCommandRouter {
    save_modifier: SaveModifier,
    save_selector: String,
}

impl KeyCommandRouter {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            save_modifier: config.save_modifier,
            save_selector: config.save_selector.clone(),
        }
    }

    /// Selector the save action is addressed to
    pub fn save_selector(&self) -> &str {
        &self.save_selector
    }

    pub fn is_save_combo(&self, event: &KeyEvent) -> bool {
        let modifier = match self.save_modifier {
            SaveModifier::Either => event.modifiers.ctrl || event.modifiers.meta,
            SaveModifier::Ctrl => event.modifiers.ctrl,
            SaveModifier::Meta => event.modifiers.meta,
        };
        modifier && event.key == Key::Char('s')
    }

    pub fn is_tab_insert(&self, event: &KeyEvent) -> bool {
        event.key == Key::Tab && !event.modifiers.shift
    }

    /// Route one key press, splicing a tab into the buffer when it applies
    pub fn route(&self, event: &KeyEvent, buffer: &mut EditorBuffer) -> KeyOutcome {
        if self.is_save_combo(event) {
            tracing::debug!("Save shortcut pressed");
            return KeyOutcome::Save;
        }

        if self.is_tab_insert(event) {
            let caret = buffer.replace_selection("\t");
            tracing::trace!("Inserted tab, caret at {}", caret);
            return KeyOutcome::InsertedTab { caret };
        }

        KeyOutcome::PassThrough
    }
}

impl Default for KeyCommandRouter {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}
