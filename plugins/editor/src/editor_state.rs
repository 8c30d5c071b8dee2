//! Editing buffer with selection tracking
//!
//! Offsets are counted in chars (Unicode scalar values), never bytes, so a
//! selection can not split a multi-byte character.

use serde::{Deserialize, Serialize};

/// Selection range within the buffer; a caret is an empty selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl Selection {
    /// Create a selection, ordering the offsets
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Collapsed selection at `offset`
    pub fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Width of the range; zero for an unordered literal
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Clamp both offsets into `[0, len]`
    pub fn clamp(&self, len: usize) -> Self {
        Self {
            start: self.start.min(len),
            end: self.end.min(len),
        }
    }
}

/// Text of the editing surface plus its current selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditorBuffer {
    text: String,
    selection: Selection,
}

impl EditorBuffer {
    /// Buffer with the caret at the start
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selection: Selection::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Set the selection; offsets past the end are clamped and a start past
    /// the end collapses onto the end
    pub fn set_selection(&mut self, start: usize, end: usize) {
        let len = self.len();
        let end = end.min(len);
        let start = start.min(end);
        self.selection = Selection { start, end };
    }

    /// Replace the whole text, leaving the caret at the end
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.selection = Selection::caret(self.len());
    }

    /// Text covered by the selection
    pub fn selected_text(&self) -> &str {
        let start = byte_offset(&self.text, self.selection.start);
        let end = byte_offset(&self.text, self.selection.end);
        &self.text[start..end]
    }

    /// Replace the selected range with `insert` and put the caret right after it
    pub fn replace_selection(&mut self, insert: &str) -> usize {
        let Selection { start, end } = self.selection;
        let start_byte = byte_offset(&self.text, start);
        let end_byte = byte_offset(&self.text, end);

        self.text.replace_range(start_byte..end_byte, insert);

        let caret = start + insert.chars().count();
        self.selection = Selection::caret(caret);
        caret
    }
}

/// Byte index of the char at `char_offset`, or the text length past the end
pub fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_ordering() {
        let selection = Selection::new(7, 3);
        assert_eq!(selection, Selection { start: 3, end: 7 });
        assert_eq!(selection.len(), 4);
        assert!(Selection::caret(2).is_empty());
    }

    #[test]
    fn test_unordered_literal_has_zero_len() {
        let selection = Selection { start: 5, end: 2 };
        assert_eq!(selection.len(), 0);

        let mut buffer = EditorBuffer::new("hello");
        buffer.set_selection(selection.start, selection.end);
        assert_eq!(buffer.selection(), Selection::caret(2));
        assert_eq!(buffer.selected_text(), "");
    }

    #[test]
    fn test_selection_clamp() {
        assert_eq!(Selection::new(2, 9).clamp(5), Selection::new(2, 5));
        assert_eq!(Selection::new(6, 9).clamp(5), Selection::caret(5));
    }

    #[test]
    fn test_set_selection_follows_textarea_rules() {
        let mut buffer = EditorBuffer::new("hello");
        buffer.set_selection(1, 99);
        assert_eq!(buffer.selection(), Selection::new(1, 5));

        buffer.set_selection(4, 2);
        assert_eq!(buffer.selection(), Selection::caret(2));
    }

    #[test]
    fn test_replace_selection() {
        let mut buffer = EditorBuffer::new("hello world");
        buffer.set_selection(0, 5);
        assert_eq!(buffer.selected_text(), "hello");

        let caret = buffer.replace_selection("bye");
        assert_eq!(buffer.text(), "bye world");
        assert_eq!(caret, 3);
        assert_eq!(buffer.selection(), Selection::caret(3));
    }

    #[test]
    fn test_offsets_are_chars_not_bytes() {
        let mut buffer = EditorBuffer::new("héllo wörld");
        assert_eq!(buffer.len(), 11);

        buffer.set_selection(1, 2);
        assert_eq!(buffer.selected_text(), "é");

        buffer.replace_selection("e");
        assert_eq!(buffer.text(), "hello wörld");
    }

    #[test]
    fn test_set_text_moves_caret_to_end() {
        let mut buffer = EditorBuffer::new("abc");
        buffer.set_text("abcdef");
        assert_eq!(buffer.selection(), Selection::caret(6));
    }

    #[test]
    fn test_byte_offset_past_end() {
        assert_eq!(byte_offset("ab", 5), 2);
        assert_eq!(byte_offset("日本", 1), 3);
    }
}
