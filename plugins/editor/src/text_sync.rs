//! Reconciliation of authoritative snapshots into the local buffer

use serde::{Deserialize, Serialize};

use crate::editor_state::{EditorBuffer, Selection};

/// What a reconciliation did to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// Snapshot equals the buffer; nothing was touched
    Unchanged,
    /// Text replaced and the selection restored, clamped to the new length
    Replaced {
        previous: Selection,
        restored: Selection,
    },
}

impl ReconcileOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ReconcileOutcome::Replaced { .. })
    }
}

/// Counters over the lifetime of one editing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub applied: u64,
    pub skipped: u64,
    /// Snapshots that replaced text carrying unsent local edits
    pub local_edits_overwritten: u64,
}

/// Owns the editing buffer and applies inbound snapshots to it.
///
/// This is last-broadcast-wins, not a merge: a snapshot that differs from the
/// buffer replaces it, local edits included. Only the caret survives.
#[derive(Debug, Clone, Default)]
pub struct TextSyncEngine {
    buffer: EditorBuffer,
    local_edits_pending: bool,
    stats: SyncStats,
}

impl TextSyncEngine {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            buffer: EditorBuffer::new(initial),
            local_edits_pending: false,
            stats: SyncStats::default(),
        }
    }

    /// Apply a snapshot, preserving the selection as far as it still fits
    pub fn reconcile(&mut self, incoming: &str) -> ReconcileOutcome {
        if incoming == self.buffer.text() {
            self.stats.skipped += 1;
            self.local_edits_pending = false;
            tracing::trace!("Snapshot matches buffer, skipping");
            return ReconcileOutcome::Unchanged;
        }

        let previous = self.buffer.selection();

        if self.local_edits_pending {
            self.stats.local_edits_overwritten += 1;
            tracing::debug!("Snapshot overwrites unsent local edits");
        }

        self.buffer.set_text(incoming);
        let restored = previous.clamp(self.buffer.len());
        self.buffer.set_selection(restored.start, restored.end);

        self.stats.applied += 1;
        self.local_edits_pending = false;

        tracing::debug!(
            "Applied snapshot of {} chars, selection {:?} -> {:?}",
            self.buffer.len(),
            previous,
            restored
        );

        ReconcileOutcome::Replaced { previous, restored }
    }

    /// Replace the buffer with text typed by the user
    pub fn apply_local_edit(&mut self, text: impl Into<String>, selection: Selection) {
        self.buffer.set_text(text);
        self.buffer.set_selection(selection.start, selection.end);
        self.record_local_edit();
    }

    /// Mark the buffer as carrying edits the server has not echoed yet
    pub fn record_local_edit(&mut self) {
        self.local_edits_pending = true;
    }

    pub fn has_local_edits(&self) -> bool {
        self.local_edits_pending
    }

    pub fn buffer(&self) -> &EditorBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut EditorBuffer {
        &mut self.buffer
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }
}
