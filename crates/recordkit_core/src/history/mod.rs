//! Unsaved change history of one list controller.
//!
//! # Responsibility
//! - Record additions, removals and per-field edits since the last save/load.
//! - Provide the counts shown next to a list and export rows for display.
//!
//! # Invariants
//! - Recording a field change whose old and new values are equal is a no-op.
//! - The history is cleared whenever the owning list becomes unmodified.

use crate::list::FieldChange;
use crate::model::{EntityId, EntityOperation, FieldKey, Value};
use serde::Serialize;
use std::collections::HashSet;

/// One recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry<F> {
    Added {
        entity: EntityId,
        title: String,
    },
    Removed {
        entity: EntityId,
        title: String,
    },
    FieldChanged {
        entity: EntityId,
        title: String,
        field: F,
        old_value: Value,
        new_value: Value,
    },
}

impl<F: FieldKey> HistoryEntry<F> {
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Added { entity, .. }
            | Self::Removed { entity, .. }
            | Self::FieldChanged { entity, .. } => *entity,
        }
    }

    pub fn operation(&self) -> EntityOperation {
        match self {
            Self::Added { .. } => EntityOperation::Add,
            Self::Removed { .. } => EntityOperation::Remove,
            Self::FieldChanged { .. } => EntityOperation::Modify,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Added { title, .. }
            | Self::Removed { title, .. }
            | Self::FieldChanged { title, .. } => title,
        }
    }

    /// Flattened, display-ready form of this entry.
    pub fn to_row(&self) -> HistoryRow {
        let (field, old_value, new_value) = match self {
            Self::FieldChanged {
                field,
                old_value,
                new_value,
                ..
            } => (
                field.caption().to_string(),
                old_value.to_text(),
                new_value.to_text(),
            ),
            _ => (String::new(), String::new(), String::new()),
        };
        HistoryRow {
            operation: self.operation(),
            entity: self.entity().to_string(),
            title: self.title().to_string(),
            field,
            old_value,
            new_value,
        }
    }
}

/// Export row: operation, entity, field caption, old and new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub operation: EntityOperation,
    pub entity: String,
    pub title: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// Ordered change log since the last save or load.
#[derive(Debug, Clone)]
pub struct ChangeHistory<F> {
    entries: Vec<HistoryEntry<F>>,
}

impl<F> Default for ChangeHistory<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: FieldKey> ChangeHistory<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_added(&mut self, entity: EntityId, title: impl Into<String>) {
        self.entries.push(HistoryEntry::Added {
            entity,
            title: title.into(),
        });
    }

    pub fn record_removed(&mut self, entity: EntityId, title: impl Into<String>) {
        self.entries.push(HistoryEntry::Removed {
            entity,
            title: title.into(),
        });
    }

    /// Records one field edit; unchanged values are ignored.
    pub fn record_field_change(
        &mut self,
        entity: EntityId,
        title: impl Into<String>,
        field: F,
        old_value: Value,
        new_value: Value,
    ) {
        if old_value == new_value {
            return;
        }
        self.entries.push(HistoryEntry::FieldChanged {
            entity,
            title: title.into(),
            field,
            old_value,
            new_value,
        });
    }

    /// Records every change of one list diff under the same title.
    pub fn record_changes(&mut self, title: &str, changes: &[FieldChange<F>]) {
        for change in changes {
            self.record_field_change(
                change.entity,
                title,
                change.field,
                change.old_value.clone(),
                change.new_value.clone(),
            );
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[HistoryEntry<F>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct entities with at least one field edit.
    pub fn distinct_modified_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                HistoryEntry::FieldChanged { entity, .. } => Some(*entity),
                _ => None,
            })
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn added_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, HistoryEntry::Added { .. }))
            .count()
    }

    pub fn removed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, HistoryEntry::Removed { .. }))
            .count()
    }

    pub fn rows(&self) -> Vec<HistoryRow> {
        self.entries.iter().map(HistoryEntry::to_row).collect()
    }
}
