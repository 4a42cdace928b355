//! Pure operations over the list of contexts. [`crate::ContextStore`] wraps
//! these with locking, persistence and snapshot publication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veemee_sdk::{sort_key, ContextRow, DeletedFromState, SkinId};

/// Input of [`crate::ContextStore::create_context`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContext {
    pub name: String,
    #[serde(default)]
    pub skin_id: Option<SkinId>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl NewContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skin_id: None,
            order: None,
        }
    }

    #[must_use]
    pub fn skin_id(mut self, skin_id: SkinId) -> Self {
        self.skin_id = Some(skin_id);
        self
    }

    #[must_use]
    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// Fields to overwrite on a context. `None` leaves a field untouched; the
/// nested options clear optional fields. The id cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPatch {
    pub name: Option<String>,
    pub skin_id: Option<SkinId>,
    pub order: Option<Option<i64>>,
    pub is_archived: Option<bool>,
    pub is_deleted: Option<bool>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub deleted_from_state: Option<Option<DeletedFromState>>,
}

impl ContextPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn skin_id(mut self, skin_id: SkinId) -> Self {
        self.skin_id = Some(skin_id);
        self
    }

    #[must_use]
    pub fn order(mut self, order: Option<i64>) -> Self {
        self.order = Some(order);
        self
    }

    fn apply_to(self, row: &mut ContextRow) {
        if let Some(name) = self.name {
            row.name = name;
        }
        if let Some(skin_id) = self.skin_id {
            row.skin_id = skin_id;
        }
        if let Some(order) = self.order {
            row.order = order;
        }
        if let Some(is_archived) = self.is_archived {
            row.is_archived = is_archived;
        }
        if let Some(is_deleted) = self.is_deleted {
            row.is_deleted = is_deleted;
        }
        if let Some(deleted_at) = self.deleted_at {
            row.deleted_at = deleted_at;
        }
        if let Some(deleted_from_state) = self.deleted_from_state {
            row.deleted_from_state = deleted_from_state;
        }
    }
}

/// Built-in contexts used when the list cannot be loaded from the API.
#[must_use]
pub fn seed_contexts() -> Vec<ContextRow> {
    vec![
        ContextRow::new(1, "Test 1", SkinId::Tide).with_order(1),
        ContextRow::new(2, "Test 2", SkinId::Geo).with_order(2),
    ]
}

/// Ordered collection of context rows, including archived, deleted and
/// placeholder rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextList {
    rows: Vec<ContextRow>,
}

impl ContextList {
    #[must_use]
    pub fn new(rows: Vec<ContextRow>) -> Self {
        Self { rows }
    }

    /// The list holding only the loading sentinel.
    #[must_use]
    pub fn loading() -> Self {
        Self::new(vec![ContextRow::loading()])
    }

    #[must_use]
    pub fn rows(&self) -> &[ContextRow] {
        &self.rows
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&ContextRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut ContextRow> {
        self.rows.iter_mut().find(|row| row.id == id)
    }

    pub fn visible(&self) -> impl Iterator<Item = &ContextRow> {
        self.rows.iter().filter(|row| row.is_visible())
    }

    /// Whether `id` may become the active context.
    #[must_use]
    pub fn is_selectable(&self, id: i64) -> bool {
        self.get(id).is_some_and(ContextRow::is_visible)
    }

    /// The visible context with the lowest order. Rows without an order sort
    /// last; ties go to the row that comes first in the list.
    #[must_use]
    pub fn fallback_id(&self) -> Option<i64> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_visible())
            .min_by_key(|(index, row)| (sort_key(row), *index))
            .map(|(_, row)| row.id)
    }

    /// One more than the largest id of any row, visible or not, with a floor
    /// of zero.
    #[must_use]
    pub fn next_id(&self) -> i64 {
        self.rows.iter().map(|row| row.id).fold(0, i64::max) + 1
    }

    pub fn create(&mut self, input: NewContext) -> i64 {
        let id = self.next_id();
        let mut row = ContextRow::new(id, input.name, input.skin_id.unwrap_or_default());
        row.order = input.order;
        self.rows.push(row);
        id
    }

    pub fn update(&mut self, id: i64, patch: ContextPatch) -> bool {
        match self.get_mut(id) {
            Some(row) => {
                patch.apply_to(row);
                true
            }
            None => false,
        }
    }

    pub fn set_archived(&mut self, id: i64, archived: bool) -> bool {
        match self.get_mut(id) {
            Some(row) => {
                row.is_archived = archived;
                true
            }
            None => false,
        }
    }

    /// Move a row to the wastebasket, remembering whether it was archived.
    /// Returns `false` if the row is missing or already deleted.
    pub fn soft_delete(&mut self, id: i64, now: DateTime<Utc>) -> bool {
        match self.get_mut(id) {
            Some(row) if !row.is_deleted => {
                row.deleted_from_state = Some(if row.is_archived {
                    DeletedFromState::Archived
                } else {
                    DeletedFromState::Active
                });
                row.is_deleted = true;
                row.deleted_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Bring a row back from the wastebasket into the state it was deleted
    /// from.
    pub fn restore(&mut self, id: i64) -> bool {
        match self.get_mut(id) {
            Some(row) => {
                row.is_archived = row.deleted_from_state == Some(DeletedFromState::Archived);
                row.is_deleted = false;
                row.deleted_at = None;
                row.deleted_from_state = None;
                true
            }
            None => false,
        }
    }

    pub fn purge(&mut self, id: i64) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        self.rows.len() != before
    }
}
