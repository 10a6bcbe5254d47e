//! Ordered, duplicate-free collection of one entity type.
//!
//! # Responsibility
//! - Own the entities of one type and persist them as sibling elements.
//! - Route every item mutation through the list so the list's dirty flag and
//!   the resulting field diffs stay in sync.
//! - Build filtered, sorted projections without touching the source order.
//!
//! # Invariants
//! - No two items share an `EntityId`.
//! - `filtered_list` and `iter_matching` never mutate the list.
//! - Any recorded item change marks the list modified exactly once per call.

use crate::list::filter::Matcher;
use crate::list::sorting::Sortings;
use crate::model::{
    Entity, EntityId, EntityObject, EntityState, FieldMapping, LoadError, LoadStatus, Value,
};
use crate::xml::XmlElement;
use log::warn;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

const ITEMS_ELEMENT_NAME: &str = "Items";

/// One persisted field value changed on one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange<F> {
    pub entity: EntityId,
    pub field: F,
    pub old_value: Value,
    pub new_value: Value,
}

/// Entry of a projection: identity plus the content digest at projection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectedEntry {
    pub id: EntityId,
    pub signature: u64,
}

/// Filtered and sorted view of a list, by identity.
///
/// Two projections are equal only when they hold the same entities in the same
/// order with the same content, so edits and reorders both count as changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListProjection {
    entries: Vec<ProjectedEntry>,
}

impl ListProjection {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ProjectedEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Looks the projected entities up in `list`, in projection order.
    pub fn resolve<'a, E: Entity>(&self, list: &'a EntityList<E>) -> Vec<&'a E> {
        let index: HashMap<EntityId, &'a E> = list.iter().map(|item| (item.id(), item)).collect();
        self.entries
            .iter()
            .filter_map(|entry| index.get(&entry.id).copied())
            .collect()
    }
}

/// Ordered entity collection persisted as repeated sibling elements.
pub struct EntityList<E: Entity> {
    state: EntityState,
    items: Vec<E>,
}

impl<E: Entity> Default for EntityList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityList<E> {
    pub fn new() -> Self {
        let mut state = EntityState::new();
        state.set_without_xml_node(true);
        Self {
            state,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.items.iter().map(|item| item.id())
    }

    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.position(id).is_some()
    }

    pub fn find(&self, predicate: impl Fn(&E) -> bool) -> Option<&E> {
        self.items.iter().find(|item| predicate(item))
    }

    /// First item whose `field` equals `value`.
    pub fn find_by_field(&self, field: E::Field, value: &Value) -> Option<&E> {
        self.items.iter().find(|item| item.get(field) == *value)
    }

    /// Appends an item and marks the list modified.
    ///
    /// Identities are unique per instance and entities are not clonable, so an
    /// owned item can never already be in the list.
    pub fn add(&mut self, item: E) -> EntityId {
        let id = item.id();
        self.items.push(item);
        self.state.set_modified(true);
        id
    }

    /// Removes an item and marks the list modified.
    pub fn remove(&mut self, id: EntityId) -> Option<E> {
        let index = self.position(id)?;
        let item = self.items.remove(index);
        self.state.set_modified(true);
        Some(item)
    }

    /// Mutates one item and reports the persisted fields that changed.
    pub fn modify<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut E) -> R,
    ) -> Option<(R, Vec<FieldChange<E::Field>>)> {
        let index = self.position(id)?;
        let item = &mut self.items[index];

        let before = item.field_values();
        let revision = item.state().revision();
        let result = f(item);
        let after = item.field_values();
        let touched = item.state().revision() != revision;

        let changes: Vec<_> = before
            .into_iter()
            .zip(after)
            .filter(|((_, old_value), (_, new_value))| old_value != new_value)
            .map(|((field, old_value), (_, new_value))| FieldChange {
                entity: id,
                field,
                old_value,
                new_value,
            })
            .collect();

        if touched || !changes.is_empty() {
            self.state.set_modified(true);
        }
        Some((result, changes))
    }

    /// Assigns one field of one item; `None` when the item is not in the list.
    pub fn set_field(
        &mut self,
        id: EntityId,
        field: E::Field,
        value: Value,
    ) -> Option<Vec<FieldChange<E::Field>>> {
        self.modify(id, |item| item.set(field, value))
            .map(|(_, changes)| changes)
    }

    /// Stable in-place sort; returns whether the order changed.
    pub fn sort(&mut self, sortings: &Sortings<E>) -> bool {
        if sortings.is_empty() || self.items.len() < 2 {
            return false;
        }
        let before: Vec<EntityId> = self.ids().collect();
        self.items.sort_by(|left, right| sortings.compare(left, right));
        !self.ids().eq(before)
    }

    /// Filtered, sorted projection of the list. Pure.
    pub fn filtered_list(
        &self,
        matcher: Option<&dyn Matcher<E>>,
        sortings: &Sortings<E>,
    ) -> ListProjection {
        let matcher = matcher.filter(|matcher| !matcher.is_filter_empty());
        let mut selected: Vec<&E> = self
            .items
            .iter()
            .filter(|item| matcher.map_or(true, |matcher| matcher.is_match(item)))
            .collect();
        if !sortings.is_empty() {
            selected.sort_by(|left, right| sortings.compare(left, right));
        }

        ListProjection {
            entries: selected
                .into_iter()
                .map(|item| ProjectedEntry {
                    id: item.id(),
                    signature: item.content_signature(),
                })
                .collect(),
        }
    }

    /// Lazily yields the items accepted by `matcher`, in list order.
    pub fn iter_matching<'a, M>(&'a self, matcher: &'a M) -> Matching<'a, E, M>
    where
        M: Matcher<E> + ?Sized,
    {
        Matching {
            items: self.items.iter(),
            matcher,
        }
    }

    pub fn for_each_matching<M>(&self, matcher: &M, mut f: impl FnMut(&E))
    where
        M: Matcher<E> + ?Sized,
    {
        for item in self.iter_matching(matcher) {
            f(item);
        }
    }

    /// Content equality: same length and pairwise equal persisted values.
    pub fn equals(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(left, right)| left.content_signature() == right.content_signature())
    }
}

impl<E: Entity> PartialEq for EntityList<E> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<E: Entity> Debug for EntityList<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityList")
            .field("item_type", &E::ELEMENT_NAME)
            .field("len", &self.items.len())
            .field("modified", &self.state.is_modified())
            .finish()
    }
}

impl<'a, E: Entity> IntoIterator for &'a EntityList<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<E: Entity> EntityObject for EntityList<E> {
    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    fn default_xml_element_name(&self) -> &'static str {
        ITEMS_ELEMENT_NAME
    }

    fn init(&mut self) {
        self.items.clear();
    }

    fn save_data(&self, element: &mut XmlElement) {
        for item in &self.items {
            item.write(element);
        }
    }

    fn load_data(&mut self, element: &XmlElement) -> Result<(), LoadError> {
        for (index, child) in element.children_named(E::ELEMENT_NAME).enumerate() {
            let mut item = E::default();
            match item.load(Some(child)) {
                LoadStatus::Loaded => self.items.push(item),
                LoadStatus::Malformed | LoadStatus::NotFound => {
                    warn!(
                        "event=list_item_skipped module=list status=error element={} index={}",
                        E::ELEMENT_NAME,
                        index
                    );
                }
            }
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn mark_saved(&mut self) {
        for item in &mut self.items {
            item.mark_saved();
        }
        self.set_modified(false);
    }
}

/// Iterator returned by `EntityList::iter_matching`.
pub struct Matching<'a, E, M: ?Sized> {
    items: std::slice::Iter<'a, E>,
    matcher: &'a M,
}

impl<E, M: ?Sized> Clone for Matching<'_, E, M> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            matcher: self.matcher,
        }
    }
}

impl<'a, E, M> Iterator for Matching<'a, E, M>
where
    M: Matcher<E> + ?Sized,
{
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        let matcher = self.matcher;
        self.items.by_ref().find(|item| matcher.is_match(item))
    }
}
