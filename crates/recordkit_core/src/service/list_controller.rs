//! List controller: one entity type's full list, its visible projection,
//! change history and persistence.
//!
//! # Responsibility
//! - Own the full list as the single source of truth.
//! - Derive the visible projection from category, quick filter and sort keys.
//! - Record unsaved changes and fan change events out to subscribers.
//! - Load and save the list as an XML document named after the controller.
//!
//! # Invariants
//! - The visible projection is recomputed, never edited in place.
//! - Editors work on a draft copy; a cancelled edit touches nothing.
//! - One user operation emits at most one `ListChanged` event.
//! - History is empty whenever the full list is unmodified.

use crate::history::{ChangeHistory, HistoryRow};
use crate::list::{
    Category, EntityList, FieldChange, ListProjection, Matcher, SimpleFilter, Sortings,
};
use crate::model::{
    Entity, EntityId, EntityObject, EntityOperation, FieldMapping, LoadStatus, SubscriptionId,
    Subscribers, Value,
};
use crate::service::settings::{ListSettings, SettingsError};
use crate::xml::{XmlElement, XmlResult};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Opens an item for editing; returns `true` when the user confirmed.
pub trait Editor<E> {
    fn show_editor(&mut self, item: &mut E) -> bool;
}

impl<E, F> Editor<E> for F
where
    F: FnMut(&mut E) -> bool,
{
    fn show_editor(&mut self, item: &mut E) -> bool {
        self(item)
    }
}

/// Asks the user a yes/no question.
pub trait ConfirmationPrompt {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> ConfirmationPrompt for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

/// Notification fanned out to controller subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    EntityChanged {
        entity: EntityId,
        operation: EntityOperation,
    },
    ModifiedChanged(bool),
    ListChanged,
    CategoryChanged,
    SortChanged,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Unloaded,
    Clean,
    Modified,
}

struct VisibleMatcher<'a, E: Entity> {
    category: Option<&'a Category<E>>,
    quick_filter: &'a SimpleFilter<E::Field>,
}

impl<E: Entity> Matcher<E> for VisibleMatcher<'_, E> {
    fn is_match(&self, entity: &E) -> bool {
        let in_category = self.category.map_or(true, |category| {
            Matcher::<E>::is_filter_empty(category) || category.is_match(entity)
        });
        in_category
            && (self.quick_filter.is_empty()
                || Matcher::<E>::is_match(self.quick_filter, entity))
    }

    fn is_filter_empty(&self) -> bool {
        self.category
            .map_or(true, |category| Matcher::<E>::is_filter_empty(category))
            && self.quick_filter.is_empty()
    }
}

pub struct ListController<E: Entity> {
    name: String,
    full_items: EntityList<E>,
    visible_items: ListProjection,
    category: Option<Category<E>>,
    settings: ListSettings<E>,
    history: ChangeHistory<E::Field>,
    events: Subscribers<ControllerEvent>,
    loaded: bool,
    system: bool,
}

impl<E: Entity> ListController<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, ListSettings::default())
    }

    pub fn with_settings(name: impl Into<String>, settings: ListSettings<E>) -> Self {
        Self {
            name: name.into(),
            full_items: EntityList::new(),
            visible_items: ListProjection::default(),
            category: None,
            settings,
            history: ChangeHistory::new(),
            events: Subscribers::new(),
            loaded: false,
            system: false,
        }
    }

    /// Marks the controller as internal bookkeeping rather than user data.
    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> String {
        format!("{}.xml", self.name)
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_modified(&self) -> bool {
        self.full_items.is_modified()
    }

    pub fn state(&self) -> ControllerState {
        if !self.loaded {
            ControllerState::Unloaded
        } else if self.is_modified() {
            ControllerState::Modified
        } else {
            ControllerState::Clean
        }
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&ControllerEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn full_items(&self) -> &EntityList<E> {
        &self.full_items
    }

    pub fn visible_items(&self) -> &ListProjection {
        &self.visible_items
    }

    /// Visible entities in display order.
    pub fn visible_entities(&self) -> Vec<&E> {
        self.visible_items.resolve(&self.full_items)
    }

    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.full_items.get(id)
    }

    /// First entity whose `field` equals `value`.
    pub fn item(&self, field: E::Field, value: &Value) -> Option<&E> {
        self.full_items.find_by_field(field, value)
    }

    pub fn history(&self) -> &ChangeHistory<E::Field> {
        &self.history
    }

    pub fn history_rows(&self) -> Vec<HistoryRow> {
        self.history.rows()
    }

    pub fn total_count(&self) -> usize {
        self.full_items.len()
    }

    pub fn filtered_count(&self) -> usize {
        self.visible_items.len()
    }

    pub fn modified_count(&self) -> usize {
        self.history.distinct_modified_count()
    }

    pub fn added_count(&self) -> usize {
        self.history.added_count()
    }

    pub fn removed_count(&self) -> usize {
        self.history.removed_count()
    }

    pub fn category(&self) -> Option<&Category<E>> {
        self.category.as_ref()
    }

    pub fn set_category(&mut self, category: Option<Category<E>>) {
        self.category = category;
        self.events.emit(&ControllerEvent::CategoryChanged);
        self.renew_and_notify();
    }

    pub fn settings(&self) -> &ListSettings<E> {
        &self.settings
    }

    /// Replaces sort keys and quick filter at once.
    pub fn apply_settings(&mut self, settings: ListSettings<E>) {
        self.settings = settings;
        self.sort();
    }

    pub fn set_quick_filter(&mut self, filter: SimpleFilter<E::Field>) {
        self.settings.quick_filter = filter;
        self.renew_and_notify();
    }

    pub fn set_sortings(&mut self, sortings: Sortings<E>) {
        self.settings.sortings = sortings;
        self.sort();
    }

    /// Re-sorts the full list with the current sort keys.
    pub fn sort(&mut self) {
        self.full_items.sort(&self.settings.sortings);
        self.events.emit(&ControllerEvent::SortChanged);
        self.renew_and_notify();
    }

    pub fn save_settings(&self, parent: &mut XmlElement) {
        self.settings.save(parent);
    }

    /// # Errors
    /// - Returns `SettingsError` when the stored settings reference unknown
    ///   fields or hold malformed values; current settings stay in place.
    pub fn load_settings(&mut self, element: Option<&XmlElement>) -> Result<(), SettingsError> {
        let settings = ListSettings::load(element)?;
        self.apply_settings(settings);
        Ok(())
    }

    /// Recomputes the visible projection; returns whether it changed.
    pub fn renew_visible_items(&mut self) -> bool {
        let matcher = VisibleMatcher {
            category: self.category.as_ref(),
            quick_filter: &self.settings.quick_filter,
        };
        let projection = self
            .full_items
            .filtered_list(Some(&matcher), &self.settings.sortings);
        if projection == self.visible_items {
            return false;
        }
        self.visible_items = projection;
        true
    }

    /// Replaces the full list with persisted data.
    pub fn load(&mut self, element: Option<&XmlElement>) -> LoadStatus {
        let started = Instant::now();
        let was_modified = self.is_modified();

        let status = self.full_items.load(element);
        self.history.clear();
        self.full_items.sort(&self.settings.sortings);
        self.renew_visible_items();
        self.loaded = true;

        if was_modified {
            self.events.emit(&ControllerEvent::ModifiedChanged(false));
        }
        self.events.emit(&ControllerEvent::Loaded);
        self.events.emit(&ControllerEvent::ListChanged);

        info!(
            "event=list_load module=service status=ok controller={} result={:?} items={} duration_ms={}",
            self.name,
            status,
            self.full_items.len(),
            started.elapsed().as_millis()
        );
        status
    }

    /// Writes the full list into `parent` and clears dirty state; a missing
    /// destination is a no-op.
    pub fn save(&mut self, parent: Option<&mut XmlElement>) {
        let Some(parent) = parent else {
            return;
        };
        let started = Instant::now();
        self.full_items.write(parent);
        self.mark_saved();
        info!(
            "event=list_save module=service status=ok controller={} items={} duration_ms={}",
            self.name,
            self.full_items.len(),
            started.elapsed().as_millis()
        );
    }

    /// Reads `path`; a missing file loads as an empty list.
    ///
    /// # Errors
    /// - Returns `XmlError` when the file exists but cannot be read or parsed;
    ///   the in-memory list is left untouched.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> XmlResult<LoadStatus> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "event=file_load module=service status=missing controller={} path={}",
                self.name,
                path.display()
            );
            return Ok(self.load(None));
        }

        let root = XmlElement::read_file(path).map_err(|err| {
            error!(
                "event=file_load module=service status=error controller={} error={}",
                self.name, err
            );
            err
        })?;
        Ok(self.load(Some(&root)))
    }

    /// Writes the list to `path` as a document rooted at the controller name.
    ///
    /// # Errors
    /// - Returns `XmlError::Io` when the file cannot be written; dirty state is
    ///   kept so nothing is lost.
    pub fn save_file(&mut self, path: impl AsRef<Path>) -> XmlResult<()> {
        let path = path.as_ref();
        let started = Instant::now();
        let mut root = XmlElement::new(self.name.as_str());
        self.full_items.write(&mut root);

        root.write_file(path).map_err(|err| {
            error!(
                "event=file_save module=service status=error controller={} error={}",
                self.name, err
            );
            err
        })?;

        self.mark_saved();
        info!(
            "event=file_save module=service status=ok controller={} items={} duration_ms={}",
            self.name,
            self.full_items.len(),
            started.elapsed().as_millis()
        );
        Ok(())
    }

    fn mark_saved(&mut self) {
        let was_modified = self.is_modified();
        self.full_items.mark_saved();
        self.history.clear();
        if was_modified {
            self.events.emit(&ControllerEvent::ModifiedChanged(false));
        }
        self.full_items.sort(&self.settings.sortings);
        self.renew_and_notify();
    }

    /// Creates a new item, opens it in `editor` and adds it on confirmation.
    pub fn add_item(&mut self, editor: impl Editor<E>) -> Option<EntityId> {
        self.edit_new_item(E::default(), editor)
    }

    /// Opens a copy of `id` with fresh unique keys as a new item.
    pub fn copy_item(&mut self, id: EntityId, editor: impl Editor<E>) -> Option<EntityId> {
        let source = self.full_items.get(id)?;
        let mut item = E::default();
        item.copy_from(Some(source), true);
        self.edit_new_item(item, editor)
    }

    fn edit_new_item(&mut self, mut item: E, mut editor: impl Editor<E>) -> Option<EntityId> {
        if !editor.show_editor(&mut item) {
            debug!(
                "event=item_add module=service status=cancelled controller={}",
                self.name
            );
            return None;
        }

        let was_modified = self.is_modified();
        self.history.record_added(item.id(), item.title());
        item.state_mut().notify(EntityOperation::Add);
        let id = self.full_items.add(item);

        self.events.emit(&ControllerEvent::EntityChanged {
            entity: id,
            operation: EntityOperation::Add,
        });
        self.refresh(was_modified);
        Some(id)
    }

    /// Edits a draft copy of `id` and, on confirmation, copies the draft back
    /// through the save/load contract so fields and members both land.
    /// Returns `false` when the item is missing or the edit was cancelled.
    pub fn edit_item(&mut self, id: EntityId, mut editor: impl Editor<E>) -> bool {
        let Some(source) = self.full_items.get(id) else {
            return false;
        };
        let mut draft = E::default();
        draft.copy_from(Some(source), false);

        if !editor.show_editor(&mut draft) {
            debug!(
                "event=item_edit module=service status=cancelled controller={}",
                self.name
            );
            return false;
        }

        let was_modified = self.is_modified();
        let applied = self.full_items.modify(id, |item| {
            if persisted_form(item) != persisted_form(&draft) {
                item.copy_from(Some(&draft), false);
            }
        });
        let Some(((), changes)) = applied else {
            return false;
        };

        self.record_changes(id, &changes);
        self.events.emit(&ControllerEvent::EntityChanged {
            entity: id,
            operation: EntityOperation::Modify,
        });
        self.refresh(was_modified);
        true
    }

    /// Applies an arbitrary mutation to one item and records the resulting
    /// field changes.
    pub fn modify_item<R>(&mut self, id: EntityId, f: impl FnOnce(&mut E) -> R) -> Option<R> {
        let was_modified = self.is_modified();
        let (result, changes) = self.full_items.modify(id, f)?;
        if !changes.is_empty() {
            self.record_changes(id, &changes);
            self.events.emit(&ControllerEvent::EntityChanged {
                entity: id,
                operation: EntityOperation::Modify,
            });
        }
        self.refresh(was_modified);
        Some(result)
    }

    /// Inline edit of one field; returns whether the stored value changed.
    pub fn set_field(&mut self, id: EntityId, field: E::Field, value: impl Into<Value>) -> bool {
        let value = value.into();
        self.modify_item(id, |item| item.set(field, value))
            .unwrap_or(false)
    }

    /// Assigns one field on many items in one batch; returns how many items
    /// changed.
    pub fn update_items(&mut self, ids: &[EntityId], field: E::Field, value: impl Into<Value>) -> usize {
        let value = value.into();
        let was_modified = self.is_modified();
        let mut changed = Vec::new();

        {
            let mut batch = self.full_items.silent_change();
            for &id in ids {
                let Some(changes) = batch.set_field(id, field, value.clone()) else {
                    continue;
                };
                if changes.is_empty() {
                    continue;
                }
                let title = batch.get(id).map(Entity::title).unwrap_or_default();
                self.history.record_changes(&title, &changes);
                changed.push(id);
            }
        }

        for &id in &changed {
            self.events.emit(&ControllerEvent::EntityChanged {
                entity: id,
                operation: EntityOperation::Modify,
            });
        }
        self.refresh(was_modified);
        changed.len()
    }

    /// Deletes the given items after confirmation; returns how many were
    /// removed.
    pub fn delete_items(&mut self, ids: &[EntityId], mut prompt: impl ConfirmationPrompt) -> usize {
        let mut targets: Vec<EntityId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if self.full_items.contains(id) && !targets.contains(&id) {
                targets.push(id);
            }
        }
        if targets.is_empty() {
            return 0;
        }

        let message = if targets.len() > 1 {
            format!(
                "Are you sure you want to delete selected ({}) items?",
                targets.len()
            )
        } else {
            "Are you sure you want to delete selected item?".to_string()
        };
        if !prompt.confirm(&message) {
            debug!(
                "event=item_delete module=service status=cancelled controller={} count={}",
                self.name,
                targets.len()
            );
            return 0;
        }

        let was_modified = self.is_modified();
        for &id in &targets {
            self.full_items
                .modify(id, |item| item.state_mut().notify(EntityOperation::Remove));
            self.events.emit(&ControllerEvent::EntityChanged {
                entity: id,
                operation: EntityOperation::Remove,
            });
        }

        let mut removed = 0;
        {
            let mut batch = self.full_items.silent_change();
            for &id in &targets {
                if let Some(item) = batch.remove(id) {
                    self.history.record_removed(id, item.title());
                    removed += 1;
                }
            }
        }

        self.refresh(was_modified);
        removed
    }

    fn record_changes(&mut self, id: EntityId, changes: &[FieldChange<E::Field>]) {
        if changes.is_empty() {
            return;
        }
        let title = self
            .full_items
            .get(id)
            .map(Entity::title)
            .unwrap_or_default();
        self.history.record_changes(&title, changes);
    }

    /// Reports a flipped dirty flag, re-sorts, and recomputes the projection.
    fn refresh(&mut self, was_modified: bool) {
        let modified = self.is_modified();
        if modified != was_modified {
            if !modified {
                self.history.clear();
            }
            self.events.emit(&ControllerEvent::ModifiedChanged(modified));
        }
        self.full_items.sort(&self.settings.sortings);
        self.renew_and_notify();
    }

    fn renew_and_notify(&mut self) {
        if self.renew_visible_items() {
            self.events.emit(&ControllerEvent::ListChanged);
        }
    }
}

fn persisted_form<E: Entity>(item: &E) -> XmlElement {
    let mut holder = XmlElement::new(E::ELEMENT_NAME);
    item.write_content(&mut holder);
    holder
}

impl<E: Entity> std::fmt::Debug for ListController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListController")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("total", &self.full_items.len())
            .field("visible", &self.visible_items.len())
            .finish()
    }
}
