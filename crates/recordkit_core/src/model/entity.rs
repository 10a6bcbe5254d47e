//! Entity contract: identity, dirty tracking, owned members and XML round trip.
//!
//! # Responsibility
//! - Hold the bookkeeping every record carries (`EntityState`).
//! - Define the object-safe load/save/clear contract (`EntityObject`) and the
//!   record contract used by lists (`Entity`).
//! - Own child entities in a slot arena and propagate their changes upward.
//!
//! # Invariants
//! - While loading, no notification fires and no revision is recorded, on the
//!   entity or on any of its members.
//! - Loading is released on every exit path, including unwinding.
//! - A silent-change bracket emits exactly one `ModifiedChanged` report when
//!   the outermost bracket closes, plus one `Changed(Modify)` if anything
//!   changed inside it.
//! - A member's change marks its parent modified once per `modify_member` call.
//! - Malformed persisted data leaves the entity cleared, never half-loaded.

use crate::model::observer::{SubscriptionId, Subscribers};
use crate::model::value::{check_value_modified, Value, ValueParseError};
use crate::model::FieldMapping;
use crate::xml::XmlElement;
use log::warn;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use uuid::Uuid;

/// In-process identity of one entity instance. Never persisted.
pub type EntityId = Uuid;

const COPY_ELEMENT_NAME: &str = "CopyData";

/// Entity-level operation reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOperation {
    Add,
    Modify,
    Remove,
}

/// Notification emitted by one entity to its own subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityEvent {
    Changed {
        entity: EntityId,
        operation: EntityOperation,
    },
    ModifiedChanged {
        entity: EntityId,
        modified: bool,
    },
}

/// Outcome of `EntityObject::load`. Only `Loaded` leaves persisted values in
/// place; the other outcomes leave the entity cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    NotFound,
    Malformed,
}

/// Persisted data did not match the entity's shape.
///
/// Absorbed by `EntityObject::load`; surfaced only through logs and
/// `LoadStatus::Malformed`.
#[derive(Debug)]
pub enum LoadError {
    InvalidValue {
        element: String,
        field: &'static str,
        source: ValueParseError,
    },
    Invalid {
        element: String,
        message: String,
    },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                element,
                field,
                source,
            } => write!(f, "<{element}> field `{field}`: {source}"),
            Self::Invalid { element, message } => write!(f, "<{element}>: {message}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidValue { source, .. } => Some(source),
            Self::Invalid { .. } => None,
        }
    }
}

/// Bookkeeping shared by every entity and entity list.
#[derive(Debug)]
pub struct EntityState {
    id: EntityId,
    parent: Option<EntityId>,
    modified: bool,
    loading: bool,
    silent_depth: u32,
    silent_dirty: bool,
    revision: u64,
    xml_name: Option<String>,
    without_xml_node: bool,
    auto_save_members: bool,
    auto_load_members: bool,
    members: Members,
    subscribers: Subscribers<EntityEvent>,
}

impl Default for EntityState {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            parent: None,
            modified: false,
            loading: false,
            silent_depth: 0,
            silent_dirty: false,
            revision: 0,
            xml_name: None,
            without_xml_node: false,
            auto_save_members: true,
            auto_load_members: true,
            members: Members::default(),
            subscribers: Subscribers::default(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Owning entity, when this entity is attached as a member.
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_silent(&self) -> bool {
        self.silent_depth > 0
    }

    /// Counter bumped on every recorded change; owners compare it before and
    /// after an operation to detect that something changed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn xml_name(&self) -> Option<&str> {
        self.xml_name.as_deref()
    }

    /// Overrides the element name; blank names restore the type default.
    pub fn set_xml_name(&mut self, name: Option<String>) {
        self.xml_name = name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }

    pub fn without_xml_node(&self) -> bool {
        self.without_xml_node
    }

    /// Flattened mode: fields are written into, and read from, the element
    /// handed in by the owner instead of a dedicated child element.
    pub fn set_without_xml_node(&mut self, value: bool) {
        self.without_xml_node = value;
    }

    pub fn auto_save_members(&self) -> bool {
        self.auto_save_members
    }

    pub fn set_auto_save_members(&mut self, value: bool) {
        self.auto_save_members = value;
    }

    pub fn auto_load_members(&self) -> bool {
        self.auto_load_members
    }

    pub fn set_auto_load_members(&mut self, value: bool) {
        self.auto_load_members = value;
    }

    pub fn members(&self) -> &Members {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut Members {
        &mut self.members
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&EntityEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Sets the dirty flag and notifies unless loading or inside a silent
    /// bracket.
    pub fn set_modified(&mut self, modified: bool) {
        let previous = self.modified;
        self.modified = modified;

        if self.loading {
            return;
        }
        if modified {
            self.revision += 1;
        }
        if self.silent_depth > 0 {
            self.silent_dirty |= modified;
            return;
        }
        if previous != modified {
            self.emit_modified_changed();
        }
        if modified {
            self.emit_changed(EntityOperation::Modify);
        }
    }

    /// Returns `new`, marking the entity modified iff it differs from `old`.
    pub fn modify_value<T: PartialEq>(&mut self, old: &T, new: T) -> T {
        if check_value_modified(old, &new) {
            self.set_modified(true);
        }
        new
    }

    /// Stores `new` into `target` through `modify_value`; returns whether the
    /// stored value changed.
    pub fn assign<T: PartialEq>(&mut self, target: &mut T, new: T) -> bool {
        let changed = check_value_modified(&*target, &new);
        *target = self.modify_value(&*target, new);
        changed
    }

    pub fn start_silent_change(&mut self) {
        if self.silent_depth == 0 {
            self.silent_dirty = false;
        }
        self.silent_depth += 1;
    }

    pub fn finish_silent_change(&mut self) {
        if self.silent_depth == 0 {
            return;
        }
        self.silent_depth -= 1;
        if self.silent_depth > 0 {
            return;
        }

        let changed = std::mem::take(&mut self.silent_dirty);
        if self.loading {
            return;
        }
        self.emit_modified_changed();
        if changed {
            self.emit_changed(EntityOperation::Modify);
        }
    }

    /// Emits an entity-level operation; `Remove` is preceded by a dirty report
    /// so owners learn about the pending removal.
    pub fn notify(&mut self, operation: EntityOperation) {
        if self.loading {
            return;
        }
        if operation == EntityOperation::Remove {
            self.subscribers.emit(&EntityEvent::ModifiedChanged {
                entity: self.id,
                modified: true,
            });
        }
        self.emit_changed(operation);
        self.modified = true;
    }

    /// Attaches an owned member and records this entity as its parent.
    pub fn add_member<M: EntityObject>(&mut self, mut member: M) -> MemberSlot<M> {
        member.state_mut().parent = Some(self.id);
        self.members.attach(member)
    }

    /// Detaches a member, handing ownership back to the caller.
    pub fn remove_member<M: EntityObject>(&mut self, slot: MemberSlot<M>) -> Option<M> {
        let mut member = self.members.detach(slot)?;
        member.state_mut().parent = None;
        Some(member)
    }

    pub(crate) fn reset_modified(&mut self) {
        self.modified = false;
    }

    fn emit_changed(&mut self, operation: EntityOperation) {
        self.subscribers.emit(&EntityEvent::Changed {
            entity: self.id,
            operation,
        });
    }

    fn emit_modified_changed(&mut self) {
        self.subscribers.emit(&EntityEvent::ModifiedChanged {
            entity: self.id,
            modified: self.modified,
        });
    }
}

/// `Any` access for trait objects.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Typed address of one member inside its parent's arena.
pub struct MemberSlot<M> {
    index: usize,
    generation: u32,
    marker: PhantomData<fn() -> M>,
}

impl<M> MemberSlot<M> {
    fn new(index: usize, generation: u32) -> Self {
        Self {
            index,
            generation,
            marker: PhantomData,
        }
    }
}

impl<M> Clone for MemberSlot<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for MemberSlot<M> {}

impl<M> PartialEq for MemberSlot<M> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<M> Eq for MemberSlot<M> {}

impl<M> Debug for MemberSlot<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemberSlot({}v{})", self.index, self.generation)
    }
}

struct SlotEntry {
    generation: u32,
    occupant: Option<Box<dyn EntityObject>>,
}

/// Arena of members owned by one entity.
///
/// Detached slots are reused by later attachments; each reuse bumps the slot
/// generation so handles to the detached member stop resolving.
#[derive(Default)]
pub struct Members {
    slots: Vec<SlotEntry>,
    vacant: Vec<usize>,
}

impl Members {
    fn attach<M: EntityObject>(&mut self, member: M) -> MemberSlot<M> {
        let occupant: Box<dyn EntityObject> = Box::new(member);
        if let Some(index) = self.vacant.pop() {
            let entry = &mut self.slots[index];
            entry.generation = entry.generation.wrapping_add(1);
            entry.occupant = Some(occupant);
            return MemberSlot::new(index, entry.generation);
        }
        self.slots.push(SlotEntry {
            generation: 0,
            occupant: Some(occupant),
        });
        MemberSlot::new(self.slots.len() - 1, 0)
    }

    fn detach<M: EntityObject>(&mut self, slot: MemberSlot<M>) -> Option<M> {
        let entry = self.entry_mut(slot)?;
        let occupant: &dyn EntityObject = entry.occupant.as_deref()?;
        if !occupant.as_any().is::<M>() {
            return None;
        }
        let boxed = entry.occupant.take()?;
        self.vacant.push(slot.index);
        boxed.into_any().downcast::<M>().ok().map(|member| *member)
    }

    fn entry<M>(&self, slot: MemberSlot<M>) -> Option<&SlotEntry> {
        self.slots
            .get(slot.index)
            .filter(|entry| entry.generation == slot.generation)
    }

    fn entry_mut<M>(&mut self, slot: MemberSlot<M>) -> Option<&mut SlotEntry> {
        self.slots
            .get_mut(slot.index)
            .filter(|entry| entry.generation == slot.generation)
    }

    pub fn get<M: EntityObject>(&self, slot: MemberSlot<M>) -> Option<&M> {
        let member: &dyn EntityObject = self.entry(slot)?.occupant.as_deref()?;
        member.as_any().downcast_ref::<M>()
    }

    pub fn get_mut<M: EntityObject>(&mut self, slot: MemberSlot<M>) -> Option<&mut M> {
        let member: &mut dyn EntityObject = self.entry_mut(slot)?.occupant.as_deref_mut()?;
        member.as_any_mut().downcast_mut::<M>()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    /// Number of slots ever allocated, occupied or vacant.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn EntityObject + 'static)> + '_ {
        self.slots.iter().filter_map(|entry| entry.occupant.as_deref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn EntityObject + 'static)> + '_ {
        self.slots
            .iter_mut()
            .filter_map(|entry| entry.occupant.as_deref_mut())
    }
}

impl Debug for Members {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Members").field("len", &self.len()).finish()
    }
}

/// Object-safe persistence and dirty-tracking contract.
///
/// Implemented by records and by entity lists, so both can be owned as
/// members.
pub trait EntityObject: AsAny {
    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    /// Element name used when no override is set.
    fn default_xml_element_name(&self) -> &'static str;

    /// Sets every own field to its default. Members are not touched.
    fn init(&mut self);

    fn save_data(&self, element: &mut XmlElement);

    fn load_data(&mut self, element: &XmlElement) -> Result<(), LoadError>;

    /// Empty members are skipped on save.
    fn is_empty(&self) -> bool {
        false
    }

    /// Hook run by `Entity::copy_from` when the copy needs fresh unique keys.
    fn init_unique_copy(&mut self) {}

    fn id(&self) -> EntityId {
        self.state().id()
    }

    fn is_modified(&self) -> bool {
        self.state().is_modified()
    }

    fn set_modified(&mut self, modified: bool) {
        self.state_mut().set_modified(modified);
    }

    fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    fn xml_element_name(&self) -> &str {
        self.state()
            .xml_name()
            .unwrap_or(self.default_xml_element_name())
    }

    fn start_silent_change(&mut self) {
        self.state_mut().start_silent_change();
    }

    fn finish_silent_change(&mut self) {
        self.state_mut().finish_silent_change();
    }

    /// Resets own fields and every member to defaults and clears the dirty
    /// flag. A loading entity clears its members under their own loading
    /// flag.
    fn clear(&mut self) {
        self.init();
        let loading = self.is_loading();
        for member in self.state_mut().members_mut().iter_mut() {
            if loading {
                LoadingScope::enter(member).clear();
            } else {
                member.clear();
            }
        }
        self.set_modified(false);
    }

    /// Appends this entity to `parent` without touching dirty flags.
    fn write(&self, parent: &mut XmlElement) {
        if self.state().without_xml_node() {
            self.write_content(parent);
            return;
        }
        let element = parent.append_element(self.xml_element_name());
        self.write_content(element);
    }

    /// Own fields followed by every non-empty member.
    fn write_content(&self, element: &mut XmlElement) {
        self.save_data(element);
        if !self.state().auto_save_members() {
            return;
        }
        for member in self.state().members().iter() {
            if !member.is_empty() {
                member.write(element);
            }
        }
    }

    /// Clears the dirty flag of this entity and every member.
    fn mark_saved(&mut self) {
        for member in self.state_mut().members_mut().iter_mut() {
            member.mark_saved();
        }
        self.set_modified(false);
    }

    /// Saves into `parent`; a missing destination is a no-op.
    fn save(&mut self, parent: Option<&mut XmlElement>, clear_modified: bool) {
        let Some(parent) = parent else {
            return;
        };
        self.write(parent);
        if clear_modified {
            self.mark_saved();
        }
    }

    /// Element this entity reads from: `element` itself when its name matches
    /// (or in flattened mode), otherwise its first child with a matching name.
    fn locate<'e>(&self, element: &'e XmlElement) -> Option<&'e XmlElement> {
        if self.state().without_xml_node() {
            return Some(element);
        }
        let name = self.xml_element_name();
        if element.name() == name {
            Some(element)
        } else {
            element.child(name)
        }
    }

    /// Own fields followed by every member, from an already located element.
    fn load_content(&mut self, element: &XmlElement) -> Result<(), LoadError> {
        self.load_data(element)?;
        if !self.state().auto_load_members() {
            return Ok(());
        }
        for member in self.state_mut().members_mut().iter_mut() {
            if member.load(Some(element)) == LoadStatus::Malformed {
                return Err(LoadError::Invalid {
                    element: element.name().to_string(),
                    message: format!("member <{}> is malformed", member.xml_element_name()),
                });
            }
        }
        Ok(())
    }

    /// Replaces the content of this entity with persisted data.
    ///
    /// Never fails: anything other than a clean load leaves the entity cleared.
    fn load(&mut self, element: Option<&XmlElement>) -> LoadStatus {
        let mut scope = LoadingScope::enter(self);
        scope.clear();

        let Some(element) = element else {
            return LoadStatus::NotFound;
        };
        let Some(source) = scope.locate(element) else {
            return LoadStatus::NotFound;
        };

        match scope.load_content(source) {
            Ok(()) => {
                scope.state_mut().reset_modified();
                LoadStatus::Loaded
            }
            Err(err) => {
                warn!(
                    "event=entity_load module=model status=error element={} error={}",
                    source.name(),
                    err
                );
                scope.clear();
                LoadStatus::Malformed
            }
        }
    }

    /// Opens a silent-change bracket closed when the guard drops.
    fn silent_change(&mut self) -> SilentChange<'_, Self>
    where
        Self: Sized,
    {
        SilentChange::enter(self)
    }

    fn member<M: EntityObject>(&self, slot: MemberSlot<M>) -> Option<&M>
    where
        Self: Sized,
    {
        self.state().members().get(slot)
    }

    /// Mutates one member and marks this entity modified if the member
    /// recorded any change.
    fn modify_member<M: EntityObject, R>(
        &mut self,
        slot: MemberSlot<M>,
        f: impl FnOnce(&mut M) -> R,
    ) -> Option<R>
    where
        Self: Sized,
    {
        let member = self.state_mut().members_mut().get_mut(slot)?;
        let before = member.state().revision();
        let result = f(member);
        let changed = member.state().revision() != before;
        if changed {
            self.set_modified(true);
        }
        Some(result)
    }
}

/// A record type usable in entity lists.
pub trait Entity: EntityObject + FieldMapping + Default {
    /// Element name of this record type.
    const ELEMENT_NAME: &'static str;

    /// Human-readable label used by history and prompts.
    fn title(&self) -> String {
        self.xml_element_name().to_string()
    }

    /// Natural key for cross-reference lookups, when the type has one.
    fn extract_key_value(&self) -> Option<Value> {
        None
    }

    /// Digest over persisted fields and the persisted form of every written
    /// member. Deterministic within one process; never persisted.
    fn content_signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.field_signature().hash(&mut hasher);
        if self.state().auto_save_members() {
            for member in self.state().members().iter() {
                if member.is_empty() {
                    continue;
                }
                let mut holder = XmlElement::new(COPY_ELEMENT_NAME);
                member.write(&mut holder);
                holder.to_xml_string().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Copies every persisted value of `other` through a transient save/load
    /// round trip. `None` clears this entity.
    fn copy_from(&mut self, other: Option<&Self>, as_new_identity: bool) {
        let Some(other) = other else {
            self.clear();
            return;
        };

        let mut holder = XmlElement::new(COPY_ELEMENT_NAME);
        other.write_content(&mut holder);

        {
            let mut scope = LoadingScope::enter(&mut *self);
            scope.clear();
            if let Err(err) = scope.load_content(&holder) {
                warn!(
                    "event=entity_copy module=model status=error element={} error={}",
                    other.xml_element_name(),
                    err
                );
                scope.clear();
            }
            scope.state_mut().reset_modified();
        }

        let mut batch = SilentChange::enter(self);
        if as_new_identity {
            batch.init_unique_copy();
        }
        batch.set_modified(true);
    }
}

/// Guard for a silent-change bracket; finishing is guaranteed on drop.
pub struct SilentChange<'a, T: EntityObject + ?Sized> {
    target: &'a mut T,
}

impl<'a, T: EntityObject + ?Sized> SilentChange<'a, T> {
    pub fn enter(target: &'a mut T) -> Self {
        target.start_silent_change();
        Self { target }
    }
}

impl<T: EntityObject + ?Sized> Deref for SilentChange<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: EntityObject + ?Sized> DerefMut for SilentChange<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T: EntityObject + ?Sized> Drop for SilentChange<'_, T> {
    fn drop(&mut self) {
        self.target.finish_silent_change();
    }
}

/// Holds the loading flag for the lifetime of the guard.
struct LoadingScope<'a, T: EntityObject + ?Sized> {
    target: &'a mut T,
    previous: bool,
}

impl<'a, T: EntityObject + ?Sized> LoadingScope<'a, T> {
    fn enter(target: &'a mut T) -> Self {
        let previous = target.state().loading;
        target.state_mut().loading = true;
        Self { target, previous }
    }
}

impl<T: EntityObject + ?Sized> Deref for LoadingScope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: EntityObject + ?Sized> DerefMut for LoadingScope<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T: EntityObject + ?Sized> Drop for LoadingScope<'_, T> {
    fn drop(&mut self) {
        self.target.state_mut().loading = self.previous;
    }
}
