//! Multi-key sort configuration for entity lists.

use crate::model::{FieldKey, FieldMapping, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Some(Self::Ascending),
            "descending" | "desc" => Some(Self::Descending),
            _ => None,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// What a sort step compares: a declared field or a derived value.
pub enum SortKey<E: FieldMapping> {
    Field(E::Field),
    Computed {
        name: &'static str,
        key: fn(&E) -> Value,
    },
}

impl<E: FieldMapping> SortKey<E> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Field(field) => field.name(),
            Self::Computed { name, .. } => *name,
        }
    }

    pub fn value_of(&self, entity: &E) -> Value {
        match self {
            Self::Field(field) => entity.get(*field),
            Self::Computed { key, .. } => key(entity),
        }
    }
}

impl<E: FieldMapping> Clone for SortKey<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: FieldMapping> Copy for SortKey<E> {}

impl<E: FieldMapping> PartialEq for SortKey<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Field(left), Self::Field(right)) => left == right,
            (Self::Computed { name: left, .. }, Self::Computed { name: right, .. }) => {
                left == right
            }
            _ => false,
        }
    }
}

impl<E: FieldMapping> Debug for SortKey<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Self::Computed { name, .. } => f.debug_struct("Computed").field("name", name).finish(),
        }
    }
}

/// One step of a multi-key sort.
pub struct FieldSorting<E: FieldMapping> {
    pub key: SortKey<E>,
    pub direction: SortDirection,
}

impl<E: FieldMapping> FieldSorting<E> {
    pub fn new(key: SortKey<E>, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn compare(&self, left: &E, right: &E) -> Ordering {
        self.direction
            .apply(self.key.value_of(left).cmp(&self.key.value_of(right)))
    }
}

impl<E: FieldMapping> Clone for FieldSorting<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: FieldMapping> Copy for FieldSorting<E> {}

impl<E: FieldMapping> PartialEq for FieldSorting<E> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.direction == other.direction
    }
}

impl<E: FieldMapping> Debug for FieldSorting<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSorting")
            .field("key", &self.key)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Ordered sort keys; later keys break ties left by earlier ones.
///
/// An empty configuration compares everything as equal, so stable sorts keep
/// insertion order.
pub struct Sortings<E: FieldMapping> {
    steps: Vec<FieldSorting<E>>,
}

impl<E: FieldMapping> Default for Sortings<E> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<E: FieldMapping> Clone for Sortings<E> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<E: FieldMapping> PartialEq for Sortings<E> {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl<E: FieldMapping> Debug for Sortings<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.steps).finish()
    }
}

impl<E: FieldMapping> Sortings<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by(field: E::Field, direction: SortDirection) -> Self {
        Self::new().then(field, direction)
    }

    pub fn then(mut self, field: E::Field, direction: SortDirection) -> Self {
        self.push(FieldSorting::new(SortKey::Field(field), direction));
        self
    }

    pub fn then_computed(
        mut self,
        name: &'static str,
        key: fn(&E) -> Value,
        direction: SortDirection,
    ) -> Self {
        self.push(FieldSorting::new(SortKey::Computed { name, key }, direction));
        self
    }

    pub fn push(&mut self, step: FieldSorting<E>) {
        self.steps.push(step);
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSorting<E>> {
        self.steps.iter()
    }

    pub fn compare(&self, left: &E, right: &E) -> Ordering {
        self.steps
            .iter()
            .map(|step| step.compare(left, right))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}
