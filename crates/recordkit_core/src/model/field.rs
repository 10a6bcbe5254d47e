//! Field keys, their static metadata, and the field mapping contract.
//!
//! # Responsibility
//! - Describe every entity type's fields as a closed enumeration with a
//!   compile-time metadata table.
//! - Provide uniform get/set by field key for filters, sorters and history.
//! - Persist field values through the metadata table.
//!
//! # Invariants
//! - `FieldKey::ALL` lists every variant exactly once.
//! - Fields marked as not persisted are never written or read by
//!   `save_fields`/`load_fields`.

use crate::model::entity::LoadError;
use crate::model::value::{FieldKind, Value};
use crate::xml::XmlElement;
use std::collections::hash_map::DefaultHasher;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// How a scalar field is encoded inside its entity element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// `<Entity Field="value" />`
    Attribute,
    /// `<Entity><Field>value</Field></Entity>`, for long or multi-line text.
    Element,
}

/// Static description of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Persistence name, also used to reference the field from settings.
    pub name: &'static str,
    /// User-facing column caption.
    pub caption: &'static str,
    pub kind: FieldKind,
    pub encoding: FieldEncoding,
    /// Calculated fields are derived from others and never persisted.
    pub persisted: bool,
}

impl FieldMeta {
    pub const fn new(name: &'static str, caption: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            caption,
            kind,
            encoding: FieldEncoding::Attribute,
            persisted: true,
        }
    }

    pub const fn as_element(mut self) -> Self {
        self.encoding = FieldEncoding::Element;
        self
    }

    pub const fn calculated(mut self) -> Self {
        self.persisted = false;
        self
    }
}

/// Closed enumeration of one entity type's fields.
///
/// Implementors usually index a `static` table of `FieldMeta` by discriminant.
pub trait FieldKey: Copy + Eq + Hash + Debug + 'static {
    /// Every field, in declaration order.
    const ALL: &'static [Self];

    fn meta(self) -> &'static FieldMeta;

    fn name(self) -> &'static str {
        self.meta().name
    }

    fn caption(self) -> &'static str {
        self.meta().caption
    }

    fn kind(self) -> FieldKind {
        self.meta().kind
    }

    fn default_value(self) -> Value {
        self.kind().default_value()
    }

    fn is_persisted(self) -> bool {
        self.meta().persisted
    }

    /// Resolves a field by its persistence name (case-insensitive).
    ///
    /// # Errors
    /// - Returns `FieldLookupError::UnknownField` when no field has that name;
    ///   this is a configuration defect, not a data error.
    fn from_name(name: &str) -> Result<Self, FieldLookupError> {
        let trimmed = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| FieldLookupError::UnknownField {
                field_set: std::any::type_name::<Self>(),
                name: trimmed.to_string(),
            })
    }
}

/// Indexed access to an entity's fields.
pub trait FieldMapping {
    type Field: FieldKey;

    fn get(&self, field: Self::Field) -> Value;

    /// Assigns a field and returns whether the stored value changed.
    ///
    /// Implementations must route the assignment through
    /// `EntityState::modify_value` so the dirty flag stays sound.
    fn set(&mut self, field: Self::Field, value: Value) -> bool;

    /// Snapshot of every persisted field value.
    fn field_values(&self) -> Vec<(Self::Field, Value)> {
        Self::Field::ALL
            .iter()
            .copied()
            .filter(|field| field.is_persisted())
            .map(|field| (field, self.get(field)))
            .collect()
    }

    /// Digest over all persisted field values.
    ///
    /// Deterministic within one process; never persisted.
    fn field_signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (field, value) in self.field_values() {
            field.name().hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Writes every persisted field of `entity` into `element`.
///
/// `Null` values are omitted so they load back as the field default.
pub fn save_fields<E: FieldMapping + ?Sized>(entity: &E, element: &mut XmlElement) {
    for field in E::Field::ALL.iter().copied() {
        if !field.is_persisted() {
            continue;
        }
        let Some(text) = entity.get(field).to_persisted_text() else {
            continue;
        };
        match field.meta().encoding {
            FieldEncoding::Attribute => element.set_attribute(field.name(), text),
            FieldEncoding::Element => element.append_text_element(field.name(), text),
        }
    }
}

/// Reads every persisted field of `entity` from `element`.
///
/// Absent fields keep their current (cleared) value.
///
/// # Errors
/// - Returns `LoadError::InvalidValue` on the first value that does not parse
///   as its declared kind.
pub fn load_fields<E: FieldMapping + ?Sized>(
    entity: &mut E,
    element: &XmlElement,
) -> Result<(), LoadError> {
    for field in E::Field::ALL.iter().copied() {
        if !field.is_persisted() {
            continue;
        }
        let raw = match field.meta().encoding {
            FieldEncoding::Attribute => element.attribute(field.name()),
            FieldEncoding::Element => element
                .child(field.name())
                .map(|child| child.text().unwrap_or_default()),
        };
        let Some(raw) = raw else {
            continue;
        };
        let value = field
            .kind()
            .parse(raw)
            .map_err(|source| LoadError::InvalidValue {
                element: element.name().to_string(),
                field: field.name(),
                source,
            })?;
        entity.set(field, value);
    }
    Ok(())
}

/// A field or controller was referenced by a name nothing is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLookupError {
    UnknownField {
        field_set: &'static str,
        name: String,
    },
}

impl Display for FieldLookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField { field_set, name } => {
                write!(f, "field `{name}` not found in {field_set}")
            }
        }
    }
}

impl Error for FieldLookupError {}
