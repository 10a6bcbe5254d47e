//! Record model shared by lists, controllers and persistence.
//!
//! # Responsibility
//! - Define scalar values and per-type field metadata.
//! - Define the entity contract: identity, dirty tracking, members and XML
//!   load/save.
//! - Provide per-instance observer lists for change notifications.
//!
//! # Invariants
//! - `EntityId` is an in-process identity; it is never written to XML.
//! - Every field assignment goes through `EntityState::modify_value`.

pub mod entity;
pub mod field;
pub mod observer;
pub mod value;

pub use entity::{
    AsAny, Entity, EntityEvent, EntityId, EntityObject, EntityOperation, EntityState, LoadError,
    LoadStatus, MemberSlot, Members, SilentChange,
};
pub use field::{
    load_fields, save_fields, FieldEncoding, FieldKey, FieldLookupError, FieldMapping, FieldMeta,
};
pub use observer::{SubscriptionId, Subscribers};
pub use value::{check_value_modified, FieldKind, Value, ValueParseError};
