//! Core record engine for RecordKit.
//! Entities with dirty tracking, XML-persisted entity lists, change history
//! and list controllers that derive filtered, sorted views.

pub mod history;
pub mod list;
pub mod logging;
pub mod model;
pub mod service;
pub mod xml;

pub use history::{ChangeHistory, HistoryEntry, HistoryRow};
pub use list::{
    Category, EntityList, FieldChange, FieldSorting, FilterConcat, FilterError, FilterOperation,
    FilterRule, ListProjection, Matcher, PredicateMatcher, SimpleFilter, SortDirection, SortKey,
    Sortings,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::{
    check_value_modified, load_fields, save_fields, Entity, EntityEvent, EntityId, EntityObject,
    EntityOperation, EntityState, FieldEncoding, FieldKey, FieldKind, FieldLookupError,
    FieldMapping, FieldMeta, LoadError, LoadStatus, MemberSlot, SilentChange, SubscriptionId,
    Value, ValueParseError,
};
pub use service::{
    ConfirmationPrompt, ControllerEvent, ControllerRegistry, ControllerState, DataController,
    Editor, ListController, ListSettings, RegistryError, SettingsError,
};
pub use xml::{XmlElement, XmlError, XmlResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
