//! Per-list view settings and their XML persistence.
//!
//! Fields are referenced by persistence name, so a renamed or removed field is
//! reported as `SettingsError::Lookup` instead of being silently dropped.

use crate::list::{
    FieldSorting, FilterConcat, FilterError, FilterOperation, FilterRule, SimpleFilter,
    SortDirection, SortKey, Sortings,
};
use crate::model::{Entity, FieldKey, FieldLookupError, Value, ValueParseError};
use crate::xml::XmlElement;
use log::warn;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

const SETTINGS_ELEMENT: &str = "Settings";
const SORTINGS_ELEMENT: &str = "Sortings";
const SORTING_ELEMENT: &str = "Sorting";
const QUICK_FILTER_ELEMENT: &str = "QuickFilter";
const RULE_ELEMENT: &str = "Rule";

#[derive(Debug)]
pub enum SettingsError {
    Lookup(FieldLookupError),
    Filter(FilterError),
    Value(ValueParseError),
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    InvalidDirection(String),
    InvalidConcat(String),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lookup(err) => write!(f, "{err}"),
            Self::Filter(err) => write!(f, "{err}"),
            Self::Value(err) => write!(f, "{err}"),
            Self::MissingAttribute { element, attribute } => {
                write!(f, "<{element}> is missing attribute `{attribute}`")
            }
            Self::InvalidDirection(value) => write!(f, "invalid sort direction `{value}`"),
            Self::InvalidConcat(value) => write!(f, "invalid filter concat `{value}`"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lookup(err) => Some(err),
            Self::Filter(err) => Some(err),
            Self::Value(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FieldLookupError> for SettingsError {
    fn from(value: FieldLookupError) -> Self {
        Self::Lookup(value)
    }
}

impl From<FilterError> for SettingsError {
    fn from(value: FilterError) -> Self {
        Self::Filter(value)
    }
}

impl From<ValueParseError> for SettingsError {
    fn from(value: ValueParseError) -> Self {
        Self::Value(value)
    }
}

/// Sort keys and quick filter of one list view.
pub struct ListSettings<E: Entity> {
    pub sortings: Sortings<E>,
    pub quick_filter: SimpleFilter<E::Field>,
}

impl<E: Entity> Default for ListSettings<E> {
    fn default() -> Self {
        Self {
            sortings: Sortings::new(),
            quick_filter: SimpleFilter::default(),
        }
    }
}

impl<E: Entity> Clone for ListSettings<E> {
    fn clone(&self) -> Self {
        Self {
            sortings: self.sortings.clone(),
            quick_filter: self.quick_filter.clone(),
        }
    }
}

impl<E: Entity> Debug for ListSettings<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSettings")
            .field("sortings", &self.sortings)
            .field("quick_filter", &self.quick_filter)
            .finish()
    }
}

impl<E: Entity> ListSettings<E> {
    pub fn new(sortings: Sortings<E>) -> Self {
        Self {
            sortings,
            quick_filter: SimpleFilter::default(),
        }
    }

    /// Appends a `Settings` element to `parent`.
    ///
    /// Computed sort keys have no persisted name and are skipped.
    pub fn save(&self, parent: &mut XmlElement) {
        let element = parent.append_element(SETTINGS_ELEMENT);

        let sortings = element.append_element(SORTINGS_ELEMENT);
        for step in self.sortings.iter() {
            let SortKey::Field(field) = step.key else {
                continue;
            };
            let sorting = sortings.append_element(SORTING_ELEMENT);
            sorting.set_attribute("Field", field.name());
            sorting.set_attribute("Direction", step.direction.as_str());
        }

        let filter = element.append_element(QUICK_FILTER_ELEMENT);
        filter.set_attribute("Concat", self.quick_filter.concat().as_str());
        for rule in self.quick_filter.rules() {
            let rule_element = filter.append_element(RULE_ELEMENT);
            rule_element.set_attribute("Field", rule.field().name());
            rule_element.set_attribute("Operation", rule.operation().as_str());
            if let Some(text) = rule.value().to_persisted_text() {
                rule_element.set_attribute("Value", text);
            }
        }
    }

    /// Reads settings from `element` itself or its `Settings` child.
    ///
    /// Missing settings yield the defaults.
    ///
    /// # Errors
    /// - Returns `SettingsError::Lookup` when a field name is unknown.
    /// - Returns the other variants for malformed directions, operations,
    ///   values or patterns.
    pub fn load(element: Option<&XmlElement>) -> Result<Self, SettingsError> {
        let located = element.and_then(|element| {
            if element.name() == SETTINGS_ELEMENT {
                Some(element)
            } else {
                element.child(SETTINGS_ELEMENT)
            }
        });
        let Some(settings) = located else {
            return Ok(Self::default());
        };

        Self::read(settings).map_err(|err| {
            warn!(
                "event=settings_load module=service status=error entity={} error={}",
                E::ELEMENT_NAME,
                err
            );
            err
        })
    }

    fn read(settings: &XmlElement) -> Result<Self, SettingsError> {
        let mut result = Self::default();

        if let Some(sortings) = settings.child(SORTINGS_ELEMENT) {
            for sorting in sortings.children_named(SORTING_ELEMENT) {
                let field = E::Field::from_name(required(sorting, SORTING_ELEMENT, "Field")?)?;
                let direction = match sorting.attribute("Direction") {
                    None => SortDirection::default(),
                    Some(raw) => SortDirection::parse(raw)
                        .ok_or_else(|| SettingsError::InvalidDirection(raw.to_string()))?,
                };
                result
                    .sortings
                    .push(FieldSorting::new(SortKey::Field(field), direction));
            }
        }

        if let Some(filter) = settings.child(QUICK_FILTER_ELEMENT) {
            if let Some(raw) = filter.attribute("Concat") {
                let concat = FilterConcat::parse(raw)
                    .ok_or_else(|| SettingsError::InvalidConcat(raw.to_string()))?;
                result.quick_filter.set_concat(concat);
            }
            for rule in filter.children_named(RULE_ELEMENT) {
                let field = E::Field::from_name(required(rule, RULE_ELEMENT, "Field")?)?;
                let operation = FilterOperation::parse(required(rule, RULE_ELEMENT, "Operation")?)?;
                let value = match rule.attribute("Value") {
                    None => Value::Null,
                    Some(raw) if operation.is_textual() => Value::Text(raw.to_string()),
                    Some(raw) => field.kind().parse(raw)?,
                };
                result
                    .quick_filter
                    .add_rule(FilterRule::new(field, operation, value)?);
            }
        }

        Ok(result)
    }
}

fn required<'a>(
    element: &'a XmlElement,
    element_name: &'static str,
    attribute: &'static str,
) -> Result<&'a str, SettingsError> {
    element
        .attribute(attribute)
        .ok_or(SettingsError::MissingAttribute {
            element: element_name,
            attribute,
        })
}
