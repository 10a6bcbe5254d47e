//! Predicates used to filter entity lists.
//!
//! # Responsibility
//! - Define the `Matcher` seam shared by categories, quick filters and ad-hoc
//!   predicates.
//! - Provide a field-rule filter that can be persisted in list settings.
//!
//! # Invariants
//! - A matcher reporting `is_filter_empty` is treated as "no filter".
//! - Text comparisons ignore case.

use crate::model::{FieldKey, FieldMapping, Value};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Decides whether one entity belongs to a view.
pub trait Matcher<E: ?Sized> {
    fn is_match(&self, entity: &E) -> bool;

    /// Whether this matcher accepts everything and can be skipped.
    fn is_filter_empty(&self) -> bool {
        false
    }
}

/// Comparison applied by one filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperation {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Blank,
    NotBlank,
    Matches,
}

impl FilterOperation {
    pub const ALL: &'static [Self] = &[
        Self::Equals,
        Self::NotEquals,
        Self::Contains,
        Self::NotContains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::Less,
        Self::LessOrEqual,
        Self::Blank,
        Self::NotBlank,
        Self::Matches,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::Less => "less",
            Self::LessOrEqual => "less_or_equal",
            Self::Blank => "blank",
            Self::NotBlank => "not_blank",
            Self::Matches => "matches",
        }
    }

    /// # Errors
    /// - Returns `FilterError::UnknownOperation` for names outside `ALL`.
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|operation| operation.as_str() == normalized)
            .ok_or_else(|| FilterError::UnknownOperation(raw.trim().to_string()))
    }

    /// Operations that compare the text rendering of a value.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            Self::Contains | Self::NotContains | Self::StartsWith | Self::EndsWith | Self::Matches
        )
    }

    pub fn needs_value(self) -> bool {
        !matches!(self, Self::Blank | Self::NotBlank)
    }
}

/// How the rules of one `SimpleFilter` combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterConcat {
    #[default]
    And,
    Or,
}

impl FilterConcat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FilterError {
    UnknownOperation(String),
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOperation(name) => write!(f, "unknown filter operation `{name}`"),
            Self::InvalidPattern { pattern, source } => {
                write!(f, "invalid filter pattern `{pattern}`: {source}")
            }
        }
    }
}

impl Error for FilterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownOperation(_) => None,
            Self::InvalidPattern { source, .. } => Some(source),
        }
    }
}

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex must compile"));

fn fold_text(value: &str) -> String {
    WHITESPACE_RUN
        .replace_all(value.trim(), " ")
        .to_lowercase()
}

/// One `field <operation> value` condition.
#[derive(Clone)]
pub struct FilterRule<F: FieldKey> {
    field: F,
    operation: FilterOperation,
    value: Value,
    pattern: Option<Regex>,
}

impl<F: FieldKey> FilterRule<F> {
    /// Builds a rule, converting `value` to the field's kind for comparisons
    /// and keeping it as text for textual operations.
    ///
    /// # Errors
    /// - Returns `FilterError::InvalidPattern` when a `Matches` pattern does
    ///   not compile.
    pub fn new(
        field: F,
        operation: FilterOperation,
        value: impl Into<Value>,
    ) -> Result<Self, FilterError> {
        let value = value.into();
        let value = if !operation.needs_value() {
            Value::Null
        } else if operation.is_textual() {
            Value::Text(value.to_text())
        } else {
            field.kind().coerce(value)
        };

        let pattern = if operation == FilterOperation::Matches {
            let source = value.to_text();
            let compiled = RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .map_err(|source_err| FilterError::InvalidPattern {
                    pattern: source.clone(),
                    source: source_err,
                })?;
            Some(compiled)
        } else {
            None
        };

        Ok(Self {
            field,
            operation,
            value,
            pattern,
        })
    }

    pub fn field(&self) -> F {
        self.field
    }

    pub fn operation(&self) -> FilterOperation {
        self.operation
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_match<E>(&self, entity: &E) -> bool
    where
        E: FieldMapping<Field = F> + ?Sized,
    {
        let actual = entity.get(self.field);
        match self.operation {
            FilterOperation::Equals => values_equal(&actual, &self.value),
            FilterOperation::NotEquals => !values_equal(&actual, &self.value),
            FilterOperation::Contains => self.text_test(&actual, |a, b| a.contains(b)),
            FilterOperation::NotContains => !self.text_test(&actual, |a, b| a.contains(b)),
            FilterOperation::StartsWith => self.text_test(&actual, |a, b| a.starts_with(b)),
            FilterOperation::EndsWith => self.text_test(&actual, |a, b| a.ends_with(b)),
            FilterOperation::Greater => compare(&actual, &self.value).is_gt(),
            FilterOperation::GreaterOrEqual => compare(&actual, &self.value).is_ge(),
            FilterOperation::Less => compare(&actual, &self.value).is_lt(),
            FilterOperation::LessOrEqual => compare(&actual, &self.value).is_le(),
            FilterOperation::Blank => actual.is_blank(),
            FilterOperation::NotBlank => !actual.is_blank(),
            FilterOperation::Matches => self
                .pattern
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(&actual.to_text())),
        }
    }

    fn text_test(&self, actual: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
        test(&fold_text(&actual.to_text()), &fold_text(&self.value.to_text()))
    }
}

impl<F: FieldKey> PartialEq for FilterRule<F> {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.operation == other.operation && self.value == other.value
    }
}

impl<F: FieldKey> Debug for FilterRule<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRule")
            .field("field", &self.field)
            .field("operation", &self.operation)
            .field("value", &self.value)
            .finish()
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Text(left), Value::Text(right)) => fold_text(left) == fold_text(right),
        _ => actual == expected,
    }
}

fn compare(actual: &Value, expected: &Value) -> Ordering {
    match (actual, expected) {
        (Value::Text(left), Value::Text(right)) => fold_text(left).cmp(&fold_text(right)),
        _ => actual.cmp(expected),
    }
}

/// Field rules combined with one `FilterConcat`.
#[derive(Clone, PartialEq)]
pub struct SimpleFilter<F: FieldKey> {
    concat: FilterConcat,
    rules: Vec<FilterRule<F>>,
}

impl<F: FieldKey> Default for SimpleFilter<F> {
    fn default() -> Self {
        Self::new(FilterConcat::And)
    }
}

impl<F: FieldKey> SimpleFilter<F> {
    pub fn new(concat: FilterConcat) -> Self {
        Self {
            concat,
            rules: Vec::new(),
        }
    }

    pub fn concat(&self) -> FilterConcat {
        self.concat
    }

    pub fn set_concat(&mut self, concat: FilterConcat) {
        self.concat = concat;
    }

    pub fn rules(&self) -> &[FilterRule<F>] {
        &self.rules
    }

    pub fn add_rule(&mut self, rule: FilterRule<F>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Adds an equality rule; a `Null` value filters for blank fields.
    pub fn add_filter(&mut self, field: F, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let operation = if value.is_null() {
            FilterOperation::Blank
        } else {
            FilterOperation::Equals
        };
        let rule = FilterRule {
            field,
            operation,
            value: field.kind().coerce(value),
            pattern: None,
        };
        self.add_rule(rule)
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<F: FieldKey> Debug for SimpleFilter<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleFilter")
            .field("concat", &self.concat)
            .field("rules", &self.rules)
            .finish()
    }
}

impl<F: FieldKey, E: FieldMapping<Field = F>> Matcher<E> for SimpleFilter<F> {
    fn is_match(&self, entity: &E) -> bool {
        match self.concat {
            FilterConcat::And => self.rules.iter().all(|rule| rule.is_match(entity)),
            FilterConcat::Or => {
                self.rules.is_empty() || self.rules.iter().any(|rule| rule.is_match(entity))
            }
        }
    }

    fn is_filter_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Named, user-selectable filter.
pub struct Category<E> {
    name: String,
    matcher: Box<dyn Matcher<E>>,
}

impl<E> Category<E> {
    pub fn new(name: impl Into<String>, matcher: impl Matcher<E> + 'static) -> Self {
        Self {
            name: name.into(),
            matcher: Box::new(matcher),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<E> Matcher<E> for Category<E> {
    fn is_match(&self, entity: &E) -> bool {
        self.matcher.is_match(entity)
    }

    fn is_filter_empty(&self) -> bool {
        self.matcher.is_filter_empty()
    }
}

impl<E> Debug for Category<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Category").field("name", &self.name).finish()
    }
}

/// Adapts a closure into a `Matcher`.
pub struct PredicateMatcher<P>(pub P);

impl<E, P: Fn(&E) -> bool> Matcher<E> for PredicateMatcher<P> {
    fn is_match(&self, entity: &E) -> bool {
        (self.0)(entity)
    }
}
