//! Entity collections, their sort configuration and filters.

pub mod entity_list;
pub mod filter;
pub mod sorting;

pub use entity_list::{EntityList, FieldChange, ListProjection, Matching, ProjectedEntry};
pub use filter::{
    Category, FilterConcat, FilterError, FilterOperation, FilterRule, Matcher, PredicateMatcher,
    SimpleFilter,
};
pub use sorting::{FieldSorting, SortDirection, SortKey, Sortings};
