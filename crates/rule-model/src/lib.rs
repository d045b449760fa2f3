//! Shared data model for the frequently-bought-together rule table.
//!
//! A [`RuleTable`] is an immutable snapshot of directed recommendation edges
//! ([`RuleRow`]) indexed by source product, plus where it was loaded from.
//! The [`codec`] module reads and writes the CSV format editors maintain.

pub mod codec;
pub mod errors;
pub mod model;

pub use codec::{
    parse_raw, parse_rules, rules_to_string, write_rules, ParsedRules, RawRecord, RawRules, RowEdit,
};
pub use errors::ModelError;
pub use model::{
    Priority, RowIssue, RowWarning, RuleKind, RuleRow, RuleTable, SourceTag, Verification,
};
