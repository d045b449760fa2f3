//! Compatibility checks for recommendation rules.
//!
//! [`Validator`] classifies each row (verified, definite mismatch, missing
//! proof, heuristic match, not applicable) using [`FitRules`]. [`Autofixer`]
//! replaces or removes definite mismatches, and [`persist`] writes the result
//! back with a backup.

pub mod autofix;
pub mod classify;
pub mod errors;
pub mod fit;
pub mod lint;
pub mod persist;
pub mod proofs;
pub mod report;

pub use autofix::{autofix, AutofixOutcome, AutofixReport, Autofixer, FixAction, FixChange};
pub use classify::{Classification, ValidationFinding, ValidationMode, Validator};
pub use errors::CompatError;
pub use fit::{FitRules, MismatchRule, Overlap, ProductIdentity};
pub use lint::{lint, Severity, StructuralIssue};
pub use persist::{
    autofix_file, backup_path, FileFixOptions, FileFixOutcome, WriteTarget,
    DEFAULT_AUTOFIX_OUTPUT,
};
pub use proofs::{
    build_proofs_template, search_url, write_proofs_template, ProofBook, ProofEntry,
    ProofTemplateRow,
};
pub use report::{validate_file, Summary, ValidationReport};

use fbt_rule_model::RuleTable;

/// Classifies every row with the built-in fit rules.
pub fn validate(table: &RuleTable, mode: ValidationMode) -> Vec<ValidationFinding> {
    Validator::default().validate(table, mode)
}
