use std::fmt;

use fbt_rule_model::{RuleKind, RuleRow, RuleTable, Verification};
use serde::{Deserialize, Serialize};

use crate::fit::FitRules;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Only verified rows pass; every unproven fit-sensitive pair is flagged.
    #[default]
    Strict,
    /// Brand or model overlap counts as a likely fit.
    Heuristic,
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "heuristic" => Ok(ValidationMode::Heuristic),
            other => Err(format!("unknown validation mode '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    DefiniteMismatch,
    MissingProof,
    HeuristicMatch,
    Verified,
    NotApplicable,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::DefiniteMismatch => "definite-mismatch",
            Classification::MissingProof => "missing-proof",
            Classification::HeuristicMatch => "heuristic-match",
            Classification::Verified => "verified",
            Classification::NotApplicable => "not-applicable",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationFinding {
    /// Position of the row in the table.
    pub row_index: usize,
    pub product_id: String,
    pub recommended_product_id: String,
    pub classification: Classification,
    pub reason: String,
}

/// Classifies rule rows against a set of fit rules.
#[derive(Clone, Debug, Default)]
pub struct Validator {
    rules: FitRules,
}

impl Validator {
    pub fn new(rules: FitRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &FitRules {
        &self.rules
    }

    /// One finding per row, in table order.
    pub fn validate(&self, table: &RuleTable, mode: ValidationMode) -> Vec<ValidationFinding> {
        table
            .rows()
            .iter()
            .enumerate()
            .map(|(row_index, row)| {
                let (classification, reason) = self.classify(row, mode);
                ValidationFinding {
                    row_index,
                    product_id: row.product_id.clone(),
                    recommended_product_id: row.recommended_product_id.clone(),
                    classification,
                    reason,
                }
            })
            .collect()
    }

    pub fn classify(&self, row: &RuleRow, mode: ValidationMode) -> (Classification, String) {
        if row.is_keyword_rule() {
            return (
                Classification::NotApplicable,
                "keyword rule; compatibility not checked".to_string(),
            );
        }
        if row.kind == RuleKind::Category {
            return (
                Classification::NotApplicable,
                "category rule; compatibility not checked".to_string(),
            );
        }
        let (product, target) = (
            row.product_id.as_str(),
            row.recommended_product_id.as_str(),
        );
        if !self.rules.requires_proof(product, target) {
            return (
                Classification::NotApplicable,
                "pair is not fit-sensitive".to_string(),
            );
        }
        if let Verification::Verified { source } = &row.verification {
            return (Classification::Verified, format!("verified: {source}"));
        }
        if let Some(reason) = self.rules.mismatch(product, target) {
            return (Classification::DefiniteMismatch, reason);
        }
        if let Verification::Rejected { source } = &row.verification {
            let reason = match source {
                Some(source) => format!("reviewer marked incompatible ({source})"),
                None => "reviewer marked incompatible".to_string(),
            };
            return (Classification::MissingProof, reason);
        }

        let identity = self.rules.identity(target);
        let overlap = self.rules.overlap(product, target);
        if mode == ValidationMode::Heuristic && overlap.is_match() {
            let mut parts = Vec::new();
            if !overlap.brands.is_empty() {
                parts.push(format!("brand {}", overlap.brands.join("/")));
            }
            if !overlap.models.is_empty() {
                parts.push(format!("model {}", overlap.models.join("/")));
            }
            return (
                Classification::HeuristicMatch,
                format!("shared {}; not verified", parts.join(" and ")),
            );
        }

        let reason = if identity.for_marker && !overlap.is_match() {
            "accessory names a model this helmet does not match; proof required".to_string()
        } else {
            "fit-sensitive accessory without compatibility proof".to_string()
        };
        (Classification::MissingProof, reason)
    }
}
