//! Structural checks: parse problems, duplicate pairs, pairings the
//! complementary table does not expect and model-specific accessories that
//! name nothing in common with their helmet.

use std::collections::HashMap;
use std::fmt;

use fbt_rule_model::RuleTable;
use serde::{Deserialize, Serialize};

use crate::fit::FitRules;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuralIssue {
    pub severity: Severity,
    /// CSV line for parse problems, otherwise absent.
    pub line: Option<u64>,
    pub row_index: Option<usize>,
    pub message: String,
}

impl fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        match (self.line, self.row_index) {
            (Some(line), _) => write!(f, "[{tag}] line {line}: {}", self.message),
            (None, Some(idx)) => write!(f, "[{tag}] row {}: {}", idx + 1, self.message),
            (None, None) => write!(f, "[{tag}] {}", self.message),
        }
    }
}

pub fn lint(table: &RuleTable, rules: &FitRules) -> Vec<StructuralIssue> {
    let mut issues: Vec<StructuralIssue> = table
        .warnings()
        .iter()
        .map(|warning| StructuralIssue {
            severity: if warning.issue.rejects_row() {
                Severity::Error
            } else {
                Severity::Warning
            },
            line: Some(warning.line),
            row_index: None,
            message: warning.issue.to_string(),
        })
        .collect();

    let mut first_seen: HashMap<(&str, &str), usize> = HashMap::new();
    for (idx, row) in table.rows().iter().enumerate() {
        let pair = (row.product_id.as_str(), row.recommended_product_id.as_str());
        if let Some(first) = first_seen.get(&pair) {
            issues.push(StructuralIssue {
                severity: Severity::Error,
                line: None,
                row_index: Some(idx),
                message: format!(
                    "duplicate pair {} -> {} (first at row {})",
                    pair.0,
                    pair.1,
                    first + 1
                ),
            });
            continue;
        }
        first_seen.insert(pair, idx);

        if row.is_keyword_rule() {
            continue;
        }
        if rules.requires_proof(pair.0, pair.1)
            && rules.identity(pair.1).for_marker
            && !rules.overlap(pair.0, pair.1).is_match()
        {
            issues.push(StructuralIssue {
                severity: Severity::Warning,
                line: None,
                row_index: Some(idx),
                message: format!(
                    "{} is model-specific but shares no brand or model with {}",
                    pair.1, pair.0
                ),
            });
        }
        let (Some(source_type), Some(target_type)) = (
            rules.detect_type(pair.0),
            rules.detect_type(pair.1),
        ) else {
            continue;
        };
        if source_type == target_type && rules.is_core(source_type) {
            issues.push(StructuralIssue {
                severity: Severity::Error,
                line: None,
                row_index: Some(idx),
                message: format!(
                    "{} -> {} pairs two {source_type} products",
                    pair.0, pair.1
                ),
            });
        } else if !rules.is_complementary(source_type, target_type) {
            issues.push(StructuralIssue {
                severity: Severity::Warning,
                line: None,
                row_index: Some(idx),
                message: format!(
                    "unusual pairing {source_type} -> {target_type} ({} -> {})",
                    pair.0, pair.1
                ),
            });
        }
    }
    issues
}
