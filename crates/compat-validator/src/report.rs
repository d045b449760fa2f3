use std::fmt::Write as _;
use std::path::Path;

use fbt_rule_model::{parse_rules, RuleTable};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classify::{Classification, ValidationFinding, ValidationMode, Validator};
use crate::errors::CompatError;
use crate::lint::{lint, Severity, StructuralIssue};
use crate::proofs::ProofBook;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub rows: usize,
    pub definite_mismatch: usize,
    pub missing_proof: usize,
    pub heuristic_match: usize,
    pub verified: usize,
    pub not_applicable: usize,
    pub structural_errors: usize,
    pub structural_warnings: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    pub mode: ValidationMode,
    pub findings: Vec<ValidationFinding>,
    pub structural: Vec<StructuralIssue>,
    pub proof_issues: Vec<String>,
}

impl ValidationReport {
    pub fn build(
        table: &RuleTable,
        validator: &Validator,
        mode: ValidationMode,
        proofs: Option<&ProofBook>,
    ) -> Self {
        let proofed;
        let table = match proofs {
            Some(book) => {
                proofed = book.apply(table);
                &proofed
            }
            None => table,
        };
        Self {
            mode,
            findings: validator.validate(table, mode),
            structural: lint(table, validator.rules()),
            proof_issues: proofs
                .map(|book| book.issues().to_vec())
                .unwrap_or_default(),
        }
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            rows: self.findings.len(),
            ..Summary::default()
        };
        for finding in &self.findings {
            match finding.classification {
                Classification::DefiniteMismatch => summary.definite_mismatch += 1,
                Classification::MissingProof => summary.missing_proof += 1,
                Classification::HeuristicMatch => summary.heuristic_match += 1,
                Classification::Verified => summary.verified += 1,
                Classification::NotApplicable => summary.not_applicable += 1,
            }
        }
        for issue in &self.structural {
            match issue.severity {
                Severity::Error => summary.structural_errors += 1,
                Severity::Warning => summary.structural_warnings += 1,
            }
        }
        summary
    }

    /// Whether the rule file should be held back. Mismatches and structural
    /// errors always block; missing proof and proofs-file problems block only
    /// in strict mode.
    pub fn blocking(&self) -> bool {
        let summary = self.summary();
        let strict = self.mode == ValidationMode::Strict;
        summary.definite_mismatch > 0
            || summary.structural_errors > 0
            || (strict && (summary.missing_proof > 0 || !self.proof_issues.is_empty()))
    }

    pub fn flagged(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|finding| {
            !matches!(
                finding.classification,
                Classification::Verified | Classification::NotApplicable
            )
        })
    }

    /// Plain-text report, listing at most `max_examples` rows per category.
    pub fn render(&self, max_examples: usize) -> String {
        let summary = self.summary();
        let mut out = String::new();
        let _ = writeln!(out, "Validation mode: {:?}", self.mode);
        let _ = writeln!(out, "Scanned rows: {}", summary.rows);
        let _ = writeln!(
            out,
            "definite mismatch: {}  missing proof: {}  heuristic match: {}  verified: {}  not applicable: {}",
            summary.definite_mismatch,
            summary.missing_proof,
            summary.heuristic_match,
            summary.verified,
            summary.not_applicable
        );
        let _ = writeln!(
            out,
            "structural errors: {}  structural warnings: {}",
            summary.structural_errors, summary.structural_warnings
        );

        for class in [
            Classification::DefiniteMismatch,
            Classification::MissingProof,
            Classification::HeuristicMatch,
        ] {
            let rows: Vec<&ValidationFinding> = self
                .flagged()
                .filter(|finding| finding.classification == class)
                .collect();
            if rows.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{class}:");
            for finding in rows.iter().take(max_examples) {
                let _ = writeln!(
                    out,
                    "- row {}: {} -> {} ({})",
                    finding.row_index + 1,
                    finding.product_id,
                    finding.recommended_product_id,
                    finding.reason
                );
            }
            if rows.len() > max_examples {
                let _ = writeln!(out, "... and {} more", rows.len() - max_examples);
            }
        }

        if !self.structural.is_empty() {
            let _ = writeln!(out, "\nstructural:");
            for issue in self.structural.iter().take(max_examples) {
                let _ = writeln!(out, "- {issue}");
            }
            if self.structural.len() > max_examples {
                let _ = writeln!(out, "... and {} more", self.structural.len() - max_examples);
            }
        }
        for issue in &self.proof_issues {
            let _ = writeln!(out, "proofs: {issue}");
        }
        let verdict = if self.blocking() { "FAIL" } else { "OK" };
        let _ = writeln!(out, "\nResult: {verdict}");
        out
    }
}

/// Reads and validates a rule file, merging the proofs file when given.
pub fn validate_file(
    path: &Path,
    validator: &Validator,
    mode: ValidationMode,
    proofs: Option<&Path>,
) -> Result<ValidationReport, CompatError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| CompatError::Io(format!("{}: {err}", path.display())))?;
    let table = parse_rules(&text)?.into_table();
    let book = proofs.map(ProofBook::load).transpose()?;
    let report = ValidationReport::build(&table, validator, mode, book.as_ref());
    let summary = report.summary();
    info!(
        path = %path.display(),
        rows = summary.rows,
        mismatches = summary.definite_mismatch,
        missing_proof = summary.missing_proof,
        blocking = report.blocking(),
        "validation finished"
    );
    Ok(report)
}
