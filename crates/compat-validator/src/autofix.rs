use std::collections::{BTreeSet, HashMap, HashSet};

use fbt_rule_model::{RowEdit, RuleRow, RuleTable, Verification};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{Classification, ValidationMode, Validator};
use crate::errors::CompatError;
use crate::proofs::ProofBook;

const REJECT_SELF: i32 = -10_000;
const REJECT_ALREADY_RECOMMENDED: i32 = -9_000;
const REJECT_MISMATCH: i32 = -8_000;
const REJECT_NOT_COMPLEMENTARY: i32 = -7_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixAction {
    Replaced {
        replacement: String,
        /// The replacement came from a verified proof entry.
        verified: bool,
    },
    Removed {
        reason: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixChange {
    pub row_index: usize,
    pub original: RuleRow,
    pub action: FixAction,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutofixReport {
    pub scanned: usize,
    pub dry_run: bool,
    pub changes: Vec<FixChange>,
}

impl AutofixReport {
    /// Rows the fix touches, as they were before it.
    pub fn changed(&self) -> Vec<&RuleRow> {
        self.changes.iter().map(|change| &change.original).collect()
    }

    pub fn replaced(&self) -> usize {
        self.changes
            .iter()
            .filter(|change| matches!(change.action, FixAction::Replaced { .. }))
            .count()
    }

    pub fn removed(&self) -> usize {
        self.changes.len() - self.replaced()
    }

    /// File edits matching the corrected table: a retargeted row takes the
    /// proof state `proofs` holds for its new pair, or none.
    pub fn row_edits(&self, proofs: Option<&ProofBook>) -> HashMap<usize, RowEdit> {
        self.changes
            .iter()
            .map(|change| {
                let edit = match &change.action {
                    FixAction::Replaced { replacement, .. } => {
                        let (verification, notes) =
                            replacement_proof(proofs, &change.original.product_id, replacement);
                        RowEdit::Retarget {
                            target: replacement.clone(),
                            verification,
                            notes,
                        }
                    }
                    FixAction::Removed { .. } => RowEdit::Drop,
                };
                (change.row_index, edit)
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct AutofixOutcome {
    pub report: AutofixReport,
    /// Corrected table; equal to the input on a dry run.
    pub table: RuleTable,
}

/// Plans and applies replacements for definite-mismatch rows.
pub struct Autofixer<'a> {
    validator: &'a Validator,
    proofs: Option<&'a ProofBook>,
}

impl<'a> Autofixer<'a> {
    pub fn new(validator: &'a Validator) -> Self {
        Self {
            validator,
            proofs: None,
        }
    }

    /// Verified proof entries become preferred replacement candidates.
    pub fn with_proofs(mut self, proofs: &'a ProofBook) -> Self {
        self.proofs = Some(proofs);
        self
    }

    pub fn autofix(&self, table: &RuleTable, dry_run: bool) -> AutofixOutcome {
        let changes = self.plan(table);
        let report = AutofixReport {
            scanned: table.len(),
            dry_run,
            changes,
        };
        if dry_run || report.changes.is_empty() {
            return AutofixOutcome {
                report,
                table: table.clone(),
            };
        }
        let fixed = apply_changes(table, &report.changes, self.proofs);
        AutofixOutcome {
            report,
            table: fixed,
        }
    }

    /// Decides what to do with each definite-mismatch row without touching
    /// the table. Later rows see the replacements chosen for earlier ones.
    pub fn plan(&self, table: &RuleTable) -> Vec<FixChange> {
        let mut product_recs: HashMap<&str, HashSet<String>> = HashMap::new();
        let mut pool: BTreeSet<&str> = BTreeSet::new();
        for row in table.rows() {
            if row.is_keyword_rule() {
                continue;
            }
            product_recs
                .entry(row.product_id.as_str())
                .or_default()
                .insert(row.recommended_product_id.clone());
            pool.insert(row.recommended_product_id.as_str());
        }

        let mut changes = Vec::new();
        for (row_index, row) in table.rows().iter().enumerate() {
            let (classification, _) = self.validator.classify(row, ValidationMode::Strict);
            if classification != Classification::DefiniteMismatch {
                continue;
            }
            let product = row.product_id.as_str();
            let original = row.recommended_product_id.as_str();
            let mut existing = product_recs.get(product).cloned().unwrap_or_default();
            existing.remove(original);

            let action = match self.pick_replacement(product, original, &existing, &pool) {
                Some((replacement, verified)) => {
                    debug!(product, original, %replacement, "mismatch replaced");
                    let recs = product_recs.entry(product).or_default();
                    recs.remove(original);
                    recs.insert(replacement.clone());
                    FixAction::Replaced {
                        replacement,
                        verified,
                    }
                }
                None => {
                    let reason = CompatError::NoCompatibleCandidate {
                        product_id: product.to_string(),
                        recommended_product_id: original.to_string(),
                    }
                    .to_string();
                    warn!(product, original, "no compatible candidate; removing row");
                    FixAction::Removed { reason }
                }
            };
            changes.push(FixChange {
                row_index,
                original: row.clone(),
                action,
            });
        }
        changes
    }

    fn pick_replacement(
        &self,
        product: &str,
        original: &str,
        existing: &HashSet<String>,
        pool: &BTreeSet<&str>,
    ) -> Option<(String, bool)> {
        if let Some(proofs) = self.proofs {
            let mut verified: Vec<(i32, &str)> = proofs
                .verified_targets(product)
                .into_iter()
                .map(|candidate| (self.score(product, original, candidate, existing), candidate))
                .collect();
            verified.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
            if let Some((_, candidate)) = verified.into_iter().find(|(score, _)| *score > 0) {
                return Some((candidate.to_string(), true));
            }
        }

        let rules = self.validator.rules();
        let mut best: Option<(i32, &str)> = None;
        for candidate in pool.iter().copied() {
            if !rules.overlap(product, candidate).is_match() {
                continue;
            }
            let score = self.score(product, original, candidate, existing);
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        best.filter(|(score, _)| *score > 0)
            .map(|(_, candidate)| (candidate.to_string(), false))
    }

    /// Ranks `candidate` as a replacement for `original` under `product`.
    /// Negative scores are hard rejections.
    pub fn score(
        &self,
        product: &str,
        original: &str,
        candidate: &str,
        existing: &HashSet<String>,
    ) -> i32 {
        let rules = self.validator.rules();
        if candidate == product {
            return REJECT_SELF;
        }
        if existing.contains(candidate) {
            return REJECT_ALREADY_RECOMMENDED;
        }
        if rules.mismatch(product, candidate).is_some() {
            return REJECT_MISMATCH;
        }
        let source_type = rules.type_name(product);
        let candidate_type = rules.type_name(candidate);
        if !rules.allowed_targets(source_type).is_empty()
            && !rules.is_complementary(source_type, candidate_type)
        {
            return REJECT_NOT_COMPLEMENTARY;
        }

        let overlap = rules.overlap(product, candidate);
        let mut score = 0;
        if candidate_type == rules.type_name(original) {
            score += 80;
        }
        if candidate_type == "helmet_accessory" {
            score += 30;
        }
        if !overlap.brands.is_empty() {
            score += 70;
        }
        if !overlap.models.is_empty() {
            score += 60;
        }
        if rules.is_fit_sensitive(candidate) {
            score += 10;
        }
        if rules.identity(candidate).for_marker && overlap.is_match() {
            score += 10;
        }
        score
    }
}

/// Autofix with the built-in fit rules and no proofs file.
pub fn autofix(table: &RuleTable, dry_run: bool) -> AutofixOutcome {
    let validator = Validator::default();
    Autofixer::new(&validator).autofix(table, dry_run)
}

fn apply_changes(
    table: &RuleTable,
    changes: &[FixChange],
    proofs: Option<&ProofBook>,
) -> RuleTable {
    let by_index: HashMap<usize, &FixAction> = changes
        .iter()
        .map(|change| (change.row_index, &change.action))
        .collect();
    let rows: Vec<RuleRow> = table
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| match by_index.get(&idx) {
            None => Some(row.clone()),
            Some(FixAction::Removed { .. }) => None,
            Some(FixAction::Replaced { replacement, .. }) => {
                let (verification, notes) =
                    replacement_proof(proofs, &row.product_id, replacement);
                let mut fixed = RuleRow::new(row.product_id.clone(), replacement.clone(), row.kind)
                    .with_verification(verification)
                    .with_priority(row.priority);
                fixed.label = row.label.clone();
                fixed.notes = notes;
                Some(fixed)
            }
        })
        .collect();
    table.replace_rows(rows)
}

/// Proof state of a replacement pair. Inline cells of the replaced pair never
/// carry over.
fn replacement_proof(
    proofs: Option<&ProofBook>,
    product_id: &str,
    replacement: &str,
) -> (Verification, Option<String>) {
    match proofs.and_then(|book| book.get(product_id, replacement)) {
        Some(entry) if entry.verification.is_set() => {
            (entry.verification.clone(), entry.notes.clone())
        }
        _ => (Verification::Unset, None),
    }
}
