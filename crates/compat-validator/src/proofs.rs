//! Compatibility proof ledger: a side CSV recording, per pair, whether a
//! reviewer confirmed fit and where the evidence lives.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use fbt_rule_model::codec::{
    COL_NOTES, COL_PRODUCT_ID, COL_RECOMMENDED_ID, COL_SOURCE, COL_VERIFIED,
};
use fbt_rule_model::{parse_rules, ModelError, RuleKind, RuleRow, RuleTable, Verification};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CompatError;
use crate::fit::FitRules;

pub const COL_SEARCH_URL: &str = "Suggested Search URL";
const SEARCH_BASE: &str = "https://www.google.com/search?q=";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofEntry {
    pub verification: Verification,
    pub notes: Option<String>,
}

/// Proof entries keyed by `(product, recommended)`. Problems reading the file
/// are collected in `issues` rather than failing the run.
#[derive(Clone, Debug, Default)]
pub struct ProofBook {
    entries: HashMap<(String, String), ProofEntry>,
    issues: Vec<String>,
}

impl ProofBook {
    pub fn parse(text: &str) -> Self {
        let mut book = ProofBook::default();
        let parsed = match parse_rules(text) {
            Ok(parsed) => parsed,
            Err(ModelError::MissingColumns(columns)) => {
                book.issues
                    .push(format!("proofs file missing required columns: {columns}"));
                return book;
            }
            Err(err) => {
                book.issues.push(format!("proofs file unreadable: {err}"));
                return book;
            }
        };
        for warning in &parsed.warnings {
            book.issues.push(format!("proofs file: {warning}"));
        }
        for row in parsed.rows {
            book.entries.insert(
                (row.product_id, row.recommended_product_id),
                ProofEntry {
                    verification: row.verification,
                    notes: row.notes,
                },
            );
        }
        book
    }

    /// Reads the proofs file. A missing file yields an empty book with an issue.
    pub fn load(path: &Path) -> Result<Self, CompatError> {
        if !path.exists() {
            let mut book = ProofBook::default();
            book.issues
                .push(format!("compatibility proofs file not found: {}", path.display()));
            return Ok(book);
        }
        let text = std::fs::read_to_string(path)?;
        let book = Self::parse(&text);
        debug!(path = %path.display(), entries = book.len(), "loaded compatibility proofs");
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn get(&self, product_id: &str, recommended_id: &str) -> Option<&ProofEntry> {
        self.entries
            .get(&(product_id.to_string(), recommended_id.to_string()))
    }

    /// Accessories with a verified proof for `product_id`, sorted.
    pub fn verified_targets(&self, product_id: &str) -> Vec<&str> {
        let targets: BTreeSet<&str> = self
            .entries
            .iter()
            .filter(|((product, _), entry)| {
                product == product_id && entry.verification.is_verified()
            })
            .map(|((_, target), _)| target.as_str())
            .collect();
        targets.into_iter().collect()
    }

    /// Copies proof state onto the table's rows. A set entry in the book
    /// overrides whatever the row carried inline.
    pub fn apply(&self, table: &RuleTable) -> RuleTable {
        if self.entries.is_empty() {
            return table.clone();
        }
        let rows: Vec<RuleRow> = table
            .rows()
            .iter()
            .map(|row| match self.get(&row.product_id, &row.recommended_product_id) {
                Some(entry) if entry.verification.is_set() => {
                    let mut row = row.clone().with_verification(entry.verification.clone());
                    if let Some(notes) = &entry.notes {
                        row = row.with_notes(notes.as_str());
                    }
                    row
                }
                _ => row.clone(),
            })
            .collect();
        table.replace_rows(rows)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofTemplateRow {
    pub product_id: String,
    pub recommended_product_id: String,
    pub verified: String,
    pub source: String,
    pub notes: String,
    pub search_url: String,
}

pub fn search_url(product_id: &str, recommended_id: &str) -> String {
    let query = format!("{recommended_id} compatible with {product_id}");
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{SEARCH_BASE}{encoded}")
}

/// One template row per distinct pair that needs proof, in table order.
/// Known proof state (from `existing` or the row itself) is carried over so
/// regenerating the template never discards a reviewer's work.
pub fn build_proofs_template(
    table: &RuleTable,
    rules: &FitRules,
    existing: Option<&ProofBook>,
) -> Vec<ProofTemplateRow> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut out = Vec::new();
    for row in table.rows() {
        let (product, target) = (
            row.product_id.as_str(),
            row.recommended_product_id.as_str(),
        );
        if row.is_keyword_rule()
            || row.kind == RuleKind::Category
            || !rules.requires_proof(product, target)
        {
            continue;
        }
        if !seen.insert((product, target)) {
            continue;
        }
        let (verification, notes) = match existing.and_then(|book| book.get(product, target)) {
            Some(entry) => (&entry.verification, entry.notes.as_deref()),
            None => (&row.verification, row.notes.as_deref()),
        };
        out.push(ProofTemplateRow {
            product_id: product.to_string(),
            recommended_product_id: target.to_string(),
            verified: verification.flag().to_string(),
            source: verification.source().unwrap_or("").to_string(),
            notes: notes.unwrap_or("").to_string(),
            search_url: search_url(product, target),
        });
    }
    out
}

pub fn write_proofs_template<W: Write>(
    rows: &[ProofTemplateRow],
    writer: W,
) -> Result<(), CompatError> {
    let mut out = WriterBuilder::new().from_writer(writer);
    out.write_record([
        COL_PRODUCT_ID,
        COL_RECOMMENDED_ID,
        COL_VERIFIED,
        COL_SOURCE,
        COL_NOTES,
        COL_SEARCH_URL,
    ])?;
    for row in rows {
        out.write_record([
            row.product_id.as_str(),
            row.recommended_product_id.as_str(),
            row.verified.as_str(),
            row.source.as_str(),
            row.notes.as_str(),
            row.search_url.as_str(),
        ])?;
    }
    out.flush()?;
    Ok(())
}
