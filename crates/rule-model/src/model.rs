use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How strong a pairing is. Explicit rows are curated per product, category
/// rows are broad fallbacks and rank below explicit rows for the same target.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Explicit,
    Category,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "Explicit",
            Self::Category => "Category",
        }
    }
}

impl Default for RuleKind {
    fn default() -> Self {
        Self::Category
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "category" => Ok(Self::Category),
            "explicit" => Ok(Self::Explicit),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank of a row among its product's rows, as written by the catalog sync.
/// Files carry it in the `Priority` column; serving order stays source order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Primary,
    Secondary,
    Tertiary,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::Primary, Self::Secondary, Self::Tertiary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::Secondary => "Secondary",
            Self::Tertiary => "Tertiary",
        }
    }

    /// Priority of the `rank`-th pick (0-based); `None` past the third.
    pub fn from_rank(rank: usize) -> Option<Self> {
        Self::ALL.get(rank).copied()
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" | "1" => Ok(Self::Primary),
            "secondary" | "2" => Ok(Self::Secondary),
            "tertiary" | "3" => Ok(Self::Tertiary),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compatibility proof state of a row.
///
/// `Unset` means nobody has looked; `Rejected` means a reviewer explicitly
/// answered "no". Only `Verified` carries a source, and the source is never
/// empty.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Verification {
    #[default]
    Unset,
    Verified {
        source: String,
    },
    Rejected {
        source: Option<String>,
    },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Verified { source } => Some(source.as_str()),
            Self::Rejected { source } => source.as_deref(),
            Self::Unset => None,
        }
    }

    /// Value written to the `Compatibility Verified` column.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Verified { .. } => "yes",
            Self::Rejected { .. } => "no",
            Self::Unset => "",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleRow {
    pub product_id: String,
    pub recommended_product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: RuleKind,
    #[serde(default)]
    pub verification: Verification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl RuleRow {
    pub fn new(
        product_id: impl Into<String>,
        recommended_product_id: impl Into<String>,
        kind: RuleKind,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            recommended_product_id: recommended_product_id.into(),
            label: None,
            kind,
            verification: Verification::Unset,
            notes: None,
            priority: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = if label.trim().is_empty() {
            None
        } else {
            Some(label)
        };
        self
    }

    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.verification = verification;
        self
    }

    pub fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.trim().is_empty() {
            None
        } else {
            Some(notes)
        };
        self
    }

    /// Keywords of a bracketed category rule such as
    /// `[helmet | visor | shield] (any product)`. `None` for plain product ids.
    pub fn category_keywords(&self) -> Option<Vec<String>> {
        parse_category_keywords(&self.product_id)
    }

    pub fn is_keyword_rule(&self) -> bool {
        is_keyword_product_id(&self.product_id)
    }
}

pub fn is_keyword_product_id(product_id: &str) -> bool {
    let trimmed = product_id.trim();
    trimmed.starts_with('[') && trimmed.contains(']')
}

fn parse_category_keywords(product_id: &str) -> Option<Vec<String>> {
    let trimmed = product_id.trim();
    if !is_keyword_product_id(trimmed) {
        return None;
    }
    let end = trimmed.find(']')?;
    let keywords: Vec<String> = trimmed[1..end]
        .split('|')
        .map(|part| part.trim().to_ascii_lowercase())
        .filter(|part| !part.is_empty())
        .collect();
    if keywords.is_empty() {
        None
    } else {
        Some(keywords)
    }
}

/// Where a snapshot came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    /// Placeholder served before the first successful load.
    Unloaded,
    Remote,
    Local,
    LocalFallback,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Remote => "remote",
            Self::Local => "local",
            Self::LocalFallback => "local-fallback",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a CSV row was rejected or flagged while loading.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "issue", content = "detail", rename_all = "snake_case")]
pub enum RowIssue {
    MissingProductId,
    MissingRecommendedId,
    SelfRecommendation(String),
    UnknownKind(String),
    Unreadable(String),
    /// Marked verified without a source; the row is kept as unverified.
    VerifiedWithoutSource,
    /// Priority text that is not Primary/Secondary/Tertiary; the row is kept
    /// without a priority.
    UnknownPriority(String),
}

impl RowIssue {
    pub fn rejects_row(&self) -> bool {
        !matches!(self, Self::VerifiedWithoutSource | Self::UnknownPriority(_))
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingProductId => f.write_str("missing Product ID"),
            Self::MissingRecommendedId => f.write_str("missing Recommended Product ID"),
            Self::SelfRecommendation(id) => write!(f, "self-recommendation is not allowed ({id})"),
            Self::UnknownKind(kind) => write!(f, "unknown Type '{kind}'"),
            Self::Unreadable(err) => write!(f, "unreadable record: {err}"),
            Self::VerifiedWithoutSource => {
                f.write_str("marked verified without a Compatibility Source")
            }
            Self::UnknownPriority(value) => write!(f, "unknown Priority '{value}'"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowWarning {
    pub line: u64,
    pub issue: RowIssue,
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.line, self.issue)
    }
}

/// Immutable snapshot of the rule rows.
///
/// Rows keep source order; `index` maps each product id to the positions of
/// its rows in that order.
#[derive(Clone, Debug)]
pub struct RuleTable {
    rows: Vec<RuleRow>,
    index: HashMap<String, Vec<usize>>,
    source: SourceTag,
    loaded_at: Option<DateTime<Utc>>,
    warnings: Vec<RowWarning>,
    proof_columns: bool,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl RuleTable {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
            source: SourceTag::Unloaded,
            loaded_at: None,
            warnings: Vec::new(),
            proof_columns: false,
        }
    }

    pub fn from_rows(rows: Vec<RuleRow>) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, row) in rows.iter().enumerate() {
            index.entry(row.product_id.clone()).or_default().push(pos);
        }
        let proof_columns = rows
            .iter()
            .any(|row| row.verification.is_set() || row.notes.is_some());
        Self {
            rows,
            index,
            source: SourceTag::Unloaded,
            loaded_at: None,
            warnings: Vec::new(),
            proof_columns,
        }
    }

    pub fn tagged(mut self, source: SourceTag, loaded_at: DateTime<Utc>) -> Self {
        self.source = source;
        self.loaded_at = Some(loaded_at);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<RowWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_proof_columns(mut self, proof_columns: bool) -> Self {
        self.proof_columns = self.proof_columns || proof_columns;
        self
    }

    /// Rebuilds the table around a new row list, keeping source metadata.
    pub fn replace_rows(&self, rows: Vec<RuleRow>) -> Self {
        let mut next = Self::from_rows(rows)
            .with_warnings(self.warnings.clone())
            .with_proof_columns(self.proof_columns);
        next.source = self.source;
        next.loaded_at = self.loaded_at;
        next
    }

    pub fn rows(&self) -> &[RuleRow] {
        &self.rows
    }

    pub fn rows_for<'a>(&'a self, product_id: &str) -> impl Iterator<Item = &'a RuleRow> + 'a {
        self.index
            .get(product_id)
            .map(|positions| positions.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |pos| &self.rows[*pos])
    }

    pub fn contains_product(&self, product_id: &str) -> bool {
        self.index.contains_key(product_id)
    }

    /// Bracketed keyword rules in first-appearance order, grouped per product id.
    pub fn keyword_rules(&self) -> Vec<(Vec<String>, Vec<&RuleRow>)> {
        let mut order: Vec<&str> = Vec::new();
        for row in &self.rows {
            if row.is_keyword_rule() && !order.contains(&row.product_id.as_str()) {
                order.push(row.product_id.as_str());
            }
        }
        order
            .into_iter()
            .filter_map(|product_id| {
                let rows: Vec<&RuleRow> = self.rows_for(product_id).collect();
                let keywords = rows.first()?.category_keywords()?;
                Some((keywords, rows))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn product_count(&self) -> usize {
        self.index.len()
    }

    pub fn source(&self) -> SourceTag {
        self.source
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn warnings(&self) -> &[RowWarning] {
        &self.warnings
    }

    pub fn has_proof_columns(&self) -> bool {
        self.proof_columns
    }
}
