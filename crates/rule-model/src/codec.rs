//! CSV reader and writer for the rule table.
//!
//! Columns are matched by header name, so editors may reorder them or add
//! their own. Required: `Product ID`, `Recommended Product ID`.

use std::collections::HashMap;
use std::io::Write;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use tracing::debug;

use crate::errors::ModelError;
use crate::model::{Priority, RowIssue, RowWarning, RuleKind, RuleRow, RuleTable, Verification};

pub const COL_PRODUCT_ID: &str = "Product ID";
pub const COL_RECOMMENDED_ID: &str = "Recommended Product ID";
pub const COL_LABEL: &str = "Label";
pub const COL_TYPE: &str = "Type";
pub const COL_PRIORITY: &str = "Priority";
pub const COL_VERIFIED: &str = "Compatibility Verified";
pub const COL_SOURCE: &str = "Compatibility Source";
pub const COL_NOTES: &str = "Compatibility Notes";

const TRUE_FLAGS: &[&str] = &["yes", "y", "true", "1", "verified"];
const FALSE_FLAGS: &[&str] = &["no", "n", "false", "0"];

/// Result of reading a rule CSV: the accepted rows in source order plus the
/// per-row warnings. Rejected rows never reach `rows`.
#[derive(Clone, Debug, Default)]
pub struct ParsedRules {
    pub rows: Vec<RuleRow>,
    pub warnings: Vec<RowWarning>,
    pub proof_columns: bool,
}

impl ParsedRules {
    pub fn rejected(&self) -> usize {
        self.warnings
            .iter()
            .filter(|warning| warning.issue.rejects_row())
            .count()
    }

    pub fn into_table(self) -> RuleTable {
        RuleTable::from_rows(self.rows)
            .with_warnings(self.warnings)
            .with_proof_columns(self.proof_columns)
    }
}

#[derive(Clone, Debug)]
struct Columns {
    product_id: usize,
    recommended: usize,
    label: Option<usize>,
    kind: Option<usize>,
    priority: Option<usize>,
    verified: Option<usize>,
    source: Option<usize>,
    notes: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, ModelError> {
        let names: Vec<String> = headers
            .iter()
            .map(|name| name.trim_start_matches('\u{feff}').trim().to_ascii_lowercase())
            .collect();
        let find = |wanted: &str| {
            let wanted = wanted.to_ascii_lowercase();
            names.iter().position(|name| *name == wanted)
        };

        let product_id = find(COL_PRODUCT_ID);
        let recommended = find(COL_RECOMMENDED_ID);
        let (product_id, recommended) = match (product_id, recommended) {
            (Some(p), Some(r)) => (p, r),
            (p, r) => {
                let mut missing = Vec::new();
                if p.is_none() {
                    missing.push(COL_PRODUCT_ID);
                }
                if r.is_none() {
                    missing.push(COL_RECOMMENDED_ID);
                }
                return Err(ModelError::MissingColumns(missing.join(", ")));
            }
        };

        Ok(Self {
            product_id,
            recommended,
            label: find(COL_LABEL),
            kind: find(COL_TYPE),
            priority: find(COL_PRIORITY),
            verified: find(COL_VERIFIED),
            source: find(COL_SOURCE),
            notes: find(COL_NOTES),
        })
    }

    fn has_proof_columns(&self) -> bool {
        self.verified.is_some() || self.source.is_some() || self.notes.is_some()
    }
}

fn field<'r>(record: &'r StringRecord, column: Option<usize>) -> &'r str {
    column
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .unwrap_or("")
}

/// Parses rule CSV text. Only a missing header or missing required column is
/// fatal; every row-level problem becomes a [`RowWarning`].
pub fn parse_rules(input: &str) -> Result<ParsedRules, ModelError> {
    parse_raw(input).map(|(_, parsed)| parsed)
}

/// One CSV record as read, with the index of the table row it became
/// (`None` for rejected or blank records).
#[derive(Clone, Debug)]
pub struct RawRecord {
    pub record: StringRecord,
    pub row_index: Option<usize>,
}

/// The file exactly as read, used to rewrite it without losing extra columns
/// or rows the table rejected.
#[derive(Clone, Debug)]
pub struct RawRules {
    pub headers: StringRecord,
    pub records: Vec<RawRecord>,
    columns: Columns,
}

/// Edit applied to one accepted row when rewriting a [`RawRules`] file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowEdit {
    /// Point the row at a new target. The proof cells describe the new pair,
    /// so they are replaced wherever the file has those columns.
    Retarget {
        target: String,
        verification: Verification,
        notes: Option<String>,
    },
    Drop,
}

impl RawRules {
    pub fn rewrite<W: Write>(
        &self,
        writer: W,
        edits: &HashMap<usize, RowEdit>,
    ) -> Result<(), ModelError> {
        let mut out = WriterBuilder::new().flexible(true).from_writer(writer);
        out.write_record(&self.headers)?;
        for raw in &self.records {
            match raw.row_index.and_then(|idx| edits.get(&idx)) {
                Some(RowEdit::Drop) => continue,
                Some(RowEdit::Retarget {
                    target,
                    verification,
                    notes,
                }) => {
                    let mut cells: Vec<&str> = raw.record.iter().collect();
                    let columns = &self.columns;
                    set_cell(&mut cells, Some(columns.recommended), target);
                    set_cell(&mut cells, columns.verified, verification.flag());
                    set_cell(&mut cells, columns.source, verification.source().unwrap_or(""));
                    set_cell(&mut cells, columns.notes, notes.as_deref().unwrap_or(""));
                    out.write_record(&cells)?;
                }
                None => out.write_record(&raw.record)?,
            }
        }
        out.flush()?;
        Ok(())
    }
}

fn set_cell<'a>(cells: &mut Vec<&'a str>, column: Option<usize>, value: &'a str) {
    let Some(column) = column else {
        return;
    };
    if column >= cells.len() {
        if value.is_empty() {
            return;
        }
        cells.resize(column + 1, "");
    }
    cells[column] = value;
}

/// Parses rule CSV text and keeps the raw records alongside the table rows.
pub fn parse_raw(input: &str) -> Result<(RawRules, ParsedRules), ModelError> {
    let input = input.trim_start_matches('\u{feff}');
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|name| name.trim().is_empty()) {
        return Err(ModelError::MissingColumns(format!(
            "{COL_PRODUCT_ID}, {COL_RECOMMENDED_ID}"
        )));
    }
    let columns = Columns::from_headers(&headers)?;

    let mut parsed = ParsedRules {
        proof_columns: columns.has_proof_columns(),
        ..ParsedRules::default()
    };
    let mut raw = RawRules {
        headers,
        records: Vec::new(),
        columns: columns.clone(),
    };

    for (idx, result) in reader.records().enumerate() {
        let fallback_line = idx as u64 + 2;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err
                    .position()
                    .map(|pos| pos.line())
                    .unwrap_or(fallback_line);
                parsed.warnings.push(RowWarning {
                    line,
                    issue: RowIssue::Unreadable(err.to_string()),
                });
                continue;
            }
        };
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(fallback_line);
        if record.iter().all(|value| value.trim().is_empty()) {
            raw.records.push(RawRecord {
                record,
                row_index: None,
            });
            continue;
        }
        let row_index = match parse_row(&record, &columns) {
            Ok((row, soft_issues)) => {
                for issue in soft_issues {
                    parsed.warnings.push(RowWarning { line, issue });
                }
                parsed.rows.push(row);
                Some(parsed.rows.len() - 1)
            }
            Err(issue) => {
                debug!(line, %issue, "rejected rule row");
                parsed.warnings.push(RowWarning { line, issue });
                None
            }
        };
        raw.records.push(RawRecord { record, row_index });
    }

    Ok((raw, parsed))
}

fn parse_row(
    record: &StringRecord,
    columns: &Columns,
) -> Result<(RuleRow, Vec<RowIssue>), RowIssue> {
    let product_id = field(record, Some(columns.product_id));
    let recommended = field(record, Some(columns.recommended));
    if product_id.is_empty() {
        return Err(RowIssue::MissingProductId);
    }
    if recommended.is_empty() {
        return Err(RowIssue::MissingRecommendedId);
    }
    if product_id == recommended {
        return Err(RowIssue::SelfRecommendation(product_id.to_string()));
    }
    let kind: RuleKind = field(record, columns.kind)
        .parse()
        .map_err(RowIssue::UnknownKind)?;

    let mut soft_issues = Vec::new();
    let (verification, verification_issue) = parse_verification(
        field(record, columns.verified),
        field(record, columns.source),
    );
    soft_issues.extend(verification_issue);

    let priority = match field(record, columns.priority) {
        "" => None,
        text => match text.parse::<Priority>() {
            Ok(priority) => Some(priority),
            Err(_) => {
                soft_issues.push(RowIssue::UnknownPriority(text.to_string()));
                None
            }
        },
    };

    let row = RuleRow::new(product_id, recommended, kind)
        .with_label(field(record, columns.label))
        .with_priority(priority)
        .with_verification(verification)
        .with_notes(field(record, columns.notes));
    Ok((row, soft_issues))
}

fn parse_verification(flag: &str, source: &str) -> (Verification, Option<RowIssue>) {
    let flag = flag.to_ascii_lowercase();
    let source = (!source.is_empty()).then(|| source.to_string());
    if TRUE_FLAGS.contains(&flag.as_str()) {
        match source {
            Some(source) => (Verification::Verified { source }, None),
            None => (Verification::Unset, Some(RowIssue::VerifiedWithoutSource)),
        }
    } else if FALSE_FLAGS.contains(&flag.as_str()) {
        (Verification::Rejected { source }, None)
    } else {
        (Verification::Unset, None)
    }
}

/// Writes the table in source order. `Priority` is emitted when any row has
/// one; proof columns when the table was loaded with them or any row carries
/// verification data.
pub fn write_rules<W: Write>(table: &RuleTable, writer: W) -> Result<(), ModelError> {
    let mut out = WriterBuilder::new().from_writer(writer);
    let proof_columns = table.has_proof_columns();
    let priority_column = table.rows().iter().any(|row| row.priority.is_some());
    let mut header = vec![COL_PRODUCT_ID, COL_RECOMMENDED_ID, COL_LABEL, COL_TYPE];
    if priority_column {
        header.push(COL_PRIORITY);
    }
    if proof_columns {
        header.extend([COL_VERIFIED, COL_SOURCE, COL_NOTES]);
    }
    out.write_record(&header)?;

    for row in table.rows() {
        let mut record = vec![
            row.product_id.as_str(),
            row.recommended_product_id.as_str(),
            row.label.as_deref().unwrap_or(""),
            row.kind.as_str(),
        ];
        if priority_column {
            record.push(row.priority.map(Priority::as_str).unwrap_or(""));
        }
        if proof_columns {
            record.push(row.verification.flag());
            record.push(row.verification.source().unwrap_or(""));
            record.push(row.notes.as_deref().unwrap_or(""));
        }
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(())
}

pub fn rules_to_string(table: &RuleTable) -> Result<String, ModelError> {
    let mut buffer = Vec::new();
    write_rules(table, &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| ModelError::Csv(err.to_string()))
}
