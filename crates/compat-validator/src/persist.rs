//! Writes autofix results back to disk.
//!
//! The source file is re-read as raw CSV so columns and rows the table does
//! not model survive the rewrite. In-place writes copy the original to a
//! timestamped backup first; the new content lands in a temp file in the
//! destination directory and is renamed over the target.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use fbt_rule_model::parse_raw;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::info;

use crate::autofix::{AutofixReport, Autofixer};
use crate::classify::Validator;
use crate::errors::CompatError;
use crate::proofs::ProofBook;

pub const DEFAULT_AUTOFIX_OUTPUT: &str = "product_recommendations.autofixed.csv";

/// Serializes backup+write sequences within the process.
static WRITE_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteTarget {
    InPlace,
    File(PathBuf),
}

impl Default for WriteTarget {
    fn default() -> Self {
        WriteTarget::File(PathBuf::from(DEFAULT_AUTOFIX_OUTPUT))
    }
}

#[derive(Clone, Debug, Default)]
pub struct FileFixOptions {
    pub dry_run: bool,
    pub target: WriteTarget,
    pub proofs: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct FileFixOutcome {
    pub report: AutofixReport,
    pub written: Option<PathBuf>,
    pub backup: Option<PathBuf>,
}

/// `<file><ext>.<YYYYmmdd-HHMMSS>.bak` next to the original.
pub fn backup_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.bak", at.format("%Y%m%d-%H%M%S")));
    path.with_file_name(name)
}

pub fn autofix_file(
    path: &Path,
    validator: &Validator,
    options: &FileFixOptions,
) -> Result<FileFixOutcome, CompatError> {
    let text = fs::read_to_string(path)
        .map_err(|err| CompatError::Io(format!("{}: {err}", path.display())))?;
    let (raw, parsed) = parse_raw(&text)?;
    let book = match &options.proofs {
        Some(proofs) => ProofBook::load(proofs)?,
        None => ProofBook::default(),
    };
    let table = book.apply(&parsed.into_table());

    let fixer = Autofixer::new(validator).with_proofs(&book);
    let outcome = fixer.autofix(&table, options.dry_run);
    let report = outcome.report;
    if options.dry_run {
        return Ok(FileFixOutcome {
            report,
            written: None,
            backup: None,
        });
    }

    let edits = report.row_edits(Some(&book));
    let _guard = WRITE_GUARD.lock();
    let (dest, backup) = match &options.target {
        WriteTarget::InPlace => {
            let backup = backup_path(path, Local::now());
            fs::copy(path, &backup).map_err(|err| unwritable(&backup, err))?;
            (path.to_path_buf(), Some(backup))
        }
        WriteTarget::File(out) => (out.clone(), None),
    };

    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut staged = NamedTempFile::new_in(&dir).map_err(|err| unwritable(&dest, err))?;
    raw.rewrite(&mut staged, &edits)
        .map_err(|err| unwritable(&dest, err))?;
    staged
        .persist(&dest)
        .map_err(|err| unwritable(&dest, err.error))?;

    info!(
        dest = %dest.display(),
        replaced = report.replaced(),
        removed = report.removed(),
        backup = ?backup,
        "autofix written"
    );
    Ok(FileFixOutcome {
        report,
        written: Some(dest),
        backup,
    })
}

fn unwritable(path: &Path, err: impl std::fmt::Display) -> CompatError {
    CompatError::FileUnwritable {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
