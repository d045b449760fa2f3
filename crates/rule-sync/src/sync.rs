use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use fbt_catalog_cache::ListingSource;
use fbt_compat_validator::backup_path;
use fbt_rule_model::{parse_rules, write_rules, RuleKind, RuleTable};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::errors::SyncError;
use crate::generate::Generator;

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    /// In-stock products the listing returned.
    pub products: usize,
    pub explicit_rows: usize,
    /// Category rows carried over from the previous file.
    pub category_rows: usize,
    pub dry_run: bool,
    pub written: Option<PathBuf>,
    pub backup: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct SyncOutcome {
    pub report: SyncReport,
    pub table: RuleTable,
}

/// Regenerates the rule file at `path` from the catalog listing.
///
/// An empty listing is an error and leaves the file alone. An existing file
/// is copied to a timestamped backup, then replaced through a temp file in
/// the same directory.
pub async fn sync_rules(
    source: &dyn ListingSource,
    generator: &Generator<'_>,
    path: &Path,
    dry_run: bool,
) -> Result<SyncOutcome, SyncError> {
    let products = source.fetch_listing().await?;
    if products.is_empty() {
        return Err(SyncError::EmptyCatalog);
    }
    let existing = read_existing(path).await?;
    let table = generator.generate(&products, &existing);

    let category_rows = table
        .rows()
        .iter()
        .filter(|row| row.kind == RuleKind::Category)
        .count();
    let mut report = SyncReport {
        products: products.len(),
        explicit_rows: table.len() - category_rows,
        category_rows,
        dry_run,
        written: None,
        backup: None,
    };
    if dry_run {
        return Ok(SyncOutcome { report, table });
    }

    let dest = path.to_path_buf();
    let staged = table.clone();
    let backup = tokio::task::spawn_blocking(move || write_table(&dest, &staged))
        .await
        .map_err(|err| unwritable(path, err))??;
    info!(
        path = %path.display(),
        products = report.products,
        rows = table.len(),
        backup = ?backup,
        "rule file synced from catalog"
    );
    report.written = Some(path.to_path_buf());
    report.backup = backup;
    Ok(SyncOutcome { report, table })
}

async fn read_existing(path: &Path) -> Result<RuleTable, SyncError> {
    let existing = |reason: String| SyncError::Existing {
        path: path.display().to_string(),
        reason,
    };
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse_rules(&text)
            .map(|parsed| parsed.into_table())
            .map_err(|err| existing(err.to_string())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuleTable::empty()),
        Err(err) => Err(existing(err.to_string())),
    }
}

fn write_table(path: &Path, table: &RuleTable) -> Result<Option<PathBuf>, SyncError> {
    let backup = if path.exists() {
        let backup = backup_path(path, Local::now());
        fs::copy(path, &backup).map_err(|err| unwritable(&backup, err))?;
        Some(backup)
    } else {
        None
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut staged = NamedTempFile::new_in(&dir).map_err(|err| unwritable(path, err))?;
    write_rules(table, &mut staged).map_err(|err| unwritable(path, err))?;
    staged
        .persist(path)
        .map_err(|err| unwritable(path, err.error))?;
    Ok(backup)
}

fn unwritable(path: &Path, err: impl std::fmt::Display) -> SyncError {
    SyncError::Unwritable {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
