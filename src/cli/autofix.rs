use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use fbt_compat_validator::{
    autofix_file, FileFixOptions, FileFixOutcome, FixAction, WriteTarget, DEFAULT_AUTOFIX_OUTPUT,
};

use crate::cli::context::CliContext;

#[derive(Args, Clone)]
pub struct AutofixArgs {
    /// Rule file to fix
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write the fixed rules here
    #[arg(long, value_name = "FILE", default_value = DEFAULT_AUTOFIX_OUTPUT, conflicts_with = "in_place")]
    pub out: PathBuf,

    /// Overwrite the rule file, keeping a timestamped .bak copy
    #[arg(long)]
    pub in_place: bool,

    /// Report what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Compatibility proofs CSV; verified entries are preferred as replacements
    #[arg(long, value_name = "FILE", alias = "compatibility-proofs")]
    pub proofs: Option<PathBuf>,

    /// Changes listed in the summary
    #[arg(long, default_value_t = 20)]
    pub max_output: usize,
}

pub async fn cmd_autofix(args: AutofixArgs, ctx: &CliContext) -> Result<ExitCode> {
    let path = ctx.csv_path(args.csv.as_deref());
    let validator = ctx.config().validator()?;
    let options = FileFixOptions {
        dry_run: args.dry_run,
        target: if args.in_place {
            WriteTarget::InPlace
        } else {
            WriteTarget::File(args.out.clone())
        },
        proofs: ctx.proofs_path(args.proofs.as_deref()),
    };

    let outcome = tokio::task::spawn_blocking(move || {
        autofix_file(&path, &validator, &options)
            .with_context(|| format!("failed to autofix {}", path.display()))
    })
    .await
    .context("autofix task failed")??;

    if ctx.output().is_human() {
        print_human(&outcome, args.max_output);
    } else {
        ctx.output().print_structured(&outcome.report)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn print_human(outcome: &FileFixOutcome, max_output: usize) {
    let report = &outcome.report;
    println!("Scanned rows: {}", report.scanned);
    println!("Replaced:     {}", report.replaced());
    println!("Removed:      {}", report.removed());
    for change in report.changes.iter().take(max_output) {
        let row = &change.original;
        match &change.action {
            FixAction::Replaced {
                replacement,
                verified,
            } => println!(
                "  row {}: {} -> {} replaced by {}{}",
                change.row_index + 1,
                row.product_id,
                row.recommended_product_id,
                replacement,
                if *verified { " (verified)" } else { "" }
            ),
            FixAction::Removed { reason } => println!(
                "  row {}: {} -> {} removed ({reason})",
                change.row_index + 1,
                row.product_id,
                row.recommended_product_id
            ),
        }
    }
    if report.changes.len() > max_output {
        println!("  ... {} more", report.changes.len() - max_output);
    }

    if report.dry_run {
        println!("Dry run: no files written.");
    }
    if let Some(backup) = &outcome.backup {
        println!("Backup: {}", backup.display());
    }
    if let Some(written) = &outcome.written {
        println!("Wrote:  {}", written.display());
    }
}
