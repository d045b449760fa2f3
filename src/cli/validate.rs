use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use fbt_compat_validator::{validate_file, ValidationMode};

use crate::cli::context::CliContext;

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Rule file to check
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Require a verified proof for every fit-sensitive pair
    #[arg(long, alias = "strict-compatibility", conflicts_with = "heuristic")]
    pub strict: bool,

    /// Accept brand or model overlap in place of a proof
    #[arg(long, alias = "allow-heuristic-fit")]
    pub heuristic: bool,

    /// Compatibility proofs CSV merged over the rule file
    #[arg(long, value_name = "FILE", alias = "compatibility-proofs")]
    pub proofs: Option<PathBuf>,

    /// Examples listed per category
    #[arg(long, default_value_t = 50)]
    pub max_output: usize,
}

/// Mode from the flags, falling back to the configured one.
pub(crate) fn resolve_mode(strict: bool, heuristic: bool, configured: ValidationMode) -> ValidationMode {
    if strict {
        ValidationMode::Strict
    } else if heuristic {
        ValidationMode::Heuristic
    } else {
        configured
    }
}

pub async fn cmd_validate(args: ValidateArgs, ctx: &CliContext) -> Result<ExitCode> {
    let path = ctx.csv_path(args.csv.as_deref());
    let proofs = ctx.proofs_path(args.proofs.as_deref());
    let mode = resolve_mode(args.strict, args.heuristic, ctx.config().validator.mode);
    let validator = ctx.config().validator()?;

    let report = tokio::task::spawn_blocking(move || {
        validate_file(&path, &validator, mode, proofs.as_deref())
            .with_context(|| format!("failed to validate {}", path.display()))
    })
    .await
    .context("validation task failed")??;

    if ctx.output().is_human() {
        print!("{}", report.render(args.max_output));
    } else {
        ctx.output().print_structured(&report)?;
    }

    Ok(if report.blocking() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
