use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use fbt_compat_validator::{build_proofs_template, write_proofs_template, ProofBook};

use crate::cli::context::CliContext;

#[derive(Args, Clone)]
pub struct ProofsTemplateArgs {
    /// Rule file to scan
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Worksheet to write; existing entries in it are carried over
    #[arg(long, value_name = "FILE", default_value = "compatibility_proofs.csv")]
    pub out: PathBuf,
}

pub async fn cmd_proofs_template(args: ProofsTemplateArgs, ctx: &CliContext) -> Result<ExitCode> {
    let table = ctx.load_rules(args.csv.as_deref()).await?;
    let validator = ctx.config().validator()?;
    let existing = if args.out.exists() {
        Some(ProofBook::load(&args.out).context("failed to read existing proofs")?)
    } else {
        None
    };

    let rows = build_proofs_template(&table, validator.rules(), existing.as_ref());
    let file = File::create(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    write_proofs_template(&rows, file).context("failed to write proofs template")?;

    println!("Wrote {} proof rows to {}", rows.len(), args.out.display());
    Ok(ExitCode::SUCCESS)
}
