use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use fbt_rule_source::{HealthView, RuleSource, RuleSourceManager};

use crate::cli::context::CliContext;

#[derive(Args, Clone)]
pub struct RefreshArgs {
    /// Local CSV path (replaces the configured URL and path)
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Remote CSV URL, tried before the local file
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn cmd_refresh(args: RefreshArgs, ctx: &CliContext) -> Result<ExitCode> {
    let mut source = ctx.source_config(args.csv.as_deref());
    if let Some(url) = args.url {
        source = source.with_remote(url);
    }
    let manager = RuleSourceManager::new(source, ctx.http_fetcher()?);
    let outcome = manager.refresh_now().await;
    let health = manager.health();

    if ctx.output().is_human() {
        print_human(ctx, &health);
    } else {
        ctx.output().print_structured(&health)?;
    }

    match outcome {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("refresh failed: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_human(ctx: &CliContext, health: &HealthView) {
    println!("config:      {}", ctx.config_path().display());
    println!("source:      {}", health.source);
    println!(
        "remote url:  {}",
        health.remote_url.as_deref().unwrap_or("(none)")
    );
    println!(
        "local path:  {}",
        health.local_path.as_deref().unwrap_or("(none)")
    );
    println!("rows:        {}", health.rows);
    println!("products:    {}", health.products);
    println!("warnings:    {}", health.row_warnings);
    if let Some(at) = health.last_success_at {
        println!("loaded at:   {}", at.to_rfc3339());
    }
    if let Some(err) = &health.last_error {
        println!("last error:  {err}");
    }
}
