use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use fbt_catalog_cache::BigCommerceCatalog;
use fbt_rule_sync::{sync_rules, Generator, SyncOptions, SyncReport, DEFAULT_PER_PRODUCT};

use crate::cli::context::CliContext;

/// Listing every product takes many pages; a serving-sized timeout is too short.
const MIN_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Args, Clone)]
pub struct SyncArgs {
    /// Rule file to regenerate
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Generate and report without writing the file
    #[arg(long)]
    pub dry_run: bool,

    /// Recommendations per product; the first three get a Priority
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PER_PRODUCT)]
    pub per_product: usize,
}

pub async fn cmd_sync(args: SyncArgs, ctx: &CliContext) -> Result<ExitCode> {
    let mut catalog_config = ctx.config().catalog_config();
    if !catalog_config.is_configured() {
        bail!("sync needs BigCommerce credentials (BC_ACCESS_TOKEN plus BC_API_PATH or BC_STORE_HASH)");
    }
    catalog_config.request_timeout = catalog_config.request_timeout.max(MIN_SYNC_TIMEOUT);
    let catalog =
        BigCommerceCatalog::new(&catalog_config).context("failed to build catalog client")?;

    let path = ctx.csv_path(args.csv.as_deref());
    let validator = ctx.config().validator()?;
    let generator = Generator::new(validator.rules()).with_options(SyncOptions {
        per_product: args.per_product.max(1),
    });
    let outcome = sync_rules(&catalog, &generator, &path, args.dry_run)
        .await
        .with_context(|| format!("failed to sync {}", path.display()))?;

    if ctx.output().is_human() {
        print_human(&outcome.report, &path);
    } else {
        ctx.output().print_structured(&outcome.report)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn print_human(report: &SyncReport, path: &std::path::Path) {
    println!("products:       {}", report.products);
    println!("explicit rows:  {}", report.explicit_rows);
    println!("category rows:  {}", report.category_rows);
    match &report.written {
        Some(written) => println!("written:        {}", written.display()),
        None => println!("dry run:        {} left unchanged", path.display()),
    }
    if let Some(backup) = &report.backup {
        println!("backup:         {}", backup.display());
    }
}
