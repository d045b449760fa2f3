use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use fbt_change_watcher::{ChangeWatcher, ValidateOnChange};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::context::CliContext;
use crate::cli::validate::resolve_mode;

#[derive(Args, Clone)]
pub struct WatchArgs {
    /// Rule file to watch
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Poll interval, e.g. "1s" or "500ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Quiet period after the last change before validating
    #[arg(long, value_parser = humantime::parse_duration)]
    pub settle: Option<Duration>,

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
    #[arg(long, default_value_t = 20)]
    pub max_output: usize,
}

pub async fn cmd_watch(args: WatchArgs, ctx: &CliContext) -> Result<ExitCode> {
    let mut config = ctx.config().watch_config(ctx.csv_path(args.csv.as_deref()));
    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    if let Some(settle) = args.settle {
        config.settle = settle;
    }
    let mode = resolve_mode(args.strict, args.heuristic, ctx.config().validator.mode);
    let validator = Arc::new(ctx.config().validator()?);
    let max_output = args.max_output;

    let mut handler = ValidateOnChange::new(validator, mode, move |path, result| match result {
        Ok(report) => {
            println!("\n== {} ==", path.display());
            print!("{}", report.render(max_output));
        }
        Err(err) => error!(%err, path = %path.display(), "validation failed"),
    });
    if let Some(proofs) = ctx.proofs_path(args.proofs.as_deref()) {
        handler = handler.with_proofs(proofs);
    }

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stopping watcher");
        }
        stop.cancel();
    });

    let stats = ChangeWatcher::new(config, handler)
        .run(cancel)
        .await
        .context("watcher stopped with an error")?;
    info!(
        validations = stats.validations,
        missing = stats.missing,
        "watch finished"
    );
    Ok(ExitCode::SUCCESS)
}
