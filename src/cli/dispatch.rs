use std::process::ExitCode;

use anyhow::Result;

use super::autofix::cmd_autofix;
use super::commands::Commands;
use super::context::CliContext;
use super::env::CliArgs;
use super::proofs::cmd_proofs_template;
use super::refresh::cmd_refresh;
use super::resolve::cmd_resolve;
use super::serve::cmd_serve;
use super::sync::cmd_sync;
use super::validate::cmd_validate;
use super::watch::cmd_watch;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<ExitCode> {
    match cli.command.clone() {
        Commands::Serve(args) => cmd_serve(args, ctx).await,
        Commands::Resolve(args) => cmd_resolve(args, ctx).await,
        Commands::Refresh(args) => cmd_refresh(args, ctx).await,
        Commands::Validate(args) => cmd_validate(args, ctx).await,
        Commands::Autofix(args) => cmd_autofix(args, ctx).await,
        Commands::Watch(args) => cmd_watch(args, ctx).await,
        Commands::ProofsTemplate(args) => cmd_proofs_template(args, ctx).await,
        Commands::Sync(args) => cmd_sync(args, ctx).await,
    }
}
