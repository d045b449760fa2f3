use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};

pub async fn run() -> Result<ExitCode> {
    let cli = CliArgs::parse();
    init_logging(&cli.log_level, cli.debug, cli.log_json)?;
    load_local_env_overrides();

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_HASH"),
        built = env!("BUILD_DATE"),
        "fbt starting"
    );

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let cli_context = CliContext::new(config, path, cli.output);

    match dispatch(&cli, &cli_context).await {
        Ok(code) => Ok(code),
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
