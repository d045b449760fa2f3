use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use fbt_catalog_cache::{BigCommerceCatalog, CatalogCache, CatalogSource};
use fbt_rule_source::{RuleSource, RuleSourceManager};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::config::AppConfig;
use crate::server::{build_router, ServeState};

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Port to listen on (overrides config and PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<IpAddr>,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<ExitCode> {
    let config = ctx.config();
    let manager = RuleSourceManager::bootstrap(config.source_config(), ctx.http_fetcher()?).await;
    let cancel = CancellationToken::new();
    let refresh_task = manager.spawn_refresh_loop(cancel.clone());

    let rules: Arc<dyn RuleSource> = manager;
    let catalog = Arc::new(build_catalog(config));
    let state = ServeState::new(rules, catalog, config.resolve_options());
    let router = build_router().with_state(state);

    let default_addr = config.bind_addr();
    let addr = SocketAddr::new(
        args.host.unwrap_or(default_addr.ip()),
        args.port.unwrap_or(default_addr.port()),
    );
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind recommendation API on {addr}"))?;
    info!(%addr, "recommendation API listening");

    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await
        .context("recommendation API exited unexpectedly")?;

    cancel.cancel();
    if let Err(err) = refresh_task.await {
        warn!(?err, "refresh timer ended abnormally");
    }
    Ok(ExitCode::SUCCESS)
}

/// BigCommerce-backed cache when credentials are present; otherwise one that
/// only synthesizes storefront links.
pub fn build_catalog(config: &AppConfig) -> CatalogCache {
    let catalog_config = config.catalog_config();
    if !catalog_config.is_configured() {
        info!("catalog credentials not set; catalog entries will be synthesized");
        return CatalogCache::offline(config.storefront());
    }
    match BigCommerceCatalog::new(&catalog_config) {
        Ok(source) => {
            let source: Arc<dyn CatalogSource> = Arc::new(source);
            CatalogCache::new(Some(source), catalog_config.ttl, config.storefront())
        }
        Err(err) => {
            warn!(%err, "catalog source unavailable; entries will be synthesized");
            CatalogCache::offline(config.storefront())
        }
    }
}
