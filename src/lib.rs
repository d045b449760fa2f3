//! `fbt`: frequently-bought-together recommendations for the storefront.
//!
//! The library crates under `crates/` hold the rule model, the rule source,
//! the resolver, the compatibility validator, the change watcher and the
//! catalog cache. This crate wires them into a CLI and a small HTTP API.

pub mod cli;
pub mod config;
pub mod server;

pub use config::AppConfig;
pub use server::{build_router, ServeState};
