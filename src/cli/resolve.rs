use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use fbt_resolver::{resolve_with, Recommendation, ResolveOptions};

use crate::cli::context::CliContext;

#[derive(Args, Clone)]
pub struct ResolveArgs {
    /// Cart product ids, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub products: Vec<String>,

    /// Maximum number of recommendations
    #[arg(long)]
    pub limit: Option<usize>,

    /// Read rules from this CSV instead of the configured source
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Let cart items without rules match bracketed keyword rules
    #[arg(long)]
    pub category_fallback: bool,
}

pub async fn cmd_resolve(args: ResolveArgs, ctx: &CliContext) -> Result<ExitCode> {
    let table = ctx.load_rules(args.csv.as_deref()).await?;
    let defaults = ctx.config().resolve_options();
    let options = ResolveOptions {
        limit: args.limit.unwrap_or(defaults.limit),
        category_fallback: args.category_fallback || defaults.category_fallback,
    };
    let cart: Vec<&str> = args
        .products
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    let recommendations = resolve_with(&cart, &table, &options);

    if ctx.output().is_human() {
        print_human(&cart, &recommendations);
    } else {
        ctx.output().print_structured(&recommendations)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn print_human(cart: &[&str], recommendations: &[Recommendation]) {
    println!("Cart: {}", cart.join(", "));
    if recommendations.is_empty() {
        println!("No recommendations.");
        return;
    }
    for (idx, rec) in recommendations.iter().enumerate() {
        let label = rec.label.as_deref().unwrap_or("-");
        println!(
            "{:>2}. {}  {}  [{}, from {}]",
            idx + 1,
            rec.product_id,
            label,
            rec.kind.as_str(),
            rec.matched_from
        );
    }
}
