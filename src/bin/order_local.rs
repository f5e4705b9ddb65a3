use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use lcod_order_local::config::{KernelConfig, LogLevel};
use lcod_order_local::step::contract::CONTRACT_ORDER_LOCAL;
use lcod_order_local::tooling::{load_document, route_logs_to_stderr};
use lcod_order_local::default_registry;

#[derive(Parser, Debug)]
#[command(name = "order-local")]
#[command(about = "Reorder the inside of items with local order rules")]
struct CliOptions {
    /// Document with `item` or `items` and optional `by` rules (YAML/JSON, '-' for stdin)
    #[arg(long = "input", short = 'i', default_value = "-")]
    input: PathBuf,

    /// Seed for shuffle orderings (overrides LCOD_SHUFFLE_SEED)
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Minimum log level (overrides LCOD_LOG_LEVEL)
    #[arg(long = "log-level")]
    log_level: Option<LogLevel>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opts = CliOptions::parse();

    let mut config = KernelConfig::from_env()?;
    if let Some(seed) = opts.seed {
        config = config.with_shuffle_seed(seed);
    }
    if let Some(level) = opts.log_level {
        config = config.with_log_level(level);
    }

    let document = load_document(&opts.input)?;
    if document.get("item").is_none() && document.get("items").is_none() {
        return Err(anyhow!("document must contain `item` or `items`"));
    }

    let registry = default_registry(config);
    // stdout carries the result document only
    route_logs_to_stderr(&registry);
    let mut ctx = registry.context();
    let token = ctx.cancellation_token();
    ctrlc::set_handler(move || {
        token.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .context("unable to install Ctrl+C handler")?;

    let result = ctx
        .call(CONTRACT_ORDER_LOCAL, document, None)
        .with_context(|| "local ordering failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
