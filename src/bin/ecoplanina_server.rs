//!
//! ecoplanina server binary
//! ------------------------
//! Command-line entry point for the credential-reset HTTP function. Configuration comes
//! from an optional JSON file, `ECOPLANINA_*` environment variables and CLI flags.

use anyhow::Result;
use std::env;

use ecoplanina::config::{has_flag, ServiceConfig, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Init logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let conf = ServiceConfig::load(&args)?;
    tracing::info!(
        target: "startup",
        "ecoplanina starting: RUST_LOG='{}', bind={}:{}, backend={:?}, locale={:?}, seed={:?}",
        rust_log, conf.bind_addr, conf.http_port, conf.backend, conf.locale, conf.seed_file
    );

    ecoplanina::server::run(conf).await
}
