use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use multiplex_core::{ExecParams, Service, ServiceController};
use tracing_subscriber::prelude::*;

use multiplex_demo::config::DemoConfig;
use multiplex_demo::services::{Echo, Hash, Random, Shutdown};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path of an optional TOML config file.
    #[clap(short, long, value_parser)]
    config: Option<String>,
}

#[monoio::main(timer_enabled = true)]
async fn main() -> Result<()> {
    let debug_layer = Arc::new(multiplex_core::diag::DebugLayer::new(64));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(debug_layer.clone())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = DemoConfig::load(args.config).await?;

    let controller = ServiceController::new();

    let echo = Echo::new();
    echo.core().set_router(controller.router());
    echo.core().set_worker(1).await;
    controller.register(echo.clone());

    let random = Random::new();
    random.core().set_router(controller.router());
    random.core().set_worker(1).await;
    controller.register(random.clone());

    let hash = Hash::new();
    hash.core().set_router(controller.router());
    hash.core().set_worker(1).await;
    controller.register(hash.clone());

    let shutdown = Shutdown::new(Duration::from_millis(config.shutdown_delay_ms));
    shutdown.core().set_router(controller.router());
    shutdown.core().set_worker(1).await;
    controller.register(shutdown.clone());

    let mut greeting = ExecParams::new();
    greeting.set("message", Arc::new("Hello, World!".to_string()));
    controller.dispatch("Echo", "", Some(greeting)).await;

    controller.dispatch("Hash", "sha256_random", None).await;

    controller.dispatch("Shutdown", "", None).await;

    controller.run(config.background).await;

    tracing::info!(
        "multiplex-demo exiting; last captured log: {}",
        debug_layer.last_message()
    );
    Ok(())
}
