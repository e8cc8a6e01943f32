//! Bridge Host
//!
//! Serves controllers to a UI process over stdin/stdout, or runs an
//! in-process demo session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bridge::bridge_runtime::ControllerHost;
use bridge::config::BridgeConfig;
use bridge::demo::{register_demo_controllers, run_loopback};
use bridge::server::BridgeServer;

/// Bridge Host
#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(about = "Controller binding host", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "bridge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the demo controllers over stdin/stdout
    Serve,
    /// Run a UI runtime and a host in this process and log the sync traffic
    Demo,
}

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();
    let config = BridgeConfig::load(&args.config).await?;

    // stdout carries IPC frames, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting bridge v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Serve => {
            let host = Arc::new(ControllerHost::new(config.bridge.naming));
            register_demo_controllers(&host);
            info!("Controllers: {:?}", host.controller_names());

            let server = BridgeServer::new(host, config.ipc.max_frame_len);
            server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
        }
        Command::Demo => {
            run_loopback(&config).await?;
        }
    }

    info!("Bridge stopped");
    Ok(())
}
