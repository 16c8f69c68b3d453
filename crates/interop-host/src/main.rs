//! Interop host entry point.
//!
//! Publishes the host service on a named channel, announces `Starting` and
//! `Started` to subscribed plugins, and announces `Stopped` on Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! interop-host [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file [default: interop-host.toml]
//!   --log-level <FILTER>     Overrides `log_level` from the config
//!   --window-handle <HWND>   Main window handle reported to plugins
//! ```
//!
//! The channel name is printed on stdout so a plugin can be started with
//! `interop-plugin --channel <name>`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use interop_core::{HostContract, HostEvent, HostWindow};
use interop_host::{load_config, HostService};
use interop_ipc::{create_server, Service};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "interop-host", about = "Publishes the host service to plugins", version)]
struct Cli {
    /// Path to the TOML configuration file. A missing file means defaults.
    #[arg(long, default_value = "interop-host.toml", env = "INTEROP_HOST_CONFIG")]
    config: PathBuf,

    /// `tracing` filter, e.g. `debug` or `interop_ipc=trace`.
    #[arg(long, env = "INTEROP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Handle of the host's main window, announced in `Started`.
    #[arg(long)]
    window_handle: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // `RUST_LOG` wins over both the flag and the config file.
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let service = Arc::new(HostService::new(config.callbacks.proxy_options()));
    let mut channel = create_server::<HostContract>(
        Arc::clone(&service) as Arc<dyn Service<HostContract>>,
        config.ipc.server_options(),
    )
    .await
    .context("publishing host service")?;

    println!("{}", channel.channel_name());
    info!(endpoint = %channel.endpoint(), "host service published");

    service.notify_lifecycle(HostEvent::Starting).await;
    match cli.window_handle {
        Some(handle) => {
            let window = HostWindow::new(handle, std::process::id());
            service.notify_lifecycle(HostEvent::Started(window)).await;
        }
        None => warn!(
            "no main window handle given; HostInfo reports no window, so window- and \
             process-scoped plugin hotkeys stay inactive"
        ),
    }

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutdown signal received");

    service.notify_lifecycle(HostEvent::Stopped).await;
    channel.close();
    info!("host stopped");
    Ok(())
}
