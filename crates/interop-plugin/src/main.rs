//! Interop plugin entry point.
//!
//! Connects to a running host, follows its lifecycle, and binds two sample
//! actions:
//!
//! - `ping_host` (default `Ctrl+Alt+P`, process scope) pings the host.
//! - `show_host_window` (default `Ctrl+Alt+H`, window scope) logs the tracked
//!   host window.
//!
//! Exits on Ctrl-C or when the host announces `Stopped`.
//!
//! # Usage
//!
//! ```text
//! interop-plugin --channel <NAME> [--config <PATH>] [--log-level <FILTER>]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use interop_core::{HostEvent, HostRequest, HotKey, HotKeyScope};
use interop_hook::{Desktop, HookInstaller, KeyboardHookEngine, ScopeResolver};
use interop_plugin::{load_config, HotKeyBindings, PluginConfig, PluginSession};
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "interop-plugin", about = "Sample plugin for the interop host", version)]
struct Cli {
    /// Channel name the host printed at startup.
    #[arg(long, env = "INTEROP_HOST_CHANNEL")]
    channel: String,

    /// Path to the TOML configuration file. A missing file means defaults.
    #[arg(long, default_value = "interop-plugin.toml", env = "INTEROP_PLUGIN_CONFIG")]
    config: PathBuf,

    /// `tracing` filter, e.g. `debug` or `interop_hook=trace`.
    #[arg(long, env = "INTEROP_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut session = PluginSession::connect(&cli.channel, config.session_options())
        .await
        .with_context(|| format!("connecting to host channel {}", cli.channel))?;
    let mut events = session.events();

    let hotkeys = match platform_hook() {
        Some((installer, desktop)) => {
            Some(start_hotkeys(&session, &config, installer.as_ref(), desktop)?)
        }
        None => {
            warn!("no system keyboard hook on this platform; hotkeys disabled");
            None
        }
    };

    info!("plugin ready.  Press Ctrl-C to exit.");
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl-C")?;
                info!("shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Ok(HostEvent::Stopped) => {
                    info!("host stopped; exiting");
                    break;
                }
                Ok(event) => debug!(event = event.kind().as_str(), "host event"),
                Err(RecvError::Lagged(missed)) => warn!(missed, "host events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Some((engine, bindings)) = hotkeys {
        bindings.clear();
        engine.dispose();
    }
    session.close().await;
    Ok(())
}

fn start_hotkeys(
    session: &PluginSession,
    config: &PluginConfig,
    installer: &dyn HookInstaller,
    desktop: Arc<dyn Desktop>,
) -> anyhow::Result<(Arc<KeyboardHookEngine>, HotKeyBindings)> {
    let runtime = Handle::current();
    let resolver = ScopeResolver::new(Arc::clone(session.context()))
        .with_locator(Arc::new(session.locator(runtime.clone())))
        .with_refresh_interval(config.refresh_interval());

    let engine = Arc::new(
        KeyboardHookEngine::install(installer, desktop, resolver, config.engine_options())
            .context("installing keyboard hook")?,
    );
    engine.set_global_observer(Some(Arc::new(|hotkey: HotKey| debug!(%hotkey, "key combination"))));

    let bindings = HotKeyBindings::new(Arc::clone(&engine), &config.hotkeys)
        .context("reading [hotkeys]")?;

    let host = Arc::clone(session.host());
    bindings
        .bind(
            "ping_host",
            HotKey::parse("Ctrl+Alt+P")?,
            HotKeyScope::Process,
            Arc::new(move || {
                let host = Arc::clone(&host);
                runtime.spawn(async move {
                    match host.call(HostRequest::Ping).await {
                        Ok(reply) => info!(?reply, "host answered"),
                        Err(e) => warn!("host ping failed: {e}"),
                    }
                });
            }),
        )
        .context("binding ping_host")?;

    let context = Arc::clone(session.context());
    bindings
        .bind(
            "show_host_window",
            HotKey::parse("Ctrl+Alt+H")?,
            HotKeyScope::Window,
            Arc::new(move || match context.window() {
                Some(window) => {
                    info!(handle = window.handle, process_id = window.process_id, "host window")
                }
                None => info!("host window unknown"),
            }),
        )
        .context("binding show_host_window")?;

    Ok((engine, bindings))
}

#[cfg(target_os = "windows")]
fn platform_hook() -> Option<(Box<dyn HookInstaller>, Arc<dyn Desktop>)> {
    use interop_hook::infrastructure::windows::{WindowsDesktop, WindowsHookInstaller};
    Some((Box::new(WindowsHookInstaller::new()), Arc::new(WindowsDesktop::new())))
}

#[cfg(not(target_os = "windows"))]
fn platform_hook() -> Option<(Box<dyn HookInstaller>, Arc<dyn Desktop>)> {
    None
}
