//! # cortical
//!
//! Cortical server binary: loads settings, builds the configured cortexes and
//! serves the websocket dispatcher until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cortical_cortexes::CortexRegistry;
use cortical_settings::CorticalSettings;
use cortical_server::config::{DispatchConfig, ServerConfig};
use cortical_server::server::CorticalServer;
use cortical_server::websocket::session::Dispatcher;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;

/// Cortical websocket dispatcher.
#[derive(Parser, Debug)]
#[command(name = "cortical", about = "Cortical websocket dispatcher")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings if specified).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file. Defaults to `~/.cortical/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory served at `/`.
    #[arg(long)]
    static_dir: Option<String>,

    /// Log level or filter directive.
    #[arg(long)]
    log_level: Option<String>,

    /// Comma-separated cortex names to enable.
    #[arg(long, value_delimiter = ',')]
    cortexes: Vec<String>,
}

impl Cli {
    /// Command-line flags win over file and environment values.
    fn apply(&self, settings: &mut CorticalSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir.clone_from(dir);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if !self.cortexes.is_empty() {
            settings.cortexes.enabled.clone_from(&self.cortexes);
        }
    }
}

/// Resolve the enabled cortexes and register them on a dispatcher.
fn build_dispatcher(settings: &CorticalSettings) -> Result<Dispatcher> {
    let registry = CortexRegistry::with_builtins(&settings.cortexes)
        .context("Failed to build cortex registry")?;
    let enabled = registry
        .resolve(&settings.cortexes.enabled)
        .context("Invalid cortex list")?;

    let mut dispatcher = Dispatcher::new(DispatchConfig::from_settings(&settings.server));
    for (name, factory) in enabled {
        dispatcher = dispatcher.with_cortex(name, factory);
    }
    Ok(dispatcher)
}

fn build_server(settings: &CorticalSettings, metrics: Option<PrometheusHandle>) -> Result<CorticalServer> {
    let dispatcher = build_dispatcher(settings)?;
    let config = ServerConfig::from_settings(&settings.server);
    Ok(CorticalServer::new(config, dispatcher, metrics))
}

/// Stop the listener, end every live session and wait for their teardown.
///
/// Sessions get `drain` to close; the listener gets one more second.
async fn shut_down(server: &CorticalServer, listener: JoinHandle<()>, drain: Duration) {
    let grace = drain + Duration::from_secs(1);
    let aborted = server.shutdown().shutdown_and_wait(vec![listener], Some(grace)).await;
    if aborted > 0 {
        tracing::warn!("server did not stop in time");
    }
    if server.dispatcher().wait_for_sessions(grace).await {
        tracing::info!("all sessions closed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli
        .settings
        .clone()
        .unwrap_or_else(cortical_settings::settings_path);
    let (mut settings, load_error) = cortical_settings::load_settings_or_defaults(&path);
    cli.apply(&mut settings);

    cortical_logging::init_from_settings(&settings.logging);
    if let Some(e) = load_error {
        tracing::warn!(path = %path.display(), error = %e, "invalid settings file, using defaults");
    }

    let metrics = match cortical_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let server = build_server(&settings, metrics)?;
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(%addr, "cortical ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    shut_down(&server, handle, Duration::from_millis(settings.server.drain_timeout_ms)).await;
    Ok(())
}
