use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use pgssl::config::LogLevel;
use pgssl::{CliArgs, Config, ProxyServer};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "pgssl";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Parsed first so the log level is known before anything is logged.
    let args = CliArgs::parse();
    init_tracing(args.log_level);

    let config = match Config::load(args).await {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let server = match ProxyServer::new(&config) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run_forever(&config, server).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} failed: {e}", APP_NAME);
            ExitCode::FAILURE
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn log_settings(config: &Config) {
    info!("backend {}", config.backend_addr);
    info!("ssl policy {}", config.negotiation_policy.as_str());

    if config.client_identity.is_some() {
        info!("presenting a client certificate to the backend");
    }

    if !config.backend_trust.verifies() {
        warn!("backend certificate verification is disabled; set --backend-ca to enable it");
    }
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever(config: &Config, server: Arc<ProxyServer>) -> std::io::Result<()> {
    let socket = if config.listen_addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    socket.set_reuseaddr(true)?;
    socket.bind(config.listen_addr)?;

    let listener: TcpListener = socket.listen(1024)?;

    info!("{} listening on {}", APP_NAME, listener.local_addr()?);
    log_settings(config);

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("{} shutting down", APP_NAME);
        }

        _ = server.serve(listener) => {}
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
