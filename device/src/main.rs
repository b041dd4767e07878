//! bstwifi device - Wi-Fi bootstrap target on a host machine.
//!
//! Joins a simulated bootstrap network, serves the companion app over UDP
//! broadcast and persists the delivered credentials. Type `help` on stdin
//! for the operator commands.

use std::process::ExitCode;

use bstwifi_device::{run, Config};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env();
    log_startup_info(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Device stopped");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with environment-based log levels.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bstwifi_device=debug,bstwifi_core=info")),
        )
        .init();
}

/// Log startup configuration (no secrets).
fn log_startup_info(config: &Config) {
    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        broadcast = %config.broadcast_addr,
        state_dir = %config.state_dir.display(),
        name = %config.device_name,
        uid = %config.device_uid_hex(),
        bootstrap_ssid = %config.bootstrap_ssid,
        confirmation = ?config.confirmation,
        need_advanced = config.need_advanced,
        "Starting bstwifi device"
    );
}
