use std::net::TcpListener;
use std::sync::Arc;

use chirpy::auth::SystemClock;
use chirpy::configuration::get_configuration;
use chirpy::startup::{build_auth_service, run};
use chirpy::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    init_telemetry(&configuration.log);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting chirpy");

    let auth = build_auth_service(&configuration, Arc::new(SystemClock))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize storage");
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    run(listener, auth)?.await
}
