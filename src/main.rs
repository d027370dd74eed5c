//! Ferrule FTP Server - Entry Point
//!
//! A Rust FTP server implementing the core of RFC 959 with per-user
//! virtual roots.

use env_logger::{Builder, Env};
use log::{error, info, warn};
use std::sync::Arc;

use ferrule_ftp_server::auth::UserStore;
use ferrule_ftp_server::{FtpServerError, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), FtpServerError> {
    // RUST_LOG overrides the default filter
    Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Launching FTP server...");

    let config = ServerConfig::load().inspect_err(|e| error!("Invalid configuration: {}", e))?;
    let store = UserStore::load(&config.users_file_path())
        .inspect_err(|e| error!("Failed to load users: {}", e))?;
    if store.is_empty() {
        warn!("No users configured; every login will fail");
    }

    let server = Server::bind(config, Arc::new(store)).await?;
    server.run().await;
    Ok(())
}
