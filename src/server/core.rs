use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::auth::CredentialStore;
use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::error::FtpServerError;
use crate::protocol::responses::{SERVICE_UNAVAILABLE, format_response};
use crate::server::ServerContext;

pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
    slots: Arc<Semaphore>,
}

impl Server {
    /// Binds the control listener. The configuration is expected to be
    /// validated already.
    pub async fn bind(
        config: ServerConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, FtpServerError> {
        let addr = config.control_socket()?;
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("Server bound to {}", listener.local_addr()?);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", addr, e);
                return Err(e.into());
            }
        };

        let slots = Arc::new(Semaphore::new(config.max_clients));
        Ok(Self {
            listener,
            context: Arc::new(ServerContext::new(config, store)),
            slots,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, FtpServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the task is dropped; a failed accept or a
    /// failing session never stops it.
    pub async fn run(&self) {
        let config = &self.context.config;
        info!(
            "Starting Ferrule FTP server (max {} clients, passive ports {}-{})",
            config.max_clients, config.pasv_port_min, config.pasv_port_max
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                        warn!("Rejecting {}: connection limit reached", addr);
                        tokio::spawn(reject_connection(stream));
                        continue;
                    };

                    info!(
                        "Accepted connection from {} ({}/{} clients)",
                        addr,
                        config.max_clients - self.slots.available_permits(),
                        config.max_clients
                    );

                    let context = Arc::clone(&self.context);
                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        handle_client(reader, writer, addr, context).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

async fn reject_connection(mut stream: TcpStream) {
    let reply = format_response(SERVICE_UNAVAILABLE, "Too many connections. Try again later.");
    if let Err(e) = stream.write_all(reply.as_bytes()).await {
        warn!("Failed to send rejection: {}", e);
    }
    let _ = stream.shutdown().await;
}
