//! Module `data_channel`
//!
//! Per-session data channel state. A session holds at most one data resource
//! at a time: either the address to dial for an active transfer or a bound
//! passive listener. Opening the channel consumes that state, so each
//! negotiation serves exactly one transfer.

use log::{error, info};
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::TransferError;
use crate::transfer::modes::DataMode;
use crate::transfer::port_pool::PassiveListener;

#[derive(Debug, Default)]
pub enum DataChannel {
    #[default]
    None,
    /// Target set by PORT; dialled by the next transfer command.
    Active(SocketAddrV4),
    /// Listener opened by PASV; accepted by the next transfer command.
    Passive(PassiveListener),
}

impl DataChannel {
    pub fn mode(&self) -> DataMode {
        match self {
            DataChannel::None => DataMode::None,
            DataChannel::Active(_) => DataMode::Active,
            DataChannel::Passive(_) => DataMode::Passive,
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, DataChannel::None)
    }

    #[cfg(test)]
    pub fn passive_port(&self) -> Option<u16> {
        match self {
            DataChannel::Passive(listener) => Some(listener.port()),
            _ => None,
        }
    }

    /// Drops whatever resource is held. Idempotent.
    pub fn close(&mut self) {
        match std::mem::take(self) {
            DataChannel::None => {}
            DataChannel::Active(target) => {
                info!("Discarded active data target {}", target);
            }
            DataChannel::Passive(listener) => {
                info!("Closed passive listener on port {}", listener.port());
            }
        }
    }

    pub fn set_active(&mut self, target: SocketAddrV4) {
        self.close();
        *self = DataChannel::Active(target);
    }

    pub fn set_passive(&mut self, listener: PassiveListener) {
        self.close();
        *self = DataChannel::Passive(listener);
    }

    /// Establishes the data connection for one transfer.
    ///
    /// Passive mode performs a single accept on the stored listener; active
    /// mode dials the stored target. Both are bounded by `wait`. The stored
    /// state is consumed whether or not this succeeds.
    pub async fn open(&mut self, wait: Duration) -> Result<TcpStream, TransferError> {
        match std::mem::take(self) {
            DataChannel::None => Err(TransferError::DataChannelNotInitialized),
            DataChannel::Passive(passive) => {
                let port = passive.port();
                match timeout(wait, passive.listener().accept()).await {
                    Ok(Ok((stream, peer))) => {
                        info!("Data connection accepted from {} on port {}", peer, port);
                        Ok(stream)
                    }
                    Ok(Err(e)) => {
                        error!("Failed to accept data connection on port {}: {}", port, e);
                        Err(TransferError::AcceptFailed(e))
                    }
                    Err(_) => {
                        error!("Timeout waiting for data connection on port {}", port);
                        Err(TransferError::AcceptTimeout(port))
                    }
                }
            }
            DataChannel::Active(target) => {
                let addr = SocketAddr::V4(target);
                match timeout(wait, TcpStream::connect(addr)).await {
                    Ok(Ok(stream)) => {
                        info!("Connected to client data port {}", addr);
                        Ok(stream)
                    }
                    Ok(Err(e)) => {
                        error!("Failed to connect to client data port {}: {}", addr, e);
                        Err(TransferError::ConnectFailed(addr, e))
                    }
                    Err(_) => {
                        error!("Timeout connecting to client data port {}", addr);
                        Err(TransferError::ConnectTimeout(addr))
                    }
                }
            }
        }
    }
}
