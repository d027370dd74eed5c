//! Module `port_pool`
//!
//! Process-wide allocator for PASV listeners. Ports in the configured range are
//! claimed in a shared set before binding and released when the listener that
//! holds the lease is dropped, so concurrent sessions never race for the same
//! port. Ports taken by other processes are skipped by probing the next
//! candidate.

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;

use crate::error::TransferError;

type ClaimSet = Arc<Mutex<HashSet<u16>>>;

fn lock(claimed: &ClaimSet) -> MutexGuard<'_, HashSet<u16>> {
    claimed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared passive port allocator
#[derive(Debug, Clone)]
pub struct PassivePortPool {
    range: RangeInclusive<u16>,
    claimed: ClaimSet,
}

/// Releases its port back to the pool on drop.
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    claimed: ClaimSet,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        lock(&self.claimed).remove(&self.port);
        debug!("Released passive port {}", self.port);
    }
}

/// A bound, not yet accepted, passive data listener.
#[derive(Debug)]
pub struct PassiveListener {
    listener: TcpListener,
    port: u16,
    _lease: PortLease,
}

impl PassiveListener {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn listener(&self) -> &TcpListener {
        &self.listener
    }
}

impl PassivePortPool {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self {
            range,
            claimed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of ports currently leased out.
    pub fn in_use(&self) -> usize {
        lock(&self.claimed).len()
    }

    /// Binds a listener on `ip` at a free port from the range, trying
    /// candidates in random order.
    pub async fn bind(&self, ip: IpAddr) -> Result<PassiveListener, TransferError> {
        let mut candidates: Vec<u16> = self.range.clone().collect();
        candidates.shuffle(&mut rand::thread_rng());

        for port in candidates {
            let Some(lease) = self.claim(port) else {
                continue;
            };

            match TcpListener::bind(SocketAddr::new(ip, port)).await {
                Ok(listener) => {
                    info!("Passive listener bound on {}:{}", ip, port);
                    return Ok(PassiveListener {
                        listener,
                        port,
                        _lease: lease,
                    });
                }
                Err(e) => {
                    debug!("Passive port {} unavailable: {}", port, e);
                }
            }
        }

        warn!(
            "No free passive port in {}-{}",
            self.range.start(),
            self.range.end()
        );
        Err(TransferError::NoAvailablePort {
            min: *self.range.start(),
            max: *self.range.end(),
        })
    }

    fn claim(&self, port: u16) -> Option<PortLease> {
        let mut claimed = lock(&self.claimed);
        if !claimed.insert(port) {
            return None;
        }
        Some(PortLease {
            port,
            claimed: Arc::clone(&self.claimed),
        })
    }
}
