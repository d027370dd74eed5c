//! Shared, read-only state handed to every session task.

use std::sync::Arc;

use crate::auth::CredentialStore;
use crate::config::ServerConfig;
use crate::transfer::PassivePortPool;

pub struct ServerContext {
    pub config: ServerConfig,
    pub store: Arc<dyn CredentialStore>,
    /// Process-wide PASV allocator; cloning shares the claim set.
    pub ports: PassivePortPool,
}

impl ServerContext {
    pub fn new(config: ServerConfig, store: Arc<dyn CredentialStore>) -> Self {
        let ports = PassivePortPool::new(config.pasv_port_range());
        Self {
            config,
            store,
            ports,
        }
    }
}
