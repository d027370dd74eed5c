//! Server core functionality
//!
//! This module contains the control listener, the accept loop, and the state
//! shared by every session.

pub mod context;
pub mod core;

pub use context::ServerContext;
pub use core::Server;
