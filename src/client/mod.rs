//! Client management system
//!
//! Handles the control connection loop and per-connection session state.

pub mod handler;
pub mod session;

pub use handler::handle_client;
pub use session::Session;
