//! Transfer module for FTP server
//!
//! Handles data channel negotiation (PASV/PORT), the shared passive port pool,
//! and moving bytes over an open data connection.

pub mod data_channel;
pub mod file_ops;
pub mod modes;
pub mod operations;
pub mod port_pool;

// Re-export key types and functions
pub use data_channel::DataChannel;
pub use file_ops::{receive_file, send_file, send_lines};
pub use modes::DataMode;
pub use operations::{format_pasv_reply, parse_port_argument};
pub use port_pool::{PassiveListener, PassivePortPool};
