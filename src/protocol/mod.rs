//! FTP Protocol implementation
//!
//! Handles FTP command parsing, dispatch, and response framing.

pub mod commands;
pub mod handlers;
pub mod responses;

pub use commands::{Command, CommandStatus, Verb, parse_command};
pub use handlers::handle_command;
pub use responses::ControlChannel;
