//! Error types
//!
//! Defines domain-specific error types for each module of the FTP server.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Authentication module errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),
    #[error("Invalid password for user: {0}")]
    InvalidPassword(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Storage module errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No such file or directory: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Directory not empty: {0}")]
    NotEmpty(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Not a regular file: {0}")]
    NotAFile(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Short human-readable text used in `550` replies.
    pub fn reply_text(&self) -> String {
        match self {
            StorageError::NotFound(_) => "No such file or directory.".into(),
            StorageError::AlreadyExists(_) => "File already exists.".into(),
            StorageError::NotEmpty(_) => "Directory not empty.".into(),
            StorageError::NotADirectory(_) => "Not a directory.".into(),
            StorageError::NotAFile(_) => "Not a regular file.".into(),
            StorageError::AccessDenied(_) => "Access denied.".into(),
            StorageError::InvalidPath(_) => "Invalid path.".into(),
            StorageError::Io(e) => format!("Requested action not taken: {}.", e.kind()),
        }
    }
}

/// Transfer module errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Data channel not initialized")]
    DataChannelNotInitialized,
    #[error("No available port in passive range {min}-{max}")]
    NoAvailablePort { min: u16, max: u16 },
    #[error("Invalid PORT command: {0}")]
    InvalidPortCommand(String),
    #[error("Failed to accept data connection: {0}")]
    AcceptFailed(io::Error),
    #[error("Timeout waiting for data connection on port {0}")]
    AcceptTimeout(u16),
    #[error("Failed to connect to {0}: {1}")]
    ConnectFailed(SocketAddr, io::Error),
    #[error("Timeout connecting to {0}")]
    ConnectTimeout(SocketAddr),
    #[error("Transfer failed: {0}")]
    TransferFailed(io::Error),
}

/// Navigate module errors
#[derive(Debug, Error)]
pub enum NavigateError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),
}

/// General FTP server error that encompasses all error types
#[derive(Debug, Error)]
pub enum FtpServerError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("Navigate error: {0}")]
    Navigate(#[from] NavigateError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}
