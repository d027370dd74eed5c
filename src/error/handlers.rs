//! Error handlers
//!
//! Maps domain errors onto FTP reply codes.

use crate::error::types::{AuthError, FtpServerError};

/// Convert error to FTP response code
pub fn error_to_ftp_code(err: &FtpServerError) -> u16 {
    match err {
        FtpServerError::Auth(AuthError::StoreUnavailable(_)) => 550,
        FtpServerError::Auth(AuthError::MalformedInput(_) | AuthError::InvalidUsername(_)) => 501,
        FtpServerError::Auth(_) => 530,
        FtpServerError::Storage(_) => 550,
        FtpServerError::Transfer(_) => 425,
        FtpServerError::Navigate(_) => 550,
        FtpServerError::Config(_) => 421,
        FtpServerError::IoError(_) => 421,
        FtpServerError::ProtocolError(_) => 501,
    }
}
