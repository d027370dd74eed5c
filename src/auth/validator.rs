//! Authentication validator
//!
//! Input sanitation for USER and PASS arguments.

use crate::error::AuthError;

/// Performs basic input sanitation to check for malicious or malformed usernames/passwords.
fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty() && input.len() <= max_length && !input.contains(['\r', '\n', '\0'])
}

/// Validates the shape of a username before it is recorded as pending.
pub fn validate_username(username: &str, max_length: usize) -> Result<(), AuthError> {
    if !is_valid_input(username, max_length) {
        return Err(AuthError::MalformedInput("Invalid username format".into()));
    }

    if username.contains(['/', '\\', ':']) {
        return Err(AuthError::InvalidUsername(username.to_string()));
    }

    Ok(())
}
