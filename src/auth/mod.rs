//! Authentication system
//!
//! Handles user lookup, credential validation, and input sanitation.

pub mod credentials;
pub mod validator;

pub use credentials::{CredentialStore, User, UserStore};
pub use validator::validate_username;
