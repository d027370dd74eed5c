//! Credential storage and management
//!
//! The server only talks to credentials through [`CredentialStore`]. The
//! bundled [`UserStore`] reads a JSON file of bcrypt-hashed users once at
//! startup and is read-only afterwards, so sessions can query it concurrently.

use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AuthError;

/// A user known to the credential store. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub home: PathBuf,
}

/// Narrow interface the session layer uses to authenticate.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when the user does not exist; `Err` when the store itself
    /// cannot answer.
    fn lookup(&self, username: &str) -> Result<Option<Arc<User>>, AuthError>;

    fn verify(&self, secret: &str, stored_hash: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct UsersFile {
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    username: String,
    password: String,
    home: PathBuf,
}

/// In-memory user table backed by bcrypt hashes.
#[derive(Debug, Default)]
pub struct UserStore {
    users: HashMap<String, Arc<User>>,
}

impl UserStore {
    /// Loads `{"users":[{"username","password","home"}]}`. Relative homes are
    /// made absolute; missing home directories are created.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AuthError::StoreUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let parsed: UsersFile = serde_json::from_str(&raw).map_err(|e| {
            AuthError::StoreUnavailable(format!("{}: {}", path.display(), e))
        })?;

        let users = parsed
            .users
            .into_iter()
            .map(|record| {
                let home = std::path::absolute(&record.home).unwrap_or(record.home);
                if let Err(e) = std::fs::create_dir_all(&home) {
                    warn!(
                        "Failed to create home directory {} for {}: {}",
                        home.display(),
                        record.username,
                        e
                    );
                }
                User {
                    username: record.username,
                    password_hash: record.password,
                    home,
                }
            })
            .collect::<Vec<_>>();

        info!("Loaded {} users from {}", users.len(), path.display());
        Ok(Self::from_users(users))
    }

    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.username.clone(), Arc::new(user)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for UserStore {
    fn lookup(&self, username: &str) -> Result<Option<Arc<User>>, AuthError> {
        Ok(self.users.get(username).cloned())
    }

    fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        bcrypt::verify(secret, stored_hash).unwrap_or(false)
    }
}
