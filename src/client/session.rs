//! Client session state
//!
//! One `Session` per control connection, owned by the task serving that
//! connection. Tracks authentication, the virtual working directory, and the
//! data channel negotiated for the next transfer.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::User;
use crate::transfer::{DataChannel, DataMode};

/// Represents the state of a connected FTP client.
///
/// A session is authenticated exactly when it holds a user, and a pending
/// username only exists while unauthenticated.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    user: Option<Arc<User>>,
    pending_user: Option<String>,
    virtual_dir: String,
    rename_from: Option<String>,
    transfer_type: String,
    data: DataChannel,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            user: None,
            pending_user: None,
            virtual_dir: "/".to_string(),
            rename_from: None,
            transfer_type: "A".to_string(),
            data: DataChannel::None,
        }
    }

    /// Full reset used by USER and REIN: closes data resources, drops the
    /// identity, and returns to `/`.
    pub fn reset(&mut self) {
        self.data.close();
        self.user = None;
        self.pending_user = None;
        self.virtual_dir = "/".to_string();
        self.rename_from = None;
        self.transfer_type = "A".to_string();
    }

    /// USER: reset, then remember the name until PASS arrives.
    pub fn begin_login(&mut self, username: &str) {
        self.reset();
        self.pending_user = Some(username.to_string());
    }

    /// Successful PASS.
    pub fn complete_login(&mut self, user: Arc<User>) {
        self.pending_user = None;
        self.virtual_dir = "/".to_string();
        self.user = Some(user);
    }

    /// Failed PASS: back to unauthenticated, a fresh USER is required.
    pub fn fail_login(&mut self) {
        self.pending_user = None;
        self.user = None;
    }

    /// Releases everything the session holds. Called on QUIT and on
    /// control-connection failure.
    pub fn close(&mut self) {
        self.data.close();
        self.rename_from = None;
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The logged-in user, cloned out so callers can keep it while mutating
    /// the session.
    pub fn user(&self) -> Option<Arc<User>> {
        self.user.clone()
    }

    pub fn pending_user(&self) -> Option<&str> {
        self.pending_user.as_deref()
    }

    pub fn virtual_dir(&self) -> &str {
        &self.virtual_dir
    }

    pub fn rename_from(&self) -> Option<&str> {
        self.rename_from.as_deref()
    }

    pub fn transfer_type(&self) -> &str {
        &self.transfer_type
    }

    pub fn data_mode(&self) -> DataMode {
        self.data.mode()
    }

    pub fn data_channel(&self) -> &DataChannel {
        &self.data
    }

    pub fn data_channel_mut(&mut self) -> &mut DataChannel {
        &mut self.data
    }

    // --------------------
    // Setter methods
    // --------------------

    pub fn set_virtual_dir(&mut self, path: String) {
        self.virtual_dir = path;
    }

    pub fn set_rename_from(&mut self, path: Option<String>) {
        self.rename_from = path;
    }

    pub fn take_rename_from(&mut self) -> Option<String> {
        self.rename_from.take()
    }

    pub fn set_transfer_type(&mut self, transfer_type: String) {
        self.transfer_type = transfer_type;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;
    use std::path::PathBuf;

    fn alice() -> Arc<User> {
        Arc::new(User {
            username: "alice".into(),
            password_hash: String::new(),
            home: PathBuf::from("/srv/ftp/alice"),
        })
    }

    fn session() -> Session {
        Session::new("127.0.0.1:4000".parse().unwrap())
    }

    #[test]
    fn test_new_session_defaults() {
        let session = session();
        assert!(!session.is_authenticated());
        assert_eq!(session.virtual_dir(), "/");
        assert_eq!(session.data_mode(), DataMode::None);
        assert!(session.pending_user().is_none());
    }

    #[test]
    fn test_login_sequence() {
        let mut session = session();
        session.begin_login("alice");
        assert_eq!(session.pending_user(), Some("alice"));
        assert!(!session.is_authenticated());

        session.complete_login(alice());
        assert!(session.is_authenticated());
        assert!(session.pending_user().is_none());
        assert_eq!(
            session.user().map(|user| user.home.clone()),
            Some(PathBuf::from("/srv/ftp/alice"))
        );
    }

    #[test]
    fn test_begin_login_resets_everything() {
        let mut session = session();
        session.complete_login(alice());
        session.set_virtual_dir("/docs".into());
        session.set_rename_from(Some("/a".into()));
        session
            .data_channel_mut()
            .set_active(SocketAddrV4::new([127, 0, 0, 1].into(), 3000));

        session.begin_login("bob");
        assert!(!session.is_authenticated());
        assert_eq!(session.virtual_dir(), "/");
        assert_eq!(session.data_mode(), DataMode::None);
        assert!(session.rename_from().is_none());
        assert_eq!(session.pending_user(), Some("bob"));
    }

    #[test]
    fn test_fail_login_clears_pending_user() {
        let mut session = session();
        session.begin_login("alice");
        session.fail_login();
        assert!(session.pending_user().is_none());
        assert!(!session.is_authenticated());
    }
}
