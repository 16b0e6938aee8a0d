//! Session state.
//!
//! The current identity is explicit application state: created signed-out,
//! populated at login and cleared at logout. Observers subscribe to changes;
//! guards read one snapshot per decision.
//!
//! A `Session` belongs to an embedding client and is driven through
//! `AuthService::login_session` and `AuthService::logout_session`. The HTTP
//! API holds no session; it resolves the identity per request from the
//! bearer token.

use tokio::sync::watch;

use crate::services::identity::Identity;

/// The current identity of one client session.
#[derive(Debug)]
pub struct Session {
    current: watch::Sender<Option<Identity>>,
}

impl Session {
    /// Create a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// Create a session already signed in as `identity`.
    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        let (current, _) = watch::channel(Some(identity));
        Self { current }
    }

    /// Record a successful sign-in.
    pub fn sign_in(&self, identity: Identity) {
        self.current.send_replace(Some(identity));
    }

    /// Clear the identity.
    pub fn sign_out(&self) {
        self.current.send_replace(None);
    }

    /// Snapshot of the current identity.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Receive every future identity change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
