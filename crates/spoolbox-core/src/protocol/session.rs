//! Session state
//!
//! Per-connection authentication state. A `Session` is exclusively owned
//! by its worker task and is never shared between connections; it is
//! created on accept and discarded on disconnect.

use uuid::Uuid;

/// Protocol state of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No verified identity yet
    Unauthenticated,
    /// Verified as the contained user
    Authenticated(String),
    /// Terminal; the connection is being torn down
    Closed,
}

/// One client connection's session
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    failed_logins: u32,
    max_login_attempts: u32,
}

impl Session {
    pub fn new(max_login_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Unauthenticated,
            failed_logins: 0,
            max_login_attempts,
        }
    }

    /// Session id for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Authenticated username, if any
    pub fn user(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    /// Whether further LOGIN attempts must be refused without consulting
    /// the authenticator. Lockout is scoped to this connection.
    pub fn is_locked_out(&self) -> bool {
        self.failed_logins >= self.max_login_attempts
    }

    pub fn record_login_failure(&mut self) {
        self.failed_logins += 1;
    }

    pub fn failed_logins(&self) -> u32 {
        self.failed_logins
    }

    /// Transition to the authenticated state; consecutive-failure counting
    /// starts over.
    pub fn login_succeeded(&mut self, user: impl Into<String>) {
        self.state = SessionState::Authenticated(user.into());
        self.failed_logins = 0;
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
