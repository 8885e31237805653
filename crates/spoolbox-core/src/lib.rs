//! Spoolbox Core - session protocol and connection handling
//!
//! This crate provides the per-connection session state machine, command
//! framing, the authenticator seam, and the connection acceptor.

pub mod auth;
pub mod protocol;

pub use auth::{hash_password, AuthDecision, Authenticator, FileAuthenticator, StaticAuthenticator};
pub use protocol::{Command, CommandReader, MailServer, Reply, Session, SessionState};
