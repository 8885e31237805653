//! Session protocol
//!
//! Line framing, command assembly, the per-connection state machine, and
//! the connection acceptor.

pub mod command;
pub mod response;
pub mod server;
pub mod session;

pub use command::{Command, CommandReader};
pub use response::Reply;
pub use server::MailServer;
pub use session::{Session, SessionState};
