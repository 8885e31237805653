//! Spoolbox Storage - Directory-backed mailbox storage
//!
//! This crate provides the mailbox storage engine for Spoolbox: one
//! directory per user, one file per message, safe under concurrent
//! access from many sessions.

pub mod record;
pub mod spool;

pub use record::{MessageRecord, FORMAT_VERSION};
pub use spool::MailboxStore;
