//! Error types for Spoolbox

use thiserror::Error;

/// Main error type for Spoolbox
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed")]
    Auth,

    #[error("Too many failed login attempts")]
    Lockout,

    #[error("Directory service error: {0}")]
    Directory(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Spoolbox
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the session can survive this error and keep serving commands.
    ///
    /// Protocol, auth, and storage failures are answered with `ERR` and the
    /// session continues; transport failures tear the session down.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Transport(_))
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Protocol(_) => "PROTOCOL_ERROR",
            Error::Auth => "UNAUTHORIZED",
            Error::Lockout => "LOCKED_OUT",
            Error::Directory(_) => "DIRECTORY_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer gone");
        assert!(!Error::Transport(io).is_recoverable());
        assert!(Error::Protocol("bad verb".into()).is_recoverable());
        assert!(Error::Lockout.is_recoverable());
        assert!(Error::NotFound("Hello".into()).is_recoverable());
    }

    #[test]
    fn error_codes() {
        assert_eq!(Error::Auth.code(), "UNAUTHORIZED");
        assert_eq!(Error::Lockout.code(), "LOCKED_OUT");
        assert_eq!(Error::Storage("disk".into()).code(), "STORAGE_ERROR");
    }
}
