//! Authenticator interface and implementations
//!
//! Credential verification is external to the protocol core: the session
//! machine only consumes the tri-state outcome. `Ok(Granted)` and
//! `Ok(Denied)` are definitive answers from the directory; `Err(_)` means
//! the directory itself failed and says nothing about the credentials, so
//! it must never count against the caller's lockout counter.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use spoolbox_common::{Error, Result};

/// Outcome of a credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Credentials verified
    Granted,
    /// Credentials rejected
    Denied,
}

/// Credential verification seam
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify a username/password pair against the directory.
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthDecision>;
}

/// Credential file layout: a `[users]` table of username -> argon2 PHC hash
#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    users: HashMap<String, String>,
}

/// File-backed authenticator
///
/// Reads the credential file on every attempt, so user changes take
/// effect without a restart and an unreachable store surfaces as an
/// infrastructure failure on the attempt that hit it.
pub struct FileAuthenticator {
    path: PathBuf,
}

impl FileAuthenticator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Authenticator for FileAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthDecision> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Directory(format!(
                "Credential store {} unreadable: {}",
                self.path.display(),
                e
            ))
        })?;

        let file: CredentialFile = toml::from_str(&content)
            .map_err(|e| Error::Directory(format!("Credential store malformed: {}", e)))?;

        let Some(hash) = file.users.get(username) else {
            debug!(username, "Unknown user");
            return Ok(AuthDecision::Denied);
        };

        let parsed = PasswordHash::new(hash).map_err(|e| {
            Error::Directory(format!("Stored hash for {} malformed: {}", username, e))
        })?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(AuthDecision::Granted),
            Err(_) => Ok(AuthDecision::Denied),
        }
    }
}

/// Hash a password for provisioning a credential file
pub fn hash_password(password: &str) -> Result<String> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Config(format!("Failed to hash password: {}", e)))?
        .to_string())
}

/// In-memory authenticator for tests and demos
///
/// Tracks how often it was consulted so callers can assert that lockout
/// short-circuits before the directory is reached, and can simulate a
/// directory outage.
#[derive(Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, String>,
    calls: AtomicUsize,
    outage: AtomicBool,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    /// Number of times `authenticate` was invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent attempt fail as an infrastructure error
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.outage.load(Ordering::SeqCst) {
            return Err(Error::Directory("Directory service unreachable".to_string()));
        }

        match self.users.get(username) {
            Some(stored) if stored == password => Ok(AuthDecision::Granted),
            _ => Ok(AuthDecision::Denied),
        }
    }
}
