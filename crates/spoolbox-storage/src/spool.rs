//! Mailbox store
//!
//! Directory-backed storage: one subdirectory per user under the spool
//! root, one file per message named by its subject. Mutations take a
//! per-mailbox write lock and publish files atomically, so any number of
//! concurrent sessions can work against the store without observing
//! partial state. Unrelated mailboxes never contend on a common lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use spoolbox_common::{Error, Result};

use crate::record::MessageRecord;

/// Maximum length of a username or subject in bytes
const MAX_NAME_LEN: usize = 255;

/// Name of the in-flight temporary inside a mailbox directory. The
/// per-mailbox write lock guarantees a single writer, so a fixed name is
/// enough; the leading dot keeps it out of `list` enumeration.
const TMP_NAME: &str = ".incoming.tmp";

/// Validate a username or subject before it is used as a path component.
///
/// Rejection policy: a name that would escape the mailbox directory or
/// collide with internal files is refused outright, so stored filenames
/// always round-trip to the subjects clients sent.
pub fn validate_name(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", what)));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "{} exceeds {} bytes",
            what, MAX_NAME_LEN
        )));
    }
    if value.starts_with('.') {
        // Covers "." and ".." as well as hidden/temporary names.
        return Err(Error::Validation(format!(
            "{} must not start with '.'",
            what
        )));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(Error::Validation(format!(
            "{} must not contain path separators",
            what
        )));
    }
    Ok(())
}

/// Mailbox store
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct MailboxStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl MailboxStore {
    /// Open a store rooted at the given spool directory, creating it if
    /// absent.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::Storage(format!(
                "Failed to create spool directory {}: {}",
                root.display(),
                e
            ))
        })?;

        info!(path = %root.display(), "Opened mail spool");

        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Spool root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Exclusion handle for one mailbox. Readers take the read side,
    /// mutators the write side; distinct users get distinct locks.
    async fn mailbox_lock(&self, user: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(user.to_string()).or_default().clone()
    }

    /// Store a message in the recipient's mailbox.
    ///
    /// The mailbox directory is created lazily. The record is written to a
    /// hidden temporary and renamed into place, so concurrent readers only
    /// ever observe complete files. A duplicate subject overwrites the
    /// previous message (last write wins).
    pub async fn save(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        validate_name(recipient, "username")?;
        validate_name(subject, "subject")?;

        let lock = self.mailbox_lock(recipient).await;
        let _guard = lock.write().await;

        let dir = self.root.join(recipient);
        fs::create_dir_all(&dir).await.map_err(|e| {
            Error::Storage(format!("Failed to create mailbox for {}: {}", recipient, e))
        })?;

        let record = MessageRecord::new(recipient, subject, body);
        let data = record.to_bytes()?;

        let tmp = dir.join(TMP_NAME);
        let path = dir.join(subject);

        fs::write(&tmp, &data)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write message: {}", e)))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(Error::Storage(format!("Failed to publish message: {}", e)));
        }

        debug!(recipient, subject, bytes = data.len(), "Stored message");
        Ok(())
    }

    /// Current set of subjects in a user's mailbox.
    ///
    /// Enumeration order follows the directory and is not a contract. A
    /// mailbox that has never received a message yields an empty list.
    pub async fn list(&self, user: &str) -> Result<Vec<String>> {
        validate_name(user, "username")?;

        let lock = self.mailbox_lock(user).await;
        let _guard = lock.read().await;

        let dir = self.root.join(user);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to open mailbox of {}: {}",
                    user, e
                )))
            }
        };

        let mut subjects = Vec::new();
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|e| Error::Storage(format!("Failed to enumerate mailbox: {}", e)))?;
            let Some(entry) = entry else { break };

            match entry.file_name().into_string() {
                // Dot-prefixed entries are in-flight temporaries, never
                // published messages.
                Ok(name) if !name.starts_with('.') => subjects.push(name),
                Ok(_) => {}
                Err(name) => warn!(user, ?name, "Skipping non-UTF-8 mailbox entry"),
            }
        }

        Ok(subjects)
    }

    /// Full body of a stored message, or `Error::NotFound`.
    pub async fn read(&self, user: &str, subject: &str) -> Result<String> {
        validate_name(user, "username")?;
        validate_name(subject, "subject")?;

        let lock = self.mailbox_lock(user).await;
        let _guard = lock.read().await;

        let path = self.root.join(user).join(subject);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(subject.to_string()))
            }
            Err(e) => return Err(Error::Storage(format!("Failed to read message: {}", e))),
        };

        let record = MessageRecord::from_bytes(&data)?;
        Ok(record.body)
    }

    /// Remove a stored message, or `Error::NotFound`.
    pub async fn delete(&self, user: &str, subject: &str) -> Result<()> {
        validate_name(user, "username")?;
        validate_name(subject, "subject")?;

        let lock = self.mailbox_lock(user).await;
        let _guard = lock.write().await;

        let path = self.root.join(user).join(subject);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(user, subject, "Deleted message");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(subject.to_string()))
            }
            Err(e) => Err(Error::Storage(format!("Failed to delete message: {}", e))),
        }
    }
}
