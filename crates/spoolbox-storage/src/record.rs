//! On-disk message record format
//!
//! One message is persisted as a single JSON document. The `format` field
//! is checked on read so a future layout change cannot be misparsed as the
//! current one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spoolbox_common::{Error, Result};

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// A persisted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// On-disk format version
    pub format: u32,
    /// Owning user of the mailbox this message lives in
    pub recipient: String,
    /// Lookup key, unique within the mailbox
    pub subject: String,
    /// Message body text
    pub body: String,
    /// Time the server accepted the message
    pub received_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Create a record for a freshly accepted message
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            format: FORMAT_VERSION,
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    /// Serialize for persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Storage(format!("Failed to encode message record: {}", e)))
    }

    /// Parse a persisted record, rejecting unknown format versions
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let record: MessageRecord = serde_json::from_slice(data)
            .map_err(|e| Error::Storage(format!("Failed to decode message record: {}", e)))?;

        if record.format != FORMAT_VERSION {
            return Err(Error::Storage(format!(
                "Unsupported message record format {} (expected {})",
                record.format, FORMAT_VERSION
            )));
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_round_trip() {
        let record = MessageRecord::new("user2", "Hello", "Hi\nsecond line");
        let bytes = record.to_bytes().unwrap();
        let parsed = MessageRecord::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_unknown_format_version_rejected() {
        let mut record = MessageRecord::new("user2", "Hello", "Hi");
        record.format = FORMAT_VERSION + 1;
        let bytes = serde_json::to_vec(&record).unwrap();
        assert!(MessageRecord::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(MessageRecord::from_bytes(b"user2\nHello\nHi").is_err());
    }
}
