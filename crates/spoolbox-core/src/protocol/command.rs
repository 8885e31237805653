//! Command assembly
//!
//! One command is a verb line plus the argument lines that verb requires,
//! assembled from a stream of framed lines. The line layer (LinesCodec)
//! already survives partial reads and batched deliveries and bounds the
//! line length; this layer bounds the total message body size.

use futures::{Stream, StreamExt};
use tokio_util::codec::LinesCodecError;

use spoolbox_common::{Error, Result};

/// End-of-body marker in a SEND block
const BODY_TERMINATOR: &str = ".";

/// One parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGIN + username line + password line
    Login { username: String, password: String },
    /// SEND + recipient + subject + body lines up to a lone `.`
    Send {
        recipient: String,
        subject: String,
        body: String,
    },
    /// LIST
    List,
    /// READ + subject line
    Read { subject: String },
    /// DEL + subject line
    Del { subject: String },
    /// QUIT
    Quit,
    /// Anything else; answered with an error, never dispatched
    Unknown { verb: String },
}

impl Command {
    /// Verb for logging
    pub fn verb(&self) -> &str {
        match self {
            Command::Login { .. } => "LOGIN",
            Command::Send { .. } => "SEND",
            Command::List => "LIST",
            Command::Read { .. } => "READ",
            Command::Del { .. } => "DEL",
            Command::Quit => "QUIT",
            Command::Unknown { verb } => verb,
        }
    }
}

/// Assembles complete commands from a framed line stream
pub struct CommandReader<S> {
    lines: S,
    max_message_bytes: usize,
    resume_after_error: bool,
}

impl<S> CommandReader<S>
where
    S: Stream<Item = std::result::Result<String, LinesCodecError>> + Unpin,
{
    pub fn new(lines: S, max_message_bytes: usize) -> Self {
        Self {
            lines,
            max_message_bytes,
            resume_after_error: false,
        }
    }

    /// Next complete command, or `Ok(None)` on clean end of stream.
    ///
    /// Protocol errors (oversized line or body, stream closed mid-command)
    /// are recoverable: the caller answers `ERR` and keeps reading.
    pub async fn next_command(&mut self) -> Result<Option<Command>> {
        let Some(verb) = self.next_line().await? else {
            return Ok(None);
        };

        let command = match verb.as_str() {
            "LOGIN" => {
                let username = self.required_line("LOGIN username").await?;
                let password = self.required_line("LOGIN password").await?;
                Command::Login { username, password }
            }
            "SEND" => {
                let recipient = self.required_line("SEND recipient").await?;
                let subject = self.required_line("SEND subject").await?;
                let body = self.read_body().await?;
                Command::Send {
                    recipient,
                    subject,
                    body,
                }
            }
            "LIST" => Command::List,
            "READ" => Command::Read {
                subject: self.required_line("READ subject").await?,
            },
            "DEL" => Command::Del {
                subject: self.required_line("DEL subject").await?,
            },
            "QUIT" => Command::Quit,
            _ => Command::Unknown { verb },
        };

        Ok(Some(command))
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            match self.lines.next().await {
                // The framed reader yields one synthetic end-of-stream
                // right after a decode error; polling again resumes at the
                // next complete line.
                None if self.resume_after_error => {
                    self.resume_after_error = false;
                    continue;
                }
                None => return Ok(None),
                Some(Ok(line)) => {
                    self.resume_after_error = false;
                    return Ok(Some(line));
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    self.resume_after_error = true;
                    return Err(Error::Protocol("Line exceeds maximum length".to_string()));
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(Error::Transport(e)),
            }
        }
    }

    async fn required_line(&mut self, what: &str) -> Result<String> {
        self.next_line()
            .await?
            .ok_or_else(|| Error::Protocol(format!("Connection closed before {}", what)))
    }

    /// Body lines up to the terminator, joined with `\n`.
    ///
    /// An oversized body (or an oversized line inside it) poisons the
    /// block but keeps draining to the terminator, so the stream stays
    /// aligned on command boundaries and the session can continue.
    async fn read_body(&mut self) -> Result<String> {
        let mut body = String::new();
        let mut size = 0usize;
        let mut oversized = false;
        let mut line_too_long = false;

        loop {
            let line = match self.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    return Err(Error::Protocol(
                        "Connection closed in message body".to_string(),
                    ))
                }
                Err(Error::Protocol(_)) => {
                    line_too_long = true;
                    body.clear();
                    continue;
                }
                Err(e) => return Err(e),
            };

            if line == BODY_TERMINATOR {
                break;
            }
            if oversized || line_too_long {
                continue;
            }

            size += line.len() + 1;
            if size > self.max_message_bytes {
                oversized = true;
                body.clear();
                continue;
            }

            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(&line);
        }

        if line_too_long {
            return Err(Error::Protocol("Line exceeds maximum length".to_string()));
        }
        if oversized {
            return Err(Error::Protocol(format!(
                "Message exceeds {} bytes",
                self.max_message_bytes
            )));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn reader(
        lines: &[&str],
        max_message_bytes: usize,
    ) -> CommandReader<impl Stream<Item = std::result::Result<String, LinesCodecError>> + Unpin>
    {
        let items: Vec<std::result::Result<String, LinesCodecError>> =
            lines.iter().map(|l| Ok(l.to_string())).collect();
        CommandReader::new(stream::iter(items), max_message_bytes)
    }

    #[tokio::test]
    async fn test_parse_login() {
        let mut r = reader(&["LOGIN", "user1", "pass1"], 1024);
        assert_eq!(
            r.next_command().await.unwrap(),
            Some(Command::Login {
                username: "user1".to_string(),
                password: "pass1".to_string(),
            })
        );
        assert_eq!(r.next_command().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_parse_send_multiline_body() {
        let mut r = reader(&["SEND", "user2", "Hello", "Hi", "there", ".", "LIST"], 1024);
        assert_eq!(
            r.next_command().await.unwrap(),
            Some(Command::Send {
                recipient: "user2".to_string(),
                subject: "Hello".to_string(),
                body: "Hi\nthere".to_string(),
            })
        );
        assert_eq!(r.next_command().await.unwrap(), Some(Command::List));
    }

    #[tokio::test]
    async fn test_parse_send_empty_body() {
        let mut r = reader(&["SEND", "user2", "empty", "."], 1024);
        assert_eq!(
            r.next_command().await.unwrap(),
            Some(Command::Send {
                recipient: "user2".to_string(),
                subject: "empty".to_string(),
                body: String::new(),
            })
        );
    }

    #[tokio::test]
    async fn test_body_keeps_dotted_lines() {
        // Only a lone "." terminates; ".." is an ordinary body line.
        let mut r = reader(&["SEND", "user2", "dots", "..", ".x", "."], 1024);
        match r.next_command().await.unwrap() {
            Some(Command::Send { body, .. }) => assert_eq!(body, "..\n.x"),
            other => panic!("expected SEND, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parse_read_del_quit_unknown() {
        let mut r = reader(&["READ", "Hello", "DEL", "Hello", "QUIT", "BOGUS"], 1024);
        assert_eq!(
            r.next_command().await.unwrap(),
            Some(Command::Read {
                subject: "Hello".to_string()
            })
        );
        assert_eq!(
            r.next_command().await.unwrap(),
            Some(Command::Del {
                subject: "Hello".to_string()
            })
        );
        assert_eq!(r.next_command().await.unwrap(), Some(Command::Quit));
        assert_eq!(
            r.next_command().await.unwrap(),
            Some(Command::Unknown {
                verb: "BOGUS".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_verbs_are_case_sensitive() {
        let mut r = reader(&["login"], 1024);
        assert_eq!(
            r.next_command().await.unwrap(),
            Some(Command::Unknown {
                verb: "login".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_eof_mid_command_is_protocol_error() {
        let mut r = reader(&["LOGIN", "user1"], 1024);
        match r.next_command().await {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_eof_in_body_is_protocol_error() {
        let mut r = reader(&["SEND", "user2", "Hello", "no terminator"], 1024);
        assert!(matches!(r.next_command().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_oversized_body_drains_to_terminator() {
        let big = "x".repeat(40);
        let mut r = reader(
            &["SEND", "user2", "big", big.as_str(), big.as_str(), ".", "LIST"],
            64,
        );
        assert!(matches!(r.next_command().await, Err(Error::Protocol(_))));
        // The stream is still aligned on command boundaries.
        assert_eq!(r.next_command().await.unwrap(), Some(Command::List));
    }

    #[tokio::test]
    async fn test_oversized_line_is_protocol_error() {
        let items: Vec<std::result::Result<String, LinesCodecError>> =
            vec![Err(LinesCodecError::MaxLineLengthExceeded), Ok("LIST".to_string())];
        let mut r = CommandReader::new(stream::iter(items), 1024);
        assert!(matches!(r.next_command().await, Err(Error::Protocol(_))));
        assert_eq!(r.next_command().await.unwrap(), Some(Command::List));
    }

    #[tokio::test]
    async fn test_oversized_line_in_body_poisons_block() {
        let items: Vec<std::result::Result<String, LinesCodecError>> = vec![
            Ok("SEND".to_string()),
            Ok("user2".to_string()),
            Ok("subject".to_string()),
            Err(LinesCodecError::MaxLineLengthExceeded),
            Ok("tail".to_string()),
            Ok(".".to_string()),
            Ok("LIST".to_string()),
        ];
        let mut r = CommandReader::new(stream::iter(items), 1024);
        assert!(matches!(r.next_command().await, Err(Error::Protocol(_))));
        assert_eq!(r.next_command().await.unwrap(), Some(Command::List));
    }

    #[tokio::test]
    async fn test_io_error_is_transport_error() {
        let items: Vec<std::result::Result<String, LinesCodecError>> =
            vec![Err(LinesCodecError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )))];
        let mut r = CommandReader::new(stream::iter(items), 1024);
        assert!(matches!(r.next_command().await, Err(Error::Transport(_))));
    }
}
