//! Connection acceptor and session workers
//!
//! One worker task per accepted connection. Live workers are held in a
//! registry so a shutdown signal reaches every in-flight session, and the
//! acceptor drains them all before returning.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, error, info, warn};

use spoolbox_common::config::LimitsConfig;
use spoolbox_common::{Error, Result};
use spoolbox_storage::MailboxStore;

use super::command::{Command, CommandReader};
use super::response::Reply;
use super::session::Session;
use crate::auth::{AuthDecision, Authenticator};

/// Mail server: accepts connections and runs one session worker each
pub struct MailServer {
    listener: TcpListener,
    limits: LimitsConfig,
    store: Arc<MailboxStore>,
    authenticator: Arc<dyn Authenticator>,
}

impl MailServer {
    /// Bind the listening endpoint. A failure here is a startup error and
    /// maps to a non-zero exit in the binary.
    pub async fn bind(
        addr: &str,
        limits: LimitsConfig,
        store: Arc<MailboxStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        Ok(Self {
            listener,
            limits,
            store,
            authenticator,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until `must_exit` flips, then stops accepting and
    /// drains every live session.
    pub async fn run(self, mut must_exit: watch::Receiver<bool>) -> Result<()> {
        info!("Mail server listening on {}", self.local_addr()?);

        let mut sessions = FuturesUnordered::new();

        while !*must_exit.borrow() {
            let wait_session_finished = async {
                if sessions.is_empty() {
                    futures::future::pending().await
                } else {
                    sessions.next().await
                }
            };

            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Accept error: {}", e);
                        continue;
                    }
                },
                _ = wait_session_finished => continue,
                _ = must_exit.changed() => continue,
            };

            info!(%peer, "Accepted connection");
            let worker = SessionWorker::new(
                stream,
                peer,
                self.store.clone(),
                self.authenticator.clone(),
                self.limits.clone(),
                must_exit.clone(),
            );
            sessions.push(tokio::spawn(worker.run_logged()));
        }

        drop(self.listener);

        info!("Mail server shutting down, draining live sessions...");
        while sessions.next().await.is_some() {}
        info!("All sessions finished");

        Ok(())
    }
}

/// Owns one connection and its session state for the connection's lifetime
struct SessionWorker {
    peer: SocketAddr,
    session: Session,
    reader: CommandReader<FramedRead<OwnedReadHalf, LinesCodec>>,
    writer: OwnedWriteHalf,
    store: Arc<MailboxStore>,
    authenticator: Arc<dyn Authenticator>,
    must_exit: watch::Receiver<bool>,
}

impl SessionWorker {
    fn new(
        stream: TcpStream,
        peer: SocketAddr,
        store: Arc<MailboxStore>,
        authenticator: Arc<dyn Authenticator>,
        limits: LimitsConfig,
        must_exit: watch::Receiver<bool>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let codec = LinesCodec::new_with_max_length(limits.max_line_length);
        let reader = CommandReader::new(FramedRead::new(read_half, codec), limits.max_message_bytes);

        Self {
            peer,
            session: Session::new(limits.max_login_attempts),
            reader,
            writer: write_half,
            store,
            authenticator,
            must_exit,
        }
    }

    async fn run_logged(mut self) {
        let session_id = self.session.id();
        let peer = self.peer;
        match self.run().await {
            Ok(()) => info!(%session_id, %peer, "Session finished"),
            Err(e) => warn!(%session_id, %peer, "Session failed: {}", e),
        }
    }

    async fn run(&mut self) -> Result<()> {
        self.reply(&Reply::greeting()).await?;

        loop {
            let next = tokio::select! {
                command = self.reader.next_command() => command,
                _ = self.must_exit.changed() => {
                    debug!(peer = %self.peer, "Server is stopping, closing session");
                    self.session.close();
                    break;
                }
            };

            match next {
                Ok(None) => {
                    debug!(peer = %self.peer, "Client closed connection");
                    self.session.close();
                    break;
                }
                Ok(Some(command)) => {
                    let (reply, quit) = self.handle_command(command).await;
                    if !reply.is_empty() {
                        self.reply(&reply).await?;
                    }
                    if quit {
                        break;
                    }
                }
                // Malformed input: answer ERR and keep the session alive.
                Err(e) if e.is_recoverable() => {
                    warn!(peer = %self.peer, "Protocol error: {}", e);
                    self.reply(&Reply::err()).await?;
                }
                // Transport failure: tear the session down.
                Err(e) => {
                    self.session.close();
                    return Err(e);
                }
            }
        }

        let _ = self.writer.shutdown().await;
        Ok(())
    }

    async fn reply(&mut self, reply: &str) -> Result<()> {
        self.writer.write_all(reply.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Dispatch one parsed command; returns the reply text and whether the
    /// session ends.
    async fn handle_command(&mut self, command: Command) -> (String, bool) {
        match command {
            Command::Quit => {
                // No reply required; the connection just closes.
                self.session.close();
                (String::new(), true)
            }
            Command::Login { username, password } => self.handle_login(username, password).await,
            _ if !self.session.is_authenticated() => {
                warn!(peer = %self.peer, verb = command.verb(), "Unauthorized command, login first");
                (Reply::err(), false)
            }
            Command::Send {
                recipient,
                subject,
                body,
            } => self.handle_send(recipient, subject, body).await,
            Command::List => self.handle_list().await,
            Command::Read { subject } => self.handle_read(subject).await,
            Command::Del { subject } => self.handle_del(subject).await,
            Command::Unknown { verb } => {
                warn!(peer = %self.peer, verb, "Unknown command");
                (Reply::err(), false)
            }
        }
    }

    async fn handle_login(&mut self, username: String, password: String) -> (String, bool) {
        if self.session.is_authenticated() {
            warn!(peer = %self.peer, "LOGIN while already authenticated");
            return (Reply::err(), false);
        }
        if self.session.is_locked_out() {
            // Fail closed: the authenticator is not consulted once this
            // connection has exhausted its attempts.
            warn!(peer = %self.peer, username, "LOGIN rejected, connection locked out");
            return (Reply::err(), false);
        }

        match self.authenticator.authenticate(&username, &password).await {
            Ok(AuthDecision::Granted) => {
                self.session.login_succeeded(username.clone());
                info!(session_id = %self.session.id(), username, "Login successful");
                (Reply::ok(), false)
            }
            Ok(AuthDecision::Denied) => {
                self.session.record_login_failure();
                warn!(
                    peer = %self.peer,
                    username,
                    attempts = self.session.failed_logins(),
                    "Login denied"
                );
                (Reply::err(), false)
            }
            Err(e) => {
                // Directory trouble is not a wrong password; the lockout
                // counter stays untouched.
                error!(peer = %self.peer, username, "Authenticator unavailable: {}", e);
                (Reply::err(), false)
            }
        }
    }

    async fn handle_send(
        &mut self,
        recipient: String,
        subject: String,
        body: String,
    ) -> (String, bool) {
        match self.store.save(&recipient, &subject, &body).await {
            Ok(()) => (Reply::ok(), false),
            Err(e) => {
                warn!(
                    user = self.session.user(),
                    recipient, subject, "SEND failed: {}", e
                );
                (Reply::err(), false)
            }
        }
    }

    async fn handle_list(&mut self) -> (String, bool) {
        let Some(user) = self.session.user().map(str::to_owned) else {
            return (Reply::err(), false);
        };

        match self.store.list(&user).await {
            Ok(subjects) => (Reply::listing(&subjects), false),
            Err(e) => {
                warn!(user, "LIST failed: {}", e);
                (Reply::err(), false)
            }
        }
    }

    async fn handle_read(&mut self, subject: String) -> (String, bool) {
        let Some(user) = self.session.user().map(str::to_owned) else {
            return (Reply::err(), false);
        };

        match self.store.read(&user, &subject).await {
            Ok(body) => (Reply::ok_with_body(&body), false),
            Err(Error::NotFound(_)) => {
                debug!(user, subject, "READ: no such message");
                (Reply::err(), false)
            }
            Err(e) => {
                warn!(user, subject, "READ failed: {}", e);
                (Reply::err(), false)
            }
        }
    }

    async fn handle_del(&mut self, subject: String) -> (String, bool) {
        let Some(user) = self.session.user().map(str::to_owned) else {
            return (Reply::err(), false);
        };

        match self.store.delete(&user, &subject).await {
            Ok(()) => (Reply::ok(), false),
            Err(Error::NotFound(_)) => {
                debug!(user, subject, "DEL: no such message");
                (Reply::err(), false)
            }
            Err(e) => {
                warn!(user, subject, "DEL failed: {}", e);
                (Reply::err(), false)
            }
        }
    }
}
