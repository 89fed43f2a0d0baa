// Mock device server
//
// Accept loop plus the per-connection protocol state machine: greeting on
// accept, `/login`, then authenticated commands against the shared
// `DeviceState`. Reads go through `FramedRead` so split deliveries are
// reassembled exactly like on the client side.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tokio_util::codec::{Encoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tiklink_api::auth::challenge_response;
use tiklink_api::{ReplyTag, Sentence, SentenceCodec};

use crate::error::MockError;
use crate::state::{DeviceState, Outcome, SharedState};

/// Behavior switches for one mock server.
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Verify credentials against `users` instead of accepting any login.
    pub strict_auth: bool,
    /// Known users for strict mode: name → secret.
    pub users: HashMap<String, SecretString>,
    /// Split every outgoing write into pieces of at most this many bytes.
    pub write_chunk: Option<usize>,
    /// Wait this long before answering each authenticated command.
    pub reply_delay: Option<Duration>,
}

impl MockOptions {
    /// Strict mode with a single known user.
    pub fn strict(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::default().with_user(user, secret)
    }

    /// Add a user and turn strict mode on.
    pub fn with_user(mut self, user: impl Into<String>, secret: impl Into<String>) -> Self {
        self.strict_auth = true;
        self.users
            .insert(user.into(), SecretString::from(secret.into()));
        self
    }
}

/// A bound, not yet running, mock device.
pub struct MockServer {
    listener: TcpListener,
    options: Arc<MockOptions>,
    state: SharedState,
}

impl MockServer {
    /// Bind with a freshly seeded device state.
    pub async fn bind(addr: impl ToSocketAddrs, options: MockOptions) -> Result<Self, MockError> {
        Self::bind_with_state(addr, options, DeviceState::default()).await
    }

    pub async fn bind_with_state(
        addr: impl ToSocketAddrs,
        options: MockOptions,
        state: DeviceState,
    ) -> Result<Self, MockError> {
        let listener = TcpListener::bind(addr).await.map_err(MockError::Bind)?;
        Ok(Self {
            listener,
            options: Arc::new(options),
            state: SharedState::new(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, MockError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Run the accept loop on a background task.
    pub fn spawn(self) -> Result<MockHandle, MockError> {
        let addr = self.local_addr()?;
        let state = self.state.clone();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        Ok(MockHandle {
            addr,
            state,
            cancel,
            task,
        })
    }

    /// Accept connections until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), MockError> {
        info!(addr = %self.local_addr()?, strict = self.options.strict_auth, "mock device listening");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let conn = Connection::new(
                        stream,
                        peer,
                        Arc::clone(&self.options),
                        self.state.clone(),
                        cancel.child_token(),
                    );
                    tokio::spawn(conn.serve());
                }
            }
        }
        debug!("mock accept loop exiting");
        Ok(())
    }
}

/// Handle to a running mock server.
pub struct MockHandle {
    addr: SocketAddr,
    state: SharedState,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), MockError>>,
}

impl MockHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Stop accepting and drop every open connection.
    pub async fn shutdown(self) -> Result<(), MockError> {
        self.cancel.cancel();
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(MockError::Task(e.to_string())),
        }
    }
}

// ── Per-connection state machine ────────────────────────────────────

enum Step {
    Continue,
    Hangup,
}

struct Connection {
    reader: FramedRead<OwnedReadHalf, SentenceCodec>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    options: Arc<MockOptions>,
    state: SharedState,
    cancel: CancellationToken,
    challenge: String,
    user: Option<String>,
}

impl Connection {
    fn new(
        stream: TcpStream,
        peer: SocketAddr,
        options: Arc<MockOptions>,
        state: SharedState,
        cancel: CancellationToken,
    ) -> Self {
        let (read, writer) = stream.into_split();
        Self {
            reader: FramedRead::new(read, SentenceCodec::default()),
            writer,
            peer,
            options,
            state,
            cancel,
            challenge: format!("{:016x}", fastrand::u64(..)),
            user: None,
        }
    }

    async fn serve(mut self) {
        info!(peer = %self.peer, "client connected");
        if let Err(e) = self.run().await {
            debug!(peer = %self.peer, error = %e, "connection error");
        }
        if let Err(e) = self.writer.shutdown().await {
            debug!(peer = %self.peer, error = %e, "shutdown");
        }
        info!(peer = %self.peer, user = ?self.user, "client disconnected");
    }

    async fn run(&mut self) -> Result<(), MockError> {
        let greeting = Sentence::reply(ReplyTag::Done).with_attribute("ret", &self.challenge);
        self.write(&[greeting]).await?;

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                next = self.reader.next() => next,
            };
            let sentence = match next {
                Some(Ok(sentence)) => sentence,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            };
            debug!(peer = %self.peer, command = sentence.head().unwrap_or_default(), "received");

            if let Step::Hangup = self.handle(&sentence).await? {
                return Ok(());
            }
        }
    }

    async fn handle(&mut self, sentence: &Sentence) -> Result<Step, MockError> {
        match sentence.head() {
            Some("/login") => return self.login(sentence).await,
            Some("/quit") => {
                self.write(&[fatal("session terminated on request")]).await?;
                return Ok(Step::Hangup);
            }
            _ => {}
        }

        if self.user.is_none() {
            self.write(&[fatal("not logged in")]).await?;
            return Ok(Step::Hangup);
        }

        if let Some(delay) = self.options.reply_delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.state.lock().apply(sentence);
        let replies = match outcome {
            Outcome::Rows(rows) => {
                let mut replies: Vec<Sentence> = rows
                    .into_iter()
                    .map(|row| {
                        row.iter().fold(Sentence::reply(ReplyTag::Re), |s, (k, v)| {
                            s.with_attribute(k, v)
                        })
                    })
                    .collect();
                replies.push(Sentence::reply(ReplyTag::Done));
                replies
            }
            Outcome::Created(id) => vec![Sentence::reply(ReplyTag::Done).with_attribute("ret", id)],
            Outcome::Done => vec![Sentence::reply(ReplyTag::Done)],
            Outcome::Trap(message) => {
                debug!(peer = %self.peer, %message, "trap");
                vec![
                    Sentence::reply(ReplyTag::Trap).with_attribute("message", message),
                    Sentence::reply(ReplyTag::Done),
                ]
            }
        };
        self.write(&replies).await?;
        Ok(Step::Continue)
    }

    async fn login(&mut self, sentence: &Sentence) -> Result<Step, MockError> {
        let name = sentence.attribute("name").unwrap_or_default();
        if name.is_empty() {
            self.write(&[fatal("invalid user name or password (6)")]).await?;
            return Ok(Step::Hangup);
        }

        if self.options.strict_auth && !self.verify(name, sentence) {
            warn!(peer = %self.peer, user = name, "login rejected");
            self.write(&[fatal("invalid user name or password (6)")]).await?;
            return Ok(Step::Hangup);
        }

        let method = if sentence.attribute("response").is_some() {
            "challenge"
        } else {
            "plaintext"
        };
        info!(peer = %self.peer, user = name, method, "login accepted");
        self.user = Some(name.to_owned());
        self.write(&[Sentence::reply(ReplyTag::Done)]).await?;
        Ok(Step::Continue)
    }

    fn verify(&self, name: &str, sentence: &Sentence) -> bool {
        let Some(secret) = self.options.users.get(name) else {
            return false;
        };
        if let Some(password) = sentence.attribute("password") {
            return password == secret.expose_secret();
        }
        if let Some(response) = sentence.attribute("response") {
            return challenge_response(&self.challenge, secret)
                .is_ok_and(|expected| expected == response);
        }
        false
    }

    /// Encode `sentences` and write them, honoring `write_chunk`.
    async fn write(&mut self, sentences: &[Sentence]) -> Result<(), MockError> {
        let mut codec = SentenceCodec::default();
        let mut buf = BytesMut::new();
        for sentence in sentences {
            codec.encode(sentence, &mut buf)?;
        }

        match self.options.write_chunk {
            Some(chunk) if chunk > 0 => {
                for piece in buf.chunks(chunk) {
                    self.writer.write_all(piece).await?;
                    self.writer.flush().await?;
                    tokio::task::yield_now().await;
                }
            }
            _ => self.writer.write_all(&buf).await?,
        }
        Ok(())
    }
}

fn fatal(message: &str) -> Sentence {
    Sentence::reply(ReplyTag::Fatal).with_attribute("message", message)
}
