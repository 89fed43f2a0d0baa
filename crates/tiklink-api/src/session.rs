// Protocol session
//
// One authenticated conversation over one TCP socket. The session owns the
// socket exclusively and allows a single command in flight: `execute` takes
// `&mut self`, so the borrow checker enforces the no-pipelining rule and the
// "next complete reply belongs to the outstanding command" correlation.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::auth::{Credentials, LoginMethod, login_request};
use crate::codec::SentenceCodec;
use crate::error::Error;
use crate::request::{Request, Response};
use crate::sentence::{ReplyTag, Sentence};
use crate::transport::TransportConfig;

/// Lifecycle of a [`Session`].
///
/// `Connecting → AwaitingChallenge → Authenticating → Ready → Closed`;
/// any state may drop straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionState {
    Connecting,
    AwaitingChallenge,
    Authenticating,
    Ready,
    Closed,
}

/// A live, authenticated conversation with one device.
pub struct Session {
    framed: Option<Framed<TcpStream, SentenceCodec>>,
    state: SessionState,
    peer: SocketAddr,
    command_timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a socket to `host:port`, consume the greeting, and log in.
    ///
    /// On any failure the socket is closed before the error is returned.
    pub async fn connect(
        host: &str,
        port: u16,
        credentials: &Credentials,
        method: LoginMethod,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        debug!(host, port, state = %SessionState::Connecting, "opening socket");

        let stream = timeout(transport.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| Error::timeout("connect", transport.connect_timeout))??;
        stream.set_nodelay(transport.nodelay)?;
        let peer = stream.peer_addr()?;

        let mut session = Self {
            framed: Some(Framed::new(
                stream,
                SentenceCodec::new(transport.max_sentence_len),
            )),
            state: SessionState::AwaitingChallenge,
            peer,
            command_timeout: transport.command_timeout,
        };

        let handshake = timeout(
            transport.handshake_timeout,
            session.handshake(credentials, method),
        )
        .await
        .unwrap_or_else(|_| Err(Error::timeout("handshake", transport.handshake_timeout)));

        match handshake {
            Ok(()) => {
                session.state = SessionState::Ready;
                info!(%peer, user = %credentials.username, %method, "session ready");
                Ok(session)
            }
            Err(e) => {
                debug!(%peer, error = %e, "handshake failed");
                session.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, credentials: &Credentials, method: LoginMethod) -> Result<(), Error> {
        let greeting = self.read_sentence().await?;
        if greeting.reply_tag() != Some(ReplyTag::Done) {
            return Err(Error::Handshake {
                message: format!("expected `!done =ret=<challenge>` greeting, got `{greeting}`"),
            });
        }
        let challenge = greeting
            .attribute("ret")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Handshake {
                message: "greeting carried no challenge".into(),
            })?
            .to_owned();
        debug!(peer = %self.peer, challenge_len = challenge.len(), "greeting received");

        self.state = SessionState::Authenticating;
        let login = login_request(credentials, method, Some(&challenge))?;
        self.send(&login.to_sentence()).await?;

        loop {
            let reply = self.read_sentence().await?;
            match reply.reply_tag() {
                Some(ReplyTag::Done) => return Ok(()),
                Some(ReplyTag::Fatal | ReplyTag::Trap) => {
                    return Err(Error::LoginRejected {
                        message: reply.message().unwrap_or("login failed").to_owned(),
                    });
                }
                Some(ReplyTag::Re) => trace!(peer = %self.peer, "ignoring row during login"),
                None => return Err(Error::UnexpectedReply(reply.to_string())),
            }
        }
    }

    /// Run one command and collect its reply.
    ///
    /// `!trap` yields [`Error::Trap`] and leaves the session usable. Every
    /// other failure, including the command timeout, closes the session.
    pub async fn execute(&mut self, request: &Request) -> Result<Response, Error> {
        if self.state != SessionState::Ready {
            return Err(Error::NotReady { state: self.state });
        }
        debug!(peer = %self.peer, command = %request, "executing");

        let result = timeout(self.command_timeout, self.exchange(request))
            .await
            .unwrap_or_else(|_| Err(Error::timeout("command", self.command_timeout)));

        match &result {
            Ok(response) => {
                debug!(
                    peer = %self.peer,
                    command = request.command(),
                    rows = response.rows.len(),
                    "command done"
                );
            }
            Err(e) if e.is_connection_level() => {
                warn!(peer = %self.peer, command = request.command(), error = %e, "closing session");
                self.close().await;
            }
            Err(e) => debug!(peer = %self.peer, command = request.command(), error = %e, "command trapped"),
        }
        result
    }

    async fn exchange(&mut self, request: &Request) -> Result<Response, Error> {
        self.send(&request.to_sentence()).await?;

        let mut rows = Vec::new();
        let mut trap = None;
        loop {
            let reply = self.read_sentence().await?;
            match reply.reply_tag() {
                Some(ReplyTag::Re) => {
                    if trap.is_none() {
                        let row = reply.attributes();
                        trace!(?row, "row");
                        rows.push(row);
                    }
                }
                // The device still terminates a trapped command with `!done`.
                Some(ReplyTag::Trap) => {
                    if trap.is_none() {
                        trap = Some(Error::Trap {
                            message: reply.message().unwrap_or("command failed").to_owned(),
                            category: reply.attribute("category").and_then(|c| c.parse().ok()),
                        });
                    }
                }
                Some(ReplyTag::Done) => {
                    return match trap {
                        Some(err) => Err(err),
                        None => Ok(Response {
                            rows,
                            ret: reply.attribute("ret").map(str::to_owned),
                        }),
                    };
                }
                Some(ReplyTag::Fatal) => {
                    return Err(Error::Fatal {
                        message: reply.message().unwrap_or("fatal error").to_owned(),
                    });
                }
                None => return Err(Error::UnexpectedReply(reply.to_string())),
            }
        }
    }

    async fn send(&mut self, sentence: &Sentence) -> Result<(), Error> {
        let framed = self.framed.as_mut().ok_or(Error::ConnectionClosed)?;
        framed.send(sentence).await
    }

    async fn read_sentence(&mut self) -> Result<Sentence, Error> {
        let framed = self.framed.as_mut().ok_or(Error::ConnectionClosed)?;
        match framed.next().await {
            Some(Ok(sentence)) => {
                trace!(%sentence, "recv");
                Ok(sentence)
            }
            Some(Err(e)) => Err(e),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Shut the socket down. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(framed) = self.framed.take() {
            let mut stream = framed.into_inner();
            if let Err(e) = stream.shutdown().await {
                trace!(peer = %self.peer, error = %e, "socket shutdown");
            }
            debug!(peer = %self.peer, "session closed");
        }
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}
