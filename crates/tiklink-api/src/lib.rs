//! Async client for the router API sentence protocol.
//!
//! Layers, bottom up:
//!
//! - [`sentence`]: the `Sentence` / `Word` model and reply tags.
//! - [`codec`]: length-prefixed wire framing, usable as a `tokio_util` codec.
//! - [`request`]: a typed command builder and the collected [`Response`].
//! - [`auth`]: login methods and the challenge-response digest.
//! - [`session`]: one authenticated conversation over one TCP socket.
//!
//! Connection caching, path fallback and the typed device operations live
//! in `tiklink-core`.

pub mod auth;
pub mod codec;
pub mod error;
pub mod request;
pub mod sentence;
pub mod session;
pub mod transport;

pub use auth::{Credentials, LoginMethod};
pub use codec::{SentenceCodec, decode_sentence, encode_sentence};
pub use error::Error;
pub use request::{Request, Response};
pub use sentence::{ReplyTag, Row, Sentence, Word};
pub use session::{Session, SessionState};
pub use transport::{DEFAULT_PORT, TransportConfig};
