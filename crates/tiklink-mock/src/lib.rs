//! Protocol test double for tiklink.
//!
//! A [`MockServer`] speaks the server side of the sentence protocol: it
//! greets every connection with a random challenge, accepts `/login`, and
//! answers hotspot and system commands from an in-memory [`DeviceState`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), tiklink_mock::MockError> {
//! use tiklink_mock::{MockOptions, MockServer};
//!
//! let handle = MockServer::bind("127.0.0.1:0", MockOptions::default())
//!     .await?
//!     .spawn()?;
//! println!("mock device on {}", handle.addr());
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Login is permissive unless [`MockOptions::strict_auth`] is set; the
//! default mode only exercises command behavior, not credential checks.

pub mod error;
pub mod server;
pub mod state;

pub use error::MockError;
pub use server::{MockHandle, MockOptions, MockServer};
pub use state::{DeviceFacts, DeviceState, MockAccount, MockActive, MockProfile, SharedState};
