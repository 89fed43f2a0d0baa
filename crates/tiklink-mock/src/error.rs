use thiserror::Error;

/// Errors raised by the mock device.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] tiklink_api::Error),

    #[error("server task failed: {0}")]
    Task(String),
}
