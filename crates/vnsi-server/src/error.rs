//! Server error types.

use std::io;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket or file IO.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed frame from a client.
    #[error("Protocol error: {0}")]
    Protocol(#[from] vnsi_protocol::ProtocolError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
