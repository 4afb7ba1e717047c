//! Error types for the connection engine.
//!
//! Two layers:
//! - [`BackendError`]: what a backend collaborator reports.
//! - [`HandlerError`]: what a request handler reports; every variant maps to
//!   exactly one [`ReturnCode`] sent back to the client.
//!
//! No error crosses the dispatch boundary: the dispatcher converts a
//! `HandlerError` into a status response and carries on.

use thiserror::Error;
use vnsi_protocol::{ProtocolError, ReturnCode};

/// Failure reported by a backend collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The referenced object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The object is in use by a running recording.
    #[error("busy: {0}")]
    Busy(String),

    /// The backend rejected the arguments.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Device or subsystem failure.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The backend does not implement this operation.
    #[error("unsupported operation")]
    Unsupported,
}

/// Failure of a single request handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// Bad or missing parameters.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Not logged in, session already active, scan already active, ...
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Referenced channel/recording/timer does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Target is busy recording.
    #[error("recording running: {0}")]
    Busy(String),

    /// Device or channel unavailable.
    #[error("device failure: {0}")]
    Device(String),

    /// Refused while data updates are inhibited.
    #[error("rejected by policy: {0}")]
    Policy(String),

    #[error("not supported")]
    NotSupported,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type HandlerResult<T> = Result<T, HandlerError>;

impl HandlerError {
    pub fn validation(reason: impl Into<String>) -> Self {
        HandlerError::Validation(reason.into())
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        HandlerError::Precondition(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        HandlerError::NotFound(reason.into())
    }

    /// Status code reported to the client.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            HandlerError::Validation(_) => ReturnCode::DataInvalid,
            HandlerError::Precondition(_) => ReturnCode::PreconditionFailed,
            HandlerError::NotFound(_) => ReturnCode::DataUnknown,
            HandlerError::Busy(_) => ReturnCode::RecRunning,
            HandlerError::Device(_) | HandlerError::Internal(_) => ReturnCode::Error,
            HandlerError::Policy(_) => ReturnCode::DataLocked,
            HandlerError::NotSupported => ReturnCode::NotSupported,
        }
    }
}

impl From<ProtocolError> for HandlerError {
    fn from(err: ProtocolError) -> Self {
        HandlerError::Validation(err.to_string())
    }
}

impl From<BackendError> for HandlerError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(what) => HandlerError::NotFound(what),
            BackendError::Busy(what) => HandlerError::Busy(what),
            BackendError::Invalid(what) => HandlerError::Validation(what),
            BackendError::Unavailable(what) => HandlerError::Device(what),
            BackendError::Unsupported => HandlerError::NotSupported,
        }
    }
}
