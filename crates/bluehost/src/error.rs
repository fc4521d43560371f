//! Error types for the bluehost library
//!
//! Failures detected by the host are reported as [`HostError`]. Failures that
//! the peer reports with an explicit protocol error code are carried inside
//! [`Error`] together with that code.

use std::fmt;
use thiserror::Error;

/// Errors raised by the host side of a transaction
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    #[error("Operation timed out")]
    TimedOut,

    #[error("Operation failed")]
    Failed,

    #[error("Link disconnected")]
    LinkDisconnected,

    #[error("Operation not supported")]
    NotSupported,

    #[error("Insufficient security")]
    InsufficientSecurity,
}

/// A host error or a protocol error code received from the peer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<P: fmt::Debug> {
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Protocol error: {0:?}")]
    Protocol(P),
}

impl<P: fmt::Debug> Error<P> {
    /// Whether the peer reported this error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// The protocol error code, if the peer reported one
    pub fn protocol_error(&self) -> Option<&P> {
        match self {
            Error::Protocol(code) => Some(code),
            Error::Host(_) => None,
        }
    }

    /// The host error, if the failure was detected locally
    pub fn host_error(&self) -> Option<HostError> {
        match self {
            Error::Host(err) => Some(*err),
            Error::Protocol(_) => None,
        }
    }
}
