//! Attribute Protocol (ATT) bearer
//!
//! This module provides the transaction layer of ATT, which the GATT client
//! and server build on:
//! - Request/response and indication/confirmation flow control
//! - Transaction timeouts that close the bearer
//! - Security escalation when the peer requires a stronger link
//! - Dispatch of inbound PDUs to registered handlers

pub mod bearer;
pub mod constants;
pub mod error;
pub mod types;

// Re-export the public API
pub use self::bearer::{Bearer, ClosedCallback, Handler, TransactionCallback};
pub use self::constants::*;
pub use self::error::{AttErrorCode, Error, TransactionError};
pub use self::types::*;
