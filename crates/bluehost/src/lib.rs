//! bluehost - transaction engines of a Bluetooth host stack
//!
//! This library turns an ordered, fixed-MTU logical channel into a reliable
//! request/response protocol. It provides the L2CAP signaling channel with
//! typed BR/EDR and LE commands, and the ATT bearer that GATT builds on.
//!
//! Engines are single threaded and never block. They are driven by feeding
//! them inbound data (`handle_sdu`, `handle_pdu`) and by calling
//! `process_timeouts()` once the deadline reported by `next_deadline()` has
//! passed.

pub mod att;
pub mod error;
pub mod l2cap;
pub mod security;
pub mod time;

#[cfg(test)]
mod testing;

// Re-export common types for convenience
pub use att::{AttErrorCode, Bearer, BearerConfig, TransactionError};
pub use error::{Error, HostError};
pub use l2cap::{
    BrEdrCommandHandler, Channel, CommandHandler, ConnectionType, L2capError, LeCommandHandler,
    SignalingChannel, SignalingConfig,
};
pub use security::SecurityLevel;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
