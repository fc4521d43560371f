//! L2CAP (Logical Link Control and Adaptation Protocol) signaling
//!
//! This module provides the signaling side of L2CAP:
//! - Matching outbound requests with responses by command identifier
//! - RTX/ERTX response timers with retransmission
//! - Dispatch of inbound requests to registered delegates
//! - Typed commands for BR/EDR and LE links

pub mod bredr_command_handler;
pub mod channel;
pub mod command_handler;
pub mod constants;
pub mod le_command_handler;
pub mod packet;
pub mod signaling;
pub mod types;
#[cfg(test)]
mod tests;

// Re-export the public API
pub use self::bredr_command_handler::{
    BrEdrCommandHandler, ConfigurationResponder, ConfigurationResponse, ConnectionResponder,
    ConnectionResponse, InformationResponder, InformationResponse,
};
pub use self::channel::Channel;
pub use self::command_handler::{
    CommandHandler, DisconnectionResponder, DisconnectionResponse, RequestFailCallback, Responder,
    Response, ResponsePayload,
};
pub use self::le_command_handler::{
    ConnectionParameterUpdateResponder, ConnectionParameterUpdateResponse, LeCommandHandler,
    LeCreditBasedConnectionResponder, LeCreditBasedConnectionResponse,
};
pub use self::signaling::{
    CommandId, CommandIdAllocator, RequestDelegate, ResponseHandler, ResponseHandlerAction,
    ResponseTimer, SignalingChannel, SignalingResponder, Status,
};
pub use self::types::*;
