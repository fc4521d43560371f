//! Type definitions for L2CAP signaling
//!
//! This module contains the data structures carried by signaling commands
//! and the tunables of the signaling engine.

use super::constants::*;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error types raised while decoding signaling payloads
#[derive(Debug, Error)]
pub enum L2capError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for L2CAP operations
pub type L2capResult<T> = std::result::Result<T, L2capError>;

/// Connection types for L2CAP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// Classic Bluetooth connection (ACL)
    Classic,
    /// Bluetooth Low Energy connection (LE)
    LE,
}

impl ConnectionType {
    /// Minimum signaling MTU for this link type
    pub fn signaling_mtu(&self) -> u16 {
        match self {
            Self::Classic => L2CAP_BREDR_SIGNALING_MTU,
            Self::LE => L2CAP_LE_SIGNALING_MTU,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => write!(f, "BR/EDR"),
            Self::LE => write!(f, "LE"),
        }
    }
}

/// Tunables of a signaling channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalingConfig {
    /// Initial response timeout, doubled on each retransmission
    pub rtx: Duration,
    /// Extended response timeout used once a peer asked for more time
    pub ertx: Duration,
    /// Total number of transmissions of a request, the first one included
    pub max_transmissions: usize,
    /// Largest command (header included) accepted or sent
    pub mtu: u16,
}

impl SignalingConfig {
    /// Default tunables for a given link type
    pub fn for_connection_type(connection_type: ConnectionType) -> Self {
        Self {
            rtx: L2CAP_RTX_TIMEOUT,
            ertx: L2CAP_ERTX_TIMEOUT,
            max_transmissions: L2CAP_MAX_TRANSMISSIONS,
            mtu: connection_type.signaling_mtu(),
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self::for_connection_type(ConnectionType::Classic)
    }
}

/// Reason carried by a Command Reject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Command not understood
    NotUnderstood,
    /// Signaling MTU exceeded
    SignalingMtuExceeded,
    /// Invalid CID in request
    InvalidCid,
    /// Reason code this host does not know about
    Other(u16),
}

impl From<u16> for RejectReason {
    fn from(value: u16) -> Self {
        match value {
            L2CAP_REJECT_NOT_UNDERSTOOD => Self::NotUnderstood,
            L2CAP_REJECT_MTU_EXCEEDED => Self::SignalingMtuExceeded,
            L2CAP_REJECT_INVALID_CID => Self::InvalidCid,
            other => Self::Other(other),
        }
    }
}

impl From<RejectReason> for u16 {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::NotUnderstood => L2CAP_REJECT_NOT_UNDERSTOOD,
            RejectReason::SignalingMtuExceeded => L2CAP_REJECT_MTU_EXCEEDED,
            RejectReason::InvalidCid => L2CAP_REJECT_INVALID_CID,
            RejectReason::Other(value) => value,
        }
    }
}

/// Quality of Service (QoS) Flow Specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosFlowSpec {
    /// QoS service type
    pub service_type: u8,
    /// Token rate (bytes/second)
    pub token_rate: u32,
    /// Token bucket size (bytes)
    pub token_bucket_size: u32,
    /// Peak bandwidth (bytes/second)
    pub peak_bandwidth: u32,
    /// Latency (microseconds)
    pub latency: u32,
    /// Delay variation (microseconds)
    pub delay_variation: u32,
}

impl Default for QosFlowSpec {
    fn default() -> Self {
        Self {
            service_type: 0x01, // Best effort
            token_rate: 0,
            token_bucket_size: 0,
            peak_bandwidth: 0,
            latency: 0xFFFFFFFF,
            delay_variation: 0xFFFFFFFF,
        }
    }
}

/// Retransmission and Flow Control modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetransmissionMode {
    /// Basic L2CAP mode (no retransmission or flow control)
    #[default]
    Basic = 0,
    /// Retransmission mode
    Retransmission = 1,
    /// Flow control mode
    FlowControl = 2,
    /// Enhanced Retransmission mode
    EnhancedRetransmission = 3,
    /// Streaming mode
    Streaming = 4,
}

impl TryFrom<u8> for RetransmissionMode {
    type Error = L2capError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Basic),
            1 => Ok(Self::Retransmission),
            2 => Ok(Self::FlowControl),
            3 => Ok(Self::EnhancedRetransmission),
            4 => Ok(Self::Streaming),
            other => Err(L2capError::InvalidParameter(format!(
                "Unknown retransmission mode {:#04x}",
                other
            ))),
        }
    }
}

/// Retransmission and Flow Control option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetransmissionFlowControl {
    /// Mode selection
    pub mode: RetransmissionMode,
    /// Transmission Window size
    pub tx_window_size: u8,
    /// Maximum number of retransmissions
    pub max_transmit: u8,
    /// Retransmission timeout (ms)
    pub retransmission_timeout: u16,
    /// Monitor timeout (ms)
    pub monitor_timeout: u16,
    /// Maximum PDU payload size
    pub max_pdu_size: u16,
}

/// Configuration options exchanged in Configuration Request/Response
///
/// Options that are not understood are kept as raw type/value pairs so that
/// a responder can report them back as unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigOptions {
    /// Maximum Transmission Unit
    pub mtu: Option<u16>,
    /// Flush Timeout
    pub flush_timeout: Option<u16>,
    /// Quality of Service
    pub qos: Option<QosFlowSpec>,
    /// Retransmission and Flow Control
    pub retransmission: Option<RetransmissionFlowControl>,
    /// Frame Check Sequence
    pub fcs: Option<u8>,
    /// Extended Window Size
    pub ext_window_size: Option<u16>,
    /// Options without a decoder, as (type, value) pairs
    pub unknown: Vec<(u8, Vec<u8>)>,
}

impl ConfigOptions {
    /// Whether no option is set
    pub fn is_empty(&self) -> bool {
        self.mtu.is_none()
            && self.flush_timeout.is_none()
            && self.qos.is_none()
            && self.retransmission.is_none()
            && self.fcs.is_none()
            && self.ext_window_size.is_none()
            && self.unknown.is_empty()
    }
}

/// L2CAP Connection Parameter Update request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameterUpdate {
    /// Minimum connection interval (1.25ms units)
    pub conn_interval_min: u16,
    /// Maximum connection interval (1.25ms units)
    pub conn_interval_max: u16,
    /// Peripheral latency (number of events)
    pub conn_latency: u16,
    /// Connection supervision timeout (10ms units)
    pub supervision_timeout: u16,
}

impl ConnectionParameterUpdate {
    /// Validates that the parameters are within acceptable ranges
    pub fn validate(&self) -> bool {
        let interval_ok = self.conn_interval_min >= L2CAP_LE_CONN_INTERVAL_MIN
            && self.conn_interval_max <= L2CAP_LE_CONN_INTERVAL_MAX
            && self.conn_interval_min <= self.conn_interval_max;

        let latency_ok = self.conn_latency <= L2CAP_LE_CONN_LATENCY_MAX;

        let timeout_ok = self.supervision_timeout >= L2CAP_LE_SUPERVISION_TIMEOUT_MIN
            && self.supervision_timeout <= L2CAP_LE_SUPERVISION_TIMEOUT_MAX;

        // Supervision timeout (10ms) must exceed (1 + latency) * max interval (1.25ms) * 2
        let relation_ok = (self.supervision_timeout as u32) * 4
            > (self.conn_interval_max as u32) * (self.conn_latency as u32 + 1);

        interval_ok && latency_ok && timeout_ok && relation_ok
    }
}

/// Kind of information asked for in an Information Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationType {
    ConnectionlessMtu,
    ExtendedFeatures,
    FixedChannels,
    Other(u16),
}

impl From<u16> for InformationType {
    fn from(value: u16) -> Self {
        match value {
            L2CAP_INFO_CONNECTIONLESS_MTU => Self::ConnectionlessMtu,
            L2CAP_INFO_EXTENDED_FEATURES => Self::ExtendedFeatures,
            L2CAP_INFO_FIXED_CHANNELS => Self::FixedChannels,
            other => Self::Other(other),
        }
    }
}

impl From<InformationType> for u16 {
    fn from(info_type: InformationType) -> Self {
        match info_type {
            InformationType::ConnectionlessMtu => L2CAP_INFO_CONNECTIONLESS_MTU,
            InformationType::ExtendedFeatures => L2CAP_INFO_EXTENDED_FEATURES,
            InformationType::FixedChannels => L2CAP_INFO_FIXED_CHANNELS,
            InformationType::Other(value) => value,
        }
    }
}
