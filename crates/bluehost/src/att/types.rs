//! ATT protocol types and PDU definitions

use super::constants::*;
use super::error::AttErrorCode;
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::time::Duration;

bitflags! {
    /// Flag bits carried in the upper part of an opcode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpcodeFlags: u8 {
        const COMMAND = ATT_OPCODE_COMMAND_FLAG;
        const AUTH_SIGNATURE = ATT_OPCODE_AUTH_SIGNATURE_FLAG;
    }
}

impl OpcodeFlags {
    pub fn of(opcode: u8) -> Self {
        Self::from_bits_truncate(opcode)
    }
}

/// Role of a PDU in the request/response discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodType {
    Request,
    Response,
    Command,
    Notification,
    Indication,
    Confirmation,
    Invalid,
}

/// Classify an opcode
pub fn method_type(opcode: u8) -> MethodType {
    if OpcodeFlags::of(opcode).contains(OpcodeFlags::COMMAND) {
        return MethodType::Command;
    }

    match opcode {
        ATT_EXCHANGE_MTU_REQ
        | ATT_FIND_INFO_REQ
        | ATT_FIND_BY_TYPE_VALUE_REQ
        | ATT_READ_BY_TYPE_REQ
        | ATT_READ_REQ
        | ATT_READ_BLOB_REQ
        | ATT_READ_MULTIPLE_REQ
        | ATT_READ_BY_GROUP_TYPE_REQ
        | ATT_WRITE_REQ
        | ATT_PREPARE_WRITE_REQ
        | ATT_EXECUTE_WRITE_REQ
        | ATT_READ_MULTIPLE_VARIABLE_REQ => MethodType::Request,
        ATT_ERROR_RSP
        | ATT_EXCHANGE_MTU_RSP
        | ATT_FIND_INFO_RSP
        | ATT_FIND_BY_TYPE_VALUE_RSP
        | ATT_READ_BY_TYPE_RSP
        | ATT_READ_RSP
        | ATT_READ_BLOB_RSP
        | ATT_READ_MULTIPLE_RSP
        | ATT_READ_BY_GROUP_TYPE_RSP
        | ATT_WRITE_RSP
        | ATT_PREPARE_WRITE_RSP
        | ATT_EXECUTE_WRITE_RSP
        | ATT_READ_MULTIPLE_VARIABLE_RSP => MethodType::Response,
        ATT_HANDLE_VALUE_NTF | ATT_MULTIPLE_HANDLE_VALUE_NTF => MethodType::Notification,
        ATT_HANDLE_VALUE_IND => MethodType::Indication,
        ATT_HANDLE_VALUE_CONF => MethodType::Confirmation,
        _ => MethodType::Invalid,
    }
}

/// The opcode that completes a transaction started with `opcode`
///
/// Requests are completed by their response and indications by a
/// confirmation. Every other opcode has no counterpart.
pub fn matching_transaction_code(opcode: u8) -> Option<u8> {
    match opcode {
        ATT_HANDLE_VALUE_IND => Some(ATT_HANDLE_VALUE_CONF),
        _ if method_type(opcode) == MethodType::Request => Some(opcode + 1),
        _ => None,
    }
}

/// Trait for ATT PDUs with a fixed opcode
pub trait AttPacket: Sized {
    /// Opcode for this packet
    fn opcode() -> u8;

    /// Parse a PDU including its opcode byte
    fn parse(data: &[u8]) -> Result<Self, AttErrorCode>;

    /// Serialize packet to bytes
    fn serialize(&self) -> Vec<u8>;
}

/// Error response packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Request opcode in error
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: u16,
    /// Error code
    pub error_code: AttErrorCode,
}

impl ErrorResponse {
    pub fn new(request_opcode: u8, handle: u16, error_code: AttErrorCode) -> Self {
        Self {
            request_opcode,
            handle,
            error_code,
        }
    }

    /// Decode the parameters that follow the opcode
    ///
    /// The parameter block has a fixed size; any other length is malformed.
    pub fn parse_params(params: &[u8]) -> Result<Self, AttErrorCode> {
        if params.len() != ATT_ERROR_RSP_PARAMS_SIZE {
            return Err(AttErrorCode::InvalidPdu);
        }

        let mut cursor = Cursor::new(params);
        let request_opcode = cursor.read_u8().map_err(|_| AttErrorCode::InvalidPdu)?;
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttErrorCode::InvalidPdu)?;
        let error_code = cursor.read_u8().map_err(|_| AttErrorCode::InvalidPdu)?;

        Ok(Self::new(request_opcode, handle, error_code.into()))
    }
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(data: &[u8]) -> Result<Self, AttErrorCode> {
        match data.split_first() {
            Some((&opcode, params)) if opcode == Self::opcode() => Self::parse_params(params),
            _ => Err(AttErrorCode::InvalidPdu),
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + ATT_ERROR_RSP_PARAMS_SIZE);

        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());

        packet
    }
}

/// Exchange MTU Request packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeMtuRequest {
    /// Client Rx MTU size
    pub client_mtu: u16,
}

impl AttPacket for ExchangeMtuRequest {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_REQ
    }

    fn parse(data: &[u8]) -> Result<Self, AttErrorCode> {
        if data.len() != 3 || data[0] != Self::opcode() {
            return Err(AttErrorCode::InvalidPdu);
        }
        let mut cursor = Cursor::new(&data[1..]);
        let client_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttErrorCode::InvalidPdu)?;
        Ok(Self { client_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.client_mtu.to_le_bytes());
        packet
    }
}

/// Exchange MTU Response packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeMtuResponse {
    /// Server Rx MTU size
    pub server_mtu: u16,
}

impl AttPacket for ExchangeMtuResponse {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_RSP
    }

    fn parse(data: &[u8]) -> Result<Self, AttErrorCode> {
        if data.len() != 3 || data[0] != Self::opcode() {
            return Err(AttErrorCode::InvalidPdu);
        }
        let mut cursor = Cursor::new(&data[1..]);
        let server_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttErrorCode::InvalidPdu)?;
        Ok(Self { server_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.server_mtu.to_le_bytes());
        packet
    }
}

/// The MTU both sides settle on after an exchange
pub fn negotiated_mtu(local_preferred: u16, peer: u16) -> u16 {
    local_preferred.min(peer).max(ATT_LE_MIN_MTU)
}

/// Bearer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerConfig {
    /// Time allowed for the peer to complete a transaction
    pub transaction_timeout: Duration,
    /// MTU in effect before any exchange
    pub mtu: u16,
    /// Largest MTU this side is willing to negotiate
    pub preferred_mtu: u16,
}

impl Default for BearerConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: ATT_TRANSACTION_TIMEOUT,
            mtu: ATT_LE_MIN_MTU,
            preferred_mtu: ATT_MAX_MTU,
        }
    }
}

/// Identifies an inbound request or indication awaiting a local reply
pub type TransactionId = u64;

/// Identifies a registered inbound handler
pub type HandlerId = u64;

pub const INVALID_TRANSACTION_ID: TransactionId = 0;
pub const INVALID_HANDLER_ID: HandlerId = 0;
