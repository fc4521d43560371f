//! L2CAP signaling packet encoding and decoding
//!
//! A signaling command is a 4 byte header (code, identifier, length) followed
//! by `length` bytes of parameters. The parameter structures below mirror the
//! command payloads one to one.

use super::constants::*;
use super::types::*;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::convert::TryFrom;
use std::io::Cursor;

/// L2CAP Signaling Command header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    /// Command code
    pub code: u8,
    /// Identifier used to match responses with requests
    pub identifier: u8,
    /// Length of command parameters
    pub length: u16,
}

impl CommandHeader {
    /// Create a new command header
    pub fn new(code: u8, identifier: u8, length: u16) -> Self {
        Self {
            code,
            identifier,
            length,
        }
    }

    /// Parse a command header from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < L2CAP_CMD_HEADER_SIZE {
            return None;
        }

        Some(Self {
            code: data[0],
            identifier: data[1],
            length: LittleEndian::read_u16(&data[2..4]),
        })
    }

    /// Serialize the command header to bytes
    pub fn to_bytes(&self) -> [u8; L2CAP_CMD_HEADER_SIZE] {
        let mut result = [0u8; L2CAP_CMD_HEADER_SIZE];
        result[0] = self.code;
        result[1] = self.identifier;
        LittleEndian::write_u16(&mut result[2..4], self.length);
        result
    }
}

/// Build a complete signaling command
pub fn encode_command(code: u8, identifier: u8, payload: &[u8]) -> Vec<u8> {
    let header = CommandHeader::new(code, identifier, payload.len() as u16);
    let mut packet = Vec::with_capacity(L2CAP_CMD_HEADER_SIZE + payload.len());
    packet.extend_from_slice(&header.to_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// A view of one signaling command inside a received frame
#[derive(Debug, Clone, Copy)]
pub struct CommandPacket<'a> {
    pub header: CommandHeader,
    pub payload: &'a [u8],
}

impl<'a> CommandPacket<'a> {
    /// Parse a command whose header length matches the remaining bytes exactly
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let header = CommandHeader::parse(data)?;
        let payload = &data[L2CAP_CMD_HEADER_SIZE..];
        if payload.len() != header.length as usize {
            return None;
        }
        Some(Self { header, payload })
    }

    /// Total size of the command on the wire
    pub fn size(&self) -> usize {
        L2CAP_CMD_HEADER_SIZE + self.payload.len()
    }
}

fn too_short(what: &str) -> L2capError {
    L2capError::InvalidParameter(format!("{} parameters too short", what))
}

/// Command Reject parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRejectParams {
    /// Reason for the rejection
    pub reason: RejectReason,
    /// Reason specific data
    pub data: Vec<u8>,
}

impl CommandRejectParams {
    pub fn not_understood() -> Self {
        Self {
            reason: RejectReason::NotUnderstood,
            data: Vec::new(),
        }
    }

    /// Reject carrying the actual signaling MTU of the rejecting side
    pub fn mtu_exceeded(mtu: u16) -> Self {
        Self {
            reason: RejectReason::SignalingMtuExceeded,
            data: mtu.to_le_bytes().to_vec(),
        }
    }

    /// Reject naming the channel endpoints from the rejecting side's view
    pub fn invalid_cid(local_cid: u16, remote_cid: u16) -> Self {
        let mut data = vec![0u8; 4];
        LittleEndian::write_u16(&mut data[0..2], local_cid);
        LittleEndian::write_u16(&mut data[2..4], remote_cid);
        Self {
            reason: RejectReason::InvalidCid,
            data,
        }
    }

    /// The two channel identifiers of an Invalid CID reject, in wire order
    pub fn channel_ids(&self) -> Option<(u16, u16)> {
        if self.reason != RejectReason::InvalidCid || self.data.len() < 4 {
            return None;
        }
        Some((
            LittleEndian::read_u16(&self.data[0..2]),
            LittleEndian::read_u16(&self.data[2..4]),
        ))
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(2 + self.data.len());
        result.extend_from_slice(&u16::from(self.reason).to_le_bytes());
        result.extend_from_slice(&self.data);
        result
    }
}

impl TryFrom<&[u8]> for CommandRejectParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < 2 {
            return Err(too_short("Command reject"));
        }

        let reason = RejectReason::from(LittleEndian::read_u16(&data[0..2]));
        let rest = &data[2..];
        let data = match reason {
            RejectReason::InvalidCid if rest.len() < 4 => {
                return Err(L2capError::InvalidParameter(
                    "Invalid CID reject without channel identifiers".into(),
                ))
            }
            RejectReason::InvalidCid => rest[..4].to_vec(),
            RejectReason::SignalingMtuExceeded if rest.len() < 2 => {
                return Err(L2capError::InvalidParameter(
                    "MTU exceeded reject without MTU".into(),
                ))
            }
            RejectReason::SignalingMtuExceeded => rest[..2].to_vec(),
            _ => rest.to_vec(),
        };

        Ok(Self { reason, data })
    }
}

impl ConfigOptions {
    /// Decode a sequence of configuration options
    ///
    /// A truncated trailing option is an error. Options of known types with a
    /// wrong length are errors too; unknown option types are collected.
    pub fn decode(data: &[u8]) -> L2capResult<Self> {
        let mut options = ConfigOptions::default();
        let mut offset = 0;

        while offset < data.len() {
            if offset + 2 > data.len() {
                return Err(L2capError::InvalidParameter(
                    "Truncated configuration option header".into(),
                ));
            }
            let raw_type = data[offset];
            let length = data[offset + 1] as usize;
            let start = offset + 2;
            if start + length > data.len() {
                return Err(L2capError::InvalidParameter(format!(
                    "Configuration option {:#04x} overruns the payload",
                    raw_type
                )));
            }
            let value = &data[start..start + length];
            offset = start + length;

            let option_type = raw_type & !L2CAP_CONF_HINT_BIT;
            match (option_type, length) {
                (L2CAP_CONF_MTU, 2) => options.mtu = Some(LittleEndian::read_u16(value)),
                (L2CAP_CONF_FLUSH_TIMEOUT, 2) => {
                    options.flush_timeout = Some(LittleEndian::read_u16(value))
                }
                (L2CAP_CONF_QOS, 22) => {
                    let mut cursor = Cursor::new(&value[2..]);
                    options.qos = Some(QosFlowSpec {
                        service_type: value[1],
                        token_rate: cursor.read_u32::<LittleEndian>()?,
                        token_bucket_size: cursor.read_u32::<LittleEndian>()?,
                        peak_bandwidth: cursor.read_u32::<LittleEndian>()?,
                        latency: cursor.read_u32::<LittleEndian>()?,
                        delay_variation: cursor.read_u32::<LittleEndian>()?,
                    });
                }
                (L2CAP_CONF_RFC, 9) => {
                    let mut cursor = Cursor::new(&value[3..]);
                    options.retransmission = Some(RetransmissionFlowControl {
                        mode: RetransmissionMode::try_from(value[0])?,
                        tx_window_size: value[1],
                        max_transmit: value[2],
                        retransmission_timeout: cursor.read_u16::<LittleEndian>()?,
                        monitor_timeout: cursor.read_u16::<LittleEndian>()?,
                        max_pdu_size: cursor.read_u16::<LittleEndian>()?,
                    });
                }
                (L2CAP_CONF_FCS, 1) => options.fcs = Some(value[0]),
                (L2CAP_CONF_EXT_WINDOW, 2) => {
                    options.ext_window_size = Some(LittleEndian::read_u16(value))
                }
                (L2CAP_CONF_MTU, _)
                | (L2CAP_CONF_FLUSH_TIMEOUT, _)
                | (L2CAP_CONF_QOS, _)
                | (L2CAP_CONF_RFC, _)
                | (L2CAP_CONF_FCS, _)
                | (L2CAP_CONF_EXT_WINDOW, _) => {
                    return Err(L2capError::InvalidParameter(format!(
                        "Configuration option {:#04x} has bad length {}",
                        option_type, length
                    )));
                }
                _ => options.unknown.push((raw_type, value.to_vec())),
            }
        }

        Ok(options)
    }

    /// Encode the options that are set, in option type order
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::new();

        if let Some(mtu) = self.mtu {
            result.extend_from_slice(&[L2CAP_CONF_MTU, 2]);
            result.extend_from_slice(&mtu.to_le_bytes());
        }

        if let Some(timeout) = self.flush_timeout {
            result.extend_from_slice(&[L2CAP_CONF_FLUSH_TIMEOUT, 2]);
            result.extend_from_slice(&timeout.to_le_bytes());
        }

        if let Some(qos) = self.qos {
            // Flags byte is reserved
            result.extend_from_slice(&[L2CAP_CONF_QOS, 22, 0, qos.service_type]);
            for value in [
                qos.token_rate,
                qos.token_bucket_size,
                qos.peak_bandwidth,
                qos.latency,
                qos.delay_variation,
            ] {
                result.extend_from_slice(&value.to_le_bytes());
            }
        }

        if let Some(rfc) = self.retransmission {
            result.extend_from_slice(&[
                L2CAP_CONF_RFC,
                9,
                rfc.mode as u8,
                rfc.tx_window_size,
                rfc.max_transmit,
            ]);
            result.extend_from_slice(&rfc.retransmission_timeout.to_le_bytes());
            result.extend_from_slice(&rfc.monitor_timeout.to_le_bytes());
            result.extend_from_slice(&rfc.max_pdu_size.to_le_bytes());
        }

        if let Some(fcs) = self.fcs {
            result.extend_from_slice(&[L2CAP_CONF_FCS, 1, fcs]);
        }

        if let Some(window) = self.ext_window_size {
            result.extend_from_slice(&[L2CAP_CONF_EXT_WINDOW, 2]);
            result.extend_from_slice(&window.to_le_bytes());
        }

        for (option_type, value) in &self.unknown {
            result.push(*option_type);
            result.push(value.len() as u8);
            result.extend_from_slice(value);
        }

        result
    }
}

/// Disconnection Request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectionRequestParams {
    /// Destination Channel Identifier, the endpoint on the receiving side
    pub dcid: u16,
    /// Source Channel Identifier, the endpoint on the sending side
    pub scid: u16,
}

impl DisconnectionRequestParams {
    pub const SIZE: usize = 4;

    pub fn to_bytes(&self) -> [u8; 4] {
        let mut result = [0u8; 4];
        LittleEndian::write_u16(&mut result[0..2], self.dcid);
        LittleEndian::write_u16(&mut result[2..4], self.scid);
        result
    }
}

impl TryFrom<&[u8]> for DisconnectionRequestParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::SIZE {
            return Err(too_short("Disconnection request"));
        }
        Ok(Self {
            dcid: LittleEndian::read_u16(&data[0..2]),
            scid: LittleEndian::read_u16(&data[2..4]),
        })
    }
}

/// Disconnection Response parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectionResponseParams {
    pub dcid: u16,
    pub scid: u16,
}

impl DisconnectionResponseParams {
    pub const SIZE: usize = 4;

    pub fn to_bytes(&self) -> [u8; 4] {
        let mut result = [0u8; 4];
        LittleEndian::write_u16(&mut result[0..2], self.dcid);
        LittleEndian::write_u16(&mut result[2..4], self.scid);
        result
    }
}

impl TryFrom<&[u8]> for DisconnectionResponseParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < Self::SIZE {
            return Err(too_short("Disconnection response"));
        }
        Ok(Self {
            dcid: LittleEndian::read_u16(&data[0..2]),
            scid: LittleEndian::read_u16(&data[2..4]),
        })
    }
}

/// L2CAP Connection Request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRequestParams {
    /// Protocol/Service Multiplexer (PSM)
    pub psm: u16,
    /// Source Channel Identifier (SCID)
    pub scid: u16,
}

impl ConnectionRequestParams {
    pub const SIZE: usize = 4;

    pub fn to_bytes(&self) -> [u8; 4] {
        let mut result = [0u8; 4];
        LittleEndian::write_u16(&mut result[0..2], self.psm);
        LittleEndian::write_u16(&mut result[2..4], self.scid);
        result
    }
}

impl TryFrom<&[u8]> for ConnectionRequestParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::SIZE {
            return Err(too_short("Connection request"));
        }
        Ok(Self {
            psm: LittleEndian::read_u16(&data[0..2]),
            scid: LittleEndian::read_u16(&data[2..4]),
        })
    }
}

/// L2CAP Connection Response parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionResponseParams {
    /// Destination Channel Identifier (DCID)
    pub dcid: u16,
    /// Source Channel Identifier (SCID)
    pub scid: u16,
    /// Result (0 = success, 1 = pending, otherwise refused)
    pub result: u16,
    /// Status (only meaningful when result = pending)
    pub status: u16,
}

impl ConnectionResponseParams {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; 8] {
        let mut result = [0u8; 8];
        LittleEndian::write_u16(&mut result[0..2], self.dcid);
        LittleEndian::write_u16(&mut result[2..4], self.scid);
        LittleEndian::write_u16(&mut result[4..6], self.result);
        LittleEndian::write_u16(&mut result[6..8], self.status);
        result
    }
}

impl TryFrom<&[u8]> for ConnectionResponseParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < Self::SIZE {
            return Err(too_short("Connection response"));
        }
        let mut cursor = Cursor::new(data);
        Ok(Self {
            dcid: cursor.read_u16::<LittleEndian>()?,
            scid: cursor.read_u16::<LittleEndian>()?,
            result: cursor.read_u16::<LittleEndian>()?,
            status: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Configuration Request parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRequestParams {
    pub dcid: u16,
    pub flags: u16,
    pub options: ConfigOptions,
}

impl ConfigurationRequestParams {
    pub const MIN_SIZE: usize = 4;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(Self::MIN_SIZE);
        result.extend_from_slice(&self.dcid.to_le_bytes());
        result.extend_from_slice(&self.flags.to_le_bytes());
        result.extend_from_slice(&self.options.encode());
        result
    }
}

impl TryFrom<&[u8]> for ConfigurationRequestParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < Self::MIN_SIZE {
            return Err(too_short("Configuration request"));
        }
        Ok(Self {
            dcid: LittleEndian::read_u16(&data[0..2]),
            flags: LittleEndian::read_u16(&data[2..4]),
            options: ConfigOptions::decode(&data[4..])?,
        })
    }
}

/// Configuration Response parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationResponseParams {
    pub scid: u16,
    pub flags: u16,
    pub result: u16,
    pub options: ConfigOptions,
}

impl ConfigurationResponseParams {
    pub const MIN_SIZE: usize = 6;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(Self::MIN_SIZE);
        result.extend_from_slice(&self.scid.to_le_bytes());
        result.extend_from_slice(&self.flags.to_le_bytes());
        result.extend_from_slice(&self.result.to_le_bytes());
        result.extend_from_slice(&self.options.encode());
        result
    }
}

impl TryFrom<&[u8]> for ConfigurationResponseParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < Self::MIN_SIZE {
            return Err(too_short("Configuration response"));
        }
        Ok(Self {
            scid: LittleEndian::read_u16(&data[0..2]),
            flags: LittleEndian::read_u16(&data[2..4]),
            result: LittleEndian::read_u16(&data[4..6]),
            options: ConfigOptions::decode(&data[6..])?,
        })
    }
}

/// Information Request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InformationRequestParams {
    pub info_type: InformationType,
}

impl InformationRequestParams {
    pub const SIZE: usize = 2;

    pub fn to_bytes(&self) -> [u8; 2] {
        u16::from(self.info_type).to_le_bytes()
    }
}

impl TryFrom<&[u8]> for InformationRequestParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::SIZE {
            return Err(too_short("Information request"));
        }
        Ok(Self {
            info_type: InformationType::from(LittleEndian::read_u16(data)),
        })
    }
}

/// Information Response parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationResponseParams {
    pub info_type: InformationType,
    pub result: u16,
    pub data: Vec<u8>,
}

impl InformationResponseParams {
    pub const MIN_SIZE: usize = 4;

    pub fn connectionless_mtu(mtu: u16) -> Self {
        Self {
            info_type: InformationType::ConnectionlessMtu,
            result: L2CAP_INFO_SUCCESS,
            data: mtu.to_le_bytes().to_vec(),
        }
    }

    pub fn extended_features(features: u32) -> Self {
        Self {
            info_type: InformationType::ExtendedFeatures,
            result: L2CAP_INFO_SUCCESS,
            data: features.to_le_bytes().to_vec(),
        }
    }

    pub fn fixed_channels(channels: u64) -> Self {
        Self {
            info_type: InformationType::FixedChannels,
            result: L2CAP_INFO_SUCCESS,
            data: channels.to_le_bytes().to_vec(),
        }
    }

    pub fn not_supported(info_type: InformationType) -> Self {
        Self {
            info_type,
            result: L2CAP_INFO_NOT_SUPPORTED,
            data: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == L2CAP_INFO_SUCCESS
    }

    /// Connectionless MTU, if that is what this response carries
    pub fn mtu(&self) -> Option<u16> {
        match self.info_type {
            InformationType::ConnectionlessMtu if self.is_success() && self.data.len() >= 2 => {
                Some(LittleEndian::read_u16(&self.data))
            }
            _ => None,
        }
    }

    /// Extended feature mask, if that is what this response carries
    pub fn features(&self) -> Option<u32> {
        match self.info_type {
            InformationType::ExtendedFeatures if self.is_success() && self.data.len() >= 4 => {
                Some(LittleEndian::read_u32(&self.data))
            }
            _ => None,
        }
    }

    /// Fixed channel mask, if that is what this response carries
    pub fn channels(&self) -> Option<u64> {
        match self.info_type {
            InformationType::FixedChannels if self.is_success() && self.data.len() >= 8 => {
                Some(LittleEndian::read_u64(&self.data))
            }
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(Self::MIN_SIZE + self.data.len());
        result.extend_from_slice(&u16::from(self.info_type).to_le_bytes());
        result.extend_from_slice(&self.result.to_le_bytes());
        result.extend_from_slice(&self.data);
        result
    }
}

impl TryFrom<&[u8]> for InformationResponseParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < Self::MIN_SIZE {
            return Err(too_short("Information response"));
        }
        let info_type = InformationType::from(LittleEndian::read_u16(&data[0..2]));
        let result = LittleEndian::read_u16(&data[2..4]);
        let data = &data[4..];

        if result == L2CAP_INFO_SUCCESS {
            let expected = match info_type {
                InformationType::ConnectionlessMtu => 2,
                InformationType::ExtendedFeatures => 4,
                InformationType::FixedChannels => 8,
                InformationType::Other(_) => 0,
            };
            if data.len() < expected {
                return Err(L2capError::InvalidParameter(format!(
                    "Information response for {:?} carries {} bytes",
                    info_type,
                    data.len()
                )));
            }
        }

        Ok(Self {
            info_type,
            result,
            data: data.to_vec(),
        })
    }
}

impl ConnectionParameterUpdate {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; 8] {
        let mut result = [0u8; 8];
        LittleEndian::write_u16(&mut result[0..2], self.conn_interval_min);
        LittleEndian::write_u16(&mut result[2..4], self.conn_interval_max);
        LittleEndian::write_u16(&mut result[4..6], self.conn_latency);
        LittleEndian::write_u16(&mut result[6..8], self.supervision_timeout);
        result
    }
}

impl TryFrom<&[u8]> for ConnectionParameterUpdate {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::SIZE {
            return Err(too_short("Connection parameter update request"));
        }
        let mut cursor = Cursor::new(data);
        Ok(Self {
            conn_interval_min: cursor.read_u16::<LittleEndian>()?,
            conn_interval_max: cursor.read_u16::<LittleEndian>()?,
            conn_latency: cursor.read_u16::<LittleEndian>()?,
            supervision_timeout: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Connection Parameter Update Response parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameterUpdateResponseParams {
    pub result: u16,
}

impl ConnectionParameterUpdateResponseParams {
    pub const SIZE: usize = 2;

    pub fn accepted(&self) -> bool {
        self.result == L2CAP_CONN_PARAM_ACCEPTED
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        self.result.to_le_bytes()
    }
}

impl TryFrom<&[u8]> for ConnectionParameterUpdateResponseParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < Self::SIZE {
            return Err(too_short("Connection parameter update response"));
        }
        Ok(Self {
            result: LittleEndian::read_u16(&data[0..2]),
        })
    }
}

/// LE Credit Based Connection Request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeCreditBasedConnectionRequestParams {
    pub le_psm: u16,
    pub scid: u16,
    pub mtu: u16,
    pub mps: u16,
    pub initial_credits: u16,
}

impl LeCreditBasedConnectionRequestParams {
    pub const SIZE: usize = 10;

    pub fn to_bytes(&self) -> [u8; 10] {
        let mut result = [0u8; 10];
        LittleEndian::write_u16(&mut result[0..2], self.le_psm);
        LittleEndian::write_u16(&mut result[2..4], self.scid);
        LittleEndian::write_u16(&mut result[4..6], self.mtu);
        LittleEndian::write_u16(&mut result[6..8], self.mps);
        LittleEndian::write_u16(&mut result[8..10], self.initial_credits);
        result
    }
}

impl TryFrom<&[u8]> for LeCreditBasedConnectionRequestParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::SIZE {
            return Err(too_short("LE credit based connection request"));
        }
        let mut cursor = Cursor::new(data);
        Ok(Self {
            le_psm: cursor.read_u16::<LittleEndian>()?,
            scid: cursor.read_u16::<LittleEndian>()?,
            mtu: cursor.read_u16::<LittleEndian>()?,
            mps: cursor.read_u16::<LittleEndian>()?,
            initial_credits: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// LE Credit Based Connection Response parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeCreditBasedConnectionResponseParams {
    pub dcid: u16,
    pub mtu: u16,
    pub mps: u16,
    pub initial_credits: u16,
    pub result: u16,
}

impl LeCreditBasedConnectionResponseParams {
    pub const SIZE: usize = 10;

    pub fn to_bytes(&self) -> [u8; 10] {
        let mut result = [0u8; 10];
        LittleEndian::write_u16(&mut result[0..2], self.dcid);
        LittleEndian::write_u16(&mut result[2..4], self.mtu);
        LittleEndian::write_u16(&mut result[4..6], self.mps);
        LittleEndian::write_u16(&mut result[6..8], self.initial_credits);
        LittleEndian::write_u16(&mut result[8..10], self.result);
        result
    }
}

impl TryFrom<&[u8]> for LeCreditBasedConnectionResponseParams {
    type Error = L2capError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < Self::SIZE {
            return Err(too_short("LE credit based connection response"));
        }
        let mut cursor = Cursor::new(data);
        Ok(Self {
            dcid: cursor.read_u16::<LittleEndian>()?,
            mtu: cursor.read_u16::<LittleEndian>()?,
            mps: cursor.read_u16::<LittleEndian>()?,
            initial_credits: cursor.read_u16::<LittleEndian>()?,
            result: cursor.read_u16::<LittleEndian>()?,
        })
    }
}
