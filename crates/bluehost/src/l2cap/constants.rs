//! L2CAP constants

use std::time::Duration;

// Signaling command header: code (1) + identifier (1) + length (2)
pub const L2CAP_CMD_HEADER_SIZE: usize = 4;

// Signaling command codes
pub const L2CAP_COMMAND_REJECT: u8 = 0x01;
pub const L2CAP_CONNECTION_REQUEST: u8 = 0x02;
pub const L2CAP_CONNECTION_RESPONSE: u8 = 0x03;
pub const L2CAP_CONFIGURE_REQUEST: u8 = 0x04;
pub const L2CAP_CONFIGURE_RESPONSE: u8 = 0x05;
pub const L2CAP_DISCONNECTION_REQUEST: u8 = 0x06;
pub const L2CAP_DISCONNECTION_RESPONSE: u8 = 0x07;
pub const L2CAP_ECHO_REQUEST: u8 = 0x08;
pub const L2CAP_ECHO_RESPONSE: u8 = 0x09;
pub const L2CAP_INFORMATION_REQUEST: u8 = 0x0A;
pub const L2CAP_INFORMATION_RESPONSE: u8 = 0x0B;
pub const L2CAP_CONNECTION_PARAMETER_UPDATE_REQUEST: u8 = 0x12;
pub const L2CAP_CONNECTION_PARAMETER_UPDATE_RESPONSE: u8 = 0x13;
pub const L2CAP_LE_CREDIT_BASED_CONNECTION_REQUEST: u8 = 0x14;
pub const L2CAP_LE_CREDIT_BASED_CONNECTION_RESPONSE: u8 = 0x15;
pub const L2CAP_LE_FLOW_CONTROL_CREDIT: u8 = 0x16;

// Command Reject reasons
pub const L2CAP_REJECT_NOT_UNDERSTOOD: u16 = 0x0000;
pub const L2CAP_REJECT_MTU_EXCEEDED: u16 = 0x0001;
pub const L2CAP_REJECT_INVALID_CID: u16 = 0x0002;

// Fixed channel identifiers
pub const L2CAP_INVALID_CID: u16 = 0x0000;
pub const L2CAP_SIGNALING_CID: u16 = 0x0001;
pub const L2CAP_CONNECTIONLESS_CID: u16 = 0x0002;
pub const L2CAP_ATTRIBUTE_PROTOCOL_CID: u16 = 0x0004;
pub const L2CAP_LE_SIGNALING_CID: u16 = 0x0005;
pub const L2CAP_LE_SECURITY_MANAGER_CID: u16 = 0x0006;
pub const L2CAP_BREDR_SECURITY_MANAGER_CID: u16 = 0x0007;
pub const L2CAP_DYNAMIC_CID_MIN: u16 = 0x0040;

// Signaling MTUs (the minimum MTU each link type must support)
pub const L2CAP_BREDR_SIGNALING_MTU: u16 = 48;
pub const L2CAP_LE_SIGNALING_MTU: u16 = 23;

// Response timers and retransmission limit
pub const L2CAP_RTX_TIMEOUT: Duration = Duration::from_secs(1);
pub const L2CAP_ERTX_TIMEOUT: Duration = Duration::from_secs(60);
pub const L2CAP_MAX_TRANSMISSIONS: usize = 3;

// Connection Response results
pub const L2CAP_RESULT_SUCCESS: u16 = 0x0000;
pub const L2CAP_RESULT_PENDING: u16 = 0x0001;
pub const L2CAP_RESULT_PSM_NOT_SUPPORTED: u16 = 0x0002;
pub const L2CAP_RESULT_SECURITY_BLOCK: u16 = 0x0003;
pub const L2CAP_RESULT_NO_RESOURCES: u16 = 0x0004;
pub const L2CAP_RESULT_INVALID_SOURCE_CID: u16 = 0x0006;
pub const L2CAP_RESULT_SOURCE_CID_ALREADY_ALLOCATED: u16 = 0x0007;

// Connection Response status (meaningful with a pending result)
pub const L2CAP_STATUS_NO_INFO: u16 = 0x0000;
pub const L2CAP_STATUS_AUTHENTICATION_PENDING: u16 = 0x0001;
pub const L2CAP_STATUS_AUTHORIZATION_PENDING: u16 = 0x0002;

// Configuration Response results
pub const L2CAP_CONF_SUCCESS: u16 = 0x0000;
pub const L2CAP_CONF_UNACCEPTABLE_PARAMETERS: u16 = 0x0001;
pub const L2CAP_CONF_REJECTED: u16 = 0x0002;
pub const L2CAP_CONF_UNKNOWN_OPTIONS: u16 = 0x0003;
pub const L2CAP_CONF_PENDING: u16 = 0x0004;
pub const L2CAP_CONF_FLOW_SPEC_REJECTED: u16 = 0x0005;

// Configuration flags
pub const L2CAP_CONF_FLAG_CONTINUATION: u16 = 0x0001;

// Configuration option types
pub const L2CAP_CONF_MTU: u8 = 0x01;
pub const L2CAP_CONF_FLUSH_TIMEOUT: u8 = 0x02;
pub const L2CAP_CONF_QOS: u8 = 0x03;
pub const L2CAP_CONF_RFC: u8 = 0x04;
pub const L2CAP_CONF_FCS: u8 = 0x05;
pub const L2CAP_CONF_EXT_FLOW_SPEC: u8 = 0x06;
pub const L2CAP_CONF_EXT_WINDOW: u8 = 0x07;
pub const L2CAP_CONF_HINT_BIT: u8 = 0x80;

// Information Request types
pub const L2CAP_INFO_CONNECTIONLESS_MTU: u16 = 0x0001;
pub const L2CAP_INFO_EXTENDED_FEATURES: u16 = 0x0002;
pub const L2CAP_INFO_FIXED_CHANNELS: u16 = 0x0003;

// Information Response results
pub const L2CAP_INFO_SUCCESS: u16 = 0x0000;
pub const L2CAP_INFO_NOT_SUPPORTED: u16 = 0x0001;

// Connection Parameter Update results
pub const L2CAP_CONN_PARAM_ACCEPTED: u16 = 0x0000;
pub const L2CAP_CONN_PARAM_REJECTED: u16 = 0x0001;

// LE Credit Based Connection results
pub const L2CAP_LE_RESULT_SUCCESS: u16 = 0x0000;
pub const L2CAP_LE_RESULT_PSM_NOT_SUPPORTED: u16 = 0x0002;
pub const L2CAP_LE_RESULT_NO_RESOURCES: u16 = 0x0004;
pub const L2CAP_LE_RESULT_INSUFFICIENT_AUTHENTICATION: u16 = 0x0005;
pub const L2CAP_LE_RESULT_INSUFFICIENT_AUTHORIZATION: u16 = 0x0006;
pub const L2CAP_LE_RESULT_INSUFFICIENT_ENCRYPTION_KEY_SIZE: u16 = 0x0007;
pub const L2CAP_LE_RESULT_INSUFFICIENT_ENCRYPTION: u16 = 0x0008;
pub const L2CAP_LE_RESULT_INVALID_SOURCE_CID: u16 = 0x0009;
pub const L2CAP_LE_RESULT_SOURCE_CID_ALREADY_ALLOCATED: u16 = 0x000A;
pub const L2CAP_LE_RESULT_UNACCEPTABLE_PARAMETERS: u16 = 0x000B;

// LE connection parameter limits
pub const L2CAP_LE_CONN_INTERVAL_MIN: u16 = 0x0006;
pub const L2CAP_LE_CONN_INTERVAL_MAX: u16 = 0x0C80;
pub const L2CAP_LE_CONN_LATENCY_MAX: u16 = 0x01F3;
pub const L2CAP_LE_SUPERVISION_TIMEOUT_MIN: u16 = 0x000A;
pub const L2CAP_LE_SUPERVISION_TIMEOUT_MAX: u16 = 0x0C80;

// LE credit based channel defaults
pub const L2CAP_LE_DEFAULT_MTU: u16 = 23;
pub const L2CAP_LE_MIN_MPS: u16 = 23;
pub const L2CAP_LE_MAX_MPS: u16 = 65533;
