//! BR/EDR signaling commands
//!
//! Connection, Configuration and Information exchanges on top of the common
//! [`CommandHandler`].

use super::command_handler::*;
use super::constants::*;
use super::packet::*;
use super::signaling::*;
use super::types::*;
use std::convert::TryFrom;
use std::ops::Deref;

impl ResponsePayload for ConnectionResponseParams {
    const MIN_SIZE: usize = Self::SIZE;

    fn decode(payload: &[u8]) -> L2capResult<Self> {
        Self::try_from(payload)
    }

    fn local_cid(&self) -> u16 {
        self.scid
    }

    fn remote_cid(&self) -> u16 {
        self.dcid
    }
}

impl ResponsePayload for ConfigurationResponseParams {
    const MIN_SIZE: usize = Self::MIN_SIZE;

    fn decode(payload: &[u8]) -> L2capResult<Self> {
        Self::try_from(payload)
    }

    fn local_cid(&self) -> u16 {
        self.scid
    }
}

impl ResponsePayload for InformationResponseParams {
    const MIN_SIZE: usize = Self::MIN_SIZE;

    fn decode(payload: &[u8]) -> L2capResult<Self> {
        Self::try_from(payload)
    }
}

pub type ConnectionResponse = Response<ConnectionResponseParams>;
pub type ConfigurationResponse = Response<ConfigurationResponseParams>;
pub type InformationResponse = Response<InformationResponseParams>;

/// Marker for responders to Connection Requests
pub struct Connection;

/// Marker for responders to Configuration Requests
pub struct Configuration;

pub type ConnectionResponder = Responder<Connection>;
pub type ConfigurationResponder = Responder<Configuration>;

impl Responder<Connection> {
    /// Answer with the endpoint allocated locally (or none if refused)
    pub fn send(self, local_cid: u16, result: u16, status: u16) -> bool {
        let params = ConnectionResponseParams {
            dcid: local_cid,
            scid: self.remote_cid(),
            result,
            status,
        };
        self.send_raw(&params.to_bytes())
    }
}

impl Responder<Configuration> {
    pub fn send(self, remote_cid: u16, flags: u16, result: u16, options: &ConfigOptions) -> bool {
        let params = ConfigurationResponseParams {
            scid: remote_cid,
            flags,
            result,
            options: options.clone(),
        };
        self.send_raw(&params.to_bytes())
    }
}

/// Replies to one Information Request
pub struct InformationResponder {
    responder: SignalingResponder,
    info_type: InformationType,
}

impl InformationResponder {
    pub fn info_type(&self) -> InformationType {
        self.info_type
    }

    pub fn send_not_supported(self) -> bool {
        let params = InformationResponseParams::not_supported(self.info_type);
        self.responder.send(&params.to_bytes())
    }

    pub fn send_connectionless_mtu(self, mtu: u16) -> bool {
        self.responder
            .send(&InformationResponseParams::connectionless_mtu(mtu).to_bytes())
    }

    pub fn send_extended_features(self, features: u32) -> bool {
        self.responder
            .send(&InformationResponseParams::extended_features(features).to_bytes())
    }

    pub fn send_fixed_channels(self, channels: u64) -> bool {
        self.responder
            .send(&InformationResponseParams::fixed_channels(channels).to_bytes())
    }

    pub fn reject_not_understood(self) -> bool {
        self.responder.reject_not_understood()
    }
}

/// Signaling commands of a BR/EDR link
#[derive(Clone)]
pub struct BrEdrCommandHandler {
    handler: CommandHandler,
}

impl Deref for BrEdrCommandHandler {
    type Target = CommandHandler;

    fn deref(&self) -> &CommandHandler {
        &self.handler
    }
}

impl BrEdrCommandHandler {
    pub fn new(signaling: SignalingChannel, request_fail: Option<RequestFailCallback>) -> Self {
        assert_eq!(
            signaling.connection_type(),
            ConnectionType::Classic,
            "l2cap: BR/EDR commands need a BR/EDR signaling channel"
        );
        Self {
            handler: CommandHandler::new(signaling, request_fail),
        }
    }

    /// Open a channel to `psm`
    ///
    /// `callback` runs for every response; a pending result keeps the
    /// request alive under the ERTX timer.
    pub fn send_connection_request(
        &self,
        psm: u16,
        local_cid: u16,
        mut callback: impl FnMut(&ConnectionResponse) + 'static,
    ) -> bool {
        let params = ConnectionRequestParams {
            psm,
            scid: local_cid,
        };
        self.send_typed_request(
            L2CAP_CONNECTION_REQUEST,
            &params.to_bytes(),
            move |response: &ConnectionResponse| {
                callback(response);
                match response.payload() {
                    Some(params) if params.result == L2CAP_RESULT_PENDING => {
                        ResponseHandlerAction::ExpectAdditionalResponse
                    }
                    _ => ResponseHandlerAction::CompleteOutboundTransaction,
                }
            },
        )
    }

    /// Send (part of) our configuration for the channel to `remote_cid`
    ///
    /// A response with the continuation flag or a pending result keeps the
    /// request alive under the ERTX timer.
    pub fn send_configuration_request(
        &self,
        remote_cid: u16,
        flags: u16,
        options: &ConfigOptions,
        mut callback: impl FnMut(&ConfigurationResponse) + 'static,
    ) -> bool {
        let params = ConfigurationRequestParams {
            dcid: remote_cid,
            flags,
            options: options.clone(),
        };
        self.send_typed_request(
            L2CAP_CONFIGURE_REQUEST,
            &params.to_bytes(),
            move |response: &ConfigurationResponse| {
                callback(response);
                match response.payload() {
                    Some(params)
                        if params.flags & L2CAP_CONF_FLAG_CONTINUATION != 0
                            || params.result == L2CAP_CONF_PENDING =>
                    {
                        ResponseHandlerAction::ExpectAdditionalResponse
                    }
                    _ => ResponseHandlerAction::CompleteOutboundTransaction,
                }
            },
        )
    }

    pub fn send_information_request(
        &self,
        info_type: InformationType,
        callback: impl FnOnce(&InformationResponse) + 'static,
    ) -> bool {
        let params = InformationRequestParams { info_type };
        self.send_typed_request(L2CAP_INFORMATION_REQUEST, &params.to_bytes(), once(callback))
    }

    /// Serve Connection Requests
    ///
    /// `callback` gets `(psm, remote_cid, responder)`.
    pub fn serve_connection_request(
        &self,
        mut callback: impl FnMut(u16, u16, ConnectionResponder) + 'static,
    ) {
        self.serve_typed_request(
            L2CAP_CONNECTION_REQUEST,
            move |request: ConnectionRequestParams, responder| {
                let responder = ConnectionResponder::new(responder, L2CAP_INVALID_CID, request.scid);
                callback(request.psm, request.scid, responder)
            },
        );
    }

    /// Serve Configuration Requests
    ///
    /// `callback` gets `(local_cid, flags, options, responder)`.
    pub fn serve_configuration_request(
        &self,
        mut callback: impl FnMut(u16, u16, ConfigOptions, ConfigurationResponder) + 'static,
    ) {
        self.serve_typed_request(
            L2CAP_CONFIGURE_REQUEST,
            move |request: ConfigurationRequestParams, responder| {
                let responder =
                    ConfigurationResponder::new(responder, request.dcid, L2CAP_INVALID_CID);
                callback(request.dcid, request.flags, request.options, responder)
            },
        );
    }

    pub fn serve_information_request(
        &self,
        mut callback: impl FnMut(InformationType, InformationResponder) + 'static,
    ) {
        self.serve_typed_request(
            L2CAP_INFORMATION_REQUEST,
            move |request: InformationRequestParams, responder| {
                let responder = InformationResponder {
                    responder,
                    info_type: request.info_type,
                };
                callback(request.info_type, responder)
            },
        );
    }
}
