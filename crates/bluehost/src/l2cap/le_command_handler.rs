//! LE signaling commands

use super::command_handler::*;
use super::constants::*;
use super::packet::*;
use super::signaling::*;
use super::types::*;
use log::debug;
use std::convert::TryFrom;
use std::ops::Deref;

impl ResponsePayload for ConnectionParameterUpdateResponseParams {
    const MIN_SIZE: usize = Self::SIZE;

    fn decode(payload: &[u8]) -> L2capResult<Self> {
        Self::try_from(payload)
    }
}

impl ResponsePayload for LeCreditBasedConnectionResponseParams {
    const MIN_SIZE: usize = Self::SIZE;

    fn decode(payload: &[u8]) -> L2capResult<Self> {
        Self::try_from(payload)
    }

    fn remote_cid(&self) -> u16 {
        self.dcid
    }
}

pub type ConnectionParameterUpdateResponse = Response<ConnectionParameterUpdateResponseParams>;
pub type LeCreditBasedConnectionResponse = Response<LeCreditBasedConnectionResponseParams>;

/// Marker for responders to Connection Parameter Update Requests
pub struct ParameterUpdate;

/// Marker for responders to LE Credit Based Connection Requests
pub struct LeCreditConnection;

pub type ConnectionParameterUpdateResponder = Responder<ParameterUpdate>;
pub type LeCreditBasedConnectionResponder = Responder<LeCreditConnection>;

impl Responder<ParameterUpdate> {
    pub fn send(self, result: u16) -> bool {
        let params = ConnectionParameterUpdateResponseParams { result };
        self.send_raw(&params.to_bytes())
    }
}

impl Responder<LeCreditConnection> {
    /// Answer with the endpoint allocated locally and its receive parameters
    pub fn send(
        self,
        local_cid: u16,
        mtu: u16,
        mps: u16,
        initial_credits: u16,
        result: u16,
    ) -> bool {
        let params = LeCreditBasedConnectionResponseParams {
            dcid: local_cid,
            mtu,
            mps,
            initial_credits,
            result,
        };
        self.send_raw(&params.to_bytes())
    }
}

/// Signaling commands of an LE link
#[derive(Clone)]
pub struct LeCommandHandler {
    handler: CommandHandler,
}

impl Deref for LeCommandHandler {
    type Target = CommandHandler;

    fn deref(&self) -> &CommandHandler {
        &self.handler
    }
}

impl LeCommandHandler {
    pub fn new(signaling: SignalingChannel, request_fail: Option<RequestFailCallback>) -> Self {
        assert_eq!(
            signaling.connection_type(),
            ConnectionType::LE,
            "l2cap: LE commands need an LE signaling channel"
        );
        Self {
            handler: CommandHandler::new(signaling, request_fail),
        }
    }

    pub fn send_connection_parameter_update_request(
        &self,
        params: &ConnectionParameterUpdate,
        callback: impl FnOnce(&ConnectionParameterUpdateResponse) + 'static,
    ) -> bool {
        self.send_typed_request(
            L2CAP_CONNECTION_PARAMETER_UPDATE_REQUEST,
            &params.to_bytes(),
            once(callback),
        )
    }

    pub fn send_le_credit_based_connection_request(
        &self,
        request: &LeCreditBasedConnectionRequestParams,
        callback: impl FnOnce(&LeCreditBasedConnectionResponse) + 'static,
    ) -> bool {
        self.send_typed_request(
            L2CAP_LE_CREDIT_BASED_CONNECTION_REQUEST,
            &request.to_bytes(),
            once(callback),
        )
    }

    /// Serve Connection Parameter Update Requests
    ///
    /// Requests with parameters out of range are answered with a rejected
    /// result without reaching `callback`.
    pub fn serve_connection_parameter_update_request(
        &self,
        mut callback: impl FnMut(ConnectionParameterUpdate, ConnectionParameterUpdateResponder)
            + 'static,
    ) {
        self.serve_typed_request(
            L2CAP_CONNECTION_PARAMETER_UPDATE_REQUEST,
            move |request: ConnectionParameterUpdate, responder| {
                let responder = ConnectionParameterUpdateResponder::new(
                    responder,
                    L2CAP_INVALID_CID,
                    L2CAP_INVALID_CID,
                );
                if !request.validate() {
                    debug!("l2cap: refusing out of range parameters {:?}", request);
                    responder.send(L2CAP_CONN_PARAM_REJECTED);
                    return;
                }
                callback(request, responder)
            },
        );
    }

    /// Serve LE Credit Based Connection Requests
    pub fn serve_le_credit_based_connection_request(
        &self,
        mut callback: impl FnMut(LeCreditBasedConnectionRequestParams, LeCreditBasedConnectionResponder)
            + 'static,
    ) {
        self.serve_typed_request(
            L2CAP_LE_CREDIT_BASED_CONNECTION_REQUEST,
            move |request: LeCreditBasedConnectionRequestParams, responder| {
                let responder =
                    LeCreditBasedConnectionResponder::new(responder, L2CAP_INVALID_CID, request.scid);
                callback(request, responder)
            },
        );
    }
}
