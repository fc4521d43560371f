//! Typed commands over a signaling channel
//!
//! [`CommandHandler`] turns raw `(Status, bytes)` responses into typed
//! [`Response`] values and hands inbound requests to profile code together
//! with a [`Responder`] that already knows the channel endpoints involved.
//! The link specific handlers in `bredr_command_handler` and
//! `le_command_handler` build on it.

use super::constants::*;
use super::packet::*;
use super::signaling::*;
use super::types::*;
use log::debug;
use std::convert::TryFrom;
use std::marker::PhantomData;
use std::rc::Rc;

/// Callback run when an outbound request times out or its channel closes
pub type RequestFailCallback = Rc<dyn Fn()>;

/// Decoded parameters of a response command
pub trait ResponsePayload: Sized {
    /// Smallest acceptable parameter size
    const MIN_SIZE: usize;

    fn decode(payload: &[u8]) -> L2capResult<Self>;

    /// Local endpoint named by the response, from this host's point of view
    fn local_cid(&self) -> u16 {
        L2CAP_INVALID_CID
    }

    /// Remote endpoint named by the response
    fn remote_cid(&self) -> u16 {
        L2CAP_INVALID_CID
    }
}

/// Typed outcome of an outbound request
#[derive(Debug, Clone)]
pub struct Response<P> {
    status: Status,
    reject_reason: Option<RejectReason>,
    local_cid: u16,
    remote_cid: u16,
    payload: Option<P>,
}

impl<P: ResponsePayload> Response<P> {
    fn success(payload: P) -> Self {
        Self {
            status: Status::Success,
            reject_reason: None,
            local_cid: payload.local_cid(),
            remote_cid: payload.remote_cid(),
            payload: Some(payload),
        }
    }

    fn rejected(reject: &CommandRejectParams) -> Self {
        // The rejecting side lists its own endpoint first
        let (remote_cid, local_cid) = reject
            .channel_ids()
            .unwrap_or((L2CAP_INVALID_CID, L2CAP_INVALID_CID));
        Self {
            status: Status::Reject,
            reject_reason: Some(reject.reason),
            local_cid,
            remote_cid,
            payload: None,
        }
    }
}

impl<P> Response<P> {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_rejected(&self) -> bool {
        self.status == Status::Reject
    }

    /// Reason of a Command Reject
    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.reject_reason
    }

    pub fn local_cid(&self) -> u16 {
        self.local_cid
    }

    pub fn remote_cid(&self) -> u16 {
        self.remote_cid
    }

    /// Decoded parameters of a successful response
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }
}

/// Wrap a typed callback into a raw [`ResponseHandler`]
///
/// Timeouts and closure run `request_fail` and complete the request without
/// reaching `callback`. Malformed rejects and responses are dropped, leaving
/// the response timer running.
pub fn build_response_handler<P, F>(
    mut callback: F,
    request_fail: Option<RequestFailCallback>,
) -> ResponseHandler
where
    P: ResponsePayload + 'static,
    F: FnMut(&Response<P>) -> ResponseHandlerAction + 'static,
{
    Box::new(move |status, payload| match status {
        Status::TimeOut | Status::Closed => {
            if let Some(request_fail) = &request_fail {
                request_fail();
            }
            ResponseHandlerAction::CompleteOutboundTransaction
        }
        Status::Reject => match CommandRejectParams::try_from(payload) {
            Ok(reject) => callback(&Response::rejected(&reject)),
            Err(err) => {
                debug!("l2cap: dropping malformed command reject: {}", err);
                ResponseHandlerAction::IgnoreResponse
            }
        },
        Status::Success => {
            if payload.len() < P::MIN_SIZE {
                debug!(
                    "l2cap: dropping response of {} bytes (expected at least {})",
                    payload.len(),
                    P::MIN_SIZE
                );
                return ResponseHandlerAction::IgnoreResponse;
            }
            match P::decode(payload) {
                Ok(decoded) => callback(&Response::success(decoded)),
                Err(err) => {
                    debug!("l2cap: dropping undecodable response: {}", err);
                    ResponseHandlerAction::IgnoreResponse
                }
            }
        }
    })
}

/// Adapt a one-shot callback to a handler that completes after one answer
pub(crate) fn once<P, F>(callback: F) -> impl FnMut(&Response<P>) -> ResponseHandlerAction
where
    F: FnOnce(&Response<P>),
{
    let mut callback = Some(callback);
    move |response: &Response<P>| {
        if let Some(callback) = callback.take() {
            callback(response);
        }
        ResponseHandlerAction::CompleteOutboundTransaction
    }
}

/// Replies to one inbound request with the channel endpoints it named
pub struct Responder<K> {
    responder: SignalingResponder,
    local_cid: u16,
    remote_cid: u16,
    _kind: PhantomData<K>,
}

impl<K> Responder<K> {
    pub(crate) fn new(responder: SignalingResponder, local_cid: u16, remote_cid: u16) -> Self {
        Self {
            responder,
            local_cid,
            remote_cid,
            _kind: PhantomData,
        }
    }

    pub fn local_cid(&self) -> u16 {
        self.local_cid
    }

    pub fn remote_cid(&self) -> u16 {
        self.remote_cid
    }

    pub fn reject_not_understood(self) -> bool {
        self.responder.reject_not_understood()
    }

    pub fn reject_invalid_channel_id(self) -> bool {
        self.responder
            .reject_invalid_channel_id(self.local_cid, self.remote_cid)
    }

    pub(crate) fn send_raw(self, payload: &[u8]) -> bool {
        self.responder.send(payload)
    }
}

/// Marker for responders to Disconnection Requests
pub struct Disconnection;

pub type DisconnectionResponder = Responder<Disconnection>;

impl Responder<Disconnection> {
    pub fn send(self) -> bool {
        let params = DisconnectionResponseParams {
            dcid: self.local_cid,
            scid: self.remote_cid,
        };
        self.send_raw(&params.to_bytes())
    }
}

impl ResponsePayload for DisconnectionResponseParams {
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

pub type DisconnectionResponse = Response<DisconnectionResponseParams>;

/// Commands common to BR/EDR and LE signaling
#[derive(Clone)]
pub struct CommandHandler {
    signaling: SignalingChannel,
    request_fail: Option<RequestFailCallback>,
}

impl CommandHandler {
    /// `request_fail` runs whenever an outbound request times out
    pub fn new(signaling: SignalingChannel, request_fail: Option<RequestFailCallback>) -> Self {
        Self {
            signaling,
            request_fail,
        }
    }

    pub fn signaling(&self) -> &SignalingChannel {
        &self.signaling
    }

    /// Send a typed request whose responses go through `callback`
    pub fn send_typed_request<P, F>(&self, req_code: u8, payload: &[u8], callback: F) -> bool
    where
        P: ResponsePayload + 'static,
        F: FnMut(&Response<P>) -> ResponseHandlerAction + 'static,
    {
        let handler = build_response_handler(callback, self.request_fail.clone());
        self.signaling.send_request(req_code, payload, handler)
    }

    /// Serve a request code, rejecting requests whose parameters fail to decode
    pub fn serve_typed_request<R, F>(&self, req_code: u8, mut callback: F)
    where
        R: for<'a> TryFrom<&'a [u8], Error = L2capError> + 'static,
        F: FnMut(R, SignalingResponder) + 'static,
    {
        self.signaling.serve_request(
            req_code,
            Box::new(move |payload, responder| match R::try_from(payload) {
                Ok(request) => callback(request, responder),
                Err(err) => {
                    debug!("l2cap: rejecting malformed request {:#04x}: {}", req_code, err);
                    responder.reject_not_understood();
                }
            }),
        );
    }

    /// Ask the peer to close the channel between `local_cid` and `remote_cid`
    pub fn send_disconnection_request(
        &self,
        remote_cid: u16,
        local_cid: u16,
        callback: impl FnOnce(&DisconnectionResponse) + 'static,
    ) -> bool {
        let params = DisconnectionRequestParams {
            dcid: remote_cid,
            scid: local_cid,
        };
        self.send_typed_request(L2CAP_DISCONNECTION_REQUEST, &params.to_bytes(), once(callback))
    }

    /// Serve Disconnection Requests
    ///
    /// `callback` gets `(local_cid, remote_cid, responder)`.
    pub fn serve_disconnection_request(
        &self,
        mut callback: impl FnMut(u16, u16, DisconnectionResponder) + 'static,
    ) {
        self.serve_typed_request(
            L2CAP_DISCONNECTION_REQUEST,
            move |request: DisconnectionRequestParams, responder| {
                let responder = DisconnectionResponder::new(responder, request.dcid, request.scid);
                callback(request.dcid, request.scid, responder)
            },
        );
    }
}
