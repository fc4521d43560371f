//! L2CAP Signaling channel implementation
//!
//! The signaling channel multiplexes outbound requests, identified by a one
//! byte command identifier, over the fixed signaling channel of a link. Each
//! outbound request stays pending until a matching response or Command Reject
//! arrives, or until its response timer gives up.
//!
//! Requests start under the RTX timer and are retransmitted verbatim with a
//! doubled timeout until the transmission limit is reached. Once the peer
//! answers and the response handler asks for more responses, the request
//! moves to the ERTX timer for good and is never retransmitted again.
//!
//! Engines are single threaded. Every callback runs with no internal borrow
//! held, so handlers may call back into the engine, drop it, or close the
//! channel.

use super::channel::Channel;
use super::constants::*;
use super::packet::*;
use super::types::*;
use crate::time::{earliest, TimeSource, Timer};
use log::{debug, error, trace, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Identifier matching a signaling response with its request
pub type CommandId = u8;

/// Reserved identifier, never used on the wire by a compliant peer
pub const INVALID_COMMAND_ID: CommandId = 0x00;

/// How a pending request was concluded (or continued)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The peer sent the expected response
    Success,
    /// The peer sent a Command Reject
    Reject,
    /// The response timer gave up
    TimeOut,
    /// The channel closed before the request completed
    Closed,
}

/// What the engine should do after a response handler ran
///
/// Ignored for [`Status::TimeOut`] and [`Status::Closed`], which always
/// complete the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHandlerAction {
    /// Forget the request
    CompleteOutboundTransaction,
    /// Keep waiting under the ERTX timer
    ExpectAdditionalResponse,
    /// Drop this response and keep the current timer running
    IgnoreResponse,
}

/// Handler for the responses to one outbound request
pub type ResponseHandler = Box<dyn FnMut(Status, &[u8]) -> ResponseHandlerAction>;

/// Handler for inbound requests of one command code
pub type RequestDelegate = Box<dyn FnMut(&[u8], SignalingResponder)>;

/// Whether `code` is a response this host knows how to match
pub fn is_supported_response(code: u8) -> bool {
    matches!(
        code,
        L2CAP_COMMAND_REJECT
            | L2CAP_CONNECTION_RESPONSE
            | L2CAP_CONFIGURE_RESPONSE
            | L2CAP_DISCONNECTION_RESPONSE
            | L2CAP_ECHO_RESPONSE
            | L2CAP_INFORMATION_RESPONSE
            | L2CAP_CONNECTION_PARAMETER_UPDATE_RESPONSE
            | L2CAP_LE_CREDIT_BASED_CONNECTION_RESPONSE
    )
}

/// Response timer of a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTimer {
    /// Retransmits on expiry while transmissions remain
    Rtx { duration: Duration },
    /// Fails the request on expiry
    Ertx { duration: Duration },
}

impl ResponseTimer {
    pub fn duration(&self) -> Duration {
        match self {
            Self::Rtx { duration } | Self::Ertx { duration } => *duration,
        }
    }
}

/// Round robin command identifier source
#[derive(Debug, Clone)]
pub struct CommandIdAllocator {
    next: CommandId,
}

impl CommandIdAllocator {
    pub fn new() -> Self {
        Self { next: 0x01 }
    }

    /// Next identifier in sequence, wrapping 0xFF to 0x01
    pub fn next_command_id(&mut self) -> CommandId {
        let id = self.next;
        self.next = if id == u8::MAX { 0x01 } else { id + 1 };
        id
    }

    /// Next identifier in sequence that is not in use
    ///
    /// Returns None only when all 255 identifiers are in use.
    pub fn allocate(&mut self, mut in_use: impl FnMut(CommandId) -> bool) -> Option<CommandId> {
        for _ in 0..u8::MAX {
            let id = self.next_command_id();
            if !in_use(id) {
                return Some(id);
            }
        }
        None
    }
}

impl Default for CommandIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

struct PendingCommand {
    request_code: u8,
    response_code: u8,
    packet: Vec<u8>,
    // None while the handler is running
    handler: Option<ResponseHandler>,
    transmit_count: usize,
    response_timer: ResponseTimer,
    timer: Timer,
    sequence: u64,
}

struct Inner {
    channel: Weak<dyn Channel>,
    connection_type: ConnectionType,
    config: SignalingConfig,
    time: Rc<dyn TimeSource>,
    ids: CommandIdAllocator,
    pending: HashMap<CommandId, PendingCommand>,
    delegates: HashMap<u8, Rc<RefCell<RequestDelegate>>>,
    next_sequence: u64,
    open: bool,
}

enum Expiry {
    Retransmit(Vec<u8>),
    Fail(ResponseHandler),
}

fn transmit(inner: &Rc<RefCell<Inner>>, packet: Vec<u8>) -> bool {
    let channel = {
        let inner = inner.borrow();
        if !inner.open {
            return false;
        }
        match inner.channel.upgrade() {
            Some(channel) => channel,
            None => {
                debug!("l2cap: signaling channel is gone, dropping {} bytes", packet.len());
                return false;
            }
        }
    };

    trace!("l2cap: tx {}", hex::encode(&packet));
    channel.send(packet)
}

fn send_command(inner: &Rc<RefCell<Inner>>, code: u8, id: CommandId, payload: &[u8]) -> bool {
    let mtu = inner.borrow().config.mtu;
    let packet = encode_command(code, id, payload);
    assert!(
        packet.len() <= mtu as usize,
        "l2cap: command {:#04x} of {} bytes exceeds the signaling MTU ({})",
        code,
        packet.len(),
        mtu
    );
    transmit(inner, packet)
}

/// Answers one inbound request
///
/// Bound to the response code and identifier of the request it answers.
/// Consumed by the first reply so a request is answered at most once.
pub struct SignalingResponder {
    engine: Weak<RefCell<Inner>>,
    response_code: u8,
    id: CommandId,
}

impl SignalingResponder {
    /// Identifier of the request being answered
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Send the response with `payload` as parameters
    pub fn send(self, payload: &[u8]) -> bool {
        match self.engine.upgrade() {
            Some(inner) => send_command(&inner, self.response_code, self.id, payload),
            None => false,
        }
    }

    /// Reject the request as not understood
    pub fn reject_not_understood(self) -> bool {
        self.reject(CommandRejectParams::not_understood())
    }

    /// Reject the request as naming an invalid channel
    ///
    /// Channel identifiers are given from this host's point of view.
    pub fn reject_invalid_channel_id(self, local_cid: u16, remote_cid: u16) -> bool {
        self.reject(CommandRejectParams::invalid_cid(local_cid, remote_cid))
    }

    fn reject(self, params: CommandRejectParams) -> bool {
        match self.engine.upgrade() {
            Some(inner) => send_command(&inner, L2CAP_COMMAND_REJECT, self.id, &params.to_bytes()),
            None => false,
        }
    }
}

/// Signaling channel of one logical link
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct SignalingChannel {
    inner: Rc<RefCell<Inner>>,
}

impl SignalingChannel {
    /// Create a signaling channel with the default tunables of its link type
    pub fn new(
        channel: Weak<dyn Channel>,
        connection_type: ConnectionType,
        time: Rc<dyn TimeSource>,
    ) -> Self {
        let config = SignalingConfig::for_connection_type(connection_type);
        Self::with_config(channel, connection_type, config, time)
    }

    /// Create a signaling channel with explicit tunables
    pub fn with_config(
        channel: Weak<dyn Channel>,
        connection_type: ConnectionType,
        config: SignalingConfig,
        time: Rc<dyn TimeSource>,
    ) -> Self {
        assert!(config.max_transmissions >= 1, "l2cap: at least one transmission is required");
        assert!(
            config.mtu as usize >= L2CAP_CMD_HEADER_SIZE,
            "l2cap: signaling MTU {} cannot hold a command header",
            config.mtu
        );

        let signaling = Self {
            inner: Rc::new(RefCell::new(Inner {
                channel,
                connection_type,
                config,
                time,
                ids: CommandIdAllocator::new(),
                pending: HashMap::new(),
                delegates: HashMap::new(),
                next_sequence: 0,
                open: true,
            })),
        };

        if connection_type == ConnectionType::Classic {
            signaling.serve_request(
                L2CAP_ECHO_REQUEST,
                Box::new(|data, responder| {
                    responder.send(data);
                }),
            );
        }

        signaling
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.inner.borrow().connection_type
    }

    /// Local signaling MTU
    pub fn mtu(&self) -> u16 {
        self.inner.borrow().config.mtu
    }

    /// Whether the channel still accepts requests
    pub fn is_open(&self) -> bool {
        self.inner.borrow().open
    }

    /// Number of outbound requests awaiting a response
    pub fn pending_command_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Send a request and route its responses to `handler`
    ///
    /// Returns false if no request went out: the channel is closed or gone,
    /// or every command identifier is pending.
    pub fn send_request(&self, req_code: u8, payload: &[u8], handler: ResponseHandler) -> bool {
        let (id, sequence, packet) = {
            let mut inner = self.inner.borrow_mut();
            let size = L2CAP_CMD_HEADER_SIZE + payload.len();
            assert!(
                size <= inner.config.mtu as usize,
                "l2cap: request {:#04x} of {} bytes exceeds the signaling MTU ({})",
                req_code,
                size,
                inner.config.mtu
            );

            if !inner.open {
                debug!("l2cap: not sending request {:#04x} on closed channel", req_code);
                return false;
            }

            let Inner { ids, pending, .. } = &mut *inner;
            let Some(id) = ids.allocate(|id| pending.contains_key(&id)) else {
                error!("l2cap: no command identifier available ({} pending)", pending.len());
                return false;
            };

            let packet = encode_command(req_code, id, payload);
            let now = inner.time.now();
            let rtx = inner.config.rtx;
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;

            let mut timer = Timer::default();
            timer.arm(now, rtx);
            inner.pending.insert(
                id,
                PendingCommand {
                    request_code: req_code,
                    response_code: req_code.wrapping_add(1),
                    packet: packet.clone(),
                    handler: Some(handler),
                    transmit_count: 1,
                    response_timer: ResponseTimer::Rtx { duration: rtx },
                    timer,
                    sequence,
                },
            );
            (id, sequence, packet)
        };

        debug!("l2cap: sending request {:#04x} (id {:#04x})", req_code, id);
        if transmit(&self.inner, packet) {
            return true;
        }

        let mut inner = self.inner.borrow_mut();
        if inner.pending.get(&id).is_some_and(|command| command.sequence == sequence) {
            inner.pending.remove(&id);
        }
        false
    }

    /// Register (or replace) the delegate for inbound requests of `req_code`
    pub fn serve_request(&self, req_code: u8, delegate: RequestDelegate) {
        assert!(
            !is_supported_response(req_code),
            "l2cap: response code {:#04x} cannot be served as a request",
            req_code
        );
        self.inner
            .borrow_mut()
            .delegates
            .insert(req_code, Rc::new(RefCell::new(delegate)));
    }

    /// Check the link with an Echo Request carrying `data`
    ///
    /// `callback` gets the echoed bytes, or None if the peer rejected the
    /// request or never answered.
    pub fn test_link(&self, data: &[u8], callback: impl FnOnce(Option<&[u8]>) + 'static) -> bool {
        assert_eq!(
            self.connection_type(),
            ConnectionType::Classic,
            "l2cap: echo requests are only defined on BR/EDR signaling channels"
        );

        let mut callback = Some(callback);
        self.send_request(
            L2CAP_ECHO_REQUEST,
            data,
            Box::new(move |status, payload| {
                if let Some(callback) = callback.take() {
                    match status {
                        Status::Success => callback(Some(payload)),
                        _ => callback(None),
                    }
                }
                ResponseHandlerAction::CompleteOutboundTransaction
            }),
        )
    }

    /// Process one received signaling frame
    ///
    /// BR/EDR frames may carry several commands; a trailing partial command
    /// is dropped. LE frames carry exactly one command and are dropped when
    /// the header length disagrees with the frame size.
    pub fn handle_sdu(&self, sdu: &[u8]) {
        trace!("l2cap: rx {}", hex::encode(sdu));

        match self.connection_type() {
            ConnectionType::Classic => {
                let mut offset = 0;
                while offset < sdu.len() {
                    let Some(header) = CommandHeader::parse(&sdu[offset..]) else {
                        debug!("l2cap: dropping {} trailing bytes", sdu.len() - offset);
                        break;
                    };
                    let start = offset + L2CAP_CMD_HEADER_SIZE;
                    let end = start + header.length as usize;
                    if end > sdu.len() {
                        debug!(
                            "l2cap: dropping truncated command {:#04x} (id {:#04x})",
                            header.code, header.identifier
                        );
                        break;
                    }
                    self.check_and_dispatch_packet(CommandPacket {
                        header,
                        payload: &sdu[start..end],
                    });
                    offset = end;
                }
            }
            ConnectionType::LE => match CommandPacket::parse(sdu) {
                Some(packet) => self.check_and_dispatch_packet(packet),
                None => debug!("l2cap: dropping malformed LE signaling frame ({} bytes)", sdu.len()),
            },
        }
    }

    /// Validate one inbound command and route it, rejecting what cannot be
    /// routed
    pub fn check_and_dispatch_packet(&self, packet: CommandPacket<'_>) {
        let header = packet.header;
        let mtu = self.mtu();

        if packet.size() > mtu as usize {
            warn!(
                "l2cap: command {:#04x} of {} bytes exceeds signaling MTU {}",
                header.code,
                packet.size(),
                mtu
            );
            self.send_reject(header.identifier, CommandRejectParams::mtu_exceeded(mtu));
            return;
        }

        if header.identifier == INVALID_COMMAND_ID {
            debug!("l2cap: rejecting command {:#04x} with invalid id", header.code);
            self.send_reject(header.identifier, CommandRejectParams::not_understood());
            return;
        }

        if !self.handle_packet(packet) {
            debug!(
                "l2cap: rejecting unhandled command {:#04x} (id {:#04x})",
                header.code, header.identifier
            );
            self.send_reject(header.identifier, CommandRejectParams::not_understood());
        }
    }

    /// Route one inbound command
    ///
    /// Returns false if nothing handles its code.
    pub fn handle_packet(&self, packet: CommandPacket<'_>) -> bool {
        let code = packet.header.code;
        if is_supported_response(code) {
            self.on_rx_response(packet);
            return true;
        }

        let delegate = self.inner.borrow().delegates.get(&code).cloned();
        let Some(delegate) = delegate else {
            return false;
        };

        let responder = SignalingResponder {
            engine: Rc::downgrade(&self.inner),
            response_code: code.wrapping_add(1),
            id: packet.header.identifier,
        };

        match delegate.try_borrow_mut() {
            Ok(mut delegate) => (&mut *delegate)(packet.payload, responder),
            Err(_) => warn!("l2cap: delegate for {:#04x} is busy, dropping request", code),
        }
        true
    }

    fn on_rx_response(&self, packet: CommandPacket<'_>) {
        let id = packet.header.identifier;
        let code = packet.header.code;

        let (status, sequence, mut handler) = {
            let mut inner = self.inner.borrow_mut();
            let Some(command) = inner.pending.get_mut(&id) else {
                debug!("l2cap: ignoring response {:#04x} with unknown id {:#04x}", code, id);
                return;
            };

            let status = if code == command.response_code {
                Status::Success
            } else if code == L2CAP_COMMAND_REJECT {
                Status::Reject
            } else {
                warn!(
                    "l2cap: response {:#04x} does not answer request {:#04x} (id {:#04x})",
                    code, command.request_code, id
                );
                drop(inner);
                self.send_reject(id, CommandRejectParams::not_understood());
                return;
            };

            let Some(handler) = command.handler.take() else {
                debug!("l2cap: dropping response for id {:#04x} while its handler runs", id);
                return;
            };
            (status, command.sequence, handler)
        };

        let action = handler(status, packet.payload);
        self.finish_response(id, sequence, handler, action);
    }

    fn finish_response(
        &self,
        id: CommandId,
        sequence: u64,
        handler: ResponseHandler,
        action: ResponseHandlerAction,
    ) {
        let orphaned = {
            let mut inner = self.inner.borrow_mut();
            let now = inner.time.now();
            let ertx = inner.config.ertx;

            match inner.pending.get_mut(&id) {
                Some(command) if command.sequence == sequence => {
                    match action {
                        ResponseHandlerAction::CompleteOutboundTransaction => {
                            inner.pending.remove(&id);
                        }
                        ResponseHandlerAction::ExpectAdditionalResponse => {
                            command.response_timer = ResponseTimer::Ertx { duration: ertx };
                            command.timer.arm(now, ertx);
                            command.handler = Some(handler);
                        }
                        ResponseHandlerAction::IgnoreResponse => {
                            command.handler = Some(handler);
                        }
                    }
                    None
                }
                // The channel closed while the handler ran
                _ if action != ResponseHandlerAction::CompleteOutboundTransaction => Some(handler),
                _ => None,
            }
        };

        if let Some(mut handler) = orphaned {
            handler(Status::Closed, &[]);
        }
    }

    fn send_reject(&self, id: CommandId, params: CommandRejectParams) {
        send_command(&self.inner, L2CAP_COMMAND_REJECT, id, &params.to_bytes());
    }

    /// Run expired response timers
    ///
    /// Requests under RTX with transmissions left are retransmitted with the
    /// timeout doubled. All others are failed with [`Status::TimeOut`].
    pub fn process_timeouts(&self) {
        let now = self.inner.borrow().time.now();
        let mut expired: Vec<(u64, CommandId)> = self
            .inner
            .borrow()
            .pending
            .iter()
            .filter(|(_, command)| command.handler.is_some() && command.timer.has_expired(now))
            .map(|(id, command)| (command.sequence, *id))
            .collect();
        expired.sort_unstable();

        for (sequence, id) in expired {
            let expiry = {
                let mut inner = self.inner.borrow_mut();
                let max_transmissions = inner.config.max_transmissions;
                let Some(command) = inner.pending.get_mut(&id) else {
                    continue;
                };
                if command.sequence != sequence
                    || command.handler.is_none()
                    || !command.timer.has_expired(now)
                {
                    continue;
                }

                let response_timer = command.response_timer;
                let transmit_count = command.transmit_count;
                match response_timer {
                    ResponseTimer::Rtx { duration } if transmit_count < max_transmissions => {
                        let duration = duration * 2;
                        command.response_timer = ResponseTimer::Rtx { duration };
                        command.transmit_count += 1;
                        command.timer.arm(now, duration);
                        debug!(
                            "l2cap: retransmitting request {:#04x} (id {:#04x}, attempt {})",
                            command.request_code, id, command.transmit_count
                        );
                        Expiry::Retransmit(command.packet.clone())
                    }
                    _ => match inner.pending.remove(&id).and_then(|command| command.handler) {
                        Some(handler) => Expiry::Fail(handler),
                        None => continue,
                    },
                }
            };

            match expiry {
                Expiry::Retransmit(packet) => {
                    if !transmit(&self.inner, packet) {
                        warn!("l2cap: retransmission of id {:#04x} not sent", id);
                    }
                }
                Expiry::Fail(mut handler) => {
                    debug!("l2cap: request with id {:#04x} timed out", id);
                    handler(Status::TimeOut, &[]);
                }
            }
        }
    }

    /// Earliest response timer deadline, if any request is pending
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner
            .borrow()
            .pending
            .values()
            .map(|command| command.timer.deadline())
            .fold(None, earliest)
    }

    /// The underlying channel closed
    ///
    /// Every pending request fails with [`Status::Closed`] in the order it was
    /// sent. Later requests are refused.
    pub fn on_channel_closed(&self) {
        let handlers: Vec<ResponseHandler> = {
            let mut inner = self.inner.borrow_mut();
            if !inner.open {
                return;
            }
            inner.open = false;

            let mut commands: Vec<PendingCommand> =
                inner.pending.drain().map(|(_, command)| command).collect();
            commands.sort_by_key(|command| command.sequence);
            commands.into_iter().filter_map(|command| command.handler).collect()
        };

        debug!("l2cap: signaling channel closed, failing {} requests", handlers.len());
        for mut handler in handlers {
            handler(Status::Closed, &[]);
        }
    }
}
