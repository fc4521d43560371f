//! ATT bearer
//!
//! The bearer multiplexes ATT traffic over one channel. Outbound Requests
//! and Indications form two independent transaction classes; each class has
//! at most one transaction on the wire and queues the rest in FIFO order.
//!
//! Anything the peer does that ATT cannot recover from (a stalled
//! transaction, an unexpected or malformed response, a second request
//! before the first was answered) closes the whole bearer.
//!
//! Like the signaling engine, every callback runs with no internal borrow
//! held. Callbacks may start new transactions, shut the bearer down or drop
//! the last handle to it.

use super::constants::*;
use super::error::{AttErrorCode, TransactionError};
use super::types::*;
use crate::error::HostError;
use crate::l2cap::Channel;
use crate::security::{SecurityLevel, SecurityUpgradeResult};
use crate::time::{earliest, TimeSource, Timer};
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Instant;

/// Completion of an outbound transaction
///
/// On success receives the whole response or confirmation PDU.
pub type TransactionCallback = Box<dyn FnOnce(Result<&[u8], TransactionError>)>;

/// Handles inbound PDUs of one opcode
///
/// Receives the whole PDU. Requests and indications come with the id to
/// answer them with; commands and notifications with
/// [`INVALID_TRANSACTION_ID`].
pub type Handler = Box<dyn FnMut(TransactionId, &[u8])>;

/// Invoked once when the bearer closes
pub type ClosedCallback = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionClass {
    Request,
    Indication,
}

struct PendingTransaction {
    opcode: u8,
    pdu: Vec<u8>,
    callback: TransactionCallback,
    // Highest level already requested on behalf of this transaction
    security_retry_level: SecurityLevel,
    // Error reported by the peer while an upgrade is in progress
    security_error: Option<(AttErrorCode, u16)>,
    sequence: u64,
}

#[derive(Default)]
struct TransactionQueue {
    current: Option<PendingTransaction>,
    queue: VecDeque<PendingTransaction>,
    timer: Timer,
}

impl TransactionQueue {
    fn awaiting_security(&self) -> bool {
        matches!(&self.current, Some(current) if current.security_error.is_some())
    }

    fn drain(&mut self) -> impl Iterator<Item = PendingTransaction> + '_ {
        self.timer.cancel();
        self.current.take().into_iter().chain(self.queue.drain(..))
    }
}

#[derive(Debug, Clone, Copy)]
struct RemoteTransaction {
    id: TransactionId,
    opcode: u8,
}

struct Inner {
    channel: Weak<dyn Channel>,
    time: Rc<dyn TimeSource>,
    config: BearerConfig,
    mtu: u16,
    preferred_mtu: u16,
    open: bool,
    closed_callback: Option<ClosedCallback>,
    request_queue: TransactionQueue,
    indication_queue: TransactionQueue,
    handlers: HashMap<u8, (HandlerId, Rc<RefCell<Handler>>)>,
    next_handler_id: HandlerId,
    next_remote_transaction_id: TransactionId,
    remote_request: Option<RemoteTransaction>,
    remote_indication: Option<RemoteTransaction>,
    next_sequence: u64,
}

impl Inner {
    fn queue_mut(&mut self, class: TransactionClass) -> &mut TransactionQueue {
        match class {
            TransactionClass::Request => &mut self.request_queue,
            TransactionClass::Indication => &mut self.indication_queue,
        }
    }

    fn remote_slot(&mut self, class: TransactionClass) -> &mut Option<RemoteTransaction> {
        match class {
            TransactionClass::Request => &mut self.remote_request,
            TransactionClass::Indication => &mut self.remote_indication,
        }
    }

    fn next_remote_id(&mut self) -> TransactionId {
        let id = self.next_remote_transaction_id;
        self.next_remote_transaction_id = self.next_remote_transaction_id.wrapping_add(1);
        if self.next_remote_transaction_id == INVALID_TRANSACTION_ID {
            self.next_remote_transaction_id = 1;
        }
        id
    }

    fn find_remote(&self, id: TransactionId) -> Option<(TransactionClass, RemoteTransaction)> {
        if id == INVALID_TRANSACTION_ID {
            return None;
        }
        match (self.remote_request, self.remote_indication) {
            (Some(remote), _) if remote.id == id => Some((TransactionClass::Request, remote)),
            (_, Some(remote)) if remote.id == id => Some((TransactionClass::Indication, remote)),
            _ => None,
        }
    }

    fn live_channel(&self) -> Option<Rc<dyn Channel>> {
        if !self.open {
            return None;
        }
        self.channel.upgrade()
    }
}

/// Level to request after the peer refused a request with `code`
///
/// `None` when no upgrade could help or one at that level was already tried.
fn security_upgrade_level(
    code: AttErrorCode,
    current: SecurityLevel,
    already_tried: SecurityLevel,
) -> Option<SecurityLevel> {
    let required = match code {
        AttErrorCode::InsufficientEncryption => SecurityLevel::Encrypted,
        AttErrorCode::InsufficientAuthentication if !current.is_encrypted() => {
            SecurityLevel::Encrypted
        }
        AttErrorCode::InsufficientAuthentication => SecurityLevel::Authenticated,
        _ => return None,
    };

    if already_tried >= required || required <= current {
        return None;
    }
    Some(required)
}

enum Completion {
    Deliver(TransactionCallback),
    Fail(TransactionCallback, TransactionError),
    UpgradeSecurity(Rc<dyn Channel>, SecurityLevel),
    ShutDown,
}

/// ATT bearer over one channel
///
/// Cloning yields another handle to the same bearer.
#[derive(Clone)]
pub struct Bearer {
    inner: Rc<RefCell<Inner>>,
}

impl Bearer {
    /// Create a bearer with the default configuration
    ///
    /// Returns `None` if the channel is already gone.
    pub fn new(channel: Weak<dyn Channel>, time: Rc<dyn TimeSource>) -> Option<Self> {
        Self::with_config(channel, BearerConfig::default(), time)
    }

    pub fn with_config(
        channel: Weak<dyn Channel>,
        config: BearerConfig,
        time: Rc<dyn TimeSource>,
    ) -> Option<Self> {
        assert!(
            config.mtu >= ATT_LE_MIN_MTU && config.preferred_mtu >= ATT_LE_MIN_MTU,
            "att: MTU below the minimum of {}",
            ATT_LE_MIN_MTU
        );
        channel.upgrade()?;

        Some(Self {
            inner: Rc::new(RefCell::new(Inner {
                channel,
                time,
                config,
                mtu: config.mtu,
                preferred_mtu: config.preferred_mtu,
                open: true,
                closed_callback: None,
                request_queue: TransactionQueue::default(),
                indication_queue: TransactionQueue::default(),
                handlers: HashMap::new(),
                next_handler_id: 1,
                next_remote_transaction_id: 1,
                remote_request: None,
                remote_indication: None,
                next_sequence: 0,
            })),
        })
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().open
    }

    /// Current MTU
    pub fn mtu(&self) -> u16 {
        self.inner.borrow().mtu
    }

    pub fn set_mtu(&self, mtu: u16) {
        assert!(mtu >= self.min_mtu(), "att: MTU {} below the minimum", mtu);
        debug!("att: bearer MTU is now {}", mtu);
        self.inner.borrow_mut().mtu = mtu;
    }

    pub fn preferred_mtu(&self) -> u16 {
        self.inner.borrow().preferred_mtu
    }

    pub fn set_preferred_mtu(&self, mtu: u16) {
        assert!(mtu >= self.min_mtu(), "att: preferred MTU {} below the minimum", mtu);
        self.inner.borrow_mut().preferred_mtu = mtu;
    }

    pub fn min_mtu(&self) -> u16 {
        ATT_LE_MIN_MTU
    }

    /// Register `callback` to run once when the bearer closes
    pub fn set_closed_callback(&self, callback: impl FnOnce() + 'static) {
        self.inner.borrow_mut().closed_callback = Some(Box::new(callback));
    }

    /// Close the bearer and signal a link error on the channel
    pub fn shut_down(&self) {
        self.shut_down_internal(false, true);
    }

    /// The channel closed underneath the bearer
    pub fn on_channel_closed(&self) {
        self.shut_down_internal(false, false);
    }

    /// Start a Request or Indication transaction
    ///
    /// `callback` runs exactly once. If the bearer is closed it runs
    /// immediately with [`HostError::LinkDisconnected`].
    ///
    /// # Panics
    ///
    /// If `pdu` is empty, larger than the MTU, or not a Request or
    /// Indication.
    pub fn start_transaction(
        &self,
        pdu: Vec<u8>,
        callback: impl FnOnce(Result<&[u8], TransactionError>) + 'static,
    ) {
        assert!(!pdu.is_empty(), "att: empty PDU");
        let opcode = pdu[0];
        let class = match method_type(opcode) {
            MethodType::Request => TransactionClass::Request,
            MethodType::Indication => TransactionClass::Indication,
            other => panic!(
                "att: opcode {:#04x} ({:?}) does not start a transaction",
                opcode, other
            ),
        };

        {
            let mut inner = self.inner.borrow_mut();
            assert!(
                pdu.len() <= inner.mtu as usize,
                "att: PDU of {} bytes exceeds the MTU ({})",
                pdu.len(),
                inner.mtu
            );

            if inner.open {
                let sequence = inner.next_sequence;
                inner.next_sequence += 1;
                inner.queue_mut(class).queue.push_back(PendingTransaction {
                    opcode,
                    pdu,
                    callback: Box::new(callback),
                    security_retry_level: SecurityLevel::NoSecurity,
                    security_error: None,
                    sequence,
                });
                drop(inner);
                self.try_start_next(class);
                return;
            }
        }

        debug!("att: bearer closed, not starting {:#04x}", opcode);
        callback(Err(TransactionError::host(HostError::LinkDisconnected)));
    }

    /// Send a Command or Notification
    ///
    /// Returns false if the bearer is closed or the channel refused the PDU.
    ///
    /// # Panics
    ///
    /// If `pdu` is empty, larger than the MTU, or expects a response.
    pub fn send_without_response(&self, pdu: Vec<u8>) -> bool {
        assert!(!pdu.is_empty(), "att: empty PDU");
        let opcode = pdu[0];
        let method = method_type(opcode);
        assert!(
            matches!(method, MethodType::Command | MethodType::Notification),
            "att: opcode {:#04x} ({:?}) expects a response",
            opcode,
            method
        );

        let channel = {
            let inner = self.inner.borrow();
            assert!(
                pdu.len() <= inner.mtu as usize,
                "att: PDU of {} bytes exceeds the MTU ({})",
                pdu.len(),
                inner.mtu
            );
            match inner.live_channel() {
                Some(channel) => channel,
                None => return false,
            }
        };

        trace!("att: tx {}", hex::encode(&pdu));
        channel.send(pdu)
    }

    /// Register `handler` for inbound PDUs with `opcode`
    ///
    /// A later registration for the same opcode replaces this one. Returns
    /// [`INVALID_HANDLER_ID`] if the bearer is closed.
    pub fn register_handler(
        &self,
        opcode: u8,
        handler: impl FnMut(TransactionId, &[u8]) + 'static,
    ) -> HandlerId {
        let method = method_type(opcode);
        assert!(
            !matches!(
                method,
                MethodType::Response | MethodType::Confirmation | MethodType::Invalid
            ),
            "att: cannot handle opcode {:#04x} ({:?})",
            opcode,
            method
        );

        let mut inner = self.inner.borrow_mut();
        if !inner.open {
            return INVALID_HANDLER_ID;
        }

        let id = inner.next_handler_id;
        inner.next_handler_id += 1;
        let handler: Handler = Box::new(handler);
        if let Some((old, _)) = inner
            .handlers
            .insert(opcode, (id, Rc::new(RefCell::new(handler))))
        {
            debug!("att: handler {} for {:#04x} replaced by {}", old, opcode, id);
        }
        id
    }

    pub fn unregister_handler(&self, id: HandlerId) {
        let mut inner = self.inner.borrow_mut();
        inner.handlers.retain(|_, (handler_id, _)| *handler_id != id);
    }

    /// Answer the inbound Request or Indication `id`
    ///
    /// `pdu` must be the response or confirmation matching the opcode the
    /// transaction was started with. Returns false, with nothing sent, if
    /// `id` is not outstanding or the opcode does not match.
    pub fn reply(&self, id: TransactionId, pdu: Vec<u8>) -> bool {
        assert!(!pdu.is_empty(), "att: empty PDU");
        let opcode = pdu[0];

        let channel = {
            let mut inner = self.inner.borrow_mut();
            assert!(
                pdu.len() <= inner.mtu as usize,
                "att: PDU of {} bytes exceeds the MTU ({})",
                pdu.len(),
                inner.mtu
            );
            if !inner.open {
                return false;
            }
            let Some((class, remote)) = inner.find_remote(id) else {
                debug!("att: no inbound transaction with id {}", id);
                return false;
            };
            if matching_transaction_code(remote.opcode) != Some(opcode) {
                warn!(
                    "att: {:#04x} does not answer {:#04x} (id {})",
                    opcode, remote.opcode, id
                );
                return false;
            }
            let Some(channel) = inner.live_channel() else {
                debug!("att: channel is gone, cannot answer id {}", id);
                return false;
            };
            *inner.remote_slot(class) = None;
            channel
        };

        trace!("att: tx {}", hex::encode(&pdu));
        channel.send(pdu)
    }

    /// Answer the inbound Request `id` with an Error Response
    ///
    /// Indications cannot be answered with an error; doing so returns false
    /// and leaves the transaction outstanding.
    pub fn reply_with_error(&self, id: TransactionId, handle: u16, code: AttErrorCode) -> bool {
        let request_opcode = {
            let mut inner = self.inner.borrow_mut();
            if !inner.open {
                return false;
            }
            match inner.find_remote(id) {
                Some((TransactionClass::Request, remote)) => {
                    if inner.live_channel().is_none() {
                        debug!("att: channel is gone, cannot answer id {}", id);
                        return false;
                    }
                    inner.remote_request = None;
                    remote.opcode
                }
                Some((TransactionClass::Indication, _)) => {
                    warn!("att: cannot answer indication {} with an error", id);
                    return false;
                }
                None => {
                    debug!("att: no inbound request with id {}", id);
                    return false;
                }
            }
        };

        self.send_error_response(request_opcode, handle, code)
    }

    /// Process one PDU received on the channel
    pub fn handle_pdu(&self, pdu: &[u8]) {
        trace!("att: rx {}", hex::encode(pdu));

        let mtu = {
            let inner = self.inner.borrow();
            if !inner.open {
                debug!("att: bearer closed, dropping {} bytes", pdu.len());
                return;
            }
            inner.mtu
        };

        let Some((&opcode, _)) = pdu.split_first() else {
            warn!("att: empty PDU received, closing bearer");
            self.shut_down();
            return;
        };
        if pdu.len() > mtu as usize {
            warn!(
                "att: PDU of {} bytes exceeds the MTU ({}), closing bearer",
                pdu.len(),
                mtu
            );
            self.shut_down();
            return;
        }

        match method_type(opcode) {
            MethodType::Response => self.handle_end_transaction(TransactionClass::Request, pdu),
            MethodType::Confirmation => {
                self.handle_end_transaction(TransactionClass::Indication, pdu)
            }
            MethodType::Request => self.handle_begin_transaction(TransactionClass::Request, pdu),
            MethodType::Indication => {
                self.handle_begin_transaction(TransactionClass::Indication, pdu)
            }
            MethodType::Command | MethodType::Notification => self.handle_without_response(pdu),
            MethodType::Invalid => {
                debug!("att: unsupported opcode {:#04x}", opcode);
                self.send_error_response(opcode, 0, AttErrorCode::RequestNotSupported);
            }
        }
    }

    /// Close the bearer if a transaction timer has expired
    pub fn process_timeouts(&self) {
        let expired = {
            let inner = self.inner.borrow();
            let now = inner.time.now();
            inner.open
                && (inner.request_queue.timer.has_expired(now)
                    || inner.indication_queue.timer.has_expired(now))
        };

        if expired {
            warn!("att: transaction timed out, closing bearer");
            self.shut_down_internal(true, true);
        }
    }

    /// Earliest transaction deadline, if a transaction is outstanding
    pub fn next_deadline(&self) -> Option<Instant> {
        let inner = self.inner.borrow();
        earliest(
            inner.request_queue.timer.deadline(),
            inner.indication_queue.timer.deadline(),
        )
    }

    fn try_start_next(&self, class: TransactionClass) {
        let (channel, pdu) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.open {
                return;
            }
            let now = inner.time.now();
            let timeout = inner.config.transaction_timeout;
            let channel = inner.channel.upgrade();

            let queue = inner.queue_mut(class);
            if queue.current.is_some() {
                return;
            }
            let Some(next) = queue.queue.pop_front() else {
                return;
            };
            let pdu = next.pdu.clone();
            queue.current = Some(next);
            queue.timer.arm(now, timeout);
            (channel, pdu)
        };

        trace!("att: tx {}", hex::encode(&pdu));
        // A transaction that could not be sent stays current; its timer
        // closes the bearer.
        match channel {
            Some(channel) => {
                if !channel.send(pdu) {
                    warn!("att: channel refused {:?} transaction", class);
                }
            }
            None => debug!("att: channel is gone, {:?} transaction not sent", class),
        }
    }

    fn handle_end_transaction(&self, class: TransactionClass, pdu: &[u8]) {
        let opcode = pdu[0];
        let completion = {
            let mut inner = self.inner.borrow_mut();
            let now = inner.time.now();
            let timeout = inner.config.transaction_timeout;
            let channel = inner.channel.upgrade();
            let queue = inner.queue_mut(class);

            let current_opcode = match &queue.current {
                Some(current) if !queue.awaiting_security() => Some(current.opcode),
                _ => None,
            };

            match current_opcode {
                Some(current_opcode) => {
                    let (target_opcode, peer_error) = if opcode == ATT_ERROR_RSP {
                        match ErrorResponse::parse_params(&pdu[1..]) {
                            Ok(rsp) => (rsp.request_opcode, Some((rsp.error_code, rsp.handle))),
                            Err(_) => {
                                warn!("att: malformed Error Response ({} bytes)", pdu.len());
                                (ATT_INVALID_OPCODE, None)
                            }
                        }
                    } else if matching_transaction_code(current_opcode) == Some(opcode) {
                        (current_opcode, None)
                    } else {
                        (ATT_INVALID_OPCODE, None)
                    };

                    if target_opcode != current_opcode {
                        warn!(
                            "att: {:#04x} does not complete {:#04x}, closing bearer",
                            opcode, current_opcode
                        );
                        Completion::ShutDown
                    } else {
                        queue.timer.cancel();
                        match queue.current.take() {
                            Some(current) => {
                                let completion =
                                    complete(queue, current, class, peer_error, channel);
                                // Still holds the slot while the upgrade is pending
                                if matches!(completion, Completion::UpgradeSecurity(..)) {
                                    queue.timer.arm(now, timeout);
                                }
                                completion
                            }
                            None => Completion::ShutDown,
                        }
                    }
                }
                None => {
                    warn!(
                        "att: unexpected {:#04x} with no {:?} transaction, closing bearer",
                        opcode, class
                    );
                    Completion::ShutDown
                }
            }
        };

        match completion {
            Completion::Deliver(callback) => {
                callback(Ok(pdu));
                self.try_start_next(class);
            }
            Completion::Fail(callback, error) => {
                debug!("att: {:?} transaction failed: {}", class, error);
                callback(Err(error));
                self.try_start_next(class);
            }
            Completion::UpgradeSecurity(channel, level) => {
                debug!("att: requesting security level {}", level);
                let engine = Rc::downgrade(&self.inner);
                channel.upgrade_security(
                    level,
                    Box::new(move |result| {
                        if let Some(inner) = engine.upgrade() {
                            Bearer { inner }.on_security_upgraded(result);
                        }
                    }),
                );
            }
            Completion::ShutDown => self.shut_down(),
        }
    }

    fn on_security_upgraded(&self, result: SecurityUpgradeResult) {
        let resend = {
            let mut inner = self.inner.borrow_mut();
            if !inner.open || !inner.request_queue.awaiting_security() {
                return;
            }
            let now = inner.time.now();
            let timeout = inner.config.transaction_timeout;
            let channel = inner.channel.upgrade();
            let queue = &mut inner.request_queue;

            match result {
                Ok(()) => {
                    let Some(current) = queue.current.as_mut() else {
                        return;
                    };
                    current.security_error = None;
                    let pdu = current.pdu.clone();
                    queue.timer.arm(now, timeout);
                    Ok((channel, pdu))
                }
                Err(err) => {
                    let Some(current) = queue.current.take() else {
                        return;
                    };
                    debug!("att: security upgrade failed: {}", err);
                    let (code, handle) = current
                        .security_error
                        .unwrap_or((AttErrorCode::Unlikely, 0));
                    Err((current.callback, TransactionError::protocol(code, handle)))
                }
            }
        };

        match resend {
            Ok((channel, pdu)) => {
                trace!("att: tx {}", hex::encode(&pdu));
                match channel {
                    Some(channel) => {
                        if !channel.send(pdu) {
                            warn!("att: channel refused retried request");
                        }
                    }
                    None => debug!("att: channel is gone, retried request not sent"),
                }
            }
            Err((callback, error)) => {
                callback(Err(error));
                self.try_start_next(TransactionClass::Request);
            }
        }
    }

    fn handle_begin_transaction(&self, class: TransactionClass, pdu: &[u8]) {
        let opcode = pdu[0];
        let dispatch = {
            let mut inner = self.inner.borrow_mut();
            if inner.remote_slot(class).is_some() {
                None
            } else {
                let handler = inner.handlers.get(&opcode).map(|(_, handler)| handler.clone());
                let id = handler.as_ref().map(|_| inner.next_remote_id());
                if let Some(id) = id {
                    *inner.remote_slot(class) = Some(RemoteTransaction { id, opcode });
                }
                Some(id.zip(handler))
            }
        };

        match dispatch {
            None => {
                warn!(
                    "att: peer sent {:#04x} before its last {:?} was answered, closing bearer",
                    opcode, class
                );
                self.shut_down();
            }
            Some(Some((id, handler))) => match handler.try_borrow_mut() {
                Ok(mut handler) => (&mut *handler)(id, pdu),
                Err(_) => warn!("att: handler for {:#04x} is busy, dropping PDU", opcode),
            },
            Some(None) if class == TransactionClass::Request => {
                debug!("att: no handler for request {:#04x}", opcode);
                self.send_error_response(opcode, 0, AttErrorCode::RequestNotSupported);
            }
            Some(None) => debug!("att: no handler for indication {:#04x}, dropping", opcode),
        }
    }

    fn handle_without_response(&self, pdu: &[u8]) {
        let opcode = pdu[0];
        let handler = self
            .inner
            .borrow()
            .handlers
            .get(&opcode)
            .map(|(_, handler)| handler.clone());

        match handler {
            Some(handler) => match handler.try_borrow_mut() {
                Ok(mut handler) => (&mut *handler)(INVALID_TRANSACTION_ID, pdu),
                Err(_) => warn!("att: handler for {:#04x} is busy, dropping PDU", opcode),
            },
            None => debug!("att: no handler for {:#04x}, dropping", opcode),
        }
    }

    fn send_error_response(&self, request_opcode: u8, handle: u16, code: AttErrorCode) -> bool {
        let Some(channel) = self.inner.borrow().live_channel() else {
            return false;
        };
        let pdu = ErrorResponse::new(request_opcode, handle, code).serialize();
        trace!("att: tx {}", hex::encode(&pdu));
        channel.send(pdu)
    }

    fn shut_down_internal(&self, due_to_timeout: bool, signal_link_error: bool) {
        let (transactions, closed_callback, channel) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.open {
                return;
            }
            inner.open = false;

            let mut transactions: Vec<PendingTransaction> = inner.request_queue.drain().collect();
            transactions.extend(inner.indication_queue.drain());
            transactions.sort_by_key(|transaction| transaction.sequence);

            inner.handlers.clear();
            inner.remote_request = None;
            inner.remote_indication = None;
            let channel = inner.channel.upgrade();
            (transactions, inner.closed_callback.take(), channel)
        };

        debug!(
            "att: bearer closed, failing {} transactions",
            transactions.len()
        );
        if signal_link_error {
            if let Some(channel) = channel {
                channel.signal_link_error();
            }
        }

        let error = if due_to_timeout {
            HostError::TimedOut
        } else {
            HostError::Failed
        };
        for transaction in transactions {
            (transaction.callback)(Err(TransactionError::host(error)));
        }

        if let Some(callback) = closed_callback {
            callback();
        }
    }
}

/// Conclude the current transaction of a class after the peer answered it
fn complete(
    queue: &mut TransactionQueue,
    mut current: PendingTransaction,
    class: TransactionClass,
    peer_error: Option<(AttErrorCode, u16)>,
    channel: Option<Rc<dyn Channel>>,
) -> Completion {
    let Some((code, handle)) = peer_error else {
        return Completion::Deliver(current.callback);
    };

    if class == TransactionClass::Request {
        if let Some(channel) = channel {
            if let Some(level) =
                security_upgrade_level(code, channel.security(), current.security_retry_level)
            {
                current.security_retry_level = level;
                current.security_error = Some((code, handle));
                queue.current = Some(current);
                return Completion::UpgradeSecurity(channel, level);
            }
        }
    }

    Completion::Fail(current.callback, TransactionError::protocol(code, handle))
}
