//! Test doubles shared by the engine tests

use crate::l2cap::Channel;
use crate::security::{SecurityLevel, SecurityUpgradeCallback};
use crate::time::ManualTimeSource;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Channel that records everything sent on it
pub struct FakeChannel {
    sent: RefCell<Vec<Vec<u8>>>,
    accept_sends: Cell<bool>,
    security: Cell<SecurityLevel>,
    upgrade_requests: RefCell<Vec<SecurityLevel>>,
    pending_upgrade: RefCell<Option<SecurityUpgradeCallback>>,
    link_error: Cell<bool>,
}

impl FakeChannel {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            sent: RefCell::new(Vec::new()),
            accept_sends: Cell::new(true),
            security: Cell::new(SecurityLevel::NoSecurity),
            upgrade_requests: RefCell::new(Vec::new()),
            pending_upgrade: RefCell::new(None),
            link_error: Cell::new(false),
        })
    }

    /// Everything sent so far, leaving the record empty
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        self.sent.take()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }

    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.sent.borrow().last().cloned()
    }

    pub fn set_accept_sends(&self, accept: bool) {
        self.accept_sends.set(accept);
    }

    pub fn set_security(&self, level: SecurityLevel) {
        self.security.set(level);
    }

    pub fn upgrade_requests(&self) -> Vec<SecurityLevel> {
        self.upgrade_requests.borrow().clone()
    }

    /// Finish the outstanding upgrade request, raising the level on success
    pub fn complete_upgrade(&self, result: Result<(), crate::error::HostError>) {
        let callback = self.pending_upgrade.borrow_mut().take();
        let callback = callback.expect("no security upgrade pending");
        if result.is_ok() {
            if let Some(level) = self.upgrade_requests.borrow().last() {
                self.security.set(*level);
            }
        }
        callback(result);
    }

    pub fn link_error_signaled(&self) -> bool {
        self.link_error.get()
    }
}

impl Channel for FakeChannel {
    fn send(&self, sdu: Vec<u8>) -> bool {
        if !self.accept_sends.get() {
            return false;
        }
        self.sent.borrow_mut().push(sdu);
        true
    }

    fn security(&self) -> SecurityLevel {
        self.security.get()
    }

    fn upgrade_security(&self, level: SecurityLevel, callback: SecurityUpgradeCallback) {
        self.upgrade_requests.borrow_mut().push(level);
        *self.pending_upgrade.borrow_mut() = Some(callback);
    }

    fn signal_link_error(&self) {
        self.link_error.set(true);
    }
}

pub fn weak_channel(channel: &Rc<FakeChannel>) -> Weak<dyn Channel> {
    let channel: Rc<dyn Channel> = channel.clone();
    Rc::downgrade(&channel)
}

pub fn manual_time() -> Rc<ManualTimeSource> {
    Rc::new(ManualTimeSource::new())
}
