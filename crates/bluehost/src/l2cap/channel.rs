//! Logical channel seen by the transaction engines
//!
//! Segmentation, reassembly and flow control happen below this interface;
//! engines only ever see whole SDUs. Engines keep a `Weak<dyn Channel>` and
//! must cope with the channel going away at any point.

use crate::security::{SecurityLevel, SecurityUpgradeCallback};

/// An open L2CAP channel carrying whole SDUs
pub trait Channel {
    /// Queue an SDU for transmission
    ///
    /// Returns false if the channel can no longer send.
    fn send(&self, sdu: Vec<u8>) -> bool;

    /// Current security level of the underlying link
    fn security(&self) -> SecurityLevel;

    /// Ask the link to reach at least `level`
    ///
    /// The callback runs exactly once when the upgrade finished or failed.
    fn upgrade_security(&self, level: SecurityLevel, callback: SecurityUpgradeCallback);

    /// Report an unrecoverable protocol error; the link will be torn down
    fn signal_link_error(&self);
}
