//! Link security levels
//!
//! The transaction engines never perform pairing themselves. They only read
//! the current level of a link and ask the channel to raise it.

use crate::error::HostError;
use std::fmt;

/// Security level of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityLevel {
    /// No encryption
    #[default]
    NoSecurity = 0,
    /// Encrypted without MITM protection (Just Works)
    Encrypted = 1,
    /// Encrypted with MITM protection
    Authenticated = 2,
    /// Authenticated with LE Secure Connections
    SecureAuthenticated = 3,
}

impl SecurityLevel {
    /// Check if this security level includes encryption
    pub fn is_encrypted(&self) -> bool {
        *self >= SecurityLevel::Encrypted
    }

    /// Check if this security level includes authentication
    pub fn is_authenticated(&self) -> bool {
        *self >= SecurityLevel::Authenticated
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSecurity => write!(f, "no security"),
            Self::Encrypted => write!(f, "encrypted"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::SecureAuthenticated => write!(f, "secure authenticated"),
        }
    }
}

/// Outcome of a security upgrade request
pub type SecurityUpgradeResult = Result<(), HostError>;

/// Invoked once a requested security upgrade has finished
pub type SecurityUpgradeCallback = Box<dyn FnOnce(SecurityUpgradeResult)>;
