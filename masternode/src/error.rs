//! Masternode error types

use prcy_crypto::CryptoError;
use thiserror::Error;

/// Coarse classification used by callers to decide whether to retry.
/// Activation failures carry theirs on the state, see
/// [`ActivationState::error_kind`](crate::ActivationState::error_kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Network,
    Protocol,
    Crypto,
    SyncNotReady,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MasternodeError {
    #[error("Masternode is not in a running status")]
    NotRunning,

    #[error("Too early to send Masternode Ping, last ping {elapsed} seconds ago")]
    TooEarly { elapsed: i64 },

    #[error("Masternode List doesn't include our Masternode, shutting down Masternode pinging service!")]
    NotInRegistry,

    #[error("Masternode role is disabled")]
    Disabled,

    #[error("Signing error: {0}")]
    Signing(#[from] CryptoError),

    #[error("Invalid ping signature")]
    InvalidPingSignature,
}

impl MasternodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MasternodeError::Disabled => ErrorKind::Configuration,
            MasternodeError::NotRunning
            | MasternodeError::TooEarly { .. }
            | MasternodeError::NotInRegistry => ErrorKind::Protocol,
            MasternodeError::Signing(_) | MasternodeError::InvalidPingSignature => ErrorKind::Crypto,
        }
    }

    /// Whether the same call can succeed later without any change to the node
    pub fn is_transient(&self) -> bool {
        matches!(self, MasternodeError::TooEarly { .. })
    }
}

pub type Result<T> = std::result::Result<T, MasternodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(MasternodeError::NotRunning.kind(), ErrorKind::Protocol);
        assert_eq!(MasternodeError::NotInRegistry.kind(), ErrorKind::Protocol);
        assert_eq!(MasternodeError::Disabled.kind(), ErrorKind::Configuration);
        assert_eq!(
            MasternodeError::Signing(CryptoError::InvalidPrivateKey).kind(),
            ErrorKind::Crypto
        );
        assert_eq!(MasternodeError::InvalidPingSignature.kind(), ErrorKind::Crypto);
    }

    #[test]
    fn test_transient_errors() {
        assert!(MasternodeError::TooEarly { elapsed: 10 }.is_transient());
        assert!(!MasternodeError::NotInRegistry.is_transient());
        assert!(!MasternodeError::NotRunning.is_transient());
    }
}
