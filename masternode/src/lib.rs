//! PRCY Masternode Module
//!
//! Brings a node up as a masternode: checks that it is synced and
//! reachable, waits for or detects its registry entry, then keeps it
//! listed with signed liveness pings.

pub mod activation;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod ping;
pub mod registry;
pub mod scheduler;
pub mod types;

pub use activation::{ActivationState, ActiveMasternode, NotCapableReason, ReasonCode};
pub use collaborators::{
    AddressResolver, Broadcaster, Clock, Collaborators, LocalAddressResolver, LogBroadcaster,
    NetworkProbe, SyncStatus, SystemClock, TcpProbe,
};
pub use config::{MasternodeConfig, MasternodeConfigEntry, MasternodeConfigError, Network, NodeSettings};
pub use error::{ErrorKind, MasternodeError, Result};
pub use ping::{MasternodePing, MASTERNODE_PING_SECONDS};
pub use registry::{InMemoryRegistry, MasternodeRegistry};
pub use scheduler::{run_status_loop, spawn_status_loop, STATUS_POLL_INTERVAL};
pub use types::{CollateralRef, MasternodeBroadcast, MasternodeIdentity};

/// Masternode module version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
