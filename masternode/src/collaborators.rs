//! Services the activation state machine consults
//!
//! Each seam is a small trait so the state machine can run against the
//! live node or against test doubles.

use crate::config::Network;
use crate::ping::MasternodePing;
use crate::registry::MasternodeRegistry;
use chrono::Utc;
use local_ip_address::local_ip;
use prcy_crypto::{Ed25519Signer, MessageSigner};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub trait SyncStatus: Send + Sync {
    fn is_blockchain_synced(&self) -> bool;
}

/// Outbound reachability check of our own service address
pub trait NetworkProbe: Send + Sync {
    fn try_connect(&self, addr: SocketAddr) -> bool;
}

/// Detection of an externally usable address when none is configured
pub trait AddressResolver: Send + Sync {
    fn detect_local(&self) -> Option<SocketAddr>;
}

/// Relay of pings to peers; delivery is not confirmed
pub trait Broadcaster: Send + Sync {
    fn relay_ping(&self, ping: &MasternodePing);
}

/// Unix seconds used to stamp pings
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

impl<F> SyncStatus for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_blockchain_synced(&self) -> bool {
        self()
    }
}

pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl NetworkProbe for TcpProbe {
    fn try_connect(&self, addr: SocketAddr) -> bool {
        match TcpStream::connect_timeout(&addr, self.timeout) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("TcpProbe - connect to {} failed: {}", addr, e);
                false
            }
        }
    }
}

/// Pairs the primary local interface address with the node's listen port
pub struct LocalAddressResolver {
    port: u16,
}

impl LocalAddressResolver {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl AddressResolver for LocalAddressResolver {
    fn detect_local(&self) -> Option<SocketAddr> {
        match local_ip() {
            Ok(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(SocketAddr::new(ip, self.port)),
            Ok(ip) => {
                log::debug!("LocalAddressResolver - ignoring non-routable {}", ip);
                None
            }
            Err(e) => {
                log::debug!("LocalAddressResolver - no local address: {}", e);
                None
            }
        }
    }
}

/// Writes relayed pings to the log; used until a peer layer is attached
#[derive(Default)]
pub struct LogBroadcaster;

impl Broadcaster for LogBroadcaster {
    fn relay_ping(&self, ping: &MasternodePing) {
        log::info!(
            "relay - masternode ping {} for {} at {}",
            ping.signing_hash(),
            ping.collateral,
            ping.sig_time
        );
    }
}

/// Everything the activation service talks to
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn MasternodeRegistry>,
    pub sync: Arc<dyn SyncStatus>,
    pub probe: Arc<dyn NetworkProbe>,
    pub resolver: Arc<dyn AddressResolver>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub signer: Arc<dyn MessageSigner>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Live implementations around the node's registry and sync tracker
    pub fn with_defaults(
        registry: Arc<dyn MasternodeRegistry>,
        sync: Arc<dyn SyncStatus>,
        network: Network,
    ) -> Self {
        Self {
            registry,
            sync,
            probe: Arc::new(TcpProbe::default()),
            resolver: Arc::new(LocalAddressResolver::new(network.default_port())),
            broadcaster: Arc::new(LogBroadcaster),
            signer: Arc::new(Ed25519Signer),
            clock: Arc::new(SystemClock),
        }
    }
}
