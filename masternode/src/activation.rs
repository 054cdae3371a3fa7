//! Local masternode activation
//!
//! `ActiveMasternode` decides whether this node may act as a masternode and,
//! once it may, keeps it alive with periodic pings. It is polled: every call
//! to [`ActiveMasternode::manage_status`] advances the state by at most one
//! step and never blocks on anything but the connectivity probe.
//!
//! ```text
//! SyncInProcess --synced--> Initial --registry match--> Started
//!                              |                           ^
//!                              v                           | enable_hot_cold
//!                         NotCapable(reason) --------------+
//! ```

use crate::collaborators::Collaborators;
use crate::config::{MasternodeConfig, MasternodeConfigEntry, MasternodeConfigError, NodeSettings};
use crate::error::{ErrorKind, MasternodeError, Result};
use crate::ping::{MasternodePing, MASTERNODE_PING_SECONDS};
use crate::types::{CollateralRef, MasternodeBroadcast};
use prcy_crypto::{KeyPair, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    NoAddress,
    InvalidAddress,
    PortMismatch,
    ConnectFailed,
    WaitingForStart,
    NotInRegistry,
}

impl ReasonCode {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReasonCode::NoAddress | ReasonCode::InvalidAddress => ErrorKind::Configuration,
            ReasonCode::PortMismatch | ReasonCode::ConnectFailed => ErrorKind::Network,
            ReasonCode::WaitingForStart | ReasonCode::NotInRegistry => ErrorKind::Protocol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotCapableReason {
    pub code: ReasonCode,
    pub detail: Option<String>,
}

impl NotCapableReason {
    pub fn new(code: ReasonCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for NotCapableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.detail.as_deref().unwrap_or_default();
        match self.code {
            ReasonCode::NoAddress => write!(
                f,
                "Can't detect external address. Please use the masternodeaddr configuration option."
            ),
            ReasonCode::InvalidAddress => write!(f, "Invalid masternodeaddr: {}", detail),
            ReasonCode::PortMismatch => write!(f, "Invalid port: {}", detail),
            ReasonCode::ConnectFailed => write!(f, "Could not connect to {}", detail),
            ReasonCode::WaitingForStart => write!(f, "Waiting for start message from controller."),
            ReasonCode::NotInRegistry => write!(
                f,
                "Masternode List doesn't include our Masternode, shutting down Masternode pinging service!"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    SyncInProcess,
    Initial,
    NotCapable(NotCapableReason),
    Started,
}

impl ActivationState {
    /// Kind of the condition holding the node back, if any
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ActivationState::SyncInProcess => Some(ErrorKind::SyncNotReady),
            ActivationState::NotCapable(reason) => Some(reason.code.kind()),
            ActivationState::Initial | ActivationState::Started => None,
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationState::SyncInProcess => write!(f, "SYNC_IN_PROCESS"),
            ActivationState::Initial => write!(f, "INITIAL"),
            ActivationState::NotCapable(_) => write!(f, "NOT_CAPABLE"),
            ActivationState::Started => write!(f, "STARTED"),
        }
    }
}

pub struct ActiveMasternode {
    settings: NodeSettings,
    key: Option<KeyPair>,
    state: ActivationState,
    collateral: Option<CollateralRef>,
    service: Option<SocketAddr>,
    services: Collaborators,
}

impl ActiveMasternode {
    /// `key` is the masternode signing key; it may be absent only when the
    /// masternode role is disabled.
    pub fn new(settings: NodeSettings, key: Option<KeyPair>, services: Collaborators) -> Self {
        Self {
            settings,
            key,
            state: ActivationState::Initial,
            collateral: None,
            service: None,
            services,
        }
    }

    /// Build from settings, parsing the configured private key when the
    /// masternode role is enabled
    pub fn from_settings(
        settings: NodeSettings,
        services: Collaborators,
    ) -> std::result::Result<Self, crate::config::MasternodeConfigError> {
        let key = if settings.masternode {
            Some(settings.keypair()?)
        } else {
            None
        };
        Ok(Self::new(settings, key, services))
    }

    pub fn state(&self) -> &ActivationState {
        &self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == ActivationState::Started
    }

    pub fn collateral(&self) -> Option<CollateralRef> {
        self.collateral
    }

    pub fn service(&self) -> Option<SocketAddr> {
        self.service
    }

    pub fn pubkey(&self) -> Option<PublicKey> {
        self.key.as_ref().map(|k| k.public_key())
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    /// Advance the activation state by one poll
    pub fn manage_status(&mut self) {
        if !self.settings.masternode {
            return;
        }

        log::debug!("ManageStatus - Begin");

        if !self.settings.network.is_regtest() && !self.services.sync.is_blockchain_synced() {
            self.state = ActivationState::SyncInProcess;
            log::info!("ManageStatus - {}", self.status_message());
            return;
        }

        if self.state == ActivationState::SyncInProcess {
            self.state = ActivationState::Initial;
        }

        if self.state == ActivationState::Initial {
            self.try_enable_from_registry();
        }

        if self.state != ActivationState::Started {
            let reason = self.check_capability();
            log::info!("ManageStatus - Not capable: {}", reason);
            self.state = ActivationState::NotCapable(reason);
            return;
        }

        if let Err(e) = self.send_ping() {
            log::error!("ManageStatus - Error on Ping: {}", e);
        }
    }

    /// Start over from Initial and poll once
    pub fn reset_status(&mut self) {
        self.state = ActivationState::Initial;
        self.manage_status();
    }

    pub fn status_message(&self) -> String {
        match &self.state {
            ActivationState::Initial => "Node just started, not yet activated".to_string(),
            ActivationState::SyncInProcess => {
                "Sync in progress. Must wait until sync is complete to start Masternode".to_string()
            }
            ActivationState::NotCapable(reason) => format!("Not capable masternode: {}", reason),
            ActivationState::Started => "Masternode successfully started".to_string(),
        }
    }

    /// Enter Started with the given collateral and service address, as when
    /// the controller's start broadcast names this node. Returns false if
    /// the masternode role is disabled.
    pub fn enable_hot_cold(&mut self, collateral: CollateralRef, addr: SocketAddr) -> bool {
        if !self.settings.masternode {
            return false;
        }

        self.state = ActivationState::Started;
        self.collateral = Some(collateral);
        self.service = Some(addr);

        log::info!(
            "EnableHotColdMasterNode - Enabled! You may shut down the cold daemon. collateral={} service={}",
            collateral,
            addr
        );
        true
    }

    /// Start from the controller's masternode.conf entry for this node.
    /// The entry must carry our masternode key.
    pub fn start_from_entry(
        &mut self,
        entry: &MasternodeConfigEntry,
    ) -> std::result::Result<bool, MasternodeConfigError> {
        entry.validate()?;
        if self.pubkey() != Some(entry.keypair()?.public_key()) {
            return Err(MasternodeConfigError::InvalidKey(format!(
                "entry {} is for another masternode",
                entry.alias
            )));
        }
        Ok(self.enable_hot_cold(entry.collateral()?, entry.service_addr()?))
    }

    /// [`start_from_entry`](Self::start_from_entry) for the entry named `alias`
    pub fn start_alias(
        &mut self,
        config: &MasternodeConfig,
        alias: &str,
    ) -> std::result::Result<bool, MasternodeConfigError> {
        let entry = config
            .get_entry(alias)
            .ok_or_else(|| MasternodeConfigError::MasternodeNotFound(alias.to_string()))?;
        self.start_from_entry(entry)
    }

    /// Sign and relay a ping for our collateral
    pub fn send_ping(&mut self) -> Result<()> {
        if self.state != ActivationState::Started {
            return Err(MasternodeError::NotRunning);
        }
        let collateral = self.collateral.ok_or(MasternodeError::NotRunning)?;
        let key = self.key.as_ref().ok_or(MasternodeError::Disabled)?;

        let mut ping = MasternodePing::at(collateral, self.services.clock.now());
        ping.sign(key, self.services.signer.as_ref())?;

        let registry = self.services.registry.as_ref();
        let Some(mn) = registry.find_by_collateral(&collateral) else {
            let reason = NotCapableReason::new(ReasonCode::NotInRegistry);
            log::error!("SendMasternodePing - {}", reason);
            self.state = ActivationState::NotCapable(reason);
            return Err(MasternodeError::NotInRegistry);
        };

        if mn.is_pinged_within(MASTERNODE_PING_SECONDS, ping.sig_time) {
            let elapsed = mn
                .last_ping
                .as_ref()
                .map(|last| last.age(ping.sig_time))
                .unwrap_or_default();
            return Err(MasternodeError::TooEarly { elapsed });
        }

        log::debug!("SendMasternodePing - Relay Masternode Ping vin = {}", collateral);
        registry.update_last_ping(&ping);

        let broadcast = MasternodeBroadcast::hash_for(&mn);
        if registry.has_seen_broadcast(&broadcast) {
            registry.refresh_broadcast_ping(&broadcast, &ping);
        }

        self.services.broadcaster.relay_ping(&ping);
        Ok(())
    }

    /// Work out why this node cannot run yet; the best case is that it
    /// just waits for the controller's start message
    fn check_capability(&mut self) -> NotCapableReason {
        let service = match self.resolve_service() {
            Ok(addr) => addr,
            Err(reason) => return reason,
        };
        self.service = Some(service);

        let expected = self.settings.network.default_port();
        if service.port() != expected {
            return NotCapableReason::with_detail(
                ReasonCode::PortMismatch,
                format!(
                    "{} - only {} is supported on {}.",
                    service.port(),
                    expected,
                    self.settings.network
                ),
            );
        }

        log::info!("ManageStatus - Checking inbound connection to '{}'", service);
        if !self.services.probe.try_connect(service) {
            return NotCapableReason::with_detail(ReasonCode::ConnectFailed, service.to_string());
        }

        NotCapableReason::new(ReasonCode::WaitingForStart)
    }

    fn resolve_service(&self) -> std::result::Result<SocketAddr, NotCapableReason> {
        match self.settings.masternodeaddr.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => parse_service(text, self.settings.network.default_port())
                .ok_or_else(|| NotCapableReason::with_detail(ReasonCode::InvalidAddress, text)),
            _ => self
                .services
                .resolver
                .detect_local()
                .ok_or_else(|| NotCapableReason::new(ReasonCode::NoAddress)),
        }
    }

    fn try_enable_from_registry(&mut self) {
        let Some(pubkey) = self.pubkey() else {
            return;
        };
        let Some(mn) = self.services.registry.find_by_pubkey(&pubkey) else {
            return;
        };

        if !mn.enabled {
            log::debug!("ManageStatus - registry entry {} is not enabled", mn.collateral);
            return;
        }
        if mn.protocol_version != self.settings.protocol_version {
            log::debug!(
                "ManageStatus - registry entry {} runs protocol {}, we run {}",
                mn.collateral,
                mn.protocol_version,
                self.settings.protocol_version
            );
            return;
        }

        self.enable_hot_cold(mn.collateral, mn.addr);
    }
}

/// `IP:port`, or a bare IP that takes the network's default port
fn parse_service(text: &str, default_port: u16) -> Option<SocketAddr> {
    text.parse::<SocketAddr>()
        .ok()
        .or_else(|| text.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, default_port)))
}
