//! Masternode configuration
//!
//! Two sources feed the masternode service:
//!
//! - the node settings file (TOML), which says whether this node runs the
//!   masternode role, which key it signs with, and which address it serves on
//! - `masternode.conf`, the controller-side list of masternodes to start,
//!   one per line: `alias IP:port masternodeprivkey collateral_txid collateral_output_index`
//!
//! Example `masternode.conf` line:
//! mn1 192.168.1.100:53572 9f1c...e2 2bcd3c84c84f87eaa86e4e56834c92927a07f9e18718810b92e0d0324456a67c 0

use crate::types::CollateralRef;
use prcy_core::OutPoint;
use prcy_crypto::{Hash256, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MasternodeConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid masternode private key: {0}")]
    InvalidKey(String),

    #[error("Duplicate alias: {0}")]
    DuplicateAlias(String),

    #[error("Masternode not found: {0}")]
    MasternodeNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// P2P port a masternode must serve on
    pub fn default_port(&self) -> u16 {
        match self {
            Network::Mainnet => 53572,
            Network::Testnet => 53574,
            Network::Regtest => 51476,
        }
    }

    pub fn is_regtest(&self) -> bool {
        *self == Network::Regtest
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

pub const DEFAULT_PROTOCOL_VERSION: u32 = 70_920;

/// Node settings relevant to the masternode role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    #[serde(default)]
    pub masternode: bool,

    /// Externally reachable `IP:port`; detected when absent
    #[serde(default)]
    pub masternodeaddr: Option<String>,

    /// Hex-encoded ed25519 secret
    #[serde(default)]
    pub masternodeprivkey: String,

    #[serde(default)]
    pub network: Network,

    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
}

fn default_protocol_version() -> u32 {
    DEFAULT_PROTOCOL_VERSION
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            masternode: false,
            masternodeaddr: None,
            masternodeprivkey: String::new(),
            network: Network::default(),
            protocol_version: DEFAULT_PROTOCOL_VERSION,
        }
    }
}

impl NodeSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, MasternodeConfigError> {
        let settings: NodeSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MasternodeConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// A masternode needs a signing key; the address is checked later by
    /// the activation service so that a bad value shows up in its status.
    pub fn validate(&self) -> Result<(), MasternodeConfigError> {
        if self.masternode && self.masternodeprivkey.is_empty() {
            return Err(MasternodeConfigError::InvalidKey(
                "masternodeprivkey is required when masternode=true".to_string(),
            ));
        }
        Ok(())
    }

    pub fn keypair(&self) -> Result<KeyPair, MasternodeConfigError> {
        KeyPair::from_private_key_hex(&self.masternodeprivkey)
            .map_err(|e| MasternodeConfigError::InvalidKey(e.to_string()))
    }
}

/// Single masternode configuration entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasternodeConfigEntry {
    pub alias: String,

    /// IP address and port (e.g., "192.168.1.100:53572")
    pub ip_port: String,

    /// Hex-encoded masternode private key
    pub masternode_privkey: String,

    pub collateral_txid: String,

    pub collateral_output_index: u32,
}

impl MasternodeConfigEntry {
    /// Parse a single non-comment line from masternode.conf
    pub fn parse_line(line: &str, line_num: usize) -> Result<Self, MasternodeConfigError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() != 5 {
            return Err(MasternodeConfigError::ParseError {
                line: line_num,
                message: format!(
                    "Expected 5 fields, got {}. Format: alias IP:port privkey txid index",
                    parts.len()
                ),
            });
        }

        let collateral_output_index =
            parts[4]
                .parse::<u32>()
                .map_err(|_| MasternodeConfigError::ParseError {
                    line: line_num,
                    message: format!("Invalid output index: {}", parts[4]),
                })?;

        let entry = Self {
            alias: parts[0].to_string(),
            ip_port: parts[1].to_string(),
            masternode_privkey: parts[2].to_string(),
            collateral_txid: parts[3].to_string(),
            collateral_output_index,
        };

        entry.validate().map_err(|e| MasternodeConfigError::ParseError {
            line: line_num,
            message: e.to_string(),
        })?;
        Ok(entry)
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.alias,
            self.ip_port,
            self.masternode_privkey,
            self.collateral_txid,
            self.collateral_output_index
        )
    }

    pub fn validate(&self) -> Result<(), MasternodeConfigError> {
        if self.alias.is_empty() || self.alias.contains(char::is_whitespace) {
            return Err(MasternodeConfigError::InvalidFormat(
                "Invalid alias".to_string(),
            ));
        }

        self.service_addr()?;

        if self.masternode_privkey.is_empty() {
            return Err(MasternodeConfigError::InvalidFormat(
                "Empty private key".to_string(),
            ));
        }

        self.collateral()?;
        Ok(())
    }

    pub fn service_addr(&self) -> Result<SocketAddr, MasternodeConfigError> {
        self.ip_port.parse().map_err(|_| {
            MasternodeConfigError::InvalidFormat(format!("Invalid IP:port format: {}", self.ip_port))
        })
    }

    pub fn collateral(&self) -> Result<CollateralRef, MasternodeConfigError> {
        let txid = Hash256::from_hex(&self.collateral_txid).ok_or_else(|| {
            MasternodeConfigError::InvalidFormat(format!(
                "Invalid transaction ID format: {}",
                self.collateral_txid
            ))
        })?;
        Ok(OutPoint::new(txid, self.collateral_output_index))
    }

    pub fn keypair(&self) -> Result<KeyPair, MasternodeConfigError> {
        KeyPair::from_private_key_hex(&self.masternode_privkey)
            .map_err(|e| MasternodeConfigError::InvalidKey(format!("{}: {}", self.alias, e)))
    }
}

/// Masternode configuration file (masternode.conf)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasternodeConfig {
    entries: Vec<MasternodeConfigEntry>,
}

impl MasternodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MasternodeConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, MasternodeConfigError> {
        let mut entries = Vec::new();
        let mut aliases = HashSet::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let entry = MasternodeConfigEntry::parse_line(line, line_num + 1)?;
            if !aliases.insert(entry.alias.clone()) {
                return Err(MasternodeConfigError::DuplicateAlias(entry.alias));
            }
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MasternodeConfigError> {
        let mut content = String::new();
        content.push_str("# PRCY Masternode Configuration\n");
        content.push_str(
            "# Format: alias IP:port masternodeprivkey collateral_txid collateral_output_index\n",
        );
        content.push_str("#\n\n");

        for entry in &self.entries {
            content.push_str(&entry.to_line());
            content.push('\n');
        }

        fs::write(path, content)?;
        Ok(())
    }

    pub fn add_entry(&mut self, entry: MasternodeConfigEntry) -> Result<(), MasternodeConfigError> {
        entry.validate()?;

        if self.has_alias(&entry.alias) {
            return Err(MasternodeConfigError::DuplicateAlias(entry.alias));
        }

        self.entries.push(entry);
        Ok(())
    }

    pub fn remove_entry(&mut self, alias: &str) -> Result<(), MasternodeConfigError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.alias == alias)
            .ok_or_else(|| MasternodeConfigError::MasternodeNotFound(alias.to_string()))?;

        self.entries.remove(pos);
        Ok(())
    }

    pub fn get_entry(&self, alias: &str) -> Option<&MasternodeConfigEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    pub fn entries(&self) -> &[MasternodeConfigEntry] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.entries.iter().any(|e| e.alias == alias)
    }
}
