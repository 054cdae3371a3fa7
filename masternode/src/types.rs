//! Masternode type definitions

use crate::ping::MasternodePing;
use chrono::{DateTime, Utc};
use prcy_core::codec::Encodable;
use prcy_core::OutPoint;
use prcy_crypto::{hash256, Hash256, PublicKey};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// The locked output that backs a masternode
pub type CollateralRef = OutPoint;

/// A masternode as the network registry sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodeIdentity {
    pub collateral: CollateralRef,
    pub addr: SocketAddr,
    /// Key the masternode signs pings with
    pub pubkey: PublicKey,
    pub protocol_version: u32,
    pub enabled: bool,
    pub last_ping: Option<MasternodePing>,
}

impl MasternodeIdentity {
    pub fn new(collateral: CollateralRef, addr: SocketAddr, pubkey: PublicKey, protocol_version: u32) -> Self {
        Self {
            collateral,
            addr,
            pubkey,
            protocol_version,
            enabled: true,
            last_ping: None,
        }
    }

    /// True when the last recorded ping lies less than `seconds` away from `now`
    pub fn is_pinged_within(&self, seconds: i64, now: i64) -> bool {
        self.last_ping
            .as_ref()
            .map(|ping| ping.age(now) < seconds)
            .unwrap_or(false)
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_ping.as_ref().and_then(|ping| ping.signed_at())
    }
}

/// Announcement that a masternode has started, relayed by its controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodeBroadcast {
    pub identity: MasternodeIdentity,
    pub sig_time: i64,
    pub signature: Vec<u8>,
}

impl MasternodeBroadcast {
    pub fn new(identity: MasternodeIdentity, sig_time: i64) -> Self {
        Self {
            identity,
            sig_time,
            signature: Vec::new(),
        }
    }

    /// Key of the broadcast in the seen-broadcast map
    pub fn hash(&self) -> Hash256 {
        Self::hash_for(&self.identity)
    }

    /// Seen-broadcast key of the announcement for `identity`
    pub fn hash_for(identity: &MasternodeIdentity) -> Hash256 {
        let mut buf = Vec::new();
        let _ = identity.collateral.encode(&mut buf);
        buf.extend_from_slice(identity.pubkey.as_bytes());
        hash256(&buf)
    }
}
