//! Masternode registry for tracking known masternodes
//!
//! The activation service only reads identities and records its own pings.
//! Each call is atomic on its own; callers never hold a lock across calls.

use crate::ping::MasternodePing;
use crate::types::{CollateralRef, MasternodeBroadcast, MasternodeIdentity};
use parking_lot::RwLock;
use prcy_crypto::{Hash256, PublicKey};
use std::collections::HashMap;

pub trait MasternodeRegistry: Send + Sync {
    fn find_by_pubkey(&self, pubkey: &PublicKey) -> Option<MasternodeIdentity>;

    fn find_by_collateral(&self, collateral: &CollateralRef) -> Option<MasternodeIdentity>;

    /// Record `ping` as the latest ping of its collateral. Returns false if
    /// the collateral is unknown.
    fn update_last_ping(&self, ping: &MasternodePing) -> bool;

    fn has_seen_broadcast(&self, hash: &Hash256) -> bool;

    /// Replace the ping stored with a seen broadcast
    fn refresh_broadcast_ping(&self, hash: &Hash256, ping: &MasternodePing);
}

#[derive(Default)]
struct RegistryState {
    masternodes: HashMap<CollateralRef, MasternodeIdentity>,
    seen_broadcasts: HashMap<Hash256, MasternodeBroadcast>,
    seen_pings: HashMap<Hash256, MasternodePing>,
}

#[derive(Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the identity's collateral
    pub fn insert(&self, identity: MasternodeIdentity) {
        self.state
            .write()
            .masternodes
            .insert(identity.collateral, identity);
    }

    pub fn remove(&self, collateral: &CollateralRef) -> Option<MasternodeIdentity> {
        self.state.write().masternodes.remove(collateral)
    }

    pub fn add_seen_broadcast(&self, broadcast: MasternodeBroadcast) -> Hash256 {
        let hash = broadcast.hash();
        self.state.write().seen_broadcasts.insert(hash, broadcast);
        hash
    }

    pub fn seen_broadcast(&self, hash: &Hash256) -> Option<MasternodeBroadcast> {
        self.state.read().seen_broadcasts.get(hash).cloned()
    }

    pub fn seen_ping(&self, hash: &Hash256) -> Option<MasternodePing> {
        self.state.read().seen_pings.get(hash).cloned()
    }

    pub fn count(&self) -> usize {
        self.state.read().masternodes.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.state
            .read()
            .masternodes
            .values()
            .filter(|mn| mn.enabled)
            .count()
    }
}

impl MasternodeRegistry for InMemoryRegistry {
    fn find_by_pubkey(&self, pubkey: &PublicKey) -> Option<MasternodeIdentity> {
        self.state
            .read()
            .masternodes
            .values()
            .find(|mn| &mn.pubkey == pubkey)
            .cloned()
    }

    fn find_by_collateral(&self, collateral: &CollateralRef) -> Option<MasternodeIdentity> {
        self.state.read().masternodes.get(collateral).cloned()
    }

    fn update_last_ping(&self, ping: &MasternodePing) -> bool {
        let mut state = self.state.write();
        let Some(mn) = state.masternodes.get_mut(&ping.collateral) else {
            return false;
        };
        mn.last_ping = Some(ping.clone());
        state.seen_pings.insert(ping.signing_hash(), ping.clone());
        true
    }

    fn has_seen_broadcast(&self, hash: &Hash256) -> bool {
        self.state.read().seen_broadcasts.contains_key(hash)
    }

    fn refresh_broadcast_ping(&self, hash: &Hash256, ping: &MasternodePing) {
        if let Some(broadcast) = self.state.write().seen_broadcasts.get_mut(hash) {
            broadcast.identity.last_ping = Some(ping.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prcy_core::OutPoint;
    use prcy_crypto::{hash256, KeyPair};

    fn identity(seed: u8) -> MasternodeIdentity {
        MasternodeIdentity::new(
            OutPoint::new(hash256(&[seed]), 0),
            format!("10.0.0.{}:53572", seed).parse().unwrap(),
            KeyPair::from_secret([seed; 32]).public_key(),
            70_920,
        )
    }

    #[test]
    fn test_register_and_find() {
        let registry = InMemoryRegistry::new();
        let mn = identity(1);
        registry.insert(mn.clone());
        registry.insert(identity(2));

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.find_by_pubkey(&mn.pubkey), Some(mn.clone()));
        assert_eq!(registry.find_by_collateral(&mn.collateral), Some(mn));
        assert!(registry
            .find_by_pubkey(&KeyPair::from_secret([9u8; 32]).public_key())
            .is_none());
    }

    #[test]
    fn test_update_last_ping() {
        let registry = InMemoryRegistry::new();
        let mn = identity(1);
        registry.insert(mn.clone());

        let ping = MasternodePing::at(mn.collateral, 1_000);
        assert!(registry.update_last_ping(&ping));
        assert_eq!(
            registry.find_by_collateral(&mn.collateral).unwrap().last_ping,
            Some(ping.clone())
        );
        assert_eq!(registry.seen_ping(&ping.signing_hash()), Some(ping));

        let unknown = MasternodePing::at(identity(5).collateral, 1_000);
        assert!(!registry.update_last_ping(&unknown));
    }

    #[test]
    fn test_refresh_seen_broadcast() {
        let registry = InMemoryRegistry::new();
        let mn = identity(1);
        let hash = registry.add_seen_broadcast(MasternodeBroadcast::new(mn.clone(), 10));
        assert!(registry.has_seen_broadcast(&hash));

        let ping = MasternodePing::at(mn.collateral, 2_000);
        registry.refresh_broadcast_ping(&hash, &ping);
        assert_eq!(
            registry.seen_broadcast(&hash).unwrap().identity.last_ping,
            Some(ping)
        );
    }

    #[test]
    fn test_enabled_count() {
        let registry = InMemoryRegistry::new();
        let mut disabled = identity(1);
        disabled.enabled = false;
        registry.insert(disabled);
        registry.insert(identity(2));
        assert_eq!(registry.enabled_count(), 1);
    }
}
