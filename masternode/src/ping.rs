//! Masternode liveness pings
//!
//! A running masternode periodically signs a ping over its collateral
//! reference and the current time. Peers accept at most one ping per
//! collateral every [`MASTERNODE_PING_SECONDS`].

use crate::error::{MasternodeError, Result};
use crate::types::CollateralRef;
use chrono::{DateTime, TimeZone, Utc};
use prcy_core::codec::Encodable;
use prcy_crypto::{hash256, Hash256, KeyPair, MessageSigner, PublicKey};
use serde::{Deserialize, Serialize};

/// Minimum spacing between two pings of the same masternode
pub const MASTERNODE_PING_SECONDS: i64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodePing {
    pub collateral: CollateralRef,
    /// Unix seconds
    pub sig_time: i64,
    pub signature: Vec<u8>,
}

impl MasternodePing {
    /// Unsigned ping stamped with the current time
    pub fn new(collateral: CollateralRef) -> Self {
        Self::at(collateral, Utc::now().timestamp())
    }

    pub fn at(collateral: CollateralRef, sig_time: i64) -> Self {
        Self {
            collateral,
            sig_time,
            signature: Vec::new(),
        }
    }

    /// Hash committed to by the signature
    pub fn signing_hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(48);
        // writes into a Vec cannot fail
        let _ = self.collateral.encode(&mut buf);
        let _ = self.sig_time.encode(&mut buf);
        hash256(&buf)
    }

    pub fn sign(&mut self, key: &KeyPair, signer: &dyn MessageSigner) -> Result<()> {
        let hash = self.signing_hash();
        self.signature = signer.sign(&hash, key).map_err(|e| {
            log::error!("MasternodePing::sign - failed to sign ping {}: {}", hash, e);
            MasternodeError::Signing(e)
        })?;
        Ok(())
    }

    pub fn verify(&self, pubkey: &PublicKey, signer: &dyn MessageSigner) -> Result<()> {
        signer
            .verify(&self.signing_hash(), &self.signature, pubkey)
            .map_err(|_| MasternodeError::InvalidPingSignature)
    }

    /// Seconds between this ping and `now`, never negative
    pub fn age(&self, now: i64) -> i64 {
        (now - self.sig_time).abs()
    }

    pub fn signed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.sig_time, 0).single()
    }
}
