//! Cache of block signatures that already verified
//!
//! Entries are keyed by the block identity, the signature bytes and the
//! signer key recovered from the block body. An audit block's identity does
//! not cover its transactions, so the identity alone cannot stand for the
//! signer.

use lru::LruCache;
use parking_lot::Mutex;
use prcy_crypto::{hash256, Hash256, PublicKey};
use std::num::NonZeroUsize;

pub const DEFAULT_SIGNATURE_CACHE_SIZE: usize = 4096;

pub struct SignatureCache {
    entries: Mutex<LruCache<Hash256, ()>>,
}

impl SignatureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn entry_key(block_hash: &Hash256, signature: &[u8], signer: &PublicKey) -> Hash256 {
        let key = signer.as_bytes();
        let mut data = Vec::with_capacity(32 + 8 + signature.len() + key.len());
        data.extend_from_slice(block_hash.as_bytes());
        // variable-length parts are length-prefixed
        data.extend_from_slice(&(signature.len() as u32).to_le_bytes());
        data.extend_from_slice(signature);
        data.extend_from_slice(&(key.len() as u32).to_le_bytes());
        data.extend_from_slice(key);
        hash256(&data)
    }

    pub fn contains(&self, block_hash: &Hash256, signature: &[u8], signer: &PublicKey) -> bool {
        let key = Self::entry_key(block_hash, signature, signer);
        self.entries.lock().get(&key).is_some()
    }

    pub fn insert(&self, block_hash: &Hash256, signature: &[u8], signer: &PublicKey) {
        let key = Self::entry_key(block_hash, signature, signer);
        self.entries.lock().put(key, ());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_CACHE_SIZE)
    }
}
