//! Block signatures
//!
//! Stake and audit blocks are signed with the key that owns the staked
//! output; the key is recovered from the block itself. Proof-of-work
//! blocks carry no signature at all.

use crate::block::{Block, BlockKind};
use crate::script::{opcodes, ScriptClassifier, ScriptKind};
use crate::sigcache::SignatureCache;
use crate::transaction::{TxIn, TxOut};
use prcy_crypto::{CryptoError, Ed25519Signer, KeyId, KeyPair, MessageSigner, PublicKey};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Why no signer key could be recovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyNotFound {
    /// Neither a coinstake output nor a classifiable coinbase output
    NoDesignatedOutput,
    /// The coinstake has no input to read an embedded key from
    NoStakeInput,
    /// The designated output has a script shape that cannot name a signer
    Unsupported(&'static str),
    /// The unlocking script holds only a signature
    SignatureOnly,
    /// Push offsets run past the end of the unlocking script
    Malformed,
    /// The embedded key does not hash to the committed key id
    KeyMismatch,
    /// The recovered bytes are not a usable public key
    InvalidKey(String),
}

impl std::fmt::Display for KeyNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyNotFound::NoDesignatedOutput => write!(f, "no designated output"),
            KeyNotFound::NoStakeInput => write!(f, "coinstake has no input"),
            KeyNotFound::Unsupported(kind) => write!(f, "unsupported script type {}", kind),
            KeyNotFound::SignatureOnly => write!(f, "unlocking script carries no key"),
            KeyNotFound::Malformed => write!(f, "malformed unlocking script"),
            KeyNotFound::KeyMismatch => write!(f, "embedded key does not match output"),
            KeyNotFound::InvalidKey(hex) => write!(f, "invalid pubkey {}", hex),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Proof-of-work block carries a {0}-byte signature")]
    UnexpectedSignature(usize),

    #[error("{0} block signature is empty")]
    EmptySignature(BlockKind),

    #[error("Signer key not found: {0}")]
    KeyNotFound(KeyNotFound),

    #[error("Block signature does not verify against signer key")]
    Mismatch,

    #[error("Failed to sign block hash: {0}")]
    Signing(CryptoError),

    #[error("Key {0} not in keystore")]
    MissingKey(String),

    #[error("Block layout is inconsistent: {0}")]
    Layout(String),
}

impl From<KeyNotFound> for SignatureError {
    fn from(reason: KeyNotFound) -> Self {
        SignatureError::KeyNotFound(reason)
    }
}

/// Private keys by id
pub trait KeyStore {
    fn get_key(&self, id: &KeyId) -> Option<KeyPair>;
}

impl KeyStore for HashMap<KeyId, KeyPair> {
    fn get_key(&self, id: &KeyId) -> Option<KeyPair> {
        self.get(id).cloned()
    }
}

/// Output whose locking script names the block signer: the coinstake's
/// second output, or for blocks without a coinstake the first coinbase
/// output with a standard script.
fn designated_output_kind(
    block: &Block,
    classifier: &dyn ScriptClassifier,
) -> Result<ScriptKind, KeyNotFound> {
    if let Some(stake) = block.coinstake() {
        let out: &TxOut = stake.outputs.get(1).ok_or(KeyNotFound::NoDesignatedOutput)?;
        return Ok(classifier.classify(&out.script_pubkey));
    }

    block
        .coinbase()
        .into_iter()
        .flat_map(|cb| cb.outputs.iter())
        .map(|out| classifier.classify(&out.script_pubkey))
        .find(|kind| *kind != ScriptKind::NonStandard)
        .ok_or(KeyNotFound::NoDesignatedOutput)
}

fn stake_input(block: &Block) -> Result<&TxIn, KeyNotFound> {
    block
        .coinstake()
        .and_then(|stake| stake.inputs.first())
        .ok_or(KeyNotFound::NoStakeInput)
}

/// Skip one length-prefixed push starting at `start`, returning the offset after it
fn skip_push(script: &[u8], start: usize) -> Result<usize, KeyNotFound> {
    let len = *script.get(start).ok_or(KeyNotFound::Malformed)? as usize;
    let next = start + 1 + len;
    // at least a length byte and one key byte must follow
    if next + 1 >= script.len() {
        return Err(KeyNotFound::Malformed);
    }
    Ok(next)
}

/// Key bytes after the length byte at `start`
fn key_at(script: &[u8], start: usize) -> PublicKey {
    PublicKey::from_slice(&script[start + 1..])
}

fn key_from_key_hash_input(input: &TxIn) -> Result<PublicKey, KeyNotFound> {
    let script = input.script_sig.as_bytes();
    let sig_len = *script.first().ok_or(KeyNotFound::Malformed)? as usize;
    if 1 + sig_len >= script.len() {
        return Err(KeyNotFound::SignatureOnly);
    }
    let start = skip_push(script, 0)?;
    Ok(key_at(script, start))
}

fn key_from_cold_stake_input(input: &TxIn) -> Result<PublicKey, KeyNotFound> {
    let script = input.script_sig.as_bytes();
    let after_sig = skip_push(script, 0)?;
    let after_flag = skip_push(script, after_sig)?;
    Ok(key_at(script, after_flag))
}

fn key_from_legacy_spend(input: &TxIn) -> Result<PublicKey, KeyNotFound> {
    let script = input.script_sig.as_bytes();
    if script.first() != Some(&opcodes::OP_LEGACY_SPEND) {
        return Err(KeyNotFound::Malformed);
    }
    let len = *script.get(1).ok_or(KeyNotFound::Malformed)? as usize;
    let key = script.get(2..2 + len).ok_or(KeyNotFound::Malformed)?;
    Ok(PublicKey::from_slice(key))
}

/// Recover the public key entitled to sign `block`
pub fn recover_signer_key(
    block: &Block,
    classifier: &dyn ScriptClassifier,
) -> Result<PublicKey, KeyNotFound> {
    let pubkey = match designated_output_kind(block, classifier)? {
        ScriptKind::PayToPubKey(key) => key,
        ScriptKind::PayToPubKeyHash(id) => {
            let key = key_from_key_hash_input(stake_input(block)?)?;
            if key.id() != id {
                return Err(KeyNotFound::KeyMismatch);
            }
            key
        }
        ScriptKind::ColdStake { staker, owner } => {
            let key = key_from_cold_stake_input(stake_input(block)?)?;
            let id = key.id();
            if id != staker && id != owner {
                return Err(KeyNotFound::KeyMismatch);
            }
            key
        }
        ScriptKind::LegacySpend { serial } => {
            let key = key_from_legacy_spend(stake_input(block)?)?;
            if prcy_crypto::hash256(key.as_bytes()).0 != serial {
                return Err(KeyNotFound::KeyMismatch);
            }
            key
        }
        ScriptKind::NonStandard => {
            return Err(KeyNotFound::Unsupported(ScriptKind::NonStandard.name()))
        }
    };

    if !pubkey.is_valid() {
        return Err(KeyNotFound::InvalidKey(pubkey.to_hex()));
    }
    Ok(pubkey)
}

/// Sign the block identity hash with `key`
pub fn sign_block(block: &mut Block, key: &KeyPair) -> Result<(), SignatureError> {
    sign_block_with(block, key, &Ed25519Signer)
}

pub fn sign_block_with(
    block: &mut Block,
    key: &KeyPair,
    signer: &dyn MessageSigner,
) -> Result<(), SignatureError> {
    check_header_layout(block)?;
    if block.kind().requires_signature() && !block.has_signature_field() {
        log::error!(
            "sign_block: {} block {} has no coinstake to carry a signature",
            block.kind(),
            block.hash()
        );
        return Err(SignatureError::Layout(
            "signature on a block without coinstake".to_string(),
        ));
    }

    let hash = block.hash();
    match signer.sign(&hash, key) {
        Ok(signature) => {
            block.signature = signature;
            Ok(())
        }
        Err(e) => {
            log::error!("sign_block: failed to sign block hash {} with key: {}", hash, e);
            Err(SignatureError::Signing(e))
        }
    }
}

/// Look up the staking key for `block` in `keystore` and sign with it.
/// Proof-of-work blocks are left unsigned.
pub fn sign_block_with_keystore(
    block: &mut Block,
    keystore: &dyn KeyStore,
    classifier: &dyn ScriptClassifier,
) -> Result<(), SignatureError> {
    if block.kind() == BlockKind::Work {
        log::debug!("sign_block: proof-of-work block {} is not signed", block.hash());
        block.signature.clear();
        return Ok(());
    }

    let id = match &designated_output_kind(block, classifier)? {
        ScriptKind::PayToPubKey(key) => key.id(),
        ScriptKind::PayToPubKeyHash(id) => *id,
        ScriptKind::ColdStake { staker, .. } => *staker,
        other => return Err(KeyNotFound::Unsupported(other.name()).into()),
    };

    let key = keystore.get_key(&id).ok_or_else(|| {
        log::error!("sign_block: failed to get key {} from keystore", id.to_hex());
        SignatureError::MissingKey(id.to_hex())
    })?;
    sign_block(block, &key)
}

fn check_header_layout(block: &Block) -> Result<(), SignatureError> {
    block.header.check_layout().map_err(|e| {
        log::debug!("block signature: {}", e);
        SignatureError::Layout(e.to_string())
    })
}

/// Every check short of the cryptographic one. Yields the signer key for
/// signed kinds and `None` for an unsigned proof-of-work block.
fn expected_signer(
    block: &Block,
    classifier: &dyn ScriptClassifier,
) -> Result<Option<PublicKey>, SignatureError> {
    check_header_layout(block)?;

    let kind = block.kind();
    if !kind.requires_signature() {
        if block.signature.is_empty() {
            return Ok(None);
        }
        return Err(SignatureError::UnexpectedSignature(block.signature.len()));
    }

    if block.signature.is_empty() {
        log::debug!("check_block_signature: signature of {} is empty", block.hash());
        return Err(SignatureError::EmptySignature(kind));
    }
    if !block.has_signature_field() {
        return Err(SignatureError::Layout(
            "signature on a block without coinstake".to_string(),
        ));
    }

    let pubkey = recover_signer_key(block, classifier).map_err(|reason| {
        log::debug!("check_block_signature: {}: {}", block.hash(), reason);
        SignatureError::KeyNotFound(reason)
    })?;
    Ok(Some(pubkey))
}

fn verify_with_key(block: &Block, pubkey: &PublicKey) -> Result<(), SignatureError> {
    pubkey
        .verify(block.hash().as_bytes(), &block.signature)
        .map_err(|_| SignatureError::Mismatch)
}

/// Verify the block signature against the recovered signer key
pub fn check_block_signature(
    block: &Block,
    classifier: &dyn ScriptClassifier,
) -> Result<(), SignatureError> {
    match expected_signer(block, classifier)? {
        Some(pubkey) => verify_with_key(block, &pubkey),
        None => Ok(()),
    }
}

/// Shareable verifier with an optional cache of successful verdicts
#[derive(Clone)]
pub struct BlockSignatureVerifier {
    classifier: Arc<dyn ScriptClassifier>,
    cache: Option<Arc<SignatureCache>>,
}

impl BlockSignatureVerifier {
    pub fn new(classifier: Arc<dyn ScriptClassifier>) -> Self {
        Self {
            classifier,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<SignatureCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The signer key is always recovered from the block body; only the
    /// final signature check is skipped on a cache hit.
    pub fn verify(&self, block: &Block) -> Result<(), SignatureError> {
        let pubkey = match expected_signer(block, self.classifier.as_ref())? {
            Some(pubkey) => pubkey,
            None => return Ok(()),
        };

        let cache = match &self.cache {
            Some(cache) => cache,
            None => return verify_with_key(block, &pubkey),
        };

        let hash = block.hash();
        if cache.contains(&hash, &block.signature, &pubkey) {
            return Ok(());
        }
        verify_with_key(block, &pubkey)?;
        cache.insert(&hash, &block.signature, &pubkey);
        Ok(())
    }

    pub fn is_valid(&self, block: &Block) -> bool {
        self.verify(block).is_ok()
    }
}
