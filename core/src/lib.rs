//! PRCY Core Library
//!
//! Block model, wire encoding and block signatures for a chain that mixes
//! proof-of-work, proof-of-stake and proof-of-audit blocks

pub mod block;
pub mod codec;
pub mod merkle;
pub mod script;
pub mod sigcache;
pub mod signature;
pub mod transaction;

// Re-export main types
pub use block::{
    finalize, AuditCandidate, AuditCommitment, AuditedBlockSummary, Block, BlockError,
    BlockHeader, BlockKind, PartialHash,
};
pub use codec::{deserialize, serialize, CodecError, Decodable, Encodable};
pub use merkle::MerkleTree;
pub use script::{Script, ScriptClassifier, ScriptKind, StandardClassifier};
pub use sigcache::SignatureCache;
pub use signature::{
    check_block_signature, recover_signer_key, sign_block, sign_block_with_keystore,
    BlockSignatureVerifier, KeyNotFound, KeyStore, SignatureError,
};
pub use transaction::{OutPoint, Transaction, TransactionError, TxIn, TxOut};
pub use prcy_crypto::{Hash256, KeyPair, PublicKey};
