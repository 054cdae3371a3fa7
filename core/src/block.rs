//! Block structures and functionality
//!
//! Three kinds of block share one chain. The kind is read from the block
//! itself: a header version in the audit band marks an audit block,
//! otherwise a coinstake in second position marks a stake block, and
//! everything else is proof of work.

use crate::codec::{self, CodecError, Decodable, Encodable};
use crate::merkle::MerkleTree;
use crate::transaction::{OutPoint, Transaction, TransactionError};
use prcy_crypto::{hash256, hash256_pair, Hash256};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;

/// The maximum allowed size for a serialized block, in bytes
pub const MAX_BLOCK_SIZE_CURRENT: usize = 2_000_000;
pub const MAX_BLOCK_SIZE_LEGACY: usize = 1_000_000;

pub const CURRENT_VERSION: i32 = 5;

/// Versions at or above this value are audit blocks
pub const AUDIT_VERSION_LOW_LIMIT: i32 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block has no transactions")]
    NoTransactions,

    #[error("Invalid coinbase transaction")]
    InvalidCoinbase,

    #[error("Merkle root mismatch: header {header}, computed {computed}")]
    MerkleMismatch { header: Hash256, computed: Hash256 },

    #[error("Duplicate transaction hashes in merkle tree")]
    MutatedMerkleTree,

    #[error("Audit commitment missing from audit header")]
    MissingAuditCommitment,

    #[error("Audit merkle root mismatch: header {header}, computed {computed}")]
    AuditMerkleMismatch { header: Hash256, computed: Hash256 },

    #[error("Duplicate audited block summaries")]
    MutatedAuditTree,

    #[error("Audited blocks out of order at height {height} (previous {previous})")]
    AuditOrder { previous: u32, height: u32 },

    #[error("Mined hash does not match header fields")]
    MinedHashMismatch,

    #[error("Audit summaries present in a non-audit block")]
    UnexpectedAuditData,

    #[error("Block size {size} exceeds limit {limit}")]
    Oversized { size: usize, limit: usize },

    #[error("Block cannot be encoded: {0}")]
    Codec(String),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Work,
    Stake,
    Audit,
}

impl BlockKind {
    pub fn requires_signature(&self) -> bool {
        !matches!(self, BlockKind::Work)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Work => write!(f, "proof-of-work"),
            BlockKind::Stake => write!(f, "proof-of-stake"),
            BlockKind::Audit => write!(f, "proof-of-audit"),
        }
    }
}

/// Summary of a previously validated block attested by an audit block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditedBlockSummary {
    pub hash: Hash256,
    pub time: u32,
    pub height: u32,
}

impl AuditedBlockSummary {
    pub fn new(hash: Hash256, time: u32, height: u32) -> Self {
        Self { hash, time, height }
    }

    /// Leaf hash in the audit merkle tree
    pub fn leaf_hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(40);
        let _ = self.encode(&mut buf);
        hash256(&buf)
    }
}

/// Audit-only header fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCommitment {
    /// Identity of the previous audit block. Audit blocks form their own
    /// chain threaded through ordinary blocks.
    pub prev_audit_block: Hash256,
    /// Root over the audited block summaries
    pub audit_merkle_root: Hash256,
    /// Proof-of-work hash found before the back-link is known
    pub mined_hash: Hash256,
}

/// First-stage hash of an audit block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartialHash(pub Hash256);

/// The fields an audit miner controls without knowing the back-link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditCandidate {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub audit_merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl AuditCandidate {
    pub fn mine(&self) -> PartialHash {
        let mut buf = Vec::with_capacity(112);
        let _ = self.version.encode(&mut buf);
        let _ = self.prev_block.encode(&mut buf);
        let _ = self.merkle_root.encode(&mut buf);
        let _ = self.audit_merkle_root.encode(&mut buf);
        let _ = self.time.encode(&mut buf);
        let _ = self.bits.encode(&mut buf);
        let _ = self.nonce.encode(&mut buf);
        PartialHash(hash256(&buf))
    }
}

/// Second stage: fold the back-link into the mined hash
pub fn finalize(partial: &PartialHash, prev_audit_block: &Hash256) -> Hash256 {
    hash256_pair(&partial.0, prev_audit_block)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    /// Present iff `version` is in the audit band
    pub audit: Option<AuditCommitment>,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            prev_block: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            audit: None,
            time: 0,
            bits: 0,
            nonce: 0,
        }
    }
}

impl BlockHeader {
    pub fn is_audit_version(&self) -> bool {
        is_audit_version(self.version)
    }

    /// Switch to the audit band, attaching an empty commitment if needed
    pub fn set_audit_version(&mut self) {
        self.version = AUDIT_VERSION_LOW_LIMIT;
        if self.audit.is_none() {
            self.audit = Some(AuditCommitment::default());
        }
    }

    pub fn is_null(&self) -> bool {
        self.bits == 0
    }

    pub fn audit_candidate(&self) -> Option<AuditCandidate> {
        let audit = self.audit.as_ref()?;
        Some(AuditCandidate {
            version: self.version,
            prev_block: self.prev_block,
            merkle_root: self.merkle_root,
            audit_merkle_root: audit.audit_merkle_root,
            time: self.time,
            bits: self.bits,
            nonce: self.nonce,
        })
    }

    /// Recompute the first-stage hash from the header's own fields
    pub fn compute_mined_hash(&self) -> Option<PartialHash> {
        self.audit_candidate().map(|candidate| candidate.mine())
    }

    /// Block identity. Only meaningful for a header that passes
    /// [`check_layout`](Self::check_layout).
    pub fn hash(&self) -> Hash256 {
        match (&self.audit, self.is_audit_version()) {
            (Some(audit), true) => finalize(&PartialHash(audit.mined_hash), &audit.prev_audit_block),
            _ => {
                if let Err(e) = self.check_layout() {
                    log::debug!("BlockHeader::hash: {}, hashing base fields", e);
                }
                let mut buf = Vec::with_capacity(80);
                let _ = self.encode_base(&mut buf);
                hash256(&buf)
            }
        }
    }

    /// Audit fields are present iff the version is in the audit band
    pub fn check_layout(&self) -> Result<(), CodecError> {
        match (self.is_audit_version(), self.audit.is_some()) {
            (true, false) => Err(CodecError::LayoutMismatch(format!(
                "audit version {} without audit commitment",
                self.version
            ))),
            (false, true) => Err(CodecError::LayoutMismatch(format!(
                "version {} carries an audit commitment",
                self.version
            ))),
            _ => Ok(()),
        }
    }

    /// Header fields that every kind serializes, in wire order
    fn encode_base<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.version.encode(w)?;
        self.prev_block.encode(w)?;
        self.merkle_root.encode(w)?;
        self.time.encode(w)?;
        self.bits.encode(w)?;
        self.nonce.encode(w)
    }
}

pub fn is_audit_version(version: i32) -> bool {
    version >= AUDIT_VERSION_LOW_LIMIT
}

impl Encodable for BlockHeader {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.check_layout()?;
        self.version.encode(w)?;
        self.prev_block.encode(w)?;
        self.merkle_root.encode(w)?;
        if let Some(audit) = &self.audit {
            audit.prev_audit_block.encode(w)?;
            audit.audit_merkle_root.encode(w)?;
            audit.mined_hash.encode(w)?;
        }
        self.time.encode(w)?;
        self.bits.encode(w)?;
        self.nonce.encode(w)
    }
}

impl Decodable for BlockHeader {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        let version = i32::decode(r)?;
        let prev_block = Hash256::decode(r)?;
        let merkle_root = Hash256::decode(r)?;
        let audit = if is_audit_version(version) {
            Some(AuditCommitment {
                prev_audit_block: Hash256::decode(r)?,
                audit_merkle_root: Hash256::decode(r)?,
                mined_hash: Hash256::decode(r)?,
            })
        } else {
            None
        };
        Ok(Self {
            version,
            prev_block,
            merkle_root,
            audit,
            time: u32::decode(r)?,
            bits: u32::decode(r)?,
            nonce: u32::decode(r)?,
        })
    }
}

impl Encodable for AuditedBlockSummary {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.hash.encode(w)?;
        self.time.encode(w)?;
        self.height.encode(w)
    }
}

impl Decodable for AuditedBlockSummary {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        Ok(Self {
            hash: Hash256::decode(r)?,
            time: u32::decode(r)?,
            height: u32::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// First is the coinbase; a coinstake in second position makes a stake block
    pub transactions: Vec<Transaction>,
    /// Signature over the block identity; empty for proof-of-work blocks
    pub signature: Vec<u8>,
    /// Ascending by height; audit blocks only
    pub audited_blocks: Vec<AuditedBlockSummary>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
            signature: Vec::new(),
            audited_blocks: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn kind(&self) -> BlockKind {
        if self.header.is_audit_version() {
            BlockKind::Audit
        } else if self.has_coinstake() {
            BlockKind::Stake
        } else {
            BlockKind::Work
        }
    }

    pub fn is_proof_of_work(&self) -> bool {
        self.kind() == BlockKind::Work
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.kind() == BlockKind::Stake
    }

    pub fn is_proof_of_audit(&self) -> bool {
        self.kind() == BlockKind::Audit
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// The second transaction, if it is a coinstake
    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions.get(1).filter(|tx| tx.is_coinstake())
    }

    fn has_coinstake(&self) -> bool {
        self.coinstake().is_some()
    }

    /// Staked outpoint and block time, for stake blocks only
    pub fn proof_of_stake(&self) -> Option<(OutPoint, u32)> {
        if !self.is_proof_of_stake() {
            return None;
        }
        let stake = self.coinstake()?;
        Some((stake.inputs.first()?.prevout, self.header.time))
    }

    /// The signature field is on the wire only when the second transaction
    /// is a coinstake, for audit blocks too
    pub fn has_signature_field(&self) -> bool {
        self.has_coinstake()
    }

    pub fn build_merkle_tree(&self) -> MerkleTree {
        let leaves: Vec<Hash256> = self.transactions.par_iter().map(|tx| tx.hash()).collect();
        MerkleTree::build(leaves)
    }

    pub fn build_audit_merkle_tree(&self) -> MerkleTree {
        MerkleTree::build(self.audited_blocks.iter().map(|s| s.leaf_hash()).collect())
    }

    /// Recompute both merkle roots and the mined hash into the header
    pub fn update_commitments(&mut self) {
        self.header.merkle_root = self.build_merkle_tree().root();
        if self.header.is_audit_version() {
            let audit_root = self.build_audit_merkle_tree().root();
            let audit = self.header.audit.get_or_insert_with(AuditCommitment::default);
            audit.audit_merkle_root = audit_root;
            if let Some(partial) = self.header.compute_mined_hash() {
                if let Some(audit) = self.header.audit.as_mut() {
                    audit.mined_hash = partial.0;
                }
            }
        }
    }

    /// One coinbase, in first position
    pub fn check_structure(&self) -> Result<(), BlockError> {
        let coinbase = self.coinbase().ok_or(BlockError::NoTransactions)?;
        if !coinbase.is_coinbase() {
            return Err(BlockError::InvalidCoinbase);
        }
        if self.transactions[1..].iter().any(|tx| tx.is_coinbase()) {
            return Err(BlockError::InvalidCoinbase);
        }
        for tx in &self.transactions {
            tx.validate_structure()?;
        }
        Ok(())
    }

    /// Header root matches and the tree is not mutated
    pub fn check_merkle_root(&self) -> Result<(), BlockError> {
        let tree = self.build_merkle_tree();
        if tree.root() != self.header.merkle_root {
            return Err(BlockError::MerkleMismatch {
                header: self.header.merkle_root,
                computed: tree.root(),
            });
        }
        if tree.is_mutated() {
            return Err(BlockError::MutatedMerkleTree);
        }
        Ok(())
    }

    /// Audit root, summary ordering and mined hash of an audit block
    pub fn check_audit_commitment(&self) -> Result<(), BlockError> {
        if !self.header.is_audit_version() {
            if self.audited_blocks.is_empty() {
                return Ok(());
            }
            return Err(BlockError::UnexpectedAuditData);
        }
        let audit = self.header.audit.as_ref().ok_or(BlockError::MissingAuditCommitment)?;

        for pair in self.audited_blocks.windows(2) {
            if pair[1].height <= pair[0].height {
                return Err(BlockError::AuditOrder {
                    previous: pair[0].height,
                    height: pair[1].height,
                });
            }
        }

        let tree = self.build_audit_merkle_tree();
        if tree.root() != audit.audit_merkle_root {
            return Err(BlockError::AuditMerkleMismatch {
                header: audit.audit_merkle_root,
                computed: tree.root(),
            });
        }
        if tree.is_mutated() {
            return Err(BlockError::MutatedAuditTree);
        }

        match self.header.compute_mined_hash() {
            Some(partial) if partial.0 == audit.mined_hash => Ok(()),
            _ => Err(BlockError::MinedHashMismatch),
        }
    }

    pub fn check_size(&self, limit: usize) -> Result<(), BlockError> {
        let size = self
            .serialized_size()
            .map_err(|e| BlockError::Codec(e.to_string()))?;
        if size > limit {
            return Err(BlockError::Oversized { size, limit });
        }
        Ok(())
    }

    pub fn serialized_size(&self) -> Result<usize, CodecError> {
        codec::serialize(self).map(|bytes| bytes.len())
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

impl Encodable for Block {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.header.encode(w)?;
        codec::write_vec(w, &self.transactions)?;
        if self.has_signature_field() {
            codec::write_bytes(w, &self.signature)?;
        } else if !self.signature.is_empty() {
            return Err(CodecError::LayoutMismatch(
                "signature on a block without coinstake".to_string(),
            ));
        }
        if self.header.is_audit_version() {
            codec::write_vec(w, &self.audited_blocks)?;
        } else if !self.audited_blocks.is_empty() {
            return Err(CodecError::LayoutMismatch(
                "audited blocks on a non-audit block".to_string(),
            ));
        }
        Ok(())
    }
}

impl Decodable for Block {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        let header = BlockHeader::decode(r)?;
        let transactions = codec::read_vec(r)?;
        let mut block = Block::new(header, transactions);
        if block.has_signature_field() {
            block.signature = codec::read_bytes(r)?;
        }
        if block.header.is_audit_version() {
            block.audited_blocks = codec::read_vec(r)?;
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{deserialize, serialize};
    use crate::script::Script;
    use crate::transaction::{TxIn, TxOut};

    fn coinbase(height: u32) -> Transaction {
        Transaction::coinbase(height, vec![TxOut::new(50, Script::default())])
    }

    fn coinstake() -> Transaction {
        Transaction::new(
            vec![TxIn::new(OutPoint::new(hash256(b"utxo"), 0), Script::default())],
            vec![TxOut::empty(), TxOut::new(1000, Script::default())],
        )
    }

    fn spend(tag: &[u8]) -> Transaction {
        Transaction::new(
            vec![TxIn::new(OutPoint::new(hash256(tag), 0), Script::default())],
            vec![TxOut::new(1, Script::default())],
        )
    }

    fn audit_block() -> Block {
        let mut header = BlockHeader {
            time: 1_600_000_000,
            bits: 0x1e0f_ffff,
            ..BlockHeader::default()
        };
        header.set_audit_version();
        header.audit.as_mut().unwrap().prev_audit_block = hash256(b"previous audit");

        let mut block = Block::new(header, vec![coinbase(7)]);
        block.audited_blocks = vec![
            AuditedBlockSummary::new(hash256(b"a"), 100, 10),
            AuditedBlockSummary::new(hash256(b"b"), 160, 11),
            AuditedBlockSummary::new(hash256(b"c"), 220, 13),
        ];
        block.update_commitments();
        block
    }

    #[test]
    fn test_kind_discriminant() {
        let work = Block::new(BlockHeader::default(), vec![coinbase(1), spend(b"x")]);
        assert_eq!(work.kind(), BlockKind::Work);

        let stake = Block::new(BlockHeader::default(), vec![coinbase(1), coinstake()]);
        assert_eq!(stake.kind(), BlockKind::Stake);

        // audit band wins over a coinstake
        let mut audit = stake.clone();
        audit.header.set_audit_version();
        assert_eq!(audit.kind(), BlockKind::Audit);
        assert!(!audit.is_proof_of_stake());
        assert!(audit.proof_of_stake().is_none());
    }

    #[test]
    fn test_kind_is_total_over_versions() {
        for version in [i32::MIN, -1, 0, 1, CURRENT_VERSION, 99, 100, 101, i32::MAX] {
            for txs in [vec![coinbase(1)], vec![coinbase(1), coinstake()]] {
                let mut header = BlockHeader {
                    version,
                    ..BlockHeader::default()
                };
                if is_audit_version(version) {
                    header.audit = Some(AuditCommitment::default());
                }
                let block = Block::new(header, txs);
                let flags = [
                    block.is_proof_of_work(),
                    block.is_proof_of_stake(),
                    block.is_proof_of_audit(),
                ];
                assert_eq!(flags.iter().filter(|f| **f).count(), 1, "version {}", version);
                assert_eq!(block.is_proof_of_audit(), version >= AUDIT_VERSION_LOW_LIMIT);
            }
        }
    }

    #[test]
    fn test_work_header_wire_layout() {
        let header = BlockHeader {
            time: 1,
            bits: 2,
            nonce: 3,
            ..BlockHeader::default()
        };
        let bytes = serialize(&header).unwrap();
        assert_eq!(bytes.len(), 4 + 32 + 32 + 12);
        assert_eq!(&bytes[..4], &CURRENT_VERSION.to_le_bytes());
        assert_eq!(&bytes[68..72], &1u32.to_le_bytes());
        assert_eq!(deserialize::<BlockHeader>(&bytes).unwrap(), header);
    }

    #[test]
    fn test_audit_header_wire_layout() {
        let block = audit_block();
        let bytes = serialize(&block.header).unwrap();
        assert_eq!(bytes.len(), 4 + 32 * 5 + 12);
        // back-link follows the primary merkle root
        let audit = block.header.audit.unwrap();
        assert_eq!(&bytes[68..100], audit.prev_audit_block.as_bytes());
        assert_eq!(deserialize::<BlockHeader>(&bytes).unwrap(), block.header);
    }

    #[test]
    fn test_inconsistent_header_rejected() {
        let mut header = BlockHeader::default();
        header.version = AUDIT_VERSION_LOW_LIMIT;
        assert!(matches!(serialize(&header), Err(CodecError::LayoutMismatch(_))));

        let header = BlockHeader {
            audit: Some(AuditCommitment::default()),
            ..BlockHeader::default()
        };
        assert!(matches!(serialize(&header), Err(CodecError::LayoutMismatch(_))));
    }

    #[test]
    fn test_two_stage_audit_identity() {
        let block = audit_block();
        let audit = block.header.audit.unwrap();
        let partial = block.header.audit_candidate().unwrap().mine();
        assert_eq!(partial.0, audit.mined_hash);
        assert_eq!(block.hash(), finalize(&partial, &audit.prev_audit_block));

        // the back-link changes the identity but not the mined hash
        let mut relinked = block.clone();
        relinked.header.audit.as_mut().unwrap().prev_audit_block = hash256(b"other");
        assert_eq!(relinked.header.compute_mined_hash(), Some(partial));
        assert_ne!(relinked.hash(), block.hash());
        assert!(relinked.check_audit_commitment().is_ok());
    }

    #[test]
    fn test_audit_commitment_checks() {
        let block = audit_block();
        assert!(block.check_audit_commitment().is_ok());

        let mut unordered = block.clone();
        unordered.audited_blocks.swap(0, 1);
        assert_eq!(
            unordered.check_audit_commitment(),
            Err(BlockError::AuditOrder {
                previous: 11,
                height: 10
            })
        );

        let mut tampered = block.clone();
        tampered.audited_blocks[2].time += 1;
        assert!(matches!(
            tampered.check_audit_commitment(),
            Err(BlockError::AuditMerkleMismatch { .. })
        ));

        let mut renonced = block.clone();
        renonced.header.nonce += 1;
        assert_eq!(renonced.check_audit_commitment(), Err(BlockError::MinedHashMismatch));
    }

    #[test]
    fn test_merkle_root_checks() {
        let mut block = Block::new(BlockHeader::default(), vec![coinbase(3), spend(b"a"), spend(b"b")]);
        block.update_commitments();
        assert!(block.check_merkle_root().is_ok());
        assert!(block.check_structure().is_ok());

        let mut swapped = block.clone();
        swapped.transactions.swap(1, 2);
        assert!(matches!(
            swapped.check_merkle_root(),
            Err(BlockError::MerkleMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicated_transactions_flag_mutation() {
        let dup = spend(b"dup");
        let mut block = Block::new(
            BlockHeader::default(),
            vec![coinbase(4), spend(b"a"), dup.clone(), dup],
        );
        block.update_commitments();
        assert!(block.build_merkle_tree().is_mutated());
        // root still computed
        assert_eq!(block.build_merkle_tree().root(), block.header.merkle_root);
        assert_eq!(block.check_merkle_root(), Err(BlockError::MutatedMerkleTree));
    }

    #[test]
    fn test_structure_checks() {
        let empty = Block::new(BlockHeader::default(), vec![]);
        assert_eq!(empty.check_structure(), Err(BlockError::NoTransactions));

        let no_coinbase = Block::new(BlockHeader::default(), vec![spend(b"a")]);
        assert_eq!(no_coinbase.check_structure(), Err(BlockError::InvalidCoinbase));

        let two_coinbases = Block::new(BlockHeader::default(), vec![coinbase(1), coinbase(2)]);
        assert_eq!(two_coinbases.check_structure(), Err(BlockError::InvalidCoinbase));
    }

    #[test]
    fn test_signature_only_on_the_wire_for_signed_kinds() {
        let work = Block::new(BlockHeader::default(), vec![coinbase(1), spend(b"a")]);
        let work_bytes = serialize(&work).unwrap();

        let mut stake = Block::new(BlockHeader::default(), vec![coinbase(1), coinstake()]);
        stake.signature = vec![0xab; 64];
        let stake_bytes = serialize(&stake).unwrap();
        assert_eq!(deserialize::<Block>(&stake_bytes).unwrap(), stake);
        assert!(stake_bytes.ends_with(&[0xab; 64]));

        let mut signed_work = work.clone();
        signed_work.signature = vec![1];
        assert!(serialize(&signed_work).is_err());
        assert_eq!(deserialize::<Block>(&work_bytes).unwrap(), work);
    }

    #[test]
    fn test_audit_block_without_coinstake_has_no_signature_field() {
        let block = audit_block();
        assert!(!block.has_signature_field());

        let mut expected = serialize(&block.header).unwrap();
        codec::write_vec(&mut expected, &block.transactions).unwrap();
        codec::write_vec(&mut expected, &block.audited_blocks).unwrap();

        let bytes = serialize(&block).unwrap();
        assert_eq!(bytes, expected);
        assert_eq!(deserialize::<Block>(&expected).unwrap(), block);

        // nowhere to put a signature
        let mut signed = block.clone();
        signed.signature = vec![7; 64];
        assert!(matches!(serialize(&signed), Err(CodecError::LayoutMismatch(_))));
    }

    #[test]
    fn test_audit_block_with_coinstake_carries_signature() {
        let mut block = audit_block();
        block.transactions.push(coinstake());
        block.update_commitments();
        block.signature = vec![7; 64];
        assert!(block.has_signature_field());

        let mut expected = serialize(&block.header).unwrap();
        codec::write_vec(&mut expected, &block.transactions).unwrap();
        codec::write_bytes(&mut expected, &block.signature).unwrap();
        codec::write_vec(&mut expected, &block.audited_blocks).unwrap();

        let bytes = serialize(&block).unwrap();
        assert_eq!(bytes, expected);
        assert_eq!(deserialize::<Block>(&bytes).unwrap(), block);
        assert_eq!(block.serialized_size().unwrap(), bytes.len());
        assert!(block.check_size(MAX_BLOCK_SIZE_LEGACY).is_ok());
        assert!(matches!(
            block.check_size(10),
            Err(BlockError::Oversized { .. })
        ));
    }

    #[test]
    fn test_size_check_reports_unencodable_block() {
        let mut work = Block::new(BlockHeader::default(), vec![coinbase(1), spend(b"a")]);
        work.update_commitments();
        work.signature = vec![0xcd; 64];

        assert!(matches!(
            work.serialized_size(),
            Err(CodecError::LayoutMismatch(_))
        ));
        assert!(matches!(
            work.check_size(MAX_BLOCK_SIZE_CURRENT),
            Err(BlockError::Codec(_))
        ));
    }

    #[test]
    fn test_inconsistent_header_hashes_base_fields() {
        let mut header = BlockHeader::default();
        let base = header.hash();
        header.version = AUDIT_VERSION_LOW_LIMIT;
        assert!(header.check_layout().is_err());
        assert_ne!(header.hash(), base);

        header.set_audit_version();
        assert!(header.check_layout().is_ok());
    }
}
