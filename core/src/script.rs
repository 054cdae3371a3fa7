//! Locking scripts and the standard template classifier
//!
//! Scripts are opaque byte strings to the block model. The classifier
//! recognizes the locking-script templates a staked output can carry and
//! returns the key material each one commits to.

use crate::codec::{self, CodecError, Decodable, Encodable};
use prcy_crypto::{hash256, KeyId, PublicKey, PUBLIC_KEY_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_1: u8 = 0x51;
    pub const OP_IF: u8 = 0x63;
    pub const OP_ELSE: u8 = 0x67;
    pub const OP_ENDIF: u8 = 0x68;
    pub const OP_ROT: u8 = 0x7b;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    /// Marks an output minted by the legacy private-coin protocol
    pub const OP_LEGACY_MINT: u8 = 0xc1;
    /// First opcode of an unlocking script spending a legacy mint
    pub const OP_LEGACY_SPEND: u8 = 0xc2;
    pub const OP_CHECKCOLDSTAKEVERIFY: u8 = 0xd1;
}

use opcodes::*;

#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }

    pub fn builder() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `<key> OP_CHECKSIG`
    pub fn pay_to_pubkey(key: &PublicKey) -> Self {
        Self::builder()
            .push_slice(key.as_bytes())
            .push_opcode(OP_CHECKSIG)
            .into_script()
    }

    /// `OP_DUP OP_HASH160 <id> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn pay_to_pubkey_hash(id: &KeyId) -> Self {
        Self::builder()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(&id.0)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .into_script()
    }

    /// Cold-stake delegation: `staker` may stake, `owner` may spend
    pub fn cold_stake(staker: &KeyId, owner: &KeyId) -> Self {
        Self::builder()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_opcode(OP_ROT)
            .push_opcode(OP_IF)
            .push_opcode(OP_CHECKCOLDSTAKEVERIFY)
            .push_slice(&staker.0)
            .push_opcode(OP_ELSE)
            .push_slice(&owner.0)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .into_script()
    }

    /// Legacy mint whose serial commits to the spending key
    pub fn legacy_mint(key: &PublicKey) -> Self {
        Self::builder()
            .push_opcode(OP_LEGACY_MINT)
            .push_slice(hash256(key.as_bytes()).as_bytes())
            .into_script()
    }

    /// `<sig> <key>`, the unlocking script of a pay-to-key-hash output
    pub fn key_hash_unlock(signature: &[u8], key: &PublicKey) -> Self {
        Self::builder()
            .push_slice(signature)
            .push_slice(key.as_bytes())
            .into_script()
    }

    /// `<sig> <flag> <key>`, the unlocking script of a cold-stake output.
    /// The flag selects the staker branch.
    pub fn cold_stake_unlock(signature: &[u8], staker_branch: bool, key: &PublicKey) -> Self {
        let builder = Self::builder().push_slice(signature);
        let builder = if staker_branch {
            builder.push_slice(&[1])
        } else {
            builder.push_opcode(OP_0)
        };
        builder.push_slice(key.as_bytes()).into_script()
    }

    /// `OP_LEGACY_SPEND <key> <proof>`
    pub fn legacy_spend(key: &PublicKey, proof: &[u8]) -> Self {
        Self::builder()
            .push_opcode(OP_LEGACY_SPEND)
            .push_slice(key.as_bytes())
            .push_slice(proof)
            .into_script()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

impl Encodable for Script {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        codec::write_bytes(w, &self.0)
    }
}

impl Decodable for Script {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        Ok(Script(codec::read_bytes(r)?))
    }
}

#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn push_opcode(mut self, op: u8) -> Self {
        self.bytes.push(op);
        self
    }

    /// Minimal push of `data`
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        match data.len() {
            len @ 0..=0x4b => self.bytes.push(len as u8),
            len @ 0x4c..=0xff => {
                self.bytes.push(OP_PUSHDATA1);
                self.bytes.push(len as u8);
            }
            len => {
                self.bytes.push(OP_PUSHDATA2);
                self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
            }
        }
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn into_script(self) -> Script {
        Script(self.bytes)
    }
}

/// Standard locking-script shapes and the key material they carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    PayToPubKey(PublicKey),
    PayToPubKeyHash(KeyId),
    ColdStake { staker: KeyId, owner: KeyId },
    /// Legacy mint; the key is embedded in the spending input
    LegacySpend { serial: [u8; 32] },
    NonStandard,
}

impl ScriptKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::PayToPubKey(_) => "pubkey",
            ScriptKind::PayToPubKeyHash(_) => "pubkeyhash",
            ScriptKind::ColdStake { .. } => "coldstake",
            ScriptKind::LegacySpend { .. } => "legacyspend",
            ScriptKind::NonStandard => "nonstandard",
        }
    }
}

/// Resolves a locking script to its template
pub trait ScriptClassifier: Send + Sync {
    fn classify(&self, script: &Script) -> ScriptKind;
}

/// Template matcher for the standard output types.
///
/// `legacy_only` restricts recognition to pay-to-key and pay-to-key-hash,
/// for chains where cold staking and legacy-spend staking are not active.
#[derive(Debug, Clone, Copy)]
pub struct StandardClassifier {
    extended: bool,
}

impl StandardClassifier {
    pub fn new() -> Self {
        Self { extended: true }
    }

    pub fn legacy_only() -> Self {
        Self { extended: false }
    }
}

impl Default for StandardClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptClassifier for StandardClassifier {
    fn classify(&self, script: &Script) -> ScriptKind {
        let s = script.as_bytes();

        if s.len() == PUBLIC_KEY_SIZE + 2 && s[0] == PUBLIC_KEY_SIZE as u8 && s[s.len() - 1] == OP_CHECKSIG {
            return ScriptKind::PayToPubKey(PublicKey::from_slice(&s[1..=PUBLIC_KEY_SIZE]));
        }

        if s.len() == 25
            && s[0] == OP_DUP
            && s[1] == OP_HASH160
            && s[2] == 20
            && s[23] == OP_EQUALVERIFY
            && s[24] == OP_CHECKSIG
        {
            if let Some(id) = KeyId::from_slice(&s[3..23]) {
                return ScriptKind::PayToPubKeyHash(id);
            }
        }

        if !self.extended {
            return ScriptKind::NonStandard;
        }

        if s.len() == 51
            && s[..5] == [OP_DUP, OP_HASH160, OP_ROT, OP_IF, OP_CHECKCOLDSTAKEVERIFY]
            && s[5] == 20
            && s[26] == OP_ELSE
            && s[27] == 20
            && s[48..] == [OP_ENDIF, OP_EQUALVERIFY, OP_CHECKSIG]
        {
            if let (Some(staker), Some(owner)) =
                (KeyId::from_slice(&s[6..26]), KeyId::from_slice(&s[28..48]))
            {
                return ScriptKind::ColdStake { staker, owner };
            }
        }

        if s.len() == 34 && s[0] == OP_LEGACY_MINT && s[1] == 32 {
            let mut serial = [0u8; 32];
            serial.copy_from_slice(&s[2..]);
            return ScriptKind::LegacySpend { serial };
        }

        ScriptKind::NonStandard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prcy_crypto::KeyPair;

    fn key(seed: u8) -> PublicKey {
        KeyPair::from_secret([seed; 32]).public_key()
    }

    #[test]
    fn test_classify_pay_to_pubkey() {
        let pk = key(1);
        let kind = StandardClassifier::new().classify(&Script::pay_to_pubkey(&pk));
        assert_eq!(kind, ScriptKind::PayToPubKey(pk));
    }

    #[test]
    fn test_classify_pay_to_pubkey_hash() {
        let id = key(2).id();
        let kind = StandardClassifier::new().classify(&Script::pay_to_pubkey_hash(&id));
        assert_eq!(kind, ScriptKind::PayToPubKeyHash(id));
    }

    #[test]
    fn test_classify_cold_stake() {
        let staker = key(3).id();
        let owner = key(4).id();
        let script = Script::cold_stake(&staker, &owner);
        assert_eq!(script.len(), 51);
        assert_eq!(
            StandardClassifier::new().classify(&script),
            ScriptKind::ColdStake { staker, owner }
        );
    }

    #[test]
    fn test_classify_legacy_mint() {
        let pk = key(5);
        let kind = StandardClassifier::new().classify(&Script::legacy_mint(&pk));
        assert_eq!(
            kind,
            ScriptKind::LegacySpend {
                serial: hash256(pk.as_bytes()).0
            }
        );
    }

    #[test]
    fn test_legacy_only_classifier() {
        let classifier = StandardClassifier::legacy_only();
        let cold = Script::cold_stake(&key(3).id(), &key(4).id());
        assert_eq!(classifier.classify(&cold), ScriptKind::NonStandard);
        assert_eq!(
            classifier.classify(&Script::legacy_mint(&key(5))),
            ScriptKind::NonStandard
        );
        assert!(matches!(
            classifier.classify(&Script::pay_to_pubkey(&key(1))),
            ScriptKind::PayToPubKey(_)
        ));
    }

    #[test]
    fn test_nonstandard() {
        let classifier = StandardClassifier::new();
        assert_eq!(classifier.classify(&Script::default()), ScriptKind::NonStandard);
        assert_eq!(
            classifier.classify(&Script::from_bytes(vec![OP_CHECKSIG; 25])),
            ScriptKind::NonStandard
        );
    }

    #[test]
    fn test_push_encoding() {
        let script = Script::builder().push_slice(&[0xaa; 80]).into_script();
        assert_eq!(script.as_bytes()[..2], [OP_PUSHDATA1, 80]);

        let unlock = Script::cold_stake_unlock(&[9; 64], true, &key(1));
        // sig push, one-byte flag push, key push
        assert_eq!(unlock.as_bytes()[0], 64);
        assert_eq!(unlock.as_bytes()[65..67], [1, 1]);
        assert_eq!(unlock.as_bytes()[67], 32);
    }
}
