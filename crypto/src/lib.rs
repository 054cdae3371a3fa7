//! PRCY Cryptography
//!
//! Block and message signing keys, key ids and the consensus hash function

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use std::fmt;
use thiserror::Error;

/// Length of a serialized public key
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Length of a block or message signature
pub const SIGNATURE_SIZE: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// 256-bit consensus hash
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let bytes = hex::decode(hex_str).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Hash256(array))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

/// Double SHA3-256, used for every consensus hash
pub fn hash256(data: &[u8]) -> Hash256 {
    let first = Sha3_256::digest(data);
    Hash256(Sha3_256::digest(first).into())
}

/// Hash the concatenation of two hashes (merkle nodes, identity folding)
pub fn hash256_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(&left.0);
    data[32..].copy_from_slice(&right.0);
    hash256(&data)
}

/// 160-bit public key id, as committed to by pay-to-key-hash scripts
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 20]);

impl KeyId {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 20] = bytes.try_into().ok()?;
        Some(KeyId(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.to_hex())
    }
}

/// Public key as found in scripts. The bytes are kept verbatim so that a
/// malformed key can be reported; call `is_valid` before trusting it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Self {
        PublicKey(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Correct length and decodes to a curve point
    pub fn is_valid(&self) -> bool {
        self.verifying_key().is_ok()
    }

    /// SHA-256 of the key bytes truncated to 20 bytes
    pub fn id(&self) -> KeyId {
        let digest = Sha256::digest(&self.0);
        let mut id = [0u8; 20];
        id.copy_from_slice(&digest[..20]);
        KeyId(id)
    }

    pub fn verify(&self, message: &[u8], signature_bytes: &[u8]) -> Result<(), CryptoError> {
        let verifying_key = self.verifying_key()?;

        let sig_array: [u8; SIGNATURE_SIZE] = signature_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        let signature = Signature::from_bytes(&sig_array);

        verifying_key
            .verify_strict(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        let key_array: [u8; PUBLIC_KEY_SIZE] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&key_array).map_err(|_| CryptoError::InvalidPublicKey)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// Key pair for signing blocks and masternode messages
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Deterministic keypair from a 32-byte secret
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&secret))
    }

    /// Create keypair from private key hex
    pub fn from_private_key_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| CryptoError::InvalidPrivateKey)?;

        let key_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;

        Ok(Self::from_secret(key_bytes))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_slice(self.verifying_key.as_bytes())
    }

    pub fn key_id(&self) -> KeyId {
        self.public_key().id()
    }

    /// Get private key as hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Sign message
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Signs and verifies 256-bit message hashes
pub trait MessageSigner: Send + Sync {
    fn sign(&self, hash: &Hash256, key: &KeyPair) -> Result<Vec<u8>, CryptoError>;

    fn verify(
        &self,
        hash: &Hash256,
        signature: &[u8],
        public_key: &PublicKey,
    ) -> Result<(), CryptoError>;
}

/// Plain ed25519 over the hash bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Signer;

impl MessageSigner for Ed25519Signer {
    fn sign(&self, hash: &Hash256, key: &KeyPair) -> Result<Vec<u8>, CryptoError> {
        Ok(key.sign(hash.as_bytes()))
    }

    fn verify(
        &self,
        hash: &Hash256,
        signature: &[u8],
        public_key: &PublicKey,
    ) -> Result<(), CryptoError> {
        public_key.verify(hash.as_bytes(), signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let keypair = KeyPair::generate();
        let pub_key = keypair.public_key();

        assert_eq!(pub_key.as_bytes().len(), PUBLIC_KEY_SIZE);
        assert!(pub_key.is_valid());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"test message";

        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"test message");

        let result = keypair.public_key().verify(b"wrong message", &signature);
        assert_eq!(result, Err(CryptoError::InvalidSignature));
    }

    #[test]
    fn test_invalid_public_key() {
        assert!(!PublicKey::from_slice(&[0x02; 33]).is_valid());
        assert!(!PublicKey::from_slice(&[]).is_valid());
    }

    #[test]
    fn test_private_key_hex_round_trip() {
        let keypair = KeyPair::from_secret([7u8; 32]);
        let restored = KeyPair::from_private_key_hex(&keypair.private_key_hex()).unwrap();
        assert_eq!(keypair.public_key(), restored.public_key());
        assert!(KeyPair::from_private_key_hex("zz").is_err());
    }

    #[test]
    fn test_hash256_is_double_sha3() {
        let once = Sha3_256::digest(b"prcy");
        let twice: [u8; 32] = Sha3_256::digest(once).into();
        assert_eq!(hash256(b"prcy"), Hash256(twice));
        assert_ne!(hash256(b"prcy"), hash256(b"prcz"));
    }

    #[test]
    fn test_message_signer() {
        let keypair = KeyPair::from_secret([9u8; 32]);
        let hash = hash256(b"ping");
        let signer = Ed25519Signer;

        let sig = signer.sign(&hash, &keypair).unwrap();
        assert!(signer.verify(&hash, &sig, &keypair.public_key()).is_ok());

        let other = hash256(b"pong");
        assert!(signer.verify(&other, &sig, &keypair.public_key()).is_err());
    }
}
