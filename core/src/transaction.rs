//! Transaction structures and types
//!
//! Only the shape needed by the block model lives here: outpoints,
//! inputs/outputs and the coinbase/coinstake predicates. Script execution
//! and UTXO accounting are handled elsewhere.

use crate::codec::{self, CodecError, Decodable, Encodable};
use crate::script::Script;
use prcy_crypto::{hash256, Hash256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction has no inputs")]
    NoInputs,

    #[error("Transaction has no outputs")]
    NoOutputs,

    #[error("Negative output value at index {0}")]
    NegativeValue(usize),

    #[error("Null prevout in non-coinbase input {0}")]
    NullPrevout(usize),
}

/// Reference to a transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

impl Default for OutPoint {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Script) -> Self {
        Self {
            prevout,
            script_sig,
            sequence: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: i64, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    /// Zero value and empty script, the marker output of a coinstake
    pub fn empty() -> Self {
        Self::new(0, Script::default())
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Coinbase paying `outputs`; `height` keeps coinbases of different blocks distinct
    pub fn coinbase(height: u32, outputs: Vec<TxOut>) -> Self {
        let script_sig = Script::builder().push_slice(&height.to_le_bytes()).into_script();
        Self::new(vec![TxIn::new(OutPoint::null(), script_sig)], outputs)
    }

    /// Transaction id: double hash of the encoding
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.encode(&mut buf);
        hash256(&buf)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// First input spends a real output and the first output is the empty marker
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].prevout.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    /// Context-free checks
    pub fn validate_structure(&self) -> Result<(), TransactionError> {
        if self.inputs.is_empty() {
            return Err(TransactionError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        if let Some(index) = self.outputs.iter().position(|o| o.value < 0) {
            return Err(TransactionError::NegativeValue(index));
        }
        if !self.is_coinbase() {
            if let Some(index) = self.inputs.iter().position(|i| i.prevout.is_null()) {
                return Err(TransactionError::NullPrevout(index));
            }
        }
        Ok(())
    }
}

impl Encodable for OutPoint {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.txid.encode(w)?;
        self.vout.encode(w)
    }
}

impl Decodable for OutPoint {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        Ok(Self {
            txid: Hash256::decode(r)?,
            vout: u32::decode(r)?,
        })
    }
}

impl Encodable for TxIn {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.prevout.encode(w)?;
        self.script_sig.encode(w)?;
        self.sequence.encode(w)
    }
}

impl Decodable for TxIn {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        Ok(Self {
            prevout: OutPoint::decode(r)?,
            script_sig: Script::decode(r)?,
            sequence: u32::decode(r)?,
        })
    }
}

impl Encodable for TxOut {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.value.encode(w)?;
        self.script_pubkey.encode(w)
    }
}

impl Decodable for TxOut {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        Ok(Self {
            value: i64::decode(r)?,
            script_pubkey: Script::decode(r)?,
        })
    }
}

impl Encodable for Transaction {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.version.encode(w)?;
        codec::write_vec(w, &self.inputs)?;
        codec::write_vec(w, &self.outputs)?;
        self.lock_time.encode(w)
    }
}

impl Decodable for Transaction {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        Ok(Self {
            version: i32::decode(r)?,
            inputs: codec::read_vec(r)?,
            outputs: codec::read_vec(r)?,
            lock_time: u32::decode(r)?,
        })
    }
}
