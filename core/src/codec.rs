//! Consensus wire encoding
//!
//! Integers are little-endian and variable-length fields carry a
//! Bitcoin-style compact-size prefix. Field order and conditional
//! inclusion are consensus critical: a header or block must re-encode to
//! exactly the bytes it was decoded from.

use prcy_crypto::Hash256;
use std::io::{Read, Write};
use thiserror::Error;

/// Upper bound for any length prefix, equal to the largest allowed block
pub const MAX_SIZE: u64 = crate::block::MAX_BLOCK_SIZE_CURRENT as u64;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Length {length} exceeds maximum {max}")]
    Oversized { length: u64, max: u64 },

    #[error("Non-canonical compact size")]
    NonCanonical,

    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

pub trait Encodable {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError>;
}

pub trait Decodable: Sized {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError>;
}

/// Encode a value into a fresh buffer
pub fn serialize<T: Encodable>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    value.encode(&mut buf)?;
    Ok(buf)
}

/// Decode a value that must span the whole input
pub fn deserialize<T: Decodable>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut cursor = bytes;
    let value = T::decode(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(CodecError::TrailingBytes(cursor.len()));
    }
    Ok(value)
}

pub fn write_compact_size<W: Write>(w: &mut W, n: u64) -> Result<(), CodecError> {
    if n < 0xfd {
        w.write_all(&[n as u8])?;
    } else if n <= 0xffff {
        w.write_all(&[0xfd])?;
        w.write_all(&(n as u16).to_le_bytes())?;
    } else if n <= 0xffff_ffff {
        w.write_all(&[0xfe])?;
        w.write_all(&(n as u32).to_le_bytes())?;
    } else {
        w.write_all(&[0xff])?;
        w.write_all(&n.to_le_bytes())?;
    }
    Ok(())
}

pub fn read_compact_size<R: Read>(r: &mut R) -> Result<u64, CodecError> {
    let tag = u8::decode(r)?;
    let n = match tag {
        0xfd => {
            let mut b = [0u8; 2];
            r.read_exact(&mut b)?;
            let n = u16::from_le_bytes(b) as u64;
            if n < 0xfd {
                return Err(CodecError::NonCanonical);
            }
            n
        }
        0xfe => {
            let mut b = [0u8; 4];
            r.read_exact(&mut b)?;
            let n = u32::from_le_bytes(b) as u64;
            if n <= 0xffff {
                return Err(CodecError::NonCanonical);
            }
            n
        }
        0xff => {
            let mut b = [0u8; 8];
            r.read_exact(&mut b)?;
            let n = u64::from_le_bytes(b);
            if n <= 0xffff_ffff {
                return Err(CodecError::NonCanonical);
            }
            n
        }
        small => small as u64,
    };
    if n > MAX_SIZE {
        return Err(CodecError::Oversized {
            length: n,
            max: MAX_SIZE,
        });
    }
    Ok(n)
}

pub fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<(), CodecError> {
    write_compact_size(w, bytes.len() as u64)?;
    w.write_all(bytes)?;
    Ok(())
}

pub fn read_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>, CodecError> {
    let len = read_compact_size(r)? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(bytes)
}

pub fn write_vec<W: Write, T: Encodable>(w: &mut W, items: &[T]) -> Result<(), CodecError> {
    write_compact_size(w, items.len() as u64)?;
    for item in items {
        item.encode(w)?;
    }
    Ok(())
}

pub fn read_vec<R: Read, T: Decodable>(r: &mut R) -> Result<Vec<T>, CodecError> {
    let len = read_compact_size(r)? as usize;
    // the prefix is attacker controlled, let the vector grow as items arrive
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        items.push(T::decode(r)?);
    }
    Ok(items)
}

impl Encodable for u8 {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        w.write_all(&[*self])?;
        Ok(())
    }
}

impl Decodable for u8 {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        let mut b = [0u8; 1];
        r.read_exact(&mut b)?;
        Ok(b[0])
    }
}

macro_rules! impl_le_int {
    ($($t:ty),*) => {
        $(
            impl Encodable for $t {
                fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
                    w.write_all(&self.to_le_bytes())?;
                    Ok(())
                }
            }

            impl Decodable for $t {
                fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
                    let mut b = [0u8; std::mem::size_of::<$t>()];
                    r.read_exact(&mut b)?;
                    Ok(<$t>::from_le_bytes(b))
                }
            }
        )*
    };
}

impl_le_int!(u32, i32, i64);

impl Encodable for Hash256 {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        w.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl Decodable for Hash256 {
    fn decode<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        let mut b = [0u8; 32];
        r.read_exact(&mut b)?;
        Ok(Hash256(b))
    }
}
