//! Minimal CBOR reader
//!
//! Definite-length unsigned/negative integers, byte strings, text strings,
//! arrays and maps: the subset attestation objects and COSE keys use.

use crate::{Error, Result};

const MAX_DEPTH: usize = 16;

/// Decoded CBOR item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CborValue {
    Unsigned(u64),
    /// Negative integer, already mapped to `-1 - n`
    Negative(i128),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<CborValue>),
    /// Map entries in encoded order
    Map(Vec<(CborValue, CborValue)>),
}

impl CborValue {
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            CborValue::Unsigned(n) => Some(*n as i128),
            CborValue::Negative(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CborValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CborValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(CborValue, CborValue)]> {
        match self {
            CborValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Map lookup by text key
    pub fn get_text_key(&self, key: &str) -> Option<&CborValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Map lookup by integer key (COSE labels)
    pub fn get_int_key(&self, key: i128) -> Option<&CborValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_integer() == Some(key))
            .map(|(_, v)| v)
    }
}

fn fail(reason: impl Into<String>) -> Error {
    Error::AttestationDecodeFailed {
        stage: "cbor",
        reason: reason.into(),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| fail(format!("truncated input at offset {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn argument(&mut self, info: u8) -> Result<u64> {
        match info {
            0..=23 => Ok(info as u64),
            24 => Ok(self.byte()? as u64),
            25 => {
                let b = self.take(2)?;
                Ok(u16::from_be_bytes([b[0], b[1]]) as u64)
            }
            26 => {
                let b = self.take(4)?;
                Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64)
            }
            27 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(self.take(8)?);
                Ok(u64::from_be_bytes(buf))
            }
            31 => Err(fail("indefinite-length items are not supported")),
            _ => Err(fail(format!("reserved additional info {}", info))),
        }
    }

    fn length(&mut self, info: u8) -> Result<usize> {
        let len = self.argument(info)?;
        let remaining = self.bytes.len() - self.pos;
        // Every element takes at least one byte
        if len > remaining as u64 {
            return Err(fail(format!("length {} exceeds remaining {} bytes", len, remaining)));
        }
        Ok(len as usize)
    }

    fn value(&mut self, depth: usize) -> Result<CborValue> {
        if depth > MAX_DEPTH {
            return Err(fail("nesting too deep"));
        }
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        match major {
            0 => Ok(CborValue::Unsigned(self.argument(info)?)),
            1 => Ok(CborValue::Negative(-1 - self.argument(info)? as i128)),
            2 => {
                let len = self.length(info)?;
                Ok(CborValue::Bytes(self.take(len)?.to_vec()))
            }
            3 => {
                let len = self.length(info)?;
                let text = std::str::from_utf8(self.take(len)?)
                    .map_err(|e| fail(format!("invalid UTF-8 text: {}", e)))?;
                Ok(CborValue::Text(text.to_string()))
            }
            4 => {
                let len = self.length(info)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.value(depth + 1)?);
                }
                Ok(CborValue::Array(items))
            }
            5 => {
                let len = self.length(info)?;
                let mut entries = Vec::with_capacity(len);
                for _ in 0..len {
                    let key = self.value(depth + 1)?;
                    let value = self.value(depth + 1)?;
                    entries.push((key, value));
                }
                Ok(CborValue::Map(entries))
            }
            _ => Err(fail(format!("unsupported major type {}", major))),
        }
    }
}

/// Decode one item from the front of `bytes`, returning it and the bytes consumed
pub fn decode_prefix(bytes: &[u8]) -> Result<(CborValue, usize)> {
    let mut reader = Reader { bytes, pos: 0 };
    let value = reader.value(0)?;
    Ok((value, reader.pos))
}

/// Decode exactly one item; trailing bytes are an error
pub fn decode(bytes: &[u8]) -> Result<CborValue> {
    let (value, used) = decode_prefix(bytes)?;
    if used != bytes.len() {
        return Err(fail(format!("{} trailing bytes", bytes.len() - used)));
    }
    Ok(value)
}
