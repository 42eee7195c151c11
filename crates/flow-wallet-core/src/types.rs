//! Core types shared across the wallet
//!
//! Curves and hash algorithms with their Flow code points, Flow and EVM
//! address types, normalized public keys, on-chain account keys and the
//! composite signature artifact handed back to callers.

use crate::crypto::hash::keccak256;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weight at which a single account key can authorize alone
pub const FULL_WEIGHT: u32 = 1000;

/// Signature curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    /// NIST P-256 (secp256r1)
    #[serde(rename = "ECDSA_P256")]
    P256,
    /// secp256k1
    #[serde(rename = "ECDSA_secp256k1")]
    Secp256k1,
}

impl Curve {
    /// Curves in key-matching order
    pub const ALL: [Curve; 2] = [Curve::P256, Curve::Secp256k1];

    /// Flow `signAlgo` code point
    pub fn flow_code(&self) -> u32 {
        match self {
            Curve::P256 => 2,
            Curve::Secp256k1 => 3,
        }
    }

    /// Parse a Flow `signAlgo` code point
    pub fn from_flow_code(code: u32) -> Result<Self> {
        match code {
            2 => Ok(Curve::P256),
            3 => Ok(Curve::Secp256k1),
            _ => Err(Error::UnknownAlgorithmCode {
                kind: "signature algorithm",
                code,
            }),
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Curve::P256 => write!(f, "P-256"),
            Curve::Secp256k1 => write!(f, "secp256k1"),
        }
    }
}

/// Message hash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgo {
    #[serde(rename = "SHA2_256")]
    Sha2_256,
    #[serde(rename = "SHA3_256")]
    Sha3_256,
    /// EVM-only; never a Flow account key hash
    #[serde(rename = "KECCAK_256")]
    Keccak256,
}

impl HashAlgo {
    /// Flow `hashAlgo` code point (Keccak has none)
    pub fn flow_code(&self) -> Option<u32> {
        match self {
            HashAlgo::Sha2_256 => Some(1),
            HashAlgo::Sha3_256 => Some(3),
            HashAlgo::Keccak256 => None,
        }
    }

    /// Parse a Flow `hashAlgo` code point
    pub fn from_flow_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(HashAlgo::Sha2_256),
            3 => Ok(HashAlgo::Sha3_256),
            _ => Err(Error::UnknownAlgorithmCode {
                kind: "hash algorithm",
                code,
            }),
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgo::Sha2_256 => write!(f, "SHA2-256"),
            HashAlgo::Sha3_256 => write!(f, "SHA3-256"),
            HashAlgo::Keccak256 => write!(f, "Keccak-256"),
        }
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Flow account address (8 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlowAddress([u8; 8]);

impl FlowAddress {
    pub const LEN: usize = 8;

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl FromStr for FlowAddress {
    type Err = Error;

    /// Accepts optional `0x` and short forms, left-padding to 8 bytes
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress {
            kind: "flow",
            value: s.to_string(),
        };
        let hex_part = strip_hex_prefix(s.trim());
        if hex_part.is_empty() || hex_part.len() > 16 {
            return Err(invalid());
        }
        let padded = format!("{:0>16}", hex_part);
        let bytes = hex::decode(padded).map_err(|_| invalid())?;
        let mut out = [0u8; 8];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl TryFrom<String> for FlowAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FlowAddress> for String {
    fn from(address: FlowAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for FlowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for FlowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowAddress({})", self)
    }
}

/// EVM account address (20 bytes), always rendered with `0x`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvmAddress([u8; 20]);

impl EvmAddress {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the address of an uncompressed secp256k1 public key (X‖Y)
    pub fn from_public_key(public_key: &PublicKeyHex) -> Self {
        let hash = keccak256(&public_key.to_bytes());
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Self(out)
    }

    /// EIP-55 mixed-case checksum form
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for EvmAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress {
            kind: "evm",
            value: s.to_string(),
        };
        let hex_part = strip_hex_prefix(s.trim());
        if hex_part.len() != 40 {
            return Err(invalid());
        }
        let bytes = hex::decode(hex_part).map_err(|_| invalid())?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl TryFrom<String> for EvmAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EvmAddress> for String {
    fn from(address: EvmAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({})", self)
    }
}

/// Uncompressed public key as 128 lowercase hex chars (X‖Y, no `04`)
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKeyHex(String);

impl PublicKeyHex {
    /// Normalized length in hex characters
    pub const HEX_LEN: usize = 128;

    /// Normalize `0x`/`04` prefixed or mixed-case input
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidInput(format!("public key {}: {}", input, reason));

        let mut hex_part = strip_hex_prefix(input.trim());
        if hex_part.len() == Self::HEX_LEN + 2 {
            hex_part = hex_part
                .strip_prefix("04")
                .ok_or_else(|| invalid("130-char key must start with 04"))?;
        }
        if hex_part.len() != Self::HEX_LEN {
            return Err(invalid("expected 128 hex characters"));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("non-hex character"));
        }
        Ok(Self(hex_part.to_ascii_lowercase()))
    }

    /// Build from raw X‖Y bytes (64) or SEC1 uncompressed bytes (65)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let xy = match bytes.len() {
            64 => bytes,
            65 if bytes[0] == 0x04 => &bytes[1..],
            n => {
                return Err(Error::InvalidInput(format!(
                    "public key must be 64 or 65 bytes, got {}",
                    n
                )));
            }
        };
        Ok(Self(hex::encode(xy)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// X‖Y bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        // Validated on construction
        hex::decode(&self.0).unwrap_or_default()
    }

    /// SEC1 uncompressed encoding (`04`‖X‖Y)
    pub fn to_sec1(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(65);
        out.push(0x04);
        out.extend_from_slice(&self.to_bytes());
        out
    }
}

impl TryFrom<String> for PublicKeyHex {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PublicKeyHex> for String {
    fn from(key: PublicKeyHex) -> Self {
        key.0
    }
}

impl fmt::Display for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyHex({}…)", &self.0[..16.min(self.0.len())])
    }
}

/// Key registered on a Flow account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKey {
    /// Key index on the account
    pub index: u32,
    /// Normalized public key
    pub public_key: PublicKeyHex,
    /// Signature curve
    #[serde(rename = "signAlgo")]
    pub curve: Curve,
    /// Hash algorithm the key signs with
    pub hash_algo: HashAlgo,
    /// Key weight (0..=1000 on Flow)
    pub weight: u32,
    /// Whether the key was revoked
    pub revoked: bool,
    /// Proposal sequence number, when the source reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
}

impl AccountKey {
    pub fn new(
        index: u32,
        public_key: PublicKeyHex,
        curve: Curve,
        hash_algo: HashAlgo,
        weight: u32,
    ) -> Self {
        Self {
            index,
            public_key,
            curve,
            hash_algo,
            weight,
            revoked: false,
            sequence_number: None,
        }
    }

    pub fn revoked(mut self) -> Self {
        self.revoked = true;
        self
    }

    pub fn with_sequence_number(mut self, sequence_number: u64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    /// Usable on its own to authorize: weight ≥ 1000 and not revoked
    pub fn is_full_weight(&self) -> bool {
        self.weight >= FULL_WEIGHT && !self.revoked
    }
}

/// Signature artifact produced for a Flow signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSignature {
    pub address: FlowAddress,
    pub key_id: u32,
    /// Hex-encoded `r‖s` signature
    pub signature: String,
    /// Hex-encoded extension data (passkey signatures)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_data: Option<String>,
}

impl CompositeSignature {
    pub fn new(address: FlowAddress, key_id: u32, signature: &[u8]) -> Self {
        Self {
            address,
            key_id,
            signature: hex::encode(signature),
            extension_data: None,
        }
    }

    pub fn with_extension_data(mut self, data: &[u8]) -> Self {
        self.extension_data = Some(hex::encode(data));
        self
    }
}
