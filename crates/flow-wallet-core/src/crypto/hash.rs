//! Message digests

use crate::types::HashAlgo;
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use tiny_keccak::{Hasher, Keccak};

/// SHA2-256 digest
pub fn sha2_256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA3-256 digest (FIPS 202)
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    Sha3_256::digest(data).into()
}

/// Keccak-256 digest (pre-FIPS padding, as used by EVM)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// Hash `data` with `algo`
pub fn digest(data: &[u8], algo: HashAlgo) -> [u8; 32] {
    match algo {
        HashAlgo::Sha2_256 => sha2_256(data),
        HashAlgo::Sha3_256 => sha3_256(data),
        HashAlgo::Keccak256 => keccak256(data),
    }
}
