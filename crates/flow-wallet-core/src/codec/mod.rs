//! Canonical signable bytes
//!
//! - [`flow`]: Flow transaction payload/envelope encoding, role resolution,
//!   domain tags and transaction ids
//! - [`evm`]: EVM legacy/EIP-1559 transaction hashing and `personal_sign`

pub mod evm;
pub mod flow;

pub use flow::{ProposalKey, Role, SigEntry, TransactionVoucher};

use alloy_rlp::{BufMut, Encodable, Header};

/// Heterogeneous RLP list assembled item by item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RlpList {
    payload: Vec<u8>,
}

impl RlpList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any RLP-encodable item (integers, byte strings, nested lists)
    pub fn push<T: Encodable + ?Sized>(&mut self, item: &T) -> &mut Self {
        item.encode(&mut self.payload);
        self
    }

    /// Full encoding including the list header
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length());
        self.encode(&mut out);
        out
    }
}

impl Encodable for RlpList {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload.len(),
        }
        .encode(out);
        out.put_slice(&self.payload);
    }

    fn length(&self) -> usize {
        alloy_rlp::length_of_length(self.payload.len()) + self.payload.len()
    }
}
