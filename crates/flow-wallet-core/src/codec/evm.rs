//! EVM transaction encoding
//!
//! Legacy (EIP-155) and EIP-1559 transactions: signing hash and signed RLP
//! encoding, plus the EIP-191 `personal_sign` message hash.

use crate::codec::RlpList;
use crate::crypto::ecdsa::Signature;
use crate::crypto::hash::keccak256;
use crate::types::EvmAddress;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Gas limit of a plain value transfer
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// EIP-2718 type byte of dynamic-fee transactions
const EIP1559_TYPE: u8 = 0x02;

/// EIP-2930 access list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListEntry {
    pub address: EvmAddress,
    pub storage_keys: Vec<[u8; 32]>,
}

/// How the sender pays for gas; this also selects the envelope format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasPricing {
    /// Untyped transaction, replay-protected with EIP-155
    Legacy { gas_price: u128 },
    /// Type-2 transaction
    Eip1559 {
        max_priority_fee_per_gas: u128,
        max_fee_per_gas: u128,
        access_list: Vec<AccessListEntry>,
    },
}

/// Unsigned EVM transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    /// `None` deploys a contract
    pub to: Option<EvmAddress>,
    pub value: U256,
    pub data: Vec<u8>,
    pub pricing: GasPricing,
}

impl EvmTransaction {
    /// Legacy transfer skeleton; set the recipient and value with the builders
    pub fn legacy(chain_id: u64, nonce: u64, gas_price: u128) -> Self {
        Self::with_pricing(chain_id, nonce, GasPricing::Legacy { gas_price })
    }

    /// EIP-1559 transfer skeleton with an empty access list
    pub fn eip1559(
        chain_id: u64,
        nonce: u64,
        max_priority_fee_per_gas: u128,
        max_fee_per_gas: u128,
    ) -> Self {
        Self::with_pricing(
            chain_id,
            nonce,
            GasPricing::Eip1559 {
                max_priority_fee_per_gas,
                max_fee_per_gas,
                access_list: Vec::new(),
            },
        )
    }

    fn with_pricing(chain_id: u64, nonce: u64, pricing: GasPricing) -> Self {
        Self {
            chain_id,
            nonce,
            gas_limit: TRANSFER_GAS_LIMIT,
            to: None,
            value: U256::ZERO,
            data: Vec::new(),
            pricing,
        }
    }

    pub fn with_to(mut self, to: EvmAddress) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Add an access list entry. Legacy transactions have no access list
    /// and ignore it.
    pub fn with_access(mut self, entry: AccessListEntry) -> Self {
        if let GasPricing::Eip1559 { access_list, .. } = &mut self.pricing {
            access_list.push(entry);
        }
        self
    }

    /// EIP-2718 type byte, `None` for untyped legacy transactions
    pub fn tx_type(&self) -> Option<u8> {
        match self.pricing {
            GasPricing::Legacy { .. } => None,
            GasPricing::Eip1559 { .. } => Some(EIP1559_TYPE),
        }
    }

    /// Signed-over fields in wire order, without signature or EIP-155 suffix
    fn fields(&self) -> RlpList {
        let mut list = RlpList::new();
        match &self.pricing {
            GasPricing::Legacy { gas_price } => {
                list.push(&self.nonce).push(gas_price).push(&self.gas_limit);
                self.push_call(&mut list);
            }
            GasPricing::Eip1559 {
                max_priority_fee_per_gas,
                max_fee_per_gas,
                access_list,
            } => {
                list.push(&self.chain_id)
                    .push(&self.nonce)
                    .push(max_priority_fee_per_gas)
                    .push(max_fee_per_gas)
                    .push(&self.gas_limit);
                self.push_call(&mut list);
                list.push(&encode_access_list(access_list));
            }
        }
        list
    }

    fn push_call(&self, list: &mut RlpList) {
        match &self.to {
            Some(to) => list.push(&to.as_bytes()[..]),
            None => list.push(&[0u8; 0][..]),
        };
        list.push(&self.value).push(self.data.as_slice());
    }

    /// Digest the sender signs with secp256k1
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut fields = self.fields();
        match self.tx_type() {
            None => {
                fields.push(&self.chain_id).push(&0u8).push(&0u8);
                keccak256(&fields.to_bytes())
            }
            Some(tx_type) => keccak256(&typed(tx_type, &fields)),
        }
    }

    /// Raw signed transaction bytes
    pub fn encode_signed(&self, signature: &Signature) -> Vec<u8> {
        let mut fields = self.fields();
        match self.tx_type() {
            None => {
                fields.push(&signature.eip155_v(self.chain_id));
                push_scalars(&mut fields, signature);
                fields.to_bytes()
            }
            Some(tx_type) => {
                fields.push(&signature.recovery_id);
                push_scalars(&mut fields, signature);
                typed(tx_type, &fields)
            }
        }
    }
}

fn typed(tx_type: u8, fields: &RlpList) -> Vec<u8> {
    let mut out = vec![tx_type];
    out.extend_from_slice(&fields.to_bytes());
    out
}

fn encode_access_list(entries: &[AccessListEntry]) -> RlpList {
    let mut list = RlpList::new();
    for entry in entries {
        let mut keys = RlpList::new();
        for key in &entry.storage_keys {
            keys.push(&key[..]);
        }
        let mut item = RlpList::new();
        item.push(&entry.address.as_bytes()[..]).push(&keys);
        list.push(&item);
    }
    list
}

/// `r` and `s` as RLP integers
fn push_scalars(list: &mut RlpList, signature: &Signature) {
    list.push(strip_leading_zeros(&signature.r))
        .push(strip_leading_zeros(&signature.s));
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Signed transaction ready for `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvmTransaction {
    /// `0x`-prefixed raw transaction hex
    pub raw: String,
    /// `0x`-prefixed transaction hash
    pub hash: String,
}

impl SignedEvmTransaction {
    pub fn from_raw(raw: &[u8]) -> Self {
        Self {
            raw: format!("0x{}", hex::encode(raw)),
            hash: format!("0x{}", hex::encode(keccak256(raw))),
        }
    }
}

/// EIP-191 hash: `keccak256("\x19Ethereum Signed Message:\n" ‖ len ‖ message)`
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    keccak256(&data)
}

/// 65-byte `r‖s‖v` form (v = 27/28) used by `personal_sign`
pub fn personal_signature_bytes(signature: &Signature) -> [u8; 65] {
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = signature.v();
    out
}
