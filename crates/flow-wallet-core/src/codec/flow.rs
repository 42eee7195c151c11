//! Flow transaction encoding
//!
//! Signable bytes are a 32-byte domain tag followed by an RLP list:
//!
//! ```text
//! payload  = tag ‖ RLP([script, args, refBlock, computeLimit,
//!                       proposer, proposerKeyId, proposerSeq,
//!                       payer, authorizers])
//! envelope = tag ‖ RLP([payloadFields, payloadSigs])
//! ```
//!
//! Payload signatures are `[signerIndex, keyId, sig, ext?]` sorted by
//! `(signerIndex, keyId)`, where signer indices come from scanning the
//! proposer, the payer and then the authorizers in order.

use super::RlpList;
use crate::crypto::CryptoContext;
use crate::types::{CompositeSignature, FlowAddress, HashAlgo};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Domain tag for transaction payloads and envelopes
pub const TRANSACTION_DOMAIN_TAG: &str = "FLOW-V0.0-transaction";

/// Domain tag for arbitrary user messages
pub const USER_DOMAIN_TAG: &str = "FLOW-V0.0-user";

/// Default computation limit for wallet-built transactions
pub const DEFAULT_COMPUTE_LIMIT: u64 = 9999;

/// ASCII tag right-padded with zeros to 32 bytes
pub fn domain_tag(tag: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = tag.as_bytes();
    let len = bytes.len().min(32);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Which part of the transaction a signer signs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Payload,
    Envelope,
}

/// Proposal key of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalKey {
    pub address: FlowAddress,
    pub key_id: u32,
    pub sequence_num: u64,
}

/// Signature recorded on a voucher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigEntry {
    pub address: FlowAddress,
    pub key_id: u32,
    /// Hex signature
    pub sig: String,
    /// Hex extension data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_data: Option<String>,
}

impl From<CompositeSignature> for SigEntry {
    fn from(signature: CompositeSignature) -> Self {
        Self {
            address: signature.address,
            key_id: signature.key_id,
            sig: signature.signature,
            extension_data: signature.extension_data,
        }
    }
}

/// Transaction as handed to signers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionVoucher {
    pub cadence: String,
    /// JSON-Cadence arguments (`{"type": .., "value": ..}`)
    pub arguments: Vec<serde_json::Value>,
    /// Reference block id, hex
    #[serde(alias = "refBlock")]
    pub ref_block_id: Option<String>,
    pub compute_limit: u64,
    pub proposal_key: Option<ProposalKey>,
    pub payer: Option<FlowAddress>,
    pub authorizers: Vec<FlowAddress>,
    pub payload_sigs: Vec<SigEntry>,
    pub envelope_sigs: Vec<SigEntry>,
}

/// Voucher fields after the required ones were checked
struct Resolved<'a> {
    ref_block: [u8; 32],
    proposal_key: &'a ProposalKey,
    payer: &'a FlowAddress,
}

impl TransactionVoucher {
    pub fn new(cadence: impl Into<String>) -> Self {
        Self {
            cadence: cadence.into(),
            compute_limit: DEFAULT_COMPUTE_LIMIT,
            ..Self::default()
        }
    }

    pub fn with_argument(mut self, argument: serde_json::Value) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_ref_block(mut self, ref_block_id: impl Into<String>) -> Self {
        self.ref_block_id = Some(ref_block_id.into());
        self
    }

    pub fn with_compute_limit(mut self, compute_limit: u64) -> Self {
        self.compute_limit = compute_limit;
        self
    }

    pub fn with_proposal_key(mut self, address: FlowAddress, key_id: u32, sequence_num: u64) -> Self {
        self.proposal_key = Some(ProposalKey {
            address,
            key_id,
            sequence_num,
        });
        self
    }

    pub fn with_payer(mut self, payer: FlowAddress) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn with_authorizer(mut self, authorizer: FlowAddress) -> Self {
        self.authorizers.push(authorizer);
        self
    }

    /// Record a signature under `role`
    pub fn add_signature(&mut self, role: Role, signature: CompositeSignature) {
        match role {
            Role::Payload => self.payload_sigs.push(signature.into()),
            Role::Envelope => self.envelope_sigs.push(signature.into()),
        }
    }

    fn resolve(&self) -> Result<Resolved<'_>> {
        let proposal_key = self.proposal_key.as_ref().ok_or(Error::MalformedVoucher {
            field: "proposalKey",
        })?;
        let payer = self
            .payer
            .as_ref()
            .ok_or(Error::MalformedVoucher { field: "payer" })?;
        let ref_block = self
            .ref_block_id
            .as_deref()
            .and_then(parse_ref_block)
            .ok_or(Error::MalformedVoucher { field: "refBlockId" })?;
        Ok(Resolved {
            ref_block,
            proposal_key,
            payer,
        })
    }
}

/// Hex block id left-padded to 32 bytes
fn parse_ref_block(id: &str) -> Option<[u8; 32]> {
    let trimmed = id.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_part.is_empty() || hex_part.len() > 64 {
        return None;
    }
    let padded = format!("{:0>64}", hex_part);
    let bytes = hex::decode(padded).ok()?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

fn encode_argument(argument: &serde_json::Value) -> Result<Vec<u8>> {
    let has_type = argument
        .as_object()
        .and_then(|object| object.get("type"))
        .is_some_and(serde_json::Value::is_string);
    if !has_type {
        return Err(Error::EncodingFailure {
            field: "arguments",
            reason: format!("not a JSON-Cadence value: {}", argument),
        });
    }
    serde_json::to_vec(argument).map_err(|e| Error::EncodingFailure {
        field: "arguments",
        reason: e.to_string(),
    })
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|e| Error::EncodingFailure {
        field,
        reason: e.to_string(),
    })
}

fn payload_list(voucher: &TransactionVoucher) -> Result<RlpList> {
    let resolved = voucher.resolve()?;

    let mut arguments = RlpList::new();
    for argument in &voucher.arguments {
        arguments.push(encode_argument(argument)?.as_slice());
    }

    let mut authorizers = RlpList::new();
    for authorizer in &voucher.authorizers {
        authorizers.push(authorizer.as_bytes().as_slice());
    }

    let mut list = RlpList::new();
    list.push(voucher.cadence.as_bytes())
        .push(&arguments)
        .push(resolved.ref_block.as_slice())
        .push(&voucher.compute_limit)
        .push(resolved.proposal_key.address.as_bytes().as_slice())
        .push(&resolved.proposal_key.key_id)
        .push(&resolved.proposal_key.sequence_num)
        .push(resolved.payer.as_bytes().as_slice())
        .push(&authorizers);
    Ok(list)
}

fn signature_list(
    field: &'static str,
    entries: &[SigEntry],
    signers: &HashMap<FlowAddress, usize>,
) -> Result<RlpList> {
    let mut indexed = Vec::with_capacity(entries.len());
    for entry in entries {
        let index = *signers
            .get(&entry.address)
            .ok_or(Error::MalformedVoucher { field })?;
        indexed.push((index, entry));
    }
    indexed.sort_by_key(|(index, entry)| (*index, entry.key_id));

    let mut list = RlpList::new();
    for (index, entry) in indexed {
        let mut item = RlpList::new();
        item.push(&(index as u64))
            .push(&entry.key_id)
            .push(decode_hex(field, &entry.sig)?.as_slice());
        if let Some(extension) = &entry.extension_data {
            item.push(decode_hex(field, extension)?.as_slice());
        }
        list.push(&item);
    }
    Ok(list)
}

fn tagged(tag: &str, list: &RlpList) -> Vec<u8> {
    let mut out = domain_tag(tag).to_vec();
    out.extend_from_slice(&list.to_bytes());
    out
}

/// Signer index per address: proposer, payer, then authorizers, first seen wins
pub fn signer_index_map(voucher: &TransactionVoucher) -> Result<HashMap<FlowAddress, usize>> {
    let resolved = voucher.resolve()?;
    let mut signers = HashMap::new();
    let order = [&resolved.proposal_key.address, resolved.payer]
        .into_iter()
        .chain(voucher.authorizers.iter());
    for address in order {
        let next = signers.len();
        signers.entry(*address).or_insert(next);
    }
    Ok(signers)
}

/// Role of `signer`: payload when it authorizes or proposes without paying
pub fn role(voucher: &TransactionVoucher, signer: &FlowAddress) -> Result<Role> {
    let resolved = voucher.resolve()?;
    let in_payload_set = signer != resolved.payer
        && (voucher.authorizers.contains(signer) || *signer == resolved.proposal_key.address);
    Ok(if in_payload_set {
        Role::Payload
    } else {
        Role::Envelope
    })
}

/// Tagged payload bytes
pub fn payload_bytes(voucher: &TransactionVoucher) -> Result<Vec<u8>> {
    Ok(tagged(TRANSACTION_DOMAIN_TAG, &payload_list(voucher)?))
}

/// Tagged envelope bytes (payload plus the voucher's payload signatures)
pub fn envelope_bytes(voucher: &TransactionVoucher) -> Result<Vec<u8>> {
    let signers = signer_index_map(voucher)?;
    let mut list = RlpList::new();
    list.push(&payload_list(voucher)?).push(&signature_list(
        "payloadSigs",
        &voucher.payload_sigs,
        &signers,
    )?);
    Ok(tagged(TRANSACTION_DOMAIN_TAG, &list))
}

/// Bytes `signer` must sign for this voucher
pub fn encode(voucher: &TransactionVoucher, signer: &FlowAddress) -> Result<Vec<u8>> {
    match role(voucher, signer)? {
        Role::Payload => payload_bytes(voucher),
        Role::Envelope => envelope_bytes(voucher),
    }
}

/// Tagged bytes for signing an arbitrary user message
pub fn user_message_bytes(message: &[u8]) -> Vec<u8> {
    let mut out = domain_tag(USER_DOMAIN_TAG).to_vec();
    out.extend_from_slice(message);
    out
}

/// Transaction id: SHA3-256 of `RLP([payload, payloadSigs, envelopeSigs])`
pub fn transaction_id(ctx: &CryptoContext, voucher: &TransactionVoucher) -> Result<[u8; 32]> {
    let signers = signer_index_map(voucher)?;
    let mut list = RlpList::new();
    list.push(&payload_list(voucher)?)
        .push(&signature_list("payloadSigs", &voucher.payload_sigs, &signers)?)
        .push(&signature_list("envelopeSigs", &voucher.envelope_sigs, &signers)?);
    Ok(ctx.hash(&list.to_bytes(), HashAlgo::Sha3_256))
}
