//! EVM externally owned account

use crate::codec::evm::{
    EvmTransaction, SignedEvmTransaction, personal_message_hash, personal_signature_bytes,
};
use crate::crypto::CryptoContext;
use crate::crypto::hd::EVM_DEFAULT_PATH;
use crate::key::{KeySlot, KeyType};
use crate::types::{Curve, EvmAddress};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{info, instrument};

/// secp256k1 account derived at the EVM path of the held key
#[derive(Debug, Clone)]
pub struct EvmAccount {
    address: EvmAddress,
    slot: Arc<KeySlot>,
    derivation_path: Option<String>,
}

impl EvmAccount {
    /// Seed phrases derive at `derivation_path` (default `m/44'/60'/0'/0/0`);
    /// raw secp256k1 keys are used as is.
    pub fn from_slot(
        ctx: &CryptoContext,
        slot: Arc<KeySlot>,
        derivation_path: Option<&str>,
    ) -> Result<Self> {
        let derivation_path = match slot.key_type() {
            Some(KeyType::SeedPhrase) => Some(derivation_path.unwrap_or(EVM_DEFAULT_PATH).to_string()),
            _ => None,
        };
        let public_key = slot
            .public_key(ctx, Curve::Secp256k1, derivation_path.as_deref())?
            .ok_or(Error::UnsupportedCurve {
                curve: Curve::Secp256k1,
                operation: "evm_account",
            })?;
        Ok(Self {
            address: EvmAddress::from_public_key(&public_key),
            slot,
            derivation_path,
        })
    }

    pub fn address(&self) -> EvmAddress {
        self.address
    }

    #[instrument(skip(self, ctx, tx), fields(address = %self.address, chain_id = tx.chain_id))]
    pub fn sign_transaction(
        &self,
        ctx: &CryptoContext,
        tx: &EvmTransaction,
    ) -> Result<SignedEvmTransaction> {
        let signature = self.slot.sign_digest(
            ctx,
            &tx.signing_hash(),
            Curve::Secp256k1,
            self.derivation_path.as_deref(),
        )?;
        let signed = SignedEvmTransaction::from_raw(&tx.encode_signed(&signature));
        info!(hash = %signed.hash, "EVM transaction signed");
        Ok(signed)
    }

    /// EIP-191 `personal_sign`: 65-byte `r‖s‖v`
    pub fn sign_personal_message(&self, ctx: &CryptoContext, message: &[u8]) -> Result<[u8; 65]> {
        let signature = self.slot.sign_digest(
            ctx,
            &personal_message_hash(message),
            Curve::Secp256k1,
            self.derivation_path.as_deref(),
        )?;
        Ok(personal_signature_bytes(&signature))
    }
}
