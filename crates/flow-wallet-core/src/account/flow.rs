//! Flow account: key matching and signing

use super::linked::{self, LinkState, LinkedAccounts};
use super::query::ChainQuery;
use crate::codec::flow::{self as flow_codec, Role, TransactionVoucher};
use crate::config::Network;
use crate::crypto::CryptoContext;
use crate::key::{KeySlot, KeyType};
use crate::passkey::PasskeySigner;
use crate::types::{AccountKey, CompositeSignature, Curve, FlowAddress, HashAlgo};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const CREATE_COA_SCRIPT: &str = r#"import EVM from 0xEVM_ADDRESS

transaction() {
    prepare(signer: auth(SaveValue, IssueStorageCapabilityController, PublishCapability) &Account) {
        let coa <- EVM.createCadenceOwnedAccount()
        signer.storage.save(<-coa, to: /storage/evm)
        let cap = signer.capabilities.storage.issue<&EVM.CadenceOwnedAccount>(/storage/evm)
        signer.capabilities.publish(cap, at: /public/evm)
    }
}
"#;

/// Cadence script creating a COA on `network`
pub fn create_coa_script(network: Network) -> String {
    CREATE_COA_SCRIPT.replace(
        "0xEVM_ADDRESS",
        &network.evm_contract_address().to_string(),
    )
}

/// A Flow account and, when not watch-only, the key slot that signs for it
#[derive(Debug)]
pub struct FlowAccount {
    address: FlowAddress,
    network: Network,
    keys: Vec<AccountKey>,
    slot: Option<Arc<KeySlot>>,
    link_state: RwLock<LinkState>,
}

impl FlowAccount {
    pub fn new(address: FlowAddress, network: Network, keys: Vec<AccountKey>) -> Self {
        Self {
            address,
            network,
            keys,
            slot: None,
            link_state: RwLock::new(LinkState::Unloaded),
        }
    }

    pub fn with_slot(mut self, slot: Arc<KeySlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Fetch the account's keys from chain
    pub async fn fetch(
        query: &dyn ChainQuery,
        address: FlowAddress,
        network: Network,
    ) -> Result<Self> {
        let keys = query.get_account_keys(&address).await?;
        Ok(Self::new(address, network, keys))
    }

    pub fn address(&self) -> FlowAddress {
        self.address
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn keys(&self) -> &[AccountKey] {
        &self.keys
    }

    /// Replace cached keys after a revocation or weight change
    pub fn set_keys(&mut self, keys: Vec<AccountKey>) {
        self.keys = keys;
    }

    pub fn slot(&self) -> Option<&Arc<KeySlot>> {
        self.slot.as_ref()
    }

    pub fn is_watch_only(&self) -> bool {
        self.slot.as_ref().is_none_or(|slot| !slot.is_unlocked())
    }

    /// Full-weight account keys matching the held key, P-256 matches first
    pub fn find_signing_keys(&self, ctx: &CryptoContext) -> Result<Vec<AccountKey>> {
        let Some(slot) = &self.slot else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();
        for curve in Curve::ALL {
            let Some(public_key) = slot.public_key(ctx, curve, None)? else {
                continue;
            };
            matches.extend(
                self.keys
                    .iter()
                    .filter(|key| {
                        key.is_full_weight() && key.curve == curve && key.public_key == public_key
                    })
                    .cloned(),
            );
        }
        debug!(address = %self.address, matches = matches.len(), "Matched signing keys");
        Ok(matches)
    }

    /// First matching key, or the one at `key_id` when given
    ///
    /// No match at all is `WatchOnlySign`. A `key_id` outside the matches,
    /// while other keys do match, is `NoMatchingKey`.
    pub fn signing_key(&self, ctx: &CryptoContext, key_id: Option<u32>) -> Result<AccountKey> {
        let watch_only = || Error::WatchOnlySign {
            address: self.address.to_string(),
        };
        if self.slot.is_none() {
            return Err(watch_only());
        }
        let matches = self.find_signing_keys(ctx)?;
        let Some(first) = matches.first() else {
            return Err(watch_only());
        };
        match key_id {
            None => Ok(first.clone()),
            Some(index) => matches
                .iter()
                .find(|key| key.index == index)
                .cloned()
                .ok_or(Error::NoMatchingKey {
                    address: self.address.to_string(),
                    key_id: index,
                }),
        }
    }

    fn sign_bytes(&self, ctx: &CryptoContext, key: &AccountKey, bytes: &[u8]) -> Result<CompositeSignature> {
        let slot = self.slot.as_ref().ok_or(Error::WatchOnlySign {
            address: self.address.to_string(),
        })?;
        check_flow_hash(key.hash_algo)?;
        let signature = slot.sign(ctx, bytes, key.curve, key.hash_algo, None)?;
        Ok(CompositeSignature::new(self.address, key.index, &signature.to_bytes()))
    }

    /// Sign an arbitrary message under the user domain tag
    #[instrument(skip(self, ctx, message), fields(address = %self.address))]
    pub fn sign_message(&self, ctx: &CryptoContext, message: &[u8]) -> Result<CompositeSignature> {
        let key = self.signing_key(ctx, None)?;
        let signature = self.sign_bytes(ctx, &key, &flow_codec::user_message_bytes(message))?;
        info!(key_id = key.index, "Message signed");
        Ok(signature)
    }

    /// Sign the payload or envelope of `voucher`, whichever this account owes
    #[instrument(skip(self, ctx, voucher), fields(address = %self.address))]
    pub fn sign_transaction(
        &self,
        ctx: &CryptoContext,
        voucher: &TransactionVoucher,
    ) -> Result<CompositeSignature> {
        let key = self.signing_key(ctx, None)?;
        let bytes = flow_codec::encode(voucher, &self.address)?;
        let signature = self.sign_bytes(ctx, &key, &bytes)?;
        info!(key_id = key.index, "Transaction signed");
        Ok(signature)
    }

    /// Sign and record the signature in the voucher under this account's role
    pub fn authorize(&self, ctx: &CryptoContext, voucher: &mut TransactionVoucher) -> Result<Role> {
        let role = flow_codec::role(voucher, &self.address)?;
        let signature = self.sign_transaction(ctx, voucher)?;
        voucher.add_signature(role, signature);
        Ok(role)
    }

    /// [`sign_transaction`](Self::sign_transaction) for passkey-held accounts
    #[instrument(skip(self, ctx, signer, voucher), fields(address = %self.address))]
    pub async fn sign_transaction_with_passkey(
        &self,
        ctx: &CryptoContext,
        signer: &PasskeySigner,
        voucher: &TransactionVoucher,
    ) -> Result<CompositeSignature> {
        let bytes = flow_codec::encode(voucher, &self.address)?;
        self.sign_with_passkey(ctx, signer, &bytes).await
    }

    async fn sign_with_passkey(
        &self,
        ctx: &CryptoContext,
        signer: &PasskeySigner,
        bytes: &[u8],
    ) -> Result<CompositeSignature> {
        let key = self.signing_key(ctx, None)?;
        let slot = self.slot.as_ref().ok_or(Error::WatchOnlySign {
            address: self.address.to_string(),
        })?;
        check_flow_hash(key.hash_algo)?;
        let signed = signer.sign(ctx, slot, bytes, key.hash_algo).await?;
        info!(key_id = key.index, consistency = ?signed.consistency, "Transaction signed with passkey");
        Ok(signed.to_composite(self.address, key.index))
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.link_state.read().is_loading()
    }

    /// Discover the COA and child accounts, moving through `Loading` to `Loaded`
    ///
    /// Dropping the future mid-load puts back the state it started from.
    pub async fn load_linked_accounts(&self, query: &dyn ChainQuery) -> LinkedAccounts {
        let previous = std::mem::replace(&mut *self.link_state.write(), LinkState::Loading);
        let mut restore = RestoreOnDrop {
            state: &self.link_state,
            previous: Some(previous),
        };
        let linked =
            linked::load_linked_accounts(query, &self.address, self.network.evm_chain_id()).await;
        restore.previous = None;
        *self.link_state.write() = LinkState::Loaded(linked.clone());
        linked
    }

    fn coa_voucher(&self, ctx: &CryptoContext, ref_block_id: &str) -> Result<(TransactionVoucher, AccountKey)> {
        let key = match self.signing_key(ctx, None) {
            Ok(key) => key,
            Err(Error::WatchOnlySign { .. }) => {
                return Err(Error::CannotCreateWatchOnly {
                    address: self.address.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        let sequence_num = key.sequence_number.ok_or(Error::MalformedVoucher {
            field: "proposalKey",
        })?;

        let voucher = TransactionVoucher::new(create_coa_script(self.network))
            .with_ref_block(ref_block_id)
            .with_proposal_key(self.address, key.index, sequence_num)
            .with_payer(self.address)
            .with_authorizer(self.address);
        Ok((voucher, key))
    }

    /// Build and sign the COA creation transaction
    ///
    /// The account proposes, pays and authorizes, so it signs the envelope.
    /// Submission is left to the caller.
    #[instrument(skip(self, ctx), fields(address = %self.address))]
    pub fn create_coa(&self, ctx: &CryptoContext, ref_block_id: &str) -> Result<TransactionVoucher> {
        if self.slot.as_ref().and_then(|slot| slot.key_type()) == Some(KeyType::Passkey) {
            return Err(Error::KeyNotInitialized {
                operation: "create_coa (use create_coa_with_passkey)",
            });
        }
        let (mut voucher, key) = self.coa_voucher(ctx, ref_block_id)?;
        let signature = self.sign_bytes(ctx, &key, &flow_codec::envelope_bytes(&voucher)?)?;
        voucher.add_signature(Role::Envelope, signature);
        info!("COA creation transaction signed");
        Ok(voucher)
    }

    pub async fn create_coa_with_passkey(
        &self,
        ctx: &CryptoContext,
        signer: &PasskeySigner,
        ref_block_id: &str,
    ) -> Result<TransactionVoucher> {
        let (mut voucher, _) = self.coa_voucher(ctx, ref_block_id)?;
        let signature = self
            .sign_with_passkey(ctx, signer, &flow_codec::envelope_bytes(&voucher)?)
            .await?;
        voucher.add_signature(Role::Envelope, signature);
        Ok(voucher)
    }
}

/// Flow signatures carry a Flow `hashAlgo`; Keccak-256 has none
fn check_flow_hash(hash: HashAlgo) -> Result<()> {
    match hash.flow_code() {
        Some(_) => Ok(()),
        None => Err(Error::UnsupportedHash {
            hash,
            operation: "flow_sign",
        }),
    }
}

/// Link state to put back if a load is abandoned
struct RestoreOnDrop<'a> {
    state: &'a RwLock<LinkState>,
    previous: Option<LinkState>,
}

impl Drop for RestoreOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.state.write() = previous;
        }
    }
}
