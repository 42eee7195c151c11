//! Collaborator contracts consumed by the account model
//!
//! Implementations live outside the core: an access-node client for
//! [`ChainQuery`] and [`TransactionStatusSource`], the public key-indexer
//! service for [`KeyIndexer`] (see [`HttpKeyIndexer`](super::HttpKeyIndexer)).

use crate::config::Network;
use crate::types::{AccountKey, Curve, EvmAddress, FlowAddress, HashAlgo, PublicKeyHex};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display metadata of a child account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildAccountMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Read access to Flow chain state
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Addresses of child accounts linked under `parent`
    async fn get_child_addresses(&self, parent: &FlowAddress) -> Result<Vec<FlowAddress>>;

    /// Metadata keyed by child address
    async fn get_child_account_meta(
        &self,
        parent: &FlowAddress,
    ) -> Result<HashMap<FlowAddress, ChildAccountMeta>>;

    /// COA address stored by `parent`, if it has one
    async fn get_coa_address(&self, parent: &FlowAddress) -> Result<Option<EvmAddress>>;

    async fn get_account_keys(&self, address: &FlowAddress) -> Result<Vec<AccountKey>>;
}

/// Account registration reported by the key-indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedAccount {
    pub address: FlowAddress,
    pub key_id: u32,
    pub weight: u32,
    pub curve: Curve,
    pub hash_algo: HashAlgo,
    pub revoked: bool,
}

impl IndexedAccount {
    /// The registration as an account key for `public_key`
    pub fn to_account_key(&self, public_key: &PublicKeyHex) -> AccountKey {
        let key = AccountKey::new(
            self.key_id,
            public_key.clone(),
            self.curve,
            self.hash_algo,
            self.weight,
        );
        if self.revoked { key.revoked() } else { key }
    }
}

/// Reverse lookup from public key to accounts
#[async_trait]
pub trait KeyIndexer: Send + Sync {
    async fn find_accounts_by_public_key(
        &self,
        public_key: &PublicKeyHex,
        network: Network,
    ) -> Result<Vec<IndexedAccount>>;
}

/// Execution status of a submitted Flow transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Unknown,
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

impl TransactionStatus {
    /// No further status change will happen
    pub fn is_final(&self) -> bool {
        matches!(self, TransactionStatus::Sealed | TransactionStatus::Expired)
    }
}

#[async_trait]
pub trait TransactionStatusSource: Send + Sync {
    async fn transaction_status(&self, tx_id: &str) -> Result<TransactionStatus>;
}
