//! Account model
//!
//! Flow accounts own a [`KeySlot`](crate::key::KeySlot), match it against
//! their on-chain keys and sign; linked COA and child accounts are
//! discovered through the [`ChainQuery`] collaborator. EVM accounts sign
//! EVM transactions with the secp256k1 key at the EVM path.

pub mod discovery;
pub mod evm;
pub mod flow;
#[cfg(feature = "http")]
pub mod indexer_http;
pub mod linked;
pub mod poll;
pub mod query;

pub use discovery::{
    DiscoveredAccount, Discovery, PasskeyDiscovery, discover_accounts, discover_passkey_accounts,
};
pub use evm::EvmAccount;
pub use flow::{FlowAccount, create_coa_script};
#[cfg(feature = "http")]
pub use indexer_http::HttpKeyIndexer;
pub use linked::{COAHandle, ChildAccountRef, LinkState, LinkedAccounts, load_linked_accounts};
pub use poll::{CancelToken, wait_for_seal};
pub use query::{
    ChainQuery, ChildAccountMeta, IndexedAccount, KeyIndexer, TransactionStatus,
    TransactionStatusSource,
};
