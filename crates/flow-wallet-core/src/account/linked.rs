//! COA and child accounts linked to a Flow account

use super::query::{ChainQuery, ChildAccountMeta};
use crate::types::{EvmAddress, FlowAddress};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Cadence-owned EVM account
///
/// The parent is held by address, never by reference to its account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct COAHandle {
    pub evm_address: EvmAddress,
    pub chain_id: u64,
    pub parent: FlowAddress,
}

/// Child account under hybrid custody
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildAccountRef {
    pub address: FlowAddress,
    pub parent_address: FlowAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ChildAccountRef {
    fn new(address: FlowAddress, parent: FlowAddress, meta: Option<ChildAccountMeta>) -> Self {
        let meta = meta.unwrap_or_default();
        Self {
            address,
            parent_address: parent,
            name: meta.name,
            description: meta.description,
            icon: meta.thumbnail_url,
        }
    }
}

/// Result of linked-account discovery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccounts {
    pub coa: Option<COAHandle>,
    pub children: Vec<ChildAccountRef>,
    /// A lookup failed and the fields above are incomplete
    pub partial: bool,
}

/// Discovery state of one account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Unloaded,
    Loading,
    Loaded(LinkedAccounts),
}

impl LinkState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LinkState::Loading)
    }

    pub fn linked(&self) -> Option<&LinkedAccounts> {
        match self {
            LinkState::Loaded(linked) => Some(linked),
            _ => None,
        }
    }
}

async fn load_children(query: &dyn ChainQuery, parent: &FlowAddress) -> (Vec<ChildAccountRef>, bool) {
    let (addresses, meta) = tokio::join!(
        query.get_child_addresses(parent),
        query.get_child_account_meta(parent)
    );

    let addresses = match addresses {
        Ok(addresses) => addresses,
        Err(e) => {
            warn!(%parent, error = %e, "Child account lookup failed");
            return (Vec::new(), true);
        }
    };
    let (mut meta, partial) = match meta {
        Ok(meta) => (meta, false),
        Err(e) => {
            warn!(%parent, error = %e, "Child account metadata lookup failed");
            (Default::default(), true)
        }
    };

    let children = addresses
        .into_iter()
        .map(|address| {
            let entry = meta.remove(&address);
            ChildAccountRef::new(address, *parent, entry)
        })
        .collect();
    (children, partial)
}

/// Look up the COA and the child accounts of `parent` concurrently
///
/// Each branch fails on its own; a failed branch leaves its field empty
/// and sets `partial`.
#[instrument(skip(query))]
pub async fn load_linked_accounts(
    query: &dyn ChainQuery,
    parent: &FlowAddress,
    evm_chain_id: u64,
) -> LinkedAccounts {
    let (coa, (children, children_partial)) =
        tokio::join!(query.get_coa_address(parent), load_children(query, parent));

    let (coa, coa_partial) = match coa {
        Ok(address) => (
            address.map(|evm_address| COAHandle {
                evm_address,
                chain_id: evm_chain_id,
                parent: *parent,
            }),
            false,
        ),
        Err(e) => {
            warn!(%parent, error = %e, "COA lookup failed");
            (None, true)
        }
    };

    let linked = LinkedAccounts {
        coa,
        children,
        partial: coa_partial || children_partial,
    };
    info!(
        has_coa = linked.coa.is_some(),
        children = linked.children.len(),
        partial = linked.partial,
        "Linked accounts loaded"
    );
    linked
}
