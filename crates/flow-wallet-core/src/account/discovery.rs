//! Account discovery through the key-indexer
//!
//! A key of unknown provenance is looked up once per curve (and a passkey
//! once per recovered candidate). Lookups run concurrently and fail on
//! their own; a failed lookup marks the result `partial`.

use super::query::{IndexedAccount, KeyIndexer};
use crate::config::Network;
use crate::crypto::CryptoContext;
use crate::key::KeySlot;
use crate::passkey::Assertion;
use crate::passkey::recovery::recover_candidates;
use crate::types::{AccountKey, Curve, FlowAddress, PublicKeyHex};
use crate::{Error, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Account the key can sign for on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAccount {
    pub address: FlowAddress,
    pub key: AccountKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub accounts: Vec<DiscoveredAccount>,
    /// At least one lookup failed
    pub partial: bool,
}

/// Discovery outcome for a passkey assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasskeyDiscovery {
    /// The one candidate key registered on chain
    pub public_key: PublicKeyHex,
    pub accounts: Vec<DiscoveredAccount>,
    pub partial: bool,
}

fn full_weight_accounts(
    public_key: &PublicKeyHex,
    curve: Curve,
    registrations: Vec<IndexedAccount>,
) -> Vec<DiscoveredAccount> {
    registrations
        .into_iter()
        .filter(|indexed| indexed.curve == curve)
        .map(|indexed| DiscoveredAccount {
            address: indexed.address,
            key: indexed.to_account_key(public_key),
        })
        .filter(|account| account.key.is_full_weight())
        .collect()
}

async fn lookup_all(
    indexer: &dyn KeyIndexer,
    keys: &[(Curve, PublicKeyHex)],
    network: Network,
) -> Vec<Result<Vec<DiscoveredAccount>>> {
    join_all(keys.iter().map(|(curve, public_key)| async move {
        let registrations = indexer
            .find_accounts_by_public_key(public_key, network)
            .await?;
        Ok(full_weight_accounts(public_key, *curve, registrations))
    }))
    .await
}

/// Accounts registered for the key in `slot`, P-256 lookups first
#[instrument(skip(ctx, indexer, slot))]
pub async fn discover_accounts(
    ctx: &CryptoContext,
    indexer: &dyn KeyIndexer,
    slot: &KeySlot,
    network: Network,
) -> Result<Discovery> {
    let mut keys = Vec::with_capacity(Curve::ALL.len());
    for curve in Curve::ALL {
        if let Some(public_key) = slot.public_key(ctx, curve, None)? {
            keys.push((curve, public_key));
        }
    }

    let mut discovery = Discovery::default();
    for ((curve, _), result) in keys.iter().zip(lookup_all(indexer, &keys, network).await) {
        match result {
            Ok(accounts) => {
                debug!(%curve, found = accounts.len(), "Key-indexer lookup finished");
                discovery.accounts.extend(accounts);
            }
            Err(e) => {
                warn!(%curve, error = %e, "Key-indexer lookup failed");
                discovery.partial = true;
            }
        }
    }
    info!(
        accounts = discovery.accounts.len(),
        partial = discovery.partial,
        "Account discovery finished"
    );
    Ok(discovery)
}

/// Recover the passkey's public key by finding which candidate is registered
///
/// Exactly one candidate with accounts wins. None raises `RecoveryFailed`
/// (or the lookup error when every lookup failed); several raise
/// `AmbiguousRecovery`.
#[instrument(skip(ctx, indexer, assertion), fields(credential_id = %assertion.credential_id))]
pub async fn discover_passkey_accounts(
    ctx: &CryptoContext,
    indexer: &dyn KeyIndexer,
    assertion: &Assertion,
    network: Network,
) -> Result<PasskeyDiscovery> {
    let keys: Vec<(Curve, PublicKeyHex)> = recover_candidates(ctx, assertion)?
        .into_iter()
        .map(|candidate| (Curve::P256, candidate))
        .collect();

    let mut failures = 0;
    let mut last_error = None;
    let mut registered = Vec::new();
    for ((_, candidate), result) in keys.iter().zip(lookup_all(indexer, &keys, network).await) {
        match result {
            Ok(accounts) if !accounts.is_empty() => registered.push((candidate.clone(), accounts)),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Key-indexer lookup for passkey candidate failed");
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match registered.len() {
        1 => {
            let (public_key, accounts) = registered.remove(0);
            info!(accounts = accounts.len(), "Passkey key recovered from chain registrations");
            Ok(PasskeyDiscovery {
                public_key,
                accounts,
                partial: failures > 0,
            })
        }
        0 => match last_error {
            Some(e) if failures == keys.len() => Err(e),
            _ => Err(Error::RecoveryFailed {
                reason: "no recovered candidate is registered on chain".into(),
            }),
        },
        n => Err(Error::AmbiguousRecovery { candidates: n }),
    }
}
