//! Key-indexer client over HTTP

use super::query::{IndexedAccount, KeyIndexer};
use crate::config::{Network, WalletConfig};
use crate::types::{Curve, FlowAddress, HashAlgo, PublicKeyHex};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct IndexerResponse {
    #[serde(default)]
    accounts: Vec<IndexerAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexerAccount {
    address: String,
    key_id: u32,
    weight: u32,
    sig_algo: u32,
    hash_algo: u32,
    #[serde(default)]
    is_revoked: bool,
}

impl IndexerAccount {
    fn into_indexed(self) -> Result<IndexedAccount> {
        Ok(IndexedAccount {
            address: self.address.parse::<FlowAddress>()?,
            key_id: self.key_id,
            weight: self.weight,
            curve: Curve::from_flow_code(self.sig_algo)?,
            hash_algo: HashAlgo::from_flow_code(self.hash_algo)?,
            revoked: self.is_revoked,
        })
    }
}

/// Client for `{base}/key/{publicKeyHex}`
///
/// Without an explicit base URL each request goes to the endpoint of the
/// network it names.
#[derive(Debug, Clone)]
pub struct HttpKeyIndexer {
    base_url: Option<String>,
    client: reqwest::Client,
}

impl HttpKeyIndexer {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::network("key_indexer", format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            client,
        })
    }

    pub fn from_config(config: &WalletConfig) -> Result<Self> {
        Self::new(config.key_indexer_url.clone(), config.http_timeout())
    }

    fn url(&self, public_key: &PublicKeyHex, network: Network) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| network.key_indexer_url());
        format!("{}/key/{}", base, public_key)
    }
}

#[async_trait]
impl KeyIndexer for HttpKeyIndexer {
    async fn find_accounts_by_public_key(
        &self,
        public_key: &PublicKeyHex,
        network: Network,
    ) -> Result<Vec<IndexedAccount>> {
        let url = self.url(public_key, network);
        debug!(%url, "Querying key-indexer");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::network("key_indexer", e))?;
        if !response.status().is_success() {
            return Err(Error::network(
                "key_indexer",
                format!("HTTP {} from {}", response.status(), url),
            ));
        }
        let body: IndexerResponse = response
            .json()
            .await
            .map_err(|e| Error::network("key_indexer", format!("invalid response: {}", e)))?;

        body.accounts
            .into_iter()
            .map(IndexerAccount::into_indexed)
            .collect()
    }
}
