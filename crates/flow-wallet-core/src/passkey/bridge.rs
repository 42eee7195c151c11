//! WebAuthn bridge contract and passkey signing

use super::authenticator::public_key_from_attestation;
use super::recovery::{self, KeyConsistency, RecoveredKey, RecoveryHint};
use crate::codec::RlpList;
use crate::crypto::CryptoContext;
use crate::crypto::ecdsa::p256_signature_from_der;
use crate::key::{KeyHandle, KeySlot};
use crate::types::{CompositeSignature, FlowAddress, HashAlgo, PublicKeyHex};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Leading byte of passkey extension data
pub const WEBAUTHN_EXTENSION_TYPE: u8 = 0x01;

/// Options for `navigator.credentials.create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    pub rp_id: String,
    pub rp_name: String,
    pub user_id: Vec<u8>,
    pub user_name: String,
    pub challenge: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Options for `navigator.credentials.get`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOptions {
    pub rp_id: String,
    pub challenge: Vec<u8>,
    /// Base64url credential ids the authenticator may use
    pub allow_credentials: Vec<String>,
    pub user_verification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Registration response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub credential_id: String,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// Authentication response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub credential_id: String,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    /// DER-encoded ECDSA signature
    pub signature: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Vec<u8>>,
}

/// Platform WebAuthn API
#[async_trait]
pub trait WebAuthnBridge: Send + Sync {
    async fn create(&self, options: CreateOptions) -> Result<Attestation>;

    async fn get(&self, options: GetOptions) -> Result<Assertion>;

    async fn is_platform_authenticator_available(&self) -> Result<bool>;
}

#[derive(Deserialize)]
struct ClientData {
    #[serde(rename = "type")]
    kind: String,
    challenge: String,
}

/// Check `clientDataJSON` type and that its challenge is `expected`
fn check_client_data(client_data_json: &[u8], kind: &str, expected: &[u8]) -> Result<()> {
    let client_data: ClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| Error::WebAuthn(format!("invalid clientDataJSON: {}", e)))?;
    if client_data.kind != kind {
        return Err(Error::WebAuthn(format!(
            "clientDataJSON type {} is not {}",
            client_data.kind, kind
        )));
    }
    let challenge = URL_SAFE_NO_PAD
        .decode(client_data.challenge.trim_end_matches('='))
        .map_err(|e| Error::WebAuthn(format!("challenge is not base64url: {}", e)))?;
    if challenge != expected {
        return Err(Error::WebAuthn("challenge does not match signable bytes".into()));
    }
    Ok(())
}

/// `0x01 ‖ RLP([authenticatorData, clientDataJSON])`
pub fn extension_data(authenticator_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut list = RlpList::new();
    list.push(authenticator_data).push(client_data_json);
    let mut out = vec![WEBAUTHN_EXTENSION_TYPE];
    out.extend_from_slice(&list.to_bytes());
    out
}

/// Signature produced through the authenticator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasskeySignature {
    /// Low-S `r‖s`
    pub signature: [u8; 64],
    pub extension_data: Vec<u8>,
    pub assertion: Assertion,
    /// Recovered signer compared against the handle's cached key
    pub consistency: KeyConsistency,
}

impl PasskeySignature {
    pub fn to_composite(&self, address: FlowAddress, key_id: u32) -> CompositeSignature {
        CompositeSignature::new(address, key_id, &self.signature)
            .with_extension_data(&self.extension_data)
    }
}

/// Registers passkeys and signs with them through a [`WebAuthnBridge`]
#[derive(Clone)]
pub struct PasskeySigner {
    bridge: Arc<dyn WebAuthnBridge>,
    rp_id: String,
    timeout_ms: Option<u64>,
}

impl PasskeySigner {
    pub fn new(bridge: Arc<dyn WebAuthnBridge>, rp_id: impl Into<String>) -> Self {
        Self {
            bridge,
            rp_id: rp_id.into(),
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    pub async fn is_available(&self) -> Result<bool> {
        self.bridge.is_platform_authenticator_available().await
    }

    /// Create a credential; the handle caches the attested public key
    #[instrument(skip(self, options), fields(rp_id = %self.rp_id))]
    pub async fn register(&self, options: CreateOptions) -> Result<KeyHandle> {
        let challenge = options.challenge.clone();
        let attestation = self.bridge.create(options).await?;
        check_client_data(&attestation.client_data_json, "webauthn.create", &challenge)?;

        let public_key = public_key_from_attestation(&attestation.attestation_object)?;
        info!(credential_id = %attestation.credential_id, "Passkey registered");
        Ok(KeyHandle::passkey(attestation.credential_id, Some(public_key)))
    }

    /// Sign `signable` with the passkey held in `slot`
    ///
    /// The challenge is `hash(signable)`. The slot's signing turn is held
    /// for the whole prompt, so a second call fails with `SignerBusy`.
    #[instrument(skip(self, ctx, slot, signable), fields(rp_id = %self.rp_id))]
    pub async fn sign(
        &self,
        ctx: &CryptoContext,
        slot: &KeySlot,
        signable: &[u8],
        hash_algo: HashAlgo,
    ) -> Result<PasskeySignature> {
        let _guard = slot.begin("passkey_sign")?;
        let (credential_id, cached) = slot.with_handle("passkey_sign", |handle| {
            let passkey = handle.as_passkey().ok_or(Error::KeyNotInitialized {
                operation: "passkey_sign",
            })?;
            Ok((
                passkey.credential_id().to_string(),
                passkey.cached_public_key().cloned(),
            ))
        })?;

        let challenge = ctx.hash(signable, hash_algo).to_vec();
        let assertion = self.assert(&credential_id, challenge).await?;

        let signature = p256_signature_from_der(&assertion.signature)?;
        let candidates = recovery::recover_candidates(ctx, &assertion)?;
        let known: Vec<PublicKeyHex> = cached.into_iter().collect();
        let consistency = recovery::check_known_keys(&candidates, &known);
        debug!(?consistency, "Passkey assertion checked");

        let extension_data =
            extension_data(&assertion.authenticator_data, &assertion.client_data_json);
        info!(credential_id = %credential_id, "Passkey signature produced");
        Ok(PasskeySignature {
            signature,
            extension_data,
            assertion,
            consistency,
        })
    }

    /// Recover and cache the public key of the passkey held in `slot`
    ///
    /// For a handle restored from its credential id alone. The authenticator
    /// signs two fresh challenges and the key both assertions recover to is
    /// the credential's key.
    #[instrument(skip(self, ctx, slot), fields(rp_id = %self.rp_id))]
    pub async fn recover(&self, ctx: &CryptoContext, slot: &KeySlot) -> Result<RecoveredKey> {
        let _guard = slot.begin("passkey_recover")?;
        let credential_id = slot.with_handle("passkey_recover", |handle| {
            handle
                .as_passkey()
                .map(|passkey| passkey.credential_id().to_string())
                .ok_or(Error::KeyNotInitialized {
                    operation: "passkey_recover",
                })
        })?;

        let first = self.assert(&credential_id, fresh_challenge()).await?;
        let second = self.assert(&credential_id, fresh_challenge()).await?;
        let recovered =
            recovery::recover_into_slot(ctx, slot, &first, RecoveryHint::SecondAssertion(&second))?;
        info!(credential_id = %credential_id, public_key = %recovered.public_key, "Passkey key recovered");
        Ok(recovered)
    }

    /// One assertion over `challenge` from `credential_id`, with its client data checked
    async fn assert(&self, credential_id: &str, challenge: Vec<u8>) -> Result<Assertion> {
        let assertion = self
            .bridge
            .get(GetOptions {
                rp_id: self.rp_id.clone(),
                challenge: challenge.clone(),
                allow_credentials: vec![credential_id.to_string()],
                user_verification: true,
                timeout_ms: self.timeout_ms,
            })
            .await?;

        if assertion.credential_id != credential_id {
            return Err(Error::WebAuthn(format!(
                "assertion from credential {} but {} was requested",
                assertion.credential_id, credential_id
            )));
        }
        check_client_data(&assertion.client_data_json, "webauthn.get", &challenge)?;
        Ok(assertion)
    }
}

fn fresh_challenge() -> Vec<u8> {
    let mut challenge = vec![0u8; 32];
    OsRng.fill_bytes(&mut challenge);
    challenge
}

impl std::fmt::Debug for PasskeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasskeySigner")
            .field("rp_id", &self.rp_id)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}
