//! End-to-end signing flows
//!
//! Accounts are fetched from the mock chain, matched against the held key
//! and sign real vouchers; every signature is verified afterwards.

use crate::support::{MockChain, SoftAuthenticator, addr};
use alloy_primitives::U256;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flow_wallet_core::account::{
    CancelToken, EvmAccount, FlowAccount, TransactionStatus, TransactionStatusSource, wait_for_seal,
};
use flow_wallet_core::codec::evm::{EvmTransaction, personal_message_hash};
use flow_wallet_core::codec::flow::{self, Role, TransactionVoucher};
use flow_wallet_core::crypto::hd::EVM_DEFAULT_PATH;
use flow_wallet_core::key::{KeyHandle, KeySlot};
use flow_wallet_core::passkey::recovery::assertion_digest;
use flow_wallet_core::passkey::{CreateOptions, PasskeySigner};
use flow_wallet_core::{
    AccountKey, CompositeSignature, CryptoContext, Curve, Error, EvmAddress, FlowAddress, HashAlgo,
    Network, PollPolicy, PublicKeyHex, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                       abandon abandon abandon abandon abandon about";
const REF_BLOCK: &str = "f0e4c2f76c58916ec258f246851bea091d14d4247a2fc3e18694461b1816e13b";
const RP_ID: &str = "wallet.example";

fn ctx() -> CryptoContext {
    CryptoContext::new(1_000)
}

fn seed_slot() -> Arc<KeySlot> {
    Arc::new(KeySlot::new(KeyHandle::from_mnemonic(ABANDON, "", None).unwrap()))
}

fn verify(
    ctx: &CryptoContext,
    signature: &CompositeSignature,
    message: &[u8],
    key: &AccountKey,
) -> bool {
    let digest = ctx.hash(message, key.hash_algo);
    let bytes = hex::decode(&signature.signature).unwrap();
    ctx.verify(&bytes, &digest, &key.public_key, key.curve).unwrap()
}

/// Chain holding `address` with one full-weight key for `public_key`
fn chain_with_key(
    address: FlowAddress,
    public_key: PublicKeyHex,
    curve: Curve,
    hash_algo: HashAlgo,
) -> (MockChain, AccountKey) {
    let key = AccountKey::new(0, public_key, curve, hash_algo, 1000).with_sequence_number(5);
    let mut chain = MockChain::default();
    chain.keys.insert(address, vec![key.clone()]);
    (chain, key)
}

// ============================================================================
// Seed Phrase Flows
// ============================================================================

#[tokio::test]
async fn test_seed_phrase_single_signer_flow() {
    let ctx = ctx();
    let slot = seed_slot();
    let address = addr("0x1234567890abcdef");
    let public_key = slot.public_key(&ctx, Curve::P256, None).unwrap().unwrap();
    let (chain, key) = chain_with_key(address, public_key, Curve::P256, HashAlgo::Sha3_256);

    let account = FlowAccount::fetch(&chain, address, Network::Testnet)
        .await
        .unwrap()
        .with_slot(slot);
    assert!(!account.is_watch_only());
    assert_eq!(account.find_signing_keys(&ctx).unwrap(), vec![key.clone()]);

    let mut voucher = TransactionVoucher::new("transaction { prepare(signer: &Account) {} }")
        .with_ref_block(REF_BLOCK)
        .with_proposal_key(address, 0, 5)
        .with_payer(address)
        .with_authorizer(address);

    let role = account.authorize(&ctx, &mut voucher).unwrap();
    assert_eq!(role, Role::Envelope);
    assert!(voucher.payload_sigs.is_empty());
    assert_eq!(voucher.envelope_sigs.len(), 1);

    let signed = &voucher.envelope_sigs[0];
    let composite = CompositeSignature::new(signed.address, signed.key_id, &hex::decode(&signed.sig).unwrap());
    let mut unsigned = voucher.clone();
    unsigned.envelope_sigs.clear();
    assert!(verify(&ctx, &composite, &flow::envelope_bytes(&unsigned).unwrap(), &key));

    assert!(flow::transaction_id(&ctx, &voucher).is_ok());
}

#[tokio::test]
async fn test_proposer_and_payer_sign_their_own_parts() {
    let ctx = ctx();
    let proposer_address = addr("0x01");
    let payer_address = addr("0x02");

    let proposer_slot = Arc::new(KeySlot::new(
        KeyHandle::from_private_key(&[0x46; 32], Curve::Secp256k1).unwrap(),
    ));
    let proposer_public = ctx.public_key(Curve::Secp256k1, &[0x46; 32]).unwrap();
    let proposer_key = AccountKey::new(2, proposer_public, Curve::Secp256k1, HashAlgo::Sha2_256, 1000);
    let proposer = FlowAccount::new(proposer_address, Network::Mainnet, vec![proposer_key.clone()])
        .with_slot(proposer_slot);

    let payer_slot = seed_slot();
    let payer_public = payer_slot.public_key(&ctx, Curve::P256, None).unwrap().unwrap();
    let payer_key = AccountKey::new(0, payer_public, Curve::P256, HashAlgo::Sha3_256, 1000);
    let payer = FlowAccount::new(payer_address, Network::Mainnet, vec![payer_key.clone()])
        .with_slot(payer_slot);

    let mut voucher = TransactionVoucher::new("transaction {}")
        .with_ref_block(REF_BLOCK)
        .with_proposal_key(proposer_address, 2, 11)
        .with_payer(payer_address)
        .with_authorizer(proposer_address);

    let payload = flow::payload_bytes(&voucher).unwrap();
    assert_eq!(proposer.authorize(&ctx, &mut voucher).unwrap(), Role::Payload);
    let proposer_sig = CompositeSignature::new(
        proposer_address,
        2,
        &hex::decode(&voucher.payload_sigs[0].sig).unwrap(),
    );
    assert!(verify(&ctx, &proposer_sig, &payload, &proposer_key));

    let envelope = flow::envelope_bytes(&voucher).unwrap();
    let payer_sig = payer.sign_transaction(&ctx, &voucher).unwrap();
    assert_eq!(payer_sig.key_id, 0);
    assert!(verify(&ctx, &payer_sig, &envelope, &payer_key));
}

#[tokio::test]
async fn test_sign_message_uses_user_tag() {
    let ctx = ctx();
    let slot = seed_slot();
    let address = addr("0x05");
    let public_key = slot.public_key(&ctx, Curve::Secp256k1, None).unwrap().unwrap();
    let (chain, key) = chain_with_key(address, public_key, Curve::Secp256k1, HashAlgo::Sha3_256);

    let account = FlowAccount::fetch(&chain, address, Network::Mainnet)
        .await
        .unwrap()
        .with_slot(slot);
    let signature = account.sign_message(&ctx, b"login:nonce-42").unwrap();

    assert!(verify(&ctx, &signature, &flow::user_message_bytes(b"login:nonce-42"), &key));
    assert!(!verify(&ctx, &signature, b"login:nonce-42", &key));
}

#[tokio::test]
async fn test_watch_only_account_refuses_to_sign() {
    let ctx = ctx();
    let address = addr("0x06");
    let stranger = ctx.public_key(Curve::P256, &[0x77; 32]).unwrap();
    let (chain, _) = chain_with_key(address, stranger, Curve::P256, HashAlgo::Sha3_256);

    let watch = FlowAccount::fetch(&chain, address, Network::Mainnet).await.unwrap();
    assert!(watch.is_watch_only());
    let voucher = TransactionVoucher::new("transaction {}")
        .with_ref_block(REF_BLOCK)
        .with_proposal_key(address, 0, 0)
        .with_payer(address);
    assert!(matches!(
        watch.sign_transaction(&ctx, &voucher),
        Err(Error::WatchOnlySign { .. })
    ));
    assert!(matches!(
        watch.create_coa(&ctx, REF_BLOCK),
        Err(Error::CannotCreateWatchOnly { .. })
    ));

    // A key that matches nothing on the account is no better than none
    let unrelated = FlowAccount::fetch(&chain, address, Network::Mainnet)
        .await
        .unwrap()
        .with_slot(seed_slot());
    assert!(unrelated.find_signing_keys(&ctx).unwrap().is_empty());
    assert!(matches!(
        unrelated.sign_transaction(&ctx, &voucher),
        Err(Error::WatchOnlySign { .. })
    ));
}

#[tokio::test]
async fn test_fetch_propagates_chain_failure() {
    let chain = MockChain::default().fail("get_account_keys");
    let err = FlowAccount::fetch(&chain, addr("0x01"), Network::Mainnet)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network { .. }));
}

// ============================================================================
// COA Creation
// ============================================================================

#[tokio::test]
async fn test_create_coa_signs_envelope() {
    let ctx = ctx();
    let slot = seed_slot();
    let address = addr("0x0a");
    let public_key = slot.public_key(&ctx, Curve::P256, None).unwrap().unwrap();
    let (chain, key) = chain_with_key(address, public_key, Curve::P256, HashAlgo::Sha3_256);
    let account = FlowAccount::fetch(&chain, address, Network::Testnet)
        .await
        .unwrap()
        .with_slot(slot);

    let voucher = account.create_coa(&ctx, REF_BLOCK).unwrap();
    assert!(voucher.cadence.contains("import EVM from 0x8c5303eaa26202d6"));
    assert_eq!(voucher.proposal_key.as_ref().unwrap().sequence_num, 5);
    assert_eq!(voucher.payer, Some(address));
    assert_eq!(voucher.authorizers, vec![address]);
    assert!(voucher.payload_sigs.is_empty());
    assert_eq!(voucher.envelope_sigs.len(), 1);

    let mut unsigned = voucher.clone();
    unsigned.envelope_sigs.clear();
    let entry = &voucher.envelope_sigs[0];
    let signature = CompositeSignature::new(entry.address, entry.key_id, &hex::decode(&entry.sig).unwrap());
    assert!(verify(&ctx, &signature, &flow::envelope_bytes(&unsigned).unwrap(), &key));
}

// ============================================================================
// Passkey Flow
// ============================================================================

async fn passkey_account(
    ctx: &CryptoContext,
    authenticator: Arc<SoftAuthenticator>,
    address: FlowAddress,
) -> (FlowAccount, PasskeySigner, AccountKey) {
    let signer = PasskeySigner::new(authenticator.clone(), RP_ID).with_timeout_ms(60_000);
    assert!(signer.is_available().await.unwrap());

    let handle = signer
        .register(CreateOptions {
            rp_id: RP_ID.into(),
            rp_name: "Flow Wallet".into(),
            user_id: vec![1, 2, 3],
            user_name: "alice".into(),
            challenge: vec![0x5a; 32],
            timeout_ms: None,
        })
        .await
        .unwrap();
    assert_eq!(handle.cached_public_key(), Some(&authenticator.public_key()));

    let public_key = handle
        .public_key(ctx, Curve::P256, None)
        .unwrap()
        .unwrap();
    let (chain, key) = chain_with_key(address, public_key, Curve::P256, HashAlgo::Sha2_256);
    let account = FlowAccount::fetch(&chain, address, Network::Mainnet)
        .await
        .unwrap()
        .with_slot(Arc::new(KeySlot::new(handle)));
    (account, signer, key)
}

#[tokio::test]
async fn test_passkey_transaction_flow() {
    let ctx = ctx();
    let authenticator = Arc::new(SoftAuthenticator::new(0x41, RP_ID));
    let address = addr("0x0b");
    let (account, signer, key) = passkey_account(&ctx, authenticator.clone(), address).await;

    let voucher = TransactionVoucher::new("transaction {}")
        .with_ref_block(REF_BLOCK)
        .with_proposal_key(address, 0, 5)
        .with_payer(address)
        .with_authorizer(address);

    // Local signing is refused for passkeys
    assert!(matches!(
        account.sign_transaction(&ctx, &voucher),
        Err(Error::KeyNotInitialized { .. })
    ));

    let signature = account
        .sign_transaction_with_passkey(&ctx, &signer, &voucher)
        .await
        .unwrap();
    assert_eq!(signature.address, address);
    assert_eq!(signature.key_id, key.index);

    let requests = authenticator.requests.lock();
    let request = requests.last().unwrap();
    let envelope = flow::envelope_bytes(&voucher).unwrap();
    assert_eq!(request.challenge, ctx.hash(&envelope, HashAlgo::Sha2_256).to_vec());
    assert_eq!(request.allow_credentials, vec![authenticator.credential_id().to_string()]);
    assert_eq!(request.timeout_ms, Some(60_000));
    assert!(request.user_verification);

    // The authenticator signed authData ‖ SHA256(clientDataJSON), not the envelope
    let extension = hex::decode(signature.extension_data.as_ref().unwrap()).unwrap();
    assert_eq!(extension[0], 0x01);
    let assertion = authenticator.assert(&request.challenge);
    let client_data: serde_json::Value = serde_json::from_slice(&assertion.client_data_json).unwrap();
    assert_eq!(
        client_data["challenge"],
        URL_SAFE_NO_PAD.encode(&request.challenge)
    );
    let digest = assertion_digest(&ctx, &assertion.authenticator_data, &assertion.client_data_json);
    let rs = flow_wallet_core::crypto::ecdsa::p256_signature_from_der(&assertion.signature).unwrap();
    assert!(ctx.verify(&rs, &digest, &key.public_key, Curve::P256).unwrap());
}

#[tokio::test]
async fn test_passkey_create_coa() {
    let ctx = ctx();
    let authenticator = Arc::new(SoftAuthenticator::new(0x42, RP_ID));
    let address = addr("0x0c");
    let (account, signer, _) = passkey_account(&ctx, authenticator, address).await;

    assert!(matches!(
        account.create_coa(&ctx, REF_BLOCK),
        Err(Error::KeyNotInitialized { .. })
    ));
    let voucher = account
        .create_coa_with_passkey(&ctx, &signer, REF_BLOCK)
        .await
        .unwrap();
    assert!(voucher.cadence.contains("import EVM from 0xe467b9dd11fa00df"));
    assert_eq!(voucher.envelope_sigs.len(), 1);
    assert!(voucher.envelope_sigs[0].extension_data.is_some());
    assert!(flow::transaction_id(&ctx, &voucher).is_ok());
}

// ============================================================================
// EVM Flow
// ============================================================================

#[test]
fn test_evm_account_from_seed_phrase() {
    let ctx = ctx();
    let account = EvmAccount::from_slot(&ctx, seed_slot(), None).unwrap();
    assert_eq!(
        account.address().to_checksum(),
        "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
    );

    let same = EvmAccount::from_slot(&ctx, seed_slot(), Some(EVM_DEFAULT_PATH)).unwrap();
    assert_eq!(same.address(), account.address());

    let message = b"Sign in to Flow";
    let signature = account.sign_personal_message(&ctx, message).unwrap();
    assert!(signature[64] == 27 || signature[64] == 28);
    let recovered = ctx
        .recover_public_key(
            &signature[..64],
            &personal_message_hash(message),
            Curve::Secp256k1,
            signature[64] - 27,
        )
        .unwrap();
    assert_eq!(EvmAddress::from_public_key(&recovered), account.address());
}

#[test]
fn test_evm_transaction_on_flow_evm() {
    let ctx = ctx();
    let account = EvmAccount::from_slot(&ctx, seed_slot(), None).unwrap();
    let tx = EvmTransaction::eip1559(Network::Mainnet.evm_chain_id(), 3, 1, 100_000_000)
        .with_to(EvmAddress::from_bytes([0x42; 20]))
        .with_value(U256::from(10u64));

    let signed = account.sign_transaction(&ctx, &tx).unwrap();
    assert!(signed.raw.starts_with("0x02"));
    assert_eq!(signed.hash.len(), 66);
    // Deterministic (RFC6979) nonces
    assert_eq!(account.sign_transaction(&ctx, &tx).unwrap(), signed);
}

#[test]
fn test_evm_account_needs_secp256k1() {
    let ctx = ctx();
    let p256_only = Arc::new(KeySlot::new(
        KeyHandle::from_private_key(&[0x46; 32], Curve::P256).unwrap(),
    ));
    assert!(matches!(
        EvmAccount::from_slot(&ctx, p256_only, None),
        Err(Error::UnsupportedCurve { .. })
    ));
}

// ============================================================================
// Seal Polling
// ============================================================================

struct StatusSequence {
    statuses: Mutex<Vec<Result<TransactionStatus>>>,
}

#[async_trait]
impl TransactionStatusSource for StatusSequence {
    async fn transaction_status(&self, _tx_id: &str) -> Result<TransactionStatus> {
        let mut statuses = self.statuses.lock();
        if statuses.len() > 1 {
            statuses.remove(0)
        } else {
            match &statuses[0] {
                Ok(status) => Ok(*status),
                Err(_) => Err(Error::network("status", "unavailable")),
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_signed_transaction_is_polled_to_seal() {
    let ctx = ctx();
    let slot = seed_slot();
    let address = addr("0x0d");
    let public_key = slot.public_key(&ctx, Curve::P256, None).unwrap().unwrap();
    let (chain, _) = chain_with_key(address, public_key, Curve::P256, HashAlgo::Sha3_256);
    let account = FlowAccount::fetch(&chain, address, Network::Mainnet)
        .await
        .unwrap()
        .with_slot(slot);

    let voucher = account.create_coa(&ctx, REF_BLOCK).unwrap();
    let tx_id = hex::encode(flow::transaction_id(&ctx, &voucher).unwrap());

    let source = StatusSequence {
        statuses: Mutex::new(vec![
            Ok(TransactionStatus::Pending),
            Err(Error::network("status", "blip")),
            Ok(TransactionStatus::Executed),
            Ok(TransactionStatus::Sealed),
        ]),
    };
    let policy = PollPolicy::new(Duration::from_secs(1), 10);
    let status = wait_for_seal(&source, &tx_id, policy, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(status, TransactionStatus::Sealed);
    assert!(status.is_final());
}
