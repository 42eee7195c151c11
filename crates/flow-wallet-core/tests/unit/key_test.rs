//! Unit tests for the key abstraction

use flow_wallet_core::crypto::hd::{EVM_DEFAULT_PATH, FLOW_DEFAULT_PATH};
use flow_wallet_core::key::{FileSystemStorage, KeyHandle, KeySlot, KeyType, MemoryStorage, mnemonic};
use flow_wallet_core::{CryptoContext, Curve, Error, EvmAddress, HashAlgo};

const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                       abandon abandon abandon abandon abandon about";

fn ctx() -> CryptoContext {
    CryptoContext::new(1_000)
}

// ============================================================================
// Seed Phrase Tests
// ============================================================================

#[test]
fn test_seed_phrase_is_deterministic() {
    let ctx = ctx();
    let a = KeyHandle::from_mnemonic(ABANDON, "", None).unwrap();
    let spaced = format!("  {}\n", ABANDON.replace(' ', "   "));
    let b = KeyHandle::from_mnemonic(&spaced, "", None).unwrap();

    for curve in Curve::ALL {
        assert_eq!(
            a.public_key(&ctx, curve, None).unwrap(),
            b.public_key(&ctx, curve, None).unwrap()
        );
    }
    assert_eq!(a.derivation_path(), FLOW_DEFAULT_PATH);
}

#[test]
fn test_passphrase_changes_keys() {
    let ctx = ctx();
    let plain = KeyHandle::from_mnemonic(ABANDON, "", None).unwrap();
    let trezor = KeyHandle::from_mnemonic(ABANDON, "TREZOR", None).unwrap();
    assert_ne!(
        plain.public_key(&ctx, Curve::P256, None).unwrap(),
        trezor.public_key(&ctx, Curve::P256, None).unwrap()
    );
}

#[test]
fn test_account_index_paths() {
    let ctx = ctx();
    let key = KeyHandle::from_mnemonic(ABANDON, "", None).unwrap();

    let first = key
        .public_key(&ctx, Curve::Secp256k1, Some(EVM_DEFAULT_PATH))
        .unwrap()
        .unwrap();
    let second = key
        .public_key(&ctx, Curve::Secp256k1, Some("m/44'/60'/0'/0/1"))
        .unwrap()
        .unwrap();
    assert_eq!(
        EvmAddress::from_public_key(&first).to_checksum(),
        "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
    );
    assert_ne!(first, second);

    let err = key
        .public_key(&ctx, Curve::P256, Some("m/44'/539'/x"))
        .unwrap_err();
    assert!(matches!(err, Error::DerivationFailed { .. }));
}

#[test]
fn test_invalid_mnemonic_rejected() {
    let err = KeyHandle::from_mnemonic("abandon abandon", "", None).unwrap_err();
    assert!(matches!(err, Error::MnemonicInvalid { .. }));
    assert!(!mnemonic::validate_mnemonic(&ABANDON.replace("about", "zoo")));
}

#[test]
fn test_generated_seed_phrase_signs() {
    let ctx = ctx();
    let key = KeyHandle::generate_seed_phrase(256).unwrap();
    assert_eq!(key.key_type(), KeyType::SeedPhrase);

    let public_key = key.public_key(&ctx, Curve::P256, None).unwrap().unwrap();
    let signature = key
        .sign(&ctx, b"payload", Curve::P256, HashAlgo::Sha3_256)
        .unwrap();
    let digest = ctx.hash(b"payload", HashAlgo::Sha3_256);
    assert!(
        ctx.verify(&signature.to_bytes(), &digest, &public_key, Curve::P256)
            .unwrap()
    );
}

// ============================================================================
// Raw Key Tests
// ============================================================================

#[test]
fn test_raw_key_hex_forms() {
    let ctx = ctx();
    let hex_key = "46".repeat(32);
    let a = KeyHandle::from_private_key_hex(&hex_key, Curve::Secp256k1).unwrap();
    let b = KeyHandle::from_private_key_hex(&format!("0x{}", hex_key), Curve::Secp256k1).unwrap();
    assert_eq!(
        a.public_key(&ctx, Curve::Secp256k1, None).unwrap(),
        b.public_key(&ctx, Curve::Secp256k1, None).unwrap()
    );
    assert_eq!(a.curve(), Curve::Secp256k1);
    assert!(KeyHandle::from_private_key_hex("zz", Curve::P256).is_err());
}

#[test]
fn test_raw_key_signs_only_its_curve() {
    let ctx = ctx();
    let key = KeyHandle::generate_private_key(&ctx, Curve::P256);
    assert!(key.sign(&ctx, b"m", Curve::P256, HashAlgo::Sha2_256).is_ok());
    assert!(matches!(
        key.sign(&ctx, b"m", Curve::Secp256k1, HashAlgo::Sha2_256),
        Err(Error::UnsupportedCurve { .. })
    ));
}

// ============================================================================
// Slot Tests
// ============================================================================

#[test]
fn test_slot_guard_rejects_second_signer() {
    let ctx = ctx();
    let slot = KeySlot::new(KeyHandle::from_private_key(&[0x46; 32], Curve::P256).unwrap());

    let guard = slot.begin("first").unwrap();
    let err = slot
        .sign(&ctx, b"m", Curve::P256, HashAlgo::Sha3_256, None)
        .unwrap_err();
    assert!(matches!(err, Error::SignerBusy { .. }));
    assert_eq!(err.code(), flow_wallet_core::ErrorCode::SignerBusy);

    drop(guard);
    assert!(slot.sign(&ctx, b"m", Curve::P256, HashAlgo::Sha3_256, None).is_ok());
}

#[test]
fn test_slot_lock_and_unlock() {
    let ctx = ctx();
    let slot = KeySlot::new(KeyHandle::from_mnemonic(ABANDON, "", None).unwrap());
    assert!(slot.is_unlocked());
    assert_eq!(slot.key_type(), Some(KeyType::SeedPhrase));

    slot.lock();
    assert!(!slot.is_unlocked());
    assert!(matches!(
        slot.public_key(&ctx, Curve::P256, None),
        Err(Error::KeyNotInitialized { .. })
    ));

    slot.unlock(KeyHandle::from_private_key(&[0x46; 32], Curve::Secp256k1).unwrap());
    assert_eq!(slot.key_type(), Some(KeyType::RawPrivateKey));
    assert!(slot.public_key(&ctx, Curve::Secp256k1, None).unwrap().is_some());
}

// ============================================================================
// Storage Tests
// ============================================================================

#[tokio::test]
async fn test_every_key_kind_survives_storage() {
    let ctx = ctx();
    let storage = MemoryStorage::new();
    let passkey_public = ctx.public_key(Curve::P256, &[0x21; 32]).unwrap();
    let keys = [
        KeyHandle::from_mnemonic(ABANDON, "secret", Some("m/44'/539'/0'/0/3")).unwrap(),
        KeyHandle::from_private_key(&[0x46; 32], Curve::Secp256k1).unwrap(),
        KeyHandle::passkey("Y3JlZA", Some(passkey_public.clone())),
    ];

    for (i, key) in keys.iter().enumerate() {
        let id = format!("key-{}", i);
        key.store(&ctx, &storage, &id, "hunter2").await.unwrap();
        let loaded = KeyHandle::load(&ctx, &storage, &id, "hunter2").await.unwrap();

        assert_eq!(loaded.key_type(), key.key_type());
        for curve in Curve::ALL {
            assert_eq!(
                loaded.public_key(&ctx, curve, None).unwrap(),
                key.public_key(&ctx, curve, None).unwrap()
            );
        }
    }
    assert_eq!(storage.len().await, 3);

    let passkey = KeyHandle::load(&ctx, &storage, "key-2", "hunter2").await.unwrap();
    assert_eq!(passkey.as_passkey().unwrap().credential_id(), "Y3JlZA");
}

#[tokio::test]
async fn test_stored_blob_hides_secret() {
    let ctx = ctx();
    let storage = MemoryStorage::new();
    let key = KeyHandle::from_mnemonic(ABANDON, "", None).unwrap();
    key.store(&ctx, &storage, "main", "pw").await.unwrap();

    use flow_wallet_core::key::SecureStorage;
    let blob = storage.retrieve("main").await.unwrap().unwrap();
    let text = String::from_utf8_lossy(&blob);
    assert!(!text.contains("abandon"));

    assert!(KeyHandle::load(&ctx, &storage, "main", "wrong").await.is_err());
    assert!(KeyHandle::load(&ctx, &storage, "missing", "pw").await.is_err());
}

#[tokio::test]
async fn test_filesystem_round_trip_then_remove() {
    let ctx = ctx();
    let dir = std::env::temp_dir().join(format!("flow-wallet-unit-{}", rand::random::<u64>()));
    let storage = FileSystemStorage::new(&dir).unwrap();

    let mut key = KeyHandle::from_private_key(&[0x46; 32], Curve::P256).unwrap();
    key.store(&ctx, &storage, "device", "pw").await.unwrap();
    let loaded = KeyHandle::load(&ctx, &storage, "device", "pw").await.unwrap();
    assert_eq!(
        loaded.public_key(&ctx, Curve::P256, None).unwrap(),
        key.public_key(&ctx, Curve::P256, None).unwrap()
    );

    assert!(key.remove(&storage, "device").await.unwrap());
    assert!(!key.is_available());
    assert!(KeyHandle::load(&ctx, &storage, "device", "pw").await.is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}
