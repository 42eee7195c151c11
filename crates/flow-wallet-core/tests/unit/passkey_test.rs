//! Unit tests for passkey attestation decoding and key recovery

use crate::support::SoftAuthenticator;
use flow_wallet_core::passkey::authenticator::{
    FLAG_AT, FLAG_UP, FLAG_UV, decode_attestation_object, parse_authenticator_data,
};
use flow_wallet_core::passkey::cbor::{self, CborValue};
use flow_wallet_core::crypto::ecdsa::p256_signature_from_der;
use flow_wallet_core::passkey::recovery::{assertion_digest, check_known_keys, recover_candidates};
use flow_wallet_core::passkey::{
    Assertion, KeyConsistency, RecoveryHint, extension_data, public_key_from_attestation,
    recover_public_key,
};
use flow_wallet_core::{CryptoContext, Error, ErrorCategory, PublicKeyHex};
use sha2::{Digest, Sha256};

const RP_ID: &str = "wallet.example";

fn ctx() -> CryptoContext {
    CryptoContext::new(1_000)
}

// ============================================================================
// Attestation Tests
// ============================================================================

#[test]
fn test_attestation_yields_credential_key() {
    let authenticator = SoftAuthenticator::new(0x31, RP_ID);
    let object = decode_attestation_object(&authenticator.attestation_object()).unwrap();

    assert_eq!(object.fmt, "none");
    assert_eq!(object.auth_data.rp_id_hash.as_slice(), Sha256::digest(RP_ID).as_slice());
    assert_eq!(object.auth_data.flags, FLAG_UP | FLAG_UV | FLAG_AT);
    assert!(object.auth_data.user_present());
    assert!(object.auth_data.user_verified());
    assert_eq!(object.auth_data.sign_count, 0);

    let credential = object.auth_data.attested_credential.unwrap();
    assert_eq!(credential.aaguid, [0u8; 16]);
    assert_eq!(credential.credential_id, vec![0x31; 16]);
    assert_eq!(credential.public_key, authenticator.public_key());

    assert_eq!(
        public_key_from_attestation(&authenticator.attestation_object()).unwrap(),
        authenticator.public_key()
    );
}

#[test]
fn test_truncated_attestation_is_rejected() {
    let bytes = SoftAuthenticator::new(0x31, RP_ID).attestation_object();
    for cut in [1, 10, bytes.len() / 2, bytes.len() - 1] {
        let err = decode_attestation_object(&bytes[..cut]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Recovery, "cut at {}", cut);
    }
}

#[test]
fn test_cbor_subset() {
    // {"a": [1, -2, h'ff'], 3: "x"}
    let value = cbor::decode(&[0xa2, 0x61, b'a', 0x83, 0x01, 0x21, 0x41, 0xff, 0x03, 0x61, b'x'])
        .unwrap();
    let array = value.get_text_key("a").unwrap();
    assert_eq!(
        array,
        &CborValue::Array(vec![
            CborValue::Unsigned(1),
            CborValue::Negative(-2),
            CborValue::Bytes(vec![0xff]),
        ])
    );
    assert_eq!(value.get_int_key(3).and_then(CborValue::as_text), Some("x"));

    // Trailing bytes
    assert!(cbor::decode(&[0x01, 0x02]).is_err());
    // Indefinite length
    assert!(cbor::decode(&[0x9f, 0x01, 0xff]).is_err());
}

// ============================================================================
// Recovery Tests
// ============================================================================

#[test]
fn test_signer_is_always_a_candidate() {
    let ctx = ctx();
    let authenticator = SoftAuthenticator::new(0x32, RP_ID);
    for challenge in [b"one".as_slice(), b"two", &[0u8; 32]] {
        let assertion = authenticator.assert(challenge);
        let candidates = recover_candidates(&ctx, &assertion).unwrap();
        assert!(candidates.contains(&authenticator.public_key()));
    }
}

#[test]
fn test_hints_select_the_signer() {
    let ctx = ctx();
    let authenticator = SoftAuthenticator::new(0x33, RP_ID);
    let first = authenticator.assert(b"first");
    let second = authenticator.assert(b"second");
    let expected = authenticator.public_key();

    let known = [expected.clone()];
    let by_known = recover_public_key(&ctx, &first, RecoveryHint::KnownKeys(&known)).unwrap();
    assert_eq!(by_known.public_key, expected);
    assert_eq!(by_known.consistency, KeyConsistency::Matched);

    let by_second =
        recover_public_key(&ctx, &first, RecoveryHint::SecondAssertion(&second)).unwrap();
    assert_eq!(by_second.public_key, expected);
}

#[test]
fn test_tampered_client_data_no_longer_matches() {
    let ctx = ctx();
    let authenticator = SoftAuthenticator::new(0x34, RP_ID);
    let mut assertion = authenticator.assert(b"challenge");
    assertion.client_data_json = assertion
        .client_data_json
        .iter()
        .map(|b| if *b == b'w' { b'W' } else { *b })
        .collect();

    let candidates = recover_candidates(&ctx, &assertion).unwrap();
    assert!(!candidates.contains(&authenticator.public_key()));
    assert!(matches!(
        check_known_keys(&candidates, &[authenticator.public_key()]),
        KeyConsistency::Mismatch { .. }
    ));
}

#[test]
fn test_malformed_der_signature() {
    let ctx = ctx();
    let mut assertion = SoftAuthenticator::new(0x35, RP_ID).assert(b"challenge");
    assertion.signature = vec![0x30, 0x02, 0x01];
    assert!(recover_candidates(&ctx, &assertion).is_err());

    assertion.signature.clear();
    let err = recover_public_key(&ctx, &assertion, RecoveryHint::None).unwrap_err();
    assert!(!matches!(err, Error::AmbiguousRecovery { .. }));
}

#[test]
fn test_extension_data_layout() {
    let assertion = SoftAuthenticator::new(0x36, RP_ID).assert(b"challenge");
    let data = extension_data(&assertion.authenticator_data, &assertion.client_data_json);

    assert_eq!(data[0], 0x01);
    // RLP list header, then the two byte strings in order
    assert!(data[1] >= 0xf7);
    let auth_at = data
        .windows(assertion.authenticator_data.len())
        .position(|w| w == assertion.authenticator_data.as_slice())
        .unwrap();
    let client_at = data
        .windows(assertion.client_data_json.len())
        .position(|w| w == assertion.client_data_json.as_slice())
        .unwrap();
    assert!(auth_at < client_at);
}

// ============================================================================
// Fixed Authenticator Capture
// ============================================================================

// Registration and assertion for rp "wallet.example", laid out the way
// Chrome emits them: `none` attestation, ES256 COSE key, high-S DER signature.
const CAPTURED_ATTESTATION: &str = "a363666d74646e6f6e656761747453746d74a06861757468446174615894\
    f34f7fb99d0c0e35e4dcd9e337700bbc66bbc64ead5e3f674968feac2103445545000000000000000000000000\
    000000000000000000103f1c9a0e5b7d2486c1e0f3a9b8d7c6e5a5010203262001215820398768e5e34e3050bb\
    c593e189b25bfbb76cb08243d77318edae78a849952cf22258202088c7e0441bd0d74842a72b70e9ff04807457\
    46dfbeed07867bd5234ad65f6a";
const CAPTURED_CREDENTIAL_ID: &str = "PxyaDlt9JIbB4POpuNfG5Q";
const CAPTURED_PUBLIC_KEY: &str = "398768e5e34e3050bbc593e189b25bfbb76cb08243d77318edae78a849952cf2\
    2088c7e0441bd0d74842a72b70e9ff0480745746dfbeed07867bd5234ad65f6a";
const CAPTURED_AUTHENTICATOR_DATA: &str =
    "f34f7fb99d0c0e35e4dcd9e337700bbc66bbc64ead5e3f674968feac210344550500000007";
const CAPTURED_CLIENT_DATA: &str = r#"{"type":"webauthn.get","challenge":"Up5BFomegOcReH3YjO6RzFwGrt1nusQmExmQPi2Dxtw","origin":"https://wallet.example","crossOrigin":false}"#;
const CAPTURED_SIGNATURE: &str = "3045022023a7931f33d7c697f042d0498eb77d078d1928dabb032f1aa175a880a2\
    1fb8fd022100dfbe2d3dc885a2f64588f0eb15479c85f28be536aafd34cbba980c9c104c265b";
const CAPTURED_DIGEST: &str = "b19071d8832b9be66cf0b41abb38e42824ddb17e4f303cda7266b7302473b875";
const CAPTURED_LOW_S: &str = "2041d2c1377a5d0aba770f14eab86379ca5b1576fc1a69b93921be26ec16fef6";

fn captured_assertion() -> Assertion {
    Assertion {
        credential_id: CAPTURED_CREDENTIAL_ID.to_string(),
        authenticator_data: hex::decode(CAPTURED_AUTHENTICATOR_DATA).unwrap(),
        client_data_json: CAPTURED_CLIENT_DATA.as_bytes().to_vec(),
        signature: hex::decode(CAPTURED_SIGNATURE).unwrap(),
        user_handle: None,
    }
}

#[test]
fn test_captured_attestation_decodes() {
    let bytes = hex::decode(CAPTURED_ATTESTATION).unwrap();
    let object = decode_attestation_object(&bytes).unwrap();

    assert_eq!(object.fmt, "none");
    assert_eq!(object.raw_auth_data.len(), 148);
    assert_eq!(object.auth_data.rp_id_hash.as_slice(), Sha256::digest(RP_ID).as_slice());
    assert_eq!(object.auth_data.flags, FLAG_UP | FLAG_UV | FLAG_AT);
    assert_eq!(object.auth_data.sign_count, 0);

    let credential = object.auth_data.attested_credential.unwrap();
    assert_eq!(credential.aaguid, [0u8; 16]);
    assert_eq!(hex::encode(&credential.credential_id), "3f1c9a0e5b7d2486c1e0f3a9b8d7c6e5");
    assert_eq!(credential.public_key, PublicKeyHex::parse(CAPTURED_PUBLIC_KEY).unwrap());
}

#[test]
fn test_captured_assertion_digest_and_recovery() {
    let ctx = ctx();
    let assertion = captured_assertion();
    let expected = PublicKeyHex::parse(CAPTURED_PUBLIC_KEY).unwrap();

    let auth = parse_authenticator_data(&assertion.authenticator_data).unwrap();
    assert_eq!(auth.flags, FLAG_UP | FLAG_UV);
    assert_eq!(auth.sign_count, 7);
    assert!(auth.attested_credential.is_none());

    let digest = assertion_digest(&ctx, &assertion.authenticator_data, &assertion.client_data_json);
    assert_eq!(hex::encode(digest), CAPTURED_DIGEST);

    // The captured signature is high-S and must come back normalized
    let rs = p256_signature_from_der(&assertion.signature).unwrap();
    assert_eq!(hex::encode(&rs[32..]), CAPTURED_LOW_S);

    let candidates = recover_candidates(&ctx, &assertion).unwrap();
    assert!(candidates.contains(&expected));

    let known = [expected.clone()];
    let recovered = recover_public_key(&ctx, &assertion, RecoveryHint::KnownKeys(&known)).unwrap();
    assert_eq!(recovered.public_key, expected);
    assert_eq!(recovered.consistency, KeyConsistency::Matched);
}
