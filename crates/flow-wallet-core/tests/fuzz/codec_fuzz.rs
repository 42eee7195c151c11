//! Fuzz tests for the Flow voucher codec
//!
//! Property-based checks for encoding determinism and role resolution.

use flow_wallet_core::codec::flow::{self, Role, TransactionVoucher};
use flow_wallet_core::{CompositeSignature, CryptoContext, FlowAddress, PublicKeyHex};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Strategies for generating test data
// ============================================================================

fn address_strategy() -> impl Strategy<Value = FlowAddress> {
    prop::array::uniform8(any::<u8>()).prop_map(FlowAddress::from_bytes)
}

fn ref_block_strategy() -> impl Strategy<Value = String> {
    prop::array::uniform32(any::<u8>()).prop_map(hex::encode)
}

fn argument_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        any::<u64>().prop_map(|n| json!({"type": "UInt64", "value": n.to_string()})),
        "[a-zA-Z0-9 ]{0,24}".prop_map(|s| json!({"type": "String", "value": s})),
        any::<bool>().prop_map(|b| json!({"type": "Bool", "value": b})),
    ]
}

/// Voucher with arbitrary parties, arguments and limits
fn voucher_strategy() -> impl Strategy<Value = TransactionVoucher> {
    (
        "[ -~]{0,64}",
        prop::collection::vec(argument_strategy(), 0..4),
        ref_block_strategy(),
        any::<u64>(),
        (address_strategy(), any::<u32>(), any::<u64>()),
        address_strategy(),
        prop::collection::vec(address_strategy(), 0..4),
    )
        .prop_map(
            |(cadence, arguments, ref_block, compute_limit, (proposer, key_id, seq), payer, authorizers)| {
                let mut voucher = TransactionVoucher::new(cadence)
                    .with_ref_block(ref_block)
                    .with_compute_limit(compute_limit)
                    .with_proposal_key(proposer, key_id, seq)
                    .with_payer(payer);
                for argument in arguments {
                    voucher = voucher.with_argument(argument);
                }
                for authorizer in authorizers {
                    voucher = voucher.with_authorizer(authorizer);
                }
                voucher
            },
        )
}

// ============================================================================
// Encoding Fuzzing
// ============================================================================

proptest! {
    /// Encoding the same voucher twice gives the same bytes and id
    #[test]
    fn encoding_is_deterministic(voucher in voucher_strategy()) {
        let ctx = CryptoContext::new(1_000);
        let payer = voucher.payer.unwrap();
        prop_assert_eq!(flow::encode(&voucher, &payer).unwrap(), flow::encode(&voucher, &payer).unwrap());
        prop_assert_eq!(
            flow::transaction_id(&ctx, &voucher).unwrap(),
            flow::transaction_id(&ctx, &voucher.clone()).unwrap()
        );
    }

    /// The envelope always contains the payload list
    #[test]
    fn envelope_extends_payload(voucher in voucher_strategy()) {
        let payload = flow::payload_bytes(&voucher).unwrap();
        let envelope = flow::envelope_bytes(&voucher).unwrap();
        prop_assert_eq!(&payload[..32], &envelope[..32]);
        let payload_rlp = &payload[32..];
        prop_assert!(envelope[32..].windows(payload_rlp.len()).any(|w| w == payload_rlp));
    }

    /// JSON transport does not change what is signed
    #[test]
    fn json_transport_preserves_bytes(voucher in voucher_strategy()) {
        let decoded: TransactionVoucher =
            serde_json::from_str(&serde_json::to_string(&voucher).unwrap()).unwrap();
        prop_assert_eq!(flow::envelope_bytes(&decoded).unwrap(), flow::envelope_bytes(&voucher).unwrap());
    }

    /// Short reference block ids are left-padded, long ones rejected
    #[test]
    fn ref_block_length(voucher in voucher_strategy(), len in 1usize..80) {
        let voucher = voucher.with_ref_block("a".repeat(len));
        prop_assert_eq!(flow::payload_bytes(&voucher).is_ok(), len <= 64);
    }
}

// ============================================================================
// Role Fuzzing
// ============================================================================

proptest! {
    /// The payer signs the envelope whatever other roles it holds
    #[test]
    fn payer_always_signs_envelope(
        voucher in voucher_strategy(),
        payer_proposes in any::<bool>(),
        payer_authorizes in any::<bool>(),
    ) {
        let payer = voucher.payer.unwrap();
        let mut voucher = voucher;
        if payer_proposes {
            voucher = voucher.with_proposal_key(payer, 0, 1);
        }
        if payer_authorizes {
            voucher = voucher.with_authorizer(payer);
        }
        prop_assert_eq!(flow::role(&voucher, &payer).unwrap(), Role::Envelope);
        prop_assert_eq!(flow::encode(&voucher, &payer).unwrap(), flow::envelope_bytes(&voucher).unwrap());
    }

    /// Proposers and authorizers that do not pay sign the payload
    #[test]
    fn non_payers_sign_payload(voucher in voucher_strategy(), authorizer in address_strategy()) {
        let payer = voucher.payer.unwrap();
        prop_assume!(authorizer != payer);
        let voucher = voucher.with_authorizer(authorizer);
        prop_assert_eq!(flow::role(&voucher, &authorizer).unwrap(), Role::Payload);

        let proposer = voucher.proposal_key.as_ref().unwrap().address;
        if proposer != payer {
            prop_assert_eq!(flow::role(&voucher, &proposer).unwrap(), Role::Payload);
        }
    }

    /// Payload signatures change the envelope but never the payload
    #[test]
    fn payload_signatures_only_touch_envelope(
        voucher in voucher_strategy(),
        signature in prop::collection::vec(any::<u8>(), 64),
    ) {
        let proposer = voucher.proposal_key.as_ref().unwrap().address;
        let before_payload = flow::payload_bytes(&voucher).unwrap();
        let before_envelope = flow::envelope_bytes(&voucher).unwrap();

        let mut signed = voucher;
        signed.add_signature(Role::Payload, CompositeSignature::new(proposer, 0, &signature));
        prop_assert_eq!(flow::payload_bytes(&signed).unwrap(), before_payload);
        prop_assert_ne!(flow::envelope_bytes(&signed).unwrap(), before_envelope);
    }
}

// ============================================================================
// Address and Key Parsing
// ============================================================================

proptest! {
    /// Flow addresses survive display and parse, with or without padding
    #[test]
    fn flow_address_round_trip(bytes in prop::array::uniform8(any::<u8>())) {
        let address = FlowAddress::from_bytes(bytes);
        prop_assert_eq!(address.to_string().parse::<FlowAddress>().unwrap(), address);
        let short = hex::encode(bytes).trim_start_matches('0').to_string();
        if !short.is_empty() {
            prop_assert_eq!(short.parse::<FlowAddress>().unwrap(), address);
        }
    }

    /// Public key input forms normalize to one value
    #[test]
    fn public_key_forms_normalize(xy in prop::collection::vec(any::<u8>(), 64)) {
        let plain = hex::encode(&xy);
        let expected = PublicKeyHex::parse(&plain).unwrap();
        prop_assert_eq!(PublicKeyHex::parse(&format!("0x04{}", plain)).unwrap(), expected.clone());
        prop_assert_eq!(PublicKeyHex::parse(&plain.to_uppercase()).unwrap(), expected.clone());
        prop_assert_eq!(PublicKeyHex::from_bytes(&xy).unwrap(), expected);
    }
}
