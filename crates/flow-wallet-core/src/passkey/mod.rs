//! Passkey (WebAuthn) support
//!
//! - [`cbor`]: the CBOR subset attestation objects use
//! - [`authenticator`]: authenticator data and COSE key extraction
//! - [`recovery`]: public-key recovery from assertions
//! - [`bridge`]: the platform WebAuthn contract and [`PasskeySigner`]

pub mod authenticator;
pub mod bridge;
pub mod cbor;
pub mod recovery;

pub use authenticator::{AttestationObject, AuthenticatorData, public_key_from_attestation};
pub use bridge::{
    Assertion, Attestation, CreateOptions, GetOptions, PasskeySignature, PasskeySigner,
    WebAuthnBridge, extension_data,
};
pub use recovery::{
    KeyConsistency, RecoveredKey, RecoveryHint, recover_into_slot, recover_public_key,
};
