//! Attestation objects and authenticator data
//!
//! ```text
//! authData = rpIdHash(32) ‖ flags(1) ‖ signCount(4)
//!            [‖ aaguid(16) ‖ credIdLen(2) ‖ credId ‖ COSE_Key]   when AT is set
//! ```

use super::cbor::{self, CborValue};
use crate::types::PublicKeyHex;
use crate::{Error, Result};

/// User present
pub const FLAG_UP: u8 = 0x01;
/// User verified
pub const FLAG_UV: u8 = 0x04;
/// Attested credential data included
pub const FLAG_AT: u8 = 0x40;
/// Extension data included
pub const FLAG_ED: u8 = 0x80;

const COSE_KTY: i128 = 1;
const COSE_ALG: i128 = 3;
const COSE_CRV: i128 = -1;
const COSE_X: i128 = -2;
const COSE_Y: i128 = -3;

const KTY_EC2: i128 = 2;
const ALG_ES256: i128 = -7;
const CRV_P256: i128 = 1;

/// Credential material attached at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredential {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub public_key: PublicKeyHex,
}

/// Parsed authenticator data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredential>,
}

impl AuthenticatorData {
    pub fn user_present(&self) -> bool {
        self.flags & FLAG_UP != 0
    }

    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_UV != 0
    }
}

/// Decoded attestation object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationObject {
    /// Attestation statement format (`none`, `packed`, ...)
    pub fmt: String,
    pub auth_data: AuthenticatorData,
    /// Raw authenticator data bytes
    pub raw_auth_data: Vec<u8>,
}

fn decode_failed(stage: &'static str, reason: impl Into<String>) -> Error {
    Error::AttestationDecodeFailed {
        stage,
        reason: reason.into(),
    }
}

fn unsupported(reason: impl Into<String>) -> Error {
    Error::UnsupportedCredentialFormat {
        reason: reason.into(),
    }
}

/// Parse raw authenticator data
pub fn parse_authenticator_data(bytes: &[u8]) -> Result<AuthenticatorData> {
    if bytes.len() < 37 {
        return Err(decode_failed(
            "authData",
            format!("need at least 37 bytes, got {}", bytes.len()),
        ));
    }
    let mut rp_id_hash = [0u8; 32];
    rp_id_hash.copy_from_slice(&bytes[..32]);
    let flags = bytes[32];
    let sign_count = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

    let attested_credential = if flags & FLAG_AT != 0 {
        Some(parse_attested_credential(&bytes[37..])?)
    } else {
        None
    };

    Ok(AuthenticatorData {
        rp_id_hash,
        flags,
        sign_count,
        attested_credential,
    })
}

fn parse_attested_credential(bytes: &[u8]) -> Result<AttestedCredential> {
    if bytes.len() < 18 {
        return Err(decode_failed("attestedCredentialData", "truncated header"));
    }
    let mut aaguid = [0u8; 16];
    aaguid.copy_from_slice(&bytes[..16]);
    let id_len = u16::from_be_bytes([bytes[16], bytes[17]]) as usize;
    let rest = &bytes[18..];
    if rest.len() < id_len {
        return Err(decode_failed(
            "attestedCredentialData",
            format!("credential id length {} exceeds data", id_len),
        ));
    }
    let credential_id = rest[..id_len].to_vec();

    // Extensions may follow the COSE key, so decode only its prefix
    let (cose_key, _) = cbor::decode_prefix(&rest[id_len..])?;
    let public_key = cose_key_to_public_key(&cose_key)?;

    Ok(AttestedCredential {
        aaguid,
        credential_id,
        public_key,
    })
}

fn int_field(cose_key: &CborValue, label: i128, name: &str) -> Result<i128> {
    cose_key
        .get_int_key(label)
        .and_then(CborValue::as_integer)
        .ok_or_else(|| unsupported(format!("missing {}", name)))
}

fn coordinate<'a>(cose_key: &'a CborValue, label: i128, name: &str) -> Result<&'a [u8]> {
    let bytes = cose_key
        .get_int_key(label)
        .and_then(CborValue::as_bytes)
        .ok_or_else(|| unsupported(format!("missing {} coordinate", name)))?;
    if bytes.len() != 32 {
        return Err(unsupported(format!(
            "{} coordinate must be 32 bytes, got {}",
            name,
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Extract an ES256 P-256 public key from a COSE key map
pub fn cose_key_to_public_key(cose_key: &CborValue) -> Result<PublicKeyHex> {
    if cose_key.as_map().is_none() {
        return Err(decode_failed("coseKey", "COSE key is not a map"));
    }
    let kty = int_field(cose_key, COSE_KTY, "kty")?;
    if kty != KTY_EC2 {
        return Err(unsupported(format!("kty {} is not EC2", kty)));
    }
    let alg = int_field(cose_key, COSE_ALG, "alg")?;
    if alg != ALG_ES256 {
        return Err(unsupported(format!("alg {} is not ES256", alg)));
    }
    let crv = int_field(cose_key, COSE_CRV, "crv")?;
    if crv != CRV_P256 {
        return Err(unsupported(format!("crv {} is not P-256", crv)));
    }
    let x = coordinate(cose_key, COSE_X, "x")?;
    let y = coordinate(cose_key, COSE_Y, "y")?;

    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(x);
    sec1.extend_from_slice(y);
    p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|_| unsupported("credential point is not on P-256"))?;

    PublicKeyHex::from_bytes(&sec1)
}

/// Decode a CBOR attestation object
pub fn decode_attestation_object(bytes: &[u8]) -> Result<AttestationObject> {
    let object = cbor::decode(bytes)?;
    let fmt = object
        .get_text_key("fmt")
        .and_then(CborValue::as_text)
        .ok_or_else(|| decode_failed("attestationObject", "missing fmt"))?
        .to_string();
    let raw_auth_data = object
        .get_text_key("authData")
        .and_then(CborValue::as_bytes)
        .ok_or_else(|| decode_failed("attestationObject", "missing authData"))?
        .to_vec();
    let auth_data = parse_authenticator_data(&raw_auth_data)?;

    Ok(AttestationObject {
        fmt,
        auth_data,
        raw_auth_data,
    })
}

/// Registration path: the credential public key from an attestation object
pub fn public_key_from_attestation(bytes: &[u8]) -> Result<PublicKeyHex> {
    decode_attestation_object(bytes)?
        .auth_data
        .attested_credential
        .map(|credential| credential.public_key)
        .ok_or_else(|| decode_failed("authData", "no attested credential data (AT flag unset)"))
}
