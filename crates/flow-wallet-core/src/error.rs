//! Error types for wallet signing operations
//!
//! Every error carries a stable machine-readable [`ErrorCode`] plus the
//! structured context (curve, address, operation) it was raised with, so
//! callers can branch on the code and log consistently.

use crate::types::{Curve, HashAlgo};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while deriving keys, encoding or signing
#[derive(Debug, Error)]
pub enum Error {
    // ============ Key Errors ============
    /// The secret behind a key handle is unavailable (locked, removed or a passkey)
    #[error("Key not initialized for {operation}")]
    KeyNotInitialized { operation: &'static str },

    /// Curve is not supported by the operation or key
    #[error("Unsupported curve {curve} for {operation}")]
    UnsupportedCurve { curve: Curve, operation: &'static str },

    /// Hash algorithm is not supported by the operation
    #[error("Unsupported hash algorithm {hash} for {operation}")]
    UnsupportedHash { hash: HashAlgo, operation: &'static str },

    /// Unknown Flow curve or hash code point
    #[error("Unknown {kind} code {code}")]
    UnknownAlgorithmCode { kind: &'static str, code: u32 },

    /// Hierarchical derivation failed
    #[error("Key derivation failed at {path}: {reason}")]
    DerivationFailed { path: String, reason: String },

    /// Mnemonic phrase or entropy is not valid BIP39
    #[error("Invalid mnemonic: {reason}")]
    MnemonicInvalid { reason: String },

    /// Malformed key material (wrong length, off-curve point, bad DER)
    #[error("Invalid key material for {curve}: {reason}")]
    InvalidKey { curve: Curve, reason: String },

    /// The signing slot of a key handle already has an operation in flight
    #[error("Signer busy: another {operation} is in flight for this key")]
    SignerBusy { operation: &'static str },

    // ============ Account Errors ============
    /// The requested account key is not a full-weight match for the key handle
    #[error("Key {key_id} on account {address} does not match the held key")]
    NoMatchingKey { address: String, key_id: u32 },

    /// Signing requested on an account without a usable key
    #[error("Cannot sign with watch-only account {address}")]
    WatchOnlySign { address: String },

    /// Address string could not be parsed
    #[error("Invalid {kind} address: {value}")]
    InvalidAddress { kind: &'static str, value: String },

    /// COA creation requested on an account without a signing key
    #[error("Cannot create COA for watch-only account {address}")]
    CannotCreateWatchOnly { address: String },

    // ============ Codec Errors ============
    /// Transaction voucher is missing a required field
    #[error("Malformed voucher: missing or invalid {field}")]
    MalformedVoucher { field: &'static str },

    /// A value could not be encoded into signable bytes
    #[error("Encoding failure in {field}: {reason}")]
    EncodingFailure { field: &'static str, reason: String },

    // ============ Recovery Errors ============
    /// No candidate public key verified the assertion signature
    #[error("Public key recovery failed: {reason}")]
    RecoveryFailed { reason: String },

    /// More than one distinct key verified and no hint disambiguated them
    #[error("Public key recovery is ambiguous: {candidates} candidates verify")]
    AmbiguousRecovery { candidates: usize },

    /// Attestation object or authenticator data could not be decoded
    #[error("Attestation decode failed at {stage}: {reason}")]
    AttestationDecodeFailed { stage: &'static str, reason: String },

    /// Credential public key is not ES256 / P-256 EC2
    #[error("Unsupported credential format: {reason}")]
    UnsupportedCredentialFormat { reason: String },

    // ============ Network Errors ============
    /// Collaborator (chain query, key indexer, submission) failure
    #[error("Network error in {operation}: {message}")]
    Network { operation: &'static str, message: String },

    /// Bounded poll exhausted its attempts
    #[error("Timeout waiting for {operation} after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    /// Caller abandoned the operation
    #[error("Operation {operation} cancelled")]
    Cancelled { operation: String },

    /// WebAuthn platform call failed or was rejected
    #[error("WebAuthn bridge error: {0}")]
    WebAuthn(String),

    // ============ Storage Errors ============
    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encryption/decryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    // ============ Internal Errors ============
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    KeyNotInitialized,
    UnsupportedCurve,
    UnsupportedHash,
    UnknownAlgorithmCode,
    DerivationFailed,
    MnemonicInvalid,
    InvalidKey,
    SignerBusy,
    NoMatchingKey,
    WatchOnlySign,
    InvalidAddress,
    CannotCreateWatchOnly,
    MalformedVoucher,
    EncodingFailure,
    RecoveryFailed,
    AmbiguousRecovery,
    AttestationDecodeFailed,
    UnsupportedCredentialFormat,
    Network,
    Timeout,
    Cancelled,
    WebAuthn,
    Storage,
    Encryption,
    Serialization,
    InvalidInput,
    Io,
}

impl ErrorCode {
    /// Wire form of the code, e.g. `KEY_NOT_INITIALIZED`
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::KeyNotInitialized => "KEY_NOT_INITIALIZED",
            ErrorCode::UnsupportedCurve => "UNSUPPORTED_CURVE",
            ErrorCode::UnsupportedHash => "UNSUPPORTED_HASH",
            ErrorCode::UnknownAlgorithmCode => "UNKNOWN_ALGORITHM_CODE",
            ErrorCode::DerivationFailed => "DERIVATION_FAILED",
            ErrorCode::MnemonicInvalid => "MNEMONIC_INVALID",
            ErrorCode::InvalidKey => "INVALID_KEY",
            ErrorCode::SignerBusy => "SIGNER_BUSY",
            ErrorCode::NoMatchingKey => "NO_MATCHING_KEY",
            ErrorCode::WatchOnlySign => "WATCH_ONLY_SIGN",
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::CannotCreateWatchOnly => "CANNOT_CREATE_WATCH_ONLY",
            ErrorCode::MalformedVoucher => "MALFORMED_VOUCHER",
            ErrorCode::EncodingFailure => "ENCODING_FAILURE",
            ErrorCode::RecoveryFailed => "RECOVERY_FAILED",
            ErrorCode::AmbiguousRecovery => "AMBIGUOUS_RECOVERY",
            ErrorCode::AttestationDecodeFailed => "ATTESTATION_DECODE_FAILED",
            ErrorCode::UnsupportedCredentialFormat => "UNSUPPORTED_CREDENTIAL_FORMAT",
            ErrorCode::Network => "NETWORK",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::WebAuthn => "WEBAUTHN",
            ErrorCode::Storage => "STORAGE",
            ErrorCode::Encryption => "ENCRYPTION",
            ErrorCode::Serialization => "SERIALIZATION",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Io => "IO",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error family, matching the taxonomy callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Key,
    Account,
    Codec,
    Recovery,
    Network,
    Storage,
    Internal,
}

impl Error {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::KeyNotInitialized { .. } => ErrorCode::KeyNotInitialized,
            Error::UnsupportedCurve { .. } => ErrorCode::UnsupportedCurve,
            Error::UnsupportedHash { .. } => ErrorCode::UnsupportedHash,
            Error::UnknownAlgorithmCode { .. } => ErrorCode::UnknownAlgorithmCode,
            Error::DerivationFailed { .. } => ErrorCode::DerivationFailed,
            Error::MnemonicInvalid { .. } => ErrorCode::MnemonicInvalid,
            Error::InvalidKey { .. } => ErrorCode::InvalidKey,
            Error::SignerBusy { .. } => ErrorCode::SignerBusy,
            Error::NoMatchingKey { .. } => ErrorCode::NoMatchingKey,
            Error::WatchOnlySign { .. } => ErrorCode::WatchOnlySign,
            Error::InvalidAddress { .. } => ErrorCode::InvalidAddress,
            Error::CannotCreateWatchOnly { .. } => ErrorCode::CannotCreateWatchOnly,
            Error::MalformedVoucher { .. } => ErrorCode::MalformedVoucher,
            Error::EncodingFailure { .. } => ErrorCode::EncodingFailure,
            Error::RecoveryFailed { .. } => ErrorCode::RecoveryFailed,
            Error::AmbiguousRecovery { .. } => ErrorCode::AmbiguousRecovery,
            Error::AttestationDecodeFailed { .. } => ErrorCode::AttestationDecodeFailed,
            Error::UnsupportedCredentialFormat { .. } => ErrorCode::UnsupportedCredentialFormat,
            Error::Network { .. } => ErrorCode::Network,
            Error::Timeout { .. } => ErrorCode::Timeout,
            Error::Cancelled { .. } => ErrorCode::Cancelled,
            Error::WebAuthn(_) => ErrorCode::WebAuthn,
            Error::Storage(_) => ErrorCode::Storage,
            Error::Encryption(_) => ErrorCode::Encryption,
            Error::Serialization(_) => ErrorCode::Serialization,
            Error::InvalidInput(_) => ErrorCode::InvalidInput,
            Error::Io(_) => ErrorCode::Io,
        }
    }

    /// Taxonomy family for this error
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            ErrorCode::KeyNotInitialized
            | ErrorCode::UnsupportedCurve
            | ErrorCode::UnsupportedHash
            | ErrorCode::UnknownAlgorithmCode
            | ErrorCode::DerivationFailed
            | ErrorCode::MnemonicInvalid
            | ErrorCode::InvalidKey
            | ErrorCode::SignerBusy => ErrorCategory::Key,
            ErrorCode::NoMatchingKey
            | ErrorCode::WatchOnlySign
            | ErrorCode::InvalidAddress
            | ErrorCode::CannotCreateWatchOnly => ErrorCategory::Account,
            ErrorCode::MalformedVoucher | ErrorCode::EncodingFailure => ErrorCategory::Codec,
            ErrorCode::RecoveryFailed
            | ErrorCode::AmbiguousRecovery
            | ErrorCode::AttestationDecodeFailed
            | ErrorCode::UnsupportedCredentialFormat => ErrorCategory::Recovery,
            ErrorCode::Network
            | ErrorCode::Timeout
            | ErrorCode::Cancelled
            | ErrorCode::WebAuthn => ErrorCategory::Network,
            ErrorCode::Storage | ErrorCode::Encryption => ErrorCategory::Storage,
            ErrorCode::Serialization | ErrorCode::InvalidInput | ErrorCode::Io => {
                ErrorCategory::Internal
            }
        }
    }

    /// Shorthand for collaborator failures
    pub fn network(operation: &'static str, message: impl fmt::Display) -> Self {
        Error::Network {
            operation,
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidInput(format!("invalid hex: {}", e))
    }
}
