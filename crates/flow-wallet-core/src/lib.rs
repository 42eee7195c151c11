//! # Flow Wallet Core
//!
//! Signing core for a multi-chain Flow/EVM wallet.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Curve/Signature Engine**: ECDSA over P-256 and secp256k1, SHA2/SHA3/Keccak
//!   hashing, BIP32/SLIP-10 derivation and password-based key encryption
//! - **Key Abstraction**: seed phrases, raw private keys and passkeys behind one
//!   [`KeyHandle`](key::KeyHandle), held in a [`KeySlot`](key::KeySlot)
//! - **Transaction Codec**: Flow payload/envelope bytes with role resolution, and
//!   EVM legacy/EIP-1559 encodings
//! - **Passkey Recovery**: attestation decoding and public-key recovery from
//!   WebAuthn assertions
//! - **Account Model**: Flow, COA, child and EVM accounts, signing-key selection
//!   and concurrent discovery
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flow_wallet_core::{CryptoContext, WalletConfig};
//! use flow_wallet_core::account::FlowAccount;
//! use flow_wallet_core::key::{KeyHandle, KeySlot};
//!
//! let config = WalletConfig::mainnet();
//! let ctx = CryptoContext::from_config(&config);
//!
//! let slot = Arc::new(KeySlot::new(KeyHandle::from_mnemonic(phrase, "", None)?));
//! let account = FlowAccount::fetch(&chain, address, config.network)
//!     .await?
//!     .with_slot(slot);
//!
//! // Signs the payload or the envelope, whichever the account owes
//! let signature = account.sign_transaction(&ctx, &voucher)?;
//! ```
//!
//! ## Key Safety
//!
//! - Secrets live only inside key handles and are zeroed on `lock()`/`remove()`
//! - Passkeys never expose a private key; they sign through the WebAuthn bridge
//! - One signing operation per slot at a time; a second gets `SignerBusy`

pub mod account;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod key;
pub mod passkey;
pub mod types;

pub use config::{Network, PollPolicy, WalletConfig};
pub use crypto::CryptoContext;
pub use error::{Error, ErrorCategory, ErrorCode, Result};
pub use types::{
    AccountKey, CompositeSignature, Curve, EvmAddress, FlowAddress, HashAlgo, PublicKeyHex,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
