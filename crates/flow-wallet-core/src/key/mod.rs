//! Key abstraction
//!
//! - [`KeyHandle`]: seed phrase, raw private key or passkey
//! - [`mnemonic`]: BIP39 conversions and word suggestions
//! - [`KeySlot`]: shared handle with the single-signer guard
//! - [`storage`]: opaque ciphertext storage contract

mod handle;
pub mod mnemonic;
mod slot;
pub mod storage;

pub use handle::{KeyHandle, KeyType, PasskeyHandle, RawPrivateKey, SeedPhraseKey};
pub use slot::{KeySlot, SigningGuard};
pub use storage::{FileSystemStorage, MemoryStorage, SecureStorage};
