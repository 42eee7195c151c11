//! BIP39 mnemonic utilities
//!
//! English wordlist only. Strength is the entropy size in bits and must be
//! one of 128, 160, 192, 224 or 256.

use crate::{Error, Result};
use bip39::{Language, Mnemonic};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// Valid entropy sizes in bits
pub const STRENGTHS: [usize; 5] = [128, 160, 192, 224, 256];

/// Default strength (12 words)
pub const DEFAULT_STRENGTH: usize = 128;

fn invalid(e: impl std::fmt::Display) -> Error {
    Error::MnemonicInvalid {
        reason: e.to_string(),
    }
}

fn check_strength(strength: usize) -> Result<()> {
    if STRENGTHS.contains(&strength) {
        Ok(())
    } else {
        Err(invalid(format!(
            "strength must be one of {:?} bits, got {}",
            STRENGTHS, strength
        )))
    }
}

fn parse(phrase: &str) -> Result<Mnemonic> {
    let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    Mnemonic::parse_in_normalized(Language::English, &normalized).map_err(invalid)
}

/// Generate a new mnemonic with `strength` bits of OS entropy
pub fn generate_mnemonic(strength: usize) -> Result<Zeroizing<String>> {
    check_strength(strength)?;
    let mut entropy = Zeroizing::new(vec![0u8; strength / 8]);
    OsRng.fill_bytes(&mut entropy);
    entropy_to_mnemonic(&entropy)
}

pub fn entropy_to_mnemonic(entropy: &[u8]) -> Result<Zeroizing<String>> {
    check_strength(entropy.len() * 8)?;
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy).map_err(invalid)?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

pub fn mnemonic_to_entropy(phrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    Ok(Zeroizing::new(parse(phrase)?.to_entropy()))
}

/// 64-byte BIP39 seed (PBKDF2-HMAC-SHA512, 2048 rounds)
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<[u8; 64]>> {
    let mnemonic = parse(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_seed_normalized(passphrase)))
}

pub fn validate_mnemonic(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

/// Wordlist entries starting with `prefix`, in wordlist order
pub fn suggest_words(prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        return Vec::new();
    }
    Language::English
        .word_list()
        .iter()
        .copied()
        .filter(|word| word.starts_with(prefix.as_str()))
        .collect()
}
