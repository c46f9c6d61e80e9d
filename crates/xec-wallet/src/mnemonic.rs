//! BIP-39 mnemonic seed backup and restoration.

use bip39::{Language, Mnemonic};

use crate::error::WalletError;
use crate::keys::Seed;

/// Convert a 32-byte seed to a 24-word BIP-39 mnemonic phrase.
pub fn seed_to_mnemonic(seed: &Seed) -> Result<String, WalletError> {
    Mnemonic::from_entropy_in(Language::English, seed.as_bytes())
        .map(|m| m.to_string())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Parse a BIP-39 phrase back into its 32-byte seed.
///
/// Whitespace is normalized and case folded before parsing.
pub fn mnemonic_to_seed(phrase: &str) -> Result<Seed, WalletError> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let m = Mnemonic::parse_in(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    let entropy = m.to_entropy();
    let bytes: [u8; 32] = entropy.as_slice().try_into().map_err(|_| {
        WalletError::InvalidMnemonic(format!(
            "expected 32 bytes of entropy, got {}",
            entropy.len()
        ))
    })?;
    Ok(Seed::from_bytes(bytes))
}
