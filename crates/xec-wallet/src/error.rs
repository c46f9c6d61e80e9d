//! Wallet error types.
//!
//! Several variants render fixed strings that callers and the UI match on
//! (`"Insufficient funds"`, `"dust"`, `"Invalid wallet"`, ...). Node
//! rejections pass through [`WalletError::Network`] unchanged.

use thiserror::Error;
use xec_core::error::{AddressError, ClientError, CryptoError, ScriptError, SlpError, TransactionError};

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Selected inputs cannot cover outputs plus fee.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Single-recipient send without a usable amount.
    #[error("Invalid singleSendValue")]
    InvalidSendValue,

    /// An output is below the dust limit.
    #[error("dust")]
    Dust,

    /// The wallet cannot sign (watch-only or missing keys).
    #[error("Invalid wallet")]
    InvalidWallet,

    /// The wallet holds no UTXOs of the requested token.
    #[error("No token UTXOs for the specified token could be found.")]
    NoTokenUtxos,

    /// The wallet does not hold the token's mint baton.
    #[error("No mint baton UTXO for the specified token could be found.")]
    NoMintBaton,

    /// Token UTXOs exist but do not add up to the requested amount.
    #[error("insufficient token funds: have {have}, need {need}")]
    InsufficientTokenFunds {
        /// Held amount in token base units.
        have: u64,
        /// Requested amount in token base units.
        need: u64,
    },

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid fee rate text.
    #[error("invalid fee rate: {0}")]
    InvalidFeeRate(String),

    /// Invalid address string.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// OP_RETURN message exceeds its byte limit.
    #[error("message too long: {len} bytes exceeds limit of {limit}")]
    MessageTooLong {
        /// Message length in bytes.
        len: usize,
        /// Applicable limit in bytes.
        limit: usize,
    },

    /// No spending transaction reveals the recipient's public key.
    #[error("public key not found for {0}")]
    PublicKeyNotFound(String),

    /// Key derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// Decryption or MAC check failure.
    #[error("decryption: {0}")]
    Decryption(String),

    /// Wrong password for wallet file.
    #[error("invalid password")]
    InvalidPassword,

    /// Wallet file is corrupted or has invalid format.
    #[error("corrupted file: {0}")]
    CorruptedFile(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Required key not found in keychain.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Transaction build error.
    #[error("build error: {0}")]
    BuildError(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Network or node failure, message unchanged.
    #[error("{0}")]
    Network(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Slp(#[from] SlpError),

    #[error(transparent)]
    Address(#[from] AddressError),
}

impl From<ClientError> for WalletError {
    fn from(e: ClientError) -> Self {
        Self::Network(e.to_string())
    }
}
