//! # xec-wallet — XEC wallet with eToken and message support.
//!
//! Provides deterministic key derivation from a master seed, fee estimation
//! and greedy coin selection, transaction building and signing, eToken
//! operations, encrypted OP_RETURN messages, history parsing and encrypted
//! wallet file persistence.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`keys`] — Seed, KeyChain, BLAKE3-based key derivation
//! - [`mnemonic`] — BIP-39 backup phrases
//! - [`amount`] — Exact decimal amount parsing and formatting
//! - [`fee`] — Byte-size fee estimation
//! - [`coin_selection`] — Greedy UTXO selection
//! - [`builder`] — Transaction builder with signing
//! - [`message`] — OP_RETURN message scripts and decoding
//! - [`ecies`] — Message encryption to a recipient's public key
//! - [`broadcast`] — Submission and explorer links
//! - [`send`] — XEC payments
//! - [`token`] — eToken genesis, send, mint and burn
//! - [`history`] — History flattening and classification
//! - [`encryption`] — AES-256-GCM wallet file encryption
//! - [`wallet`] — High-level wallet composition

pub mod amount;
pub mod broadcast;
pub mod builder;
pub mod coin_selection;
pub mod ecies;
pub mod encryption;
pub mod error;
pub mod fee;
pub mod history;
pub mod keys;
pub mod message;
pub mod mnemonic;
pub mod send;
pub mod token;
pub mod wallet;

#[cfg(test)]
mod mock;

// Re-exports for convenient access
pub use broadcast::{BroadcastResult, broadcast};
pub use builder::{Recipient, TransactionBuilder, UnsignedTransaction};
pub use coin_selection::{CoinSelection, CoinSelector, SelectionTarget};
pub use error::WalletError;
pub use fee::{FeeRate, calc_fee};
pub use history::{ParsedTx, TxCategory, flatten_transactions, parse_tx, parse_tx_data};
pub use keys::{KeyChain, KeyChainData, Seed};
pub use message::{MessageDecryptor, NoDecryptor, ParsedMessage};
pub use send::{Destination, SendRequest, send_xec};
pub use token::{GenesisConfig, burn_token, create_token, mint_token, send_token};
pub use wallet::{Balances, TokenHolding, Wallet};
