//! Currency constants. All monetary values in satoshis (1 XEC = 100 satoshis).

use serde::{Deserialize, Serialize};

/// Ticker of the base currency.
pub const TICKER: &str = "XEC";

/// Display name of tokens issued on top of the base chain.
pub const TOKEN_TICKER: &str = "eToken";

/// Number of decimal places of the base currency.
pub const CASH_DECIMALS: u32 = 2;

/// Satoshis per whole XEC.
pub const COIN: u64 = 100;

/// Minimum output value the wallet will create for a plain XEC transfer.
pub const DUST_SATS: u64 = 550;

/// Value attached to every token-carrying output.
pub const ETOKEN_SATS: u64 = 546;

/// Default fee rate in milli-satoshis per byte (1.01 sat/byte).
pub const DEFAULT_FEE_MSATS_PER_BYTE: u64 = 1_010;

/// Number of records shown by default in the transaction history.
pub const TX_HISTORY_COUNT: usize = 20;

/// Prefix used for token receive addresses.
pub const TOKEN_PREFIX: &str = "etoken";

/// Legacy prefix still accepted when decoding mainnet addresses.
pub const LEGACY_PREFIX: &str = "bitcoincash";

/// Maximum plaintext OP_RETURN message length in bytes.
pub const UNENCRYPTED_MSG_BYTE_LIMIT: usize = 160;

/// Maximum OP_RETURN message length in bytes before encryption.
pub const ENCRYPTED_MSG_BYTE_LIMIT: usize = 94;

/// 4-byte protocol identifiers pushed right after OP_RETURN.
pub mod app_prefix {
    /// SLP token protocol (`SLP\0`).
    pub const ETOKEN: [u8; 4] = [0x53, 0x4c, 0x50, 0x00];
    /// Plaintext wallet message (`\0tab`).
    pub const CASHTAB: [u8; 4] = [0x00, 0x74, 0x61, 0x62];
    /// Encrypted wallet message (`etab`).
    pub const CASHTAB_ENCRYPTED: [u8; 4] = [0x65, 0x74, 0x61, 0x62];
    /// Airdrop announcement (`drop`).
    pub const AIRDROP: [u8; 4] = [0x64, 0x72, 0x6f, 0x70];
}

/// Network selector: address prefix, explorer and API endpoint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
}

impl Network {
    /// Cashaddr prefix for this network.
    ///
    /// ```
    /// use xec_core::constants::Network;
    /// assert_eq!(Network::Mainnet.prefix(), "ecash");
    /// assert_eq!(Network::Testnet.prefix(), "ectest");
    /// ```
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Mainnet => "ecash",
            Self::Testnet => "ectest",
        }
    }

    /// Look up the network from a cashaddr prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "ecash" | LEGACY_PREFIX | TOKEN_PREFIX => Some(Self::Mainnet),
            "ectest" => Some(Self::Testnet),
            _ => None,
        }
    }

    /// Block explorer base URL.
    pub fn explorer_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://explorer.bitcoinabc.org",
            Self::Testnet => "https://texplorer.bitcoinabc.org",
        }
    }

    /// Block explorer link for a transaction id.
    ///
    /// ```
    /// use xec_core::constants::Network;
    /// assert_eq!(
    ///     Network::Mainnet.explorer_tx_url("ab"),
    ///     "https://explorer.bitcoinabc.org/tx/ab"
    /// );
    /// ```
    pub fn explorer_tx_url(&self, txid: &str) -> String {
        format!("{}/tx/{txid}", self.explorer_url())
    }

    /// Parse `mainnet` / `testnet` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Some(Self::Mainnet),
            "testnet" => Some(Self::Testnet),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "Mainnet",
            Self::Testnet => "Testnet",
        }
    }
}
