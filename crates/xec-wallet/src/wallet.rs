//! Wallet composition: keys, watched addresses, UTXOs and balances.
//!
//! A [`Wallet`] either owns a signing [`KeyChain`] or watches a fixed set of
//! addresses. UTXOs are fetched from a [`ChainClient`] by [`Wallet::refresh`];
//! balances and token holdings are recomputed from them every time.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use xec_core::address::Address;
use xec_core::constants::Network;
use xec_core::traits::ChainClient;
use xec_core::types::{TokenId, Transaction, Utxo};

use crate::encryption;
use crate::error::WalletError;
use crate::keys::{KeyChain, KeyChainData, Seed};
use crate::mnemonic::{mnemonic_to_seed, seed_to_mnemonic};

/// Magic bytes identifying a wallet file.
pub const WALLET_MAGIC: &[u8; 4] = b"XECW";

/// Current wallet file format version.
pub const WALLET_VERSION: u32 = 1;

/// XEC balance summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    /// Spendable XEC in satoshis, excluding token-carrying outputs.
    pub total_sats: u64,
}

/// Amount of one token held by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub token_id: TokenId,
    /// Balance in token base units.
    pub amount: u64,
    /// The wallet holds this token's mint baton.
    pub has_baton: bool,
}

/// Wallet file header serialized as JSON.
#[derive(Serialize, Deserialize)]
struct WalletFileHeader {
    magic: String,
    version: u32,
}

/// An XEC wallet.
pub struct Wallet {
    keychain: Option<KeyChain>,
    network: Network,
    /// Watched addresses; index 0 receives and takes change.
    addresses: Vec<Address>,
    utxos: Vec<Utxo>,
    /// `None` until the first refresh.
    balances: Option<Balances>,
    tokens: Vec<TokenHolding>,
}

impl Wallet {
    /// Create a new wallet with a random seed.
    pub fn create(network: Network) -> Self {
        Self::from_seed(Seed::generate(), network)
    }

    /// Create a wallet from an existing seed (deterministic recovery).
    pub fn from_seed(seed: Seed, network: Network) -> Self {
        let mut keychain = KeyChain::new(seed, network);
        keychain.next_address();
        Self::from_keychain(keychain)
    }

    /// Restore from a 24-word mnemonic.
    pub fn from_mnemonic(phrase: &str, network: Network) -> Result<Self, WalletError> {
        Ok(Self::from_seed(mnemonic_to_seed(phrase)?, network))
    }

    fn from_keychain(keychain: KeyChain) -> Self {
        let addresses = (0..keychain.next_index())
            .filter_map(|i| keychain.derived_address(i))
            .collect();
        Self {
            network: keychain.network(),
            keychain: Some(keychain),
            addresses,
            utxos: Vec::new(),
            balances: None,
            tokens: Vec::new(),
        }
    }

    /// A wallet that can show balances and history but cannot sign.
    pub fn watch_only(addresses: Vec<Address>) -> Result<Self, WalletError> {
        let network = addresses
            .first()
            .map(Address::network)
            .ok_or(WalletError::InvalidWallet)?;
        if addresses.iter().any(|a| a.network() != network) {
            return Err(WalletError::InvalidAddress("mixed networks".into()));
        }
        Ok(Self {
            keychain: None,
            network,
            addresses,
            utxos: Vec::new(),
            balances: None,
            tokens: Vec::new(),
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_watch_only(&self) -> bool {
        self.keychain.is_none()
    }

    pub fn keychain(&self) -> Option<&KeyChain> {
        self.keychain.as_ref()
    }

    /// The keychain, or [`WalletError::InvalidWallet`] for watch-only wallets.
    pub fn signing_keychain(&self) -> Result<&KeyChain, WalletError> {
        self.keychain.as_ref().ok_or(WalletError::InvalidWallet)
    }

    /// 24-word backup phrase.
    pub fn mnemonic(&self) -> Result<String, WalletError> {
        seed_to_mnemonic(self.signing_keychain()?.seed())
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn receive_address(&self) -> Option<&Address> {
        self.addresses.first()
    }

    /// Receive address with the `etoken:` prefix.
    pub fn token_address(&self) -> Option<String> {
        self.receive_address().map(Address::encode_token)
    }

    /// Where change is sent.
    pub fn change_address(&self) -> Result<&Address, WalletError> {
        self.receive_address().ok_or(WalletError::InvalidWallet)
    }

    /// Derive and watch one more address.
    pub fn new_address(&mut self) -> Result<Address, WalletError> {
        let keychain = self.keychain.as_mut().ok_or(WalletError::InvalidWallet)?;
        let address = keychain.next_address();
        self.addresses.push(address.clone());
        Ok(address)
    }

    /// hash160 of every watched P2PKH address.
    pub fn wallet_hashes(&self) -> HashSet<[u8; 20]> {
        self.addresses.iter().map(|a| *a.hash()).collect()
    }

    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }

    /// UTXOs spendable as plain XEC.
    pub fn spendable_utxos(&self) -> Vec<Utxo> {
        self.utxos.iter().filter(|u| !u.is_token()).cloned().collect()
    }

    pub fn balances(&self) -> Option<&Balances> {
        self.balances.as_ref()
    }

    pub fn tokens(&self) -> &[TokenHolding] {
        &self.tokens
    }

    /// Replace the UTXO set and recompute balances and token holdings.
    pub fn set_utxos(&mut self, utxos: Vec<Utxo>) {
        self.utxos = utxos;
        self.recompute();
    }

    /// Fetch UTXOs for every watched address.
    pub async fn refresh(&mut self, client: &dyn ChainClient) -> Result<Balances, WalletError> {
        let mut utxos = Vec::new();
        for address in &self.addresses {
            let found = client.utxos(address).await?;
            debug!(%address, count = found.len(), "fetched utxos");
            utxos.extend(found);
        }
        self.set_utxos(utxos);
        let balances = self.balances.unwrap_or_default();
        info!(
            total_sats = balances.total_sats,
            utxos = self.utxos.len(),
            tokens = self.tokens.len(),
            "wallet refreshed"
        );
        Ok(balances)
    }

    /// Drop UTXOs spent by `tx` so they are not reused before the next refresh.
    pub fn mark_spent(&mut self, tx: &Transaction) {
        let spent: HashSet<_> = tx.inputs.iter().map(|i| i.prev_out).collect();
        self.utxos.retain(|u| !spent.contains(&u.outpoint));
        self.recompute();
    }

    fn recompute(&mut self) {
        let total_sats = self
            .utxos
            .iter()
            .filter(|u| !u.is_token())
            .fold(0u64, |acc, u| acc.saturating_add(u.value));
        self.balances = Some(Balances { total_sats });

        let mut tokens: Vec<TokenHolding> = Vec::new();
        for utxo in &self.utxos {
            let (Some(token_id), Some(slp)) = (utxo.token_id, utxo.slp_token) else {
                continue;
            };
            let idx = match tokens.iter().position(|t| t.token_id == token_id) {
                Some(idx) => idx,
                None => {
                    tokens.push(TokenHolding {
                        token_id,
                        amount: 0,
                        has_baton: false,
                    });
                    tokens.len() - 1
                }
            };
            let holding = &mut tokens[idx];
            if slp.is_mint_baton {
                holding.has_baton = true;
            } else {
                holding.amount = holding.amount.saturating_add(slp.amount);
            }
        }
        self.tokens = tokens;
    }

    /// Save the wallet to an encrypted file.
    ///
    /// # File format
    /// ```text
    /// header_len (4 bytes LE) || header_json || encrypted_payload
    /// ```
    /// The header is unencrypted JSON containing the magic and version.
    /// The payload is AES-256-GCM encrypted keychain data.
    pub fn save_to_file(&self, path: &Path, password: &[u8]) -> Result<(), WalletError> {
        let keychain = self.signing_keychain()?;

        let header = WalletFileHeader {
            magic: String::from_utf8_lossy(WALLET_MAGIC).to_string(),
            version: WALLET_VERSION,
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;

        let kc_data = KeyChainData::from_keychain(keychain);
        let payload_json =
            serde_json::to_vec(&kc_data).map_err(|e| WalletError::Serialization(e.to_string()))?;

        let encrypted = encryption::encrypt(&payload_json, password)?;

        let header_len = header_json.len() as u32;
        let mut file_data = Vec::with_capacity(4 + header_json.len() + encrypted.len());
        file_data.extend_from_slice(&header_len.to_le_bytes());
        file_data.extend_from_slice(&header_json);
        file_data.extend_from_slice(&encrypted);

        std::fs::write(path, &file_data).map_err(|e| WalletError::IoError(e.to_string()))
    }

    /// Load a wallet from an encrypted file.
    pub fn load_from_file(path: &Path, password: &[u8]) -> Result<Self, WalletError> {
        let file_data = std::fs::read(path).map_err(|e| WalletError::IoError(e.to_string()))?;

        let (len_bytes, rest) = file_data
            .split_first_chunk::<4>()
            .ok_or_else(|| WalletError::CorruptedFile("file too short".into()))?;
        let header_len = u32::from_le_bytes(*len_bytes) as usize;
        if rest.len() < header_len {
            return Err(WalletError::CorruptedFile("header truncated".into()));
        }
        let (header_json, encrypted) = rest.split_at(header_len);

        let header: WalletFileHeader = serde_json::from_slice(header_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;
        if header.magic.as_bytes() != &WALLET_MAGIC[..] {
            return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
        }
        if header.version != WALLET_VERSION {
            return Err(WalletError::CorruptedFile(format!(
                "unsupported version: {}",
                header.version
            )));
        }

        let payload_json = encryption::decrypt(encrypted, password)?;
        let kc_data: KeyChainData = serde_json::from_slice(&payload_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid payload: {e}")))?;

        Ok(Self::from_keychain(kc_data.to_keychain()))
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.network)
            .field("watch_only", &self.is_watch_only())
            .field("addresses", &self.addresses.len())
            .field("utxos", &self.utxos.len())
            .finish()
    }
}
