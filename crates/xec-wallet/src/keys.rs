//! Seed management and deterministic key derivation.
//!
//! Child secp256k1 keys are derived from a 32-byte master seed with BLAKE3's
//! keyed derivation. The scheme is deterministic and recoverable from the
//! seed (or its mnemonic) alone.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use xec_core::address::Address;
use xec_core::constants::Network;
use xec_core::crypto::KeyPair;

use crate::error::WalletError;

/// BLAKE3 KDF context for child key derivation.
const KDF_CONTEXT: &str = "xec-wallet-key-derivation-v1";

/// A 32-byte master seed for deterministic key derivation.
///
/// Secret material is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 32],
}

impl Seed {
    /// Generate a random seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Deterministic key derivation chain from a master seed.
pub struct KeyChain {
    seed: Seed,
    network: Network,
    next_index: u32,
    /// Cache of derived keypairs by index.
    keypairs: HashMap<u32, KeyPair>,
    /// Reverse lookup: hash160 -> derivation index.
    pubkey_hash_to_index: HashMap<[u8; 20], u32>,
}

impl KeyChain {
    pub fn new(seed: Seed, network: Network) -> Self {
        Self {
            seed,
            network,
            next_index: 0,
            keypairs: HashMap::new(),
            pubkey_hash_to_index: HashMap::new(),
        }
    }

    /// Derive (and cache) the keypair for a child index.
    pub fn derive_keypair(&mut self, index: u32) -> &KeyPair {
        self.keypairs.entry(index).or_insert_with(|| {
            let kp = derive_child_keypair(&self.seed, index);
            self.pubkey_hash_to_index.insert(kp.pubkey_hash(), index);
            kp
        })
    }

    /// Derive the next address, advancing the internal index.
    pub fn next_address(&mut self) -> Address {
        let index = self.next_index;
        self.next_index = self.next_index.saturating_add(1);
        self.address_at(index)
    }

    /// P2PKH address for a derivation index.
    pub fn address_at(&mut self, index: u32) -> Address {
        let network = self.network;
        Address::from_public_key(self.derive_keypair(index).public_key(), network)
    }

    /// Address of an already-derived index, without mutating the cache.
    pub fn derived_address(&self, index: u32) -> Option<Address> {
        self.keypairs
            .get(&index)
            .map(|kp| Address::from_public_key(kp.public_key(), self.network))
    }

    /// Look up the keypair owning a hash160.
    pub fn keypair_for_pubkey_hash(&self, hash: &[u8; 20]) -> Option<&KeyPair> {
        self.pubkey_hash_to_index
            .get(hash)
            .and_then(|idx| self.keypairs.get(idx))
    }

    /// Derive every key below `n`, used when restoring from a file.
    pub fn restore_to_index(&mut self, n: u32) {
        for i in 0..n {
            self.derive_keypair(i);
        }
        self.next_index = n;
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub(crate) fn seed(&self) -> &Seed {
        &self.seed
    }

    /// All derived keypairs, in no particular order.
    pub fn keypairs(&self) -> impl Iterator<Item = &KeyPair> {
        self.keypairs.values()
    }

    pub fn known_pubkey_hashes(&self) -> impl Iterator<Item = &[u8; 20]> {
        self.pubkey_hash_to_index.keys()
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("network", &self.network)
            .field("next_index", &self.next_index)
            .field("cached_keys", &self.keypairs.len())
            .finish()
    }
}

/// Serializable keychain state for the wallet file.
#[derive(Serialize, Deserialize, Clone)]
pub struct KeyChainData {
    pub seed: [u8; 32],
    pub network: Network,
    pub next_index: u32,
}

impl KeyChainData {
    pub fn from_keychain(keychain: &KeyChain) -> Self {
        Self {
            seed: *keychain.seed().as_bytes(),
            network: keychain.network(),
            next_index: keychain.next_index(),
        }
    }

    pub fn to_keychain(&self) -> KeyChain {
        let mut keychain = KeyChain::new(Seed::from_bytes(self.seed), self.network);
        keychain.restore_to_index(self.next_index);
        keychain
    }
}

impl Drop for KeyChainData {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

/// Derive a child keypair with BLAKE3.
///
/// A derived value outside the curve order is re-hashed with a counter,
/// keeping the result deterministic.
fn derive_child_keypair(seed: &Seed, index: u32) -> KeyPair {
    let mut ikm = Vec::with_capacity(40);
    ikm.extend_from_slice(seed.as_bytes());
    ikm.extend_from_slice(&index.to_le_bytes());
    let mut counter: u32 = 0;
    loop {
        let mut input = ikm.clone();
        input.extend_from_slice(&counter.to_le_bytes());
        let mut derived = blake3::derive_key(KDF_CONTEXT, &input);
        let kp = KeyPair::from_secret_bytes(derived);
        derived.zeroize();
        input.zeroize();
        if let Ok(kp) = kp {
            ikm.zeroize();
            return kp;
        }
        counter = counter.wrapping_add(1);
    }
}

/// Check that a seed yields a usable first key.
pub fn validate_seed(seed: &Seed) -> Result<(), WalletError> {
    let kp = derive_child_keypair(seed, 0);
    if kp.pubkey_hash() == [0u8; 20] {
        return Err(WalletError::KeyDerivation("degenerate key".into()));
    }
    Ok(())
}
