//! Cashaddr address encoding.
//!
//! Addresses are written `prefix:payload` where the prefix selects the
//! network (`ecash`, `ectest`, legacy `bitcoincash`) or the token view
//! (`etoken`). The payload is base32 over a version byte and a 20-byte
//! hash, followed by a 40-bit BCH checksum that commits to the prefix.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{Network, TOKEN_PREFIX};
use crate::crypto::{PublicKey, hash160};
use crate::error::AddressError;
use crate::script::Script;

/// Base32 character set for encoding 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Number of 5-bit checksum groups.
const CHECKSUM_LEN: usize = 8;

/// Kind of script an address pays to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

impl AddressKind {
    fn version_byte(&self) -> u8 {
        match self {
            Self::P2pkh => 0x00,
            Self::P2sh => 0x08,
        }
    }

    fn from_version_byte(v: u8) -> Result<Self, AddressError> {
        match v {
            0x00 => Ok(Self::P2pkh),
            0x08 => Ok(Self::P2sh),
            other => Err(AddressError::InvalidVersion(other)),
        }
    }
}

/// A cashaddr address: network, kind and 20-byte hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    kind: AddressKind,
    hash: [u8; 20],
}

impl Address {
    /// P2PKH address for a hash160.
    pub fn p2pkh(hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::P2pkh,
            hash,
        }
    }

    /// P2SH address for a script hash.
    pub fn p2sh(hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::P2sh,
            hash,
        }
    }

    /// P2PKH address of a public key.
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::p2pkh(hash160(&public_key.serialize()), network)
    }

    /// Address paid by a locking script, if it is P2PKH or P2SH.
    pub fn from_script(script: &Script, network: Network) -> Option<Self> {
        if let Some(h) = script.p2pkh_hash() {
            Some(Self::p2pkh(h, network))
        } else {
            script.p2sh_hash().map(|h| Self::p2sh(h, network))
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The 20-byte hash encoded in this address.
    pub fn hash(&self) -> &[u8; 20] {
        &self.hash
    }

    /// Locking script paying to this address.
    pub fn script(&self) -> Script {
        match self.kind {
            AddressKind::P2pkh => Script::p2pkh(&self.hash),
            AddressKind::P2sh => Script::p2sh(&self.hash),
        }
    }

    /// Encode with the network's default prefix.
    pub fn encode(&self) -> String {
        self.encode_with_prefix(self.network.prefix())
    }

    /// Encode with the `etoken:` prefix used for token receive addresses.
    pub fn encode_token(&self) -> String {
        self.encode_with_prefix(TOKEN_PREFIX)
    }

    /// Encode with an explicit prefix.
    pub fn encode_with_prefix(&self, prefix: &str) -> String {
        let mut raw = Vec::with_capacity(21);
        raw.push(self.kind.version_byte());
        raw.extend_from_slice(&self.hash);
        let payload = convert_bits(&raw, 8, 5, true).unwrap_or_default();
        let checksum = create_checksum(prefix, &payload);

        let mut out = String::with_capacity(prefix.len() + 1 + payload.len() + CHECKSUM_LEN);
        out.push_str(prefix);
        out.push(':');
        for &d in payload.iter().chain(checksum.iter()) {
            out.push(CHARSET[d as usize] as char);
        }
        out
    }

    /// Decode a prefixed cashaddr string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        Self::decode_inner(s, None)
    }

    /// Decode, assuming `network`'s prefix when none is written.
    pub fn decode_for_network(s: &str, network: Network) -> Result<Self, AddressError> {
        Self::decode_inner(s, Some(network))
    }

    fn decode_inner(s: &str, default_network: Option<Network>) -> Result<Self, AddressError> {
        let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::MixedCase);
        }
        let s = s.trim().to_ascii_lowercase();

        let (prefix, data_part) = match s.rfind(':') {
            Some(pos) => (s[..pos].to_string(), &s[pos + 1..]),
            None => {
                let network = default_network.ok_or(AddressError::MissingPrefix)?;
                (network.prefix().to_string(), s.as_str())
            }
        };

        let network =
            Network::from_prefix(&prefix).ok_or_else(|| AddressError::UnknownPrefix(prefix.clone()))?;

        if data_part.len() <= CHECKSUM_LEN {
            return Err(AddressError::InvalidLength);
        }

        let mut data = Vec::with_capacity(data_part.len());
        for c in data_part.chars() {
            let pos = CHARSET
                .iter()
                .position(|&ch| ch as char == c)
                .ok_or(AddressError::InvalidCharacter(c))?;
            data.push(pos as u8);
        }

        if !verify_checksum(&prefix, &data) {
            return Err(AddressError::InvalidChecksum);
        }

        let payload = &data[..data.len() - CHECKSUM_LEN];
        let raw = convert_bits(payload, 5, 8, false).ok_or(AddressError::InvalidPadding)?;
        if raw.len() != 21 {
            return Err(AddressError::InvalidLength);
        }

        let kind = AddressKind::from_version_byte(raw[0])?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&raw[1..]);

        Ok(Self {
            network,
            kind,
            hash,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

// --- Cashaddr internals ---

/// 40-bit BCH code polymod over 5-bit values.
fn polymod(values: &[u8]) -> u64 {
    const GEN: [u64; 5] = [
        0x98f2bc8e61,
        0x79b76d99e2,
        0xf33e5fb3c4,
        0xae2eabe2a8,
        0x1e4f43e470,
    ];
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        for (i, &g) in GEN.iter().enumerate() {
            if (c0 >> i) & 1 != 0 {
                c ^= g;
            }
        }
    }
    c ^ 1
}

/// Lower 5 bits of each prefix character followed by a zero separator.
fn prefix_expand(prefix: &str) -> Vec<u8> {
    let mut ret: Vec<u8> = prefix.bytes().map(|c| c & 0x1f).collect();
    ret.push(0);
    ret
}

fn create_checksum(prefix: &str, payload: &[u8]) -> Vec<u8> {
    let mut values = prefix_expand(prefix);
    values.extend_from_slice(payload);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let pm = polymod(&values);
    (0..CHECKSUM_LEN)
        .map(|i| ((pm >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f) as u8)
        .collect()
}

fn verify_checksum(prefix: &str, data: &[u8]) -> bool {
    let mut values = prefix_expand(prefix);
    values.extend_from_slice(data);
    polymod(&values) == 0
}

/// Convert between bit widths (e.g. 8-bit bytes to 5-bit groups).
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::new();
    let maxv = (1u32 << to_bits) - 1;
    for &value in data {
        let v = value as u32;
        if v >> from_bits != 0 {
            return None;
        }
        acc = (acc << from_bits) | v;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            ret.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            ret.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return None;
    }
    Some(ret)
}
