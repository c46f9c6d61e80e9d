//! Core protocol types: transactions, outpoints, UTXOs and indexer records.
//!
//! All monetary values are in satoshis (1 XEC = 100 satoshis).
//! Transactions serialize to the consensus wire format shared by every
//! Bitcoin-derived chain (little-endian integers, CompactSize counts).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::sha256d;
use crate::error::TransactionError;
use crate::script::Script;

/// A 32-byte transaction hash in wire (little-endian) order.
///
/// `Display` and `FromStr` use the conventional byte-reversed hex form
/// shown by explorers and indexers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxId(pub [u8; 32]);

/// Token ids are the txid of the GENESIS transaction.
pub type TokenId = TxId;

impl TxId {
    /// The all-zero hash.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Build from bytes in wire order.
    pub fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from bytes in display (big-endian) order, as pushed in SLP scripts.
    pub fn from_display_bytes(mut bytes: [u8; 32]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    /// Bytes in display (big-endian) order.
    pub fn to_display_bytes(&self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Bytes in wire order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_display_bytes()))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({self})")
    }
}

impl FromStr for TxId {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| TransactionError::InvalidTxId(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransactionError::InvalidTxId(s.to_string()))?;
        Ok(Self::from_display_bytes(arr))
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Transaction containing the referenced output.
    pub txid: TxId,
    /// Index of the output within the transaction.
    #[serde(rename = "outIdx")]
    pub vout: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A transaction input, spending a previous output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub prev_out: OutPoint,
    /// Unlocking script. Empty until signed.
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxInput {
    /// Unsigned input with the default final sequence number.
    pub fn unsigned(prev_out: OutPoint) -> Self {
        Self {
            prev_out,
            script_sig: Script::default(),
            sequence: 0xffff_ffff,
        }
    }
}

/// A transaction output, creating a new UTXO.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in satoshis.
    pub value: u64,
    /// Locking script.
    pub script: Script,
}

/// A transaction transferring value between scripts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Consensus wire encoding.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.prev_out.txid.as_bytes());
            buf.extend_from_slice(&input.prev_out.vout.to_le_bytes());
            write_compact_size(&mut buf, input.script_sig.len() as u64);
            buf.extend_from_slice(input.script_sig.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut buf, output.script.len() as u64);
            buf.extend_from_slice(output.script.as_bytes());
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// Parse the consensus wire encoding. Rejects trailing bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut r = Reader::new(bytes);
        let version = i32::from_le_bytes(r.array::<4>()?);
        let input_count = r.compact_size()?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            let txid = TxId(r.array::<32>()?);
            let vout = u32::from_le_bytes(r.array::<4>()?);
            let script_len = r.compact_size()? as usize;
            let script_sig = Script::from_bytes(r.take(script_len)?.to_vec());
            let sequence = u32::from_le_bytes(r.array::<4>()?);
            inputs.push(TxInput {
                prev_out: OutPoint { txid, vout },
                script_sig,
                sequence,
            });
        }
        let output_count = r.compact_size()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            let value = u64::from_le_bytes(r.array::<8>()?);
            let script_len = r.compact_size()? as usize;
            let script = Script::from_bytes(r.take(script_len)?.to_vec());
            outputs.push(TxOutput { value, script });
        }
        let lock_time = u32::from_le_bytes(r.array::<4>()?);
        if r.remaining() != 0 {
            return Err(TransactionError::TrailingBytes(r.remaining()));
        }
        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Transaction id: double SHA-256 of the wire encoding.
    pub fn txid(&self) -> TxId {
        TxId(sha256d(&self.serialize()))
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    /// Lowercase hex of the wire encoding, as submitted for broadcast.
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    fn estimated_size(&self) -> usize {
        10 + self.inputs.len() * 148 + self.outputs.len() * 34
    }
}

/// Append a CompactSize unsigned integer.
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Encoded length of a CompactSize integer.
pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < n {
            return Err(TransactionError::Truncated(self.pos));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn compact_size(&mut self) -> Result<u64, TransactionError> {
        let first = self.array::<1>()?[0];
        Ok(match first {
            0xfd => u16::from_le_bytes(self.array::<2>()?) as u64,
            0xfe => u32::from_le_bytes(self.array::<4>()?) as u64,
            0xff => u64::from_le_bytes(self.array::<8>()?),
            n => n as u64,
        })
    }
}

/// Token amount attached to an output (SLP type 1).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlpToken {
    /// Raw token quantity in base units (before applying decimals).
    pub amount: u64,
    /// Whether this output carries the token's mint baton.
    #[serde(default)]
    pub is_mint_baton: bool,
}

/// A spendable output owned by the wallet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub outpoint: OutPoint,
    /// Value in satoshis.
    pub value: u64,
    /// Locking script of the output.
    pub script: Script,
    /// Block height, `None` while unconfirmed.
    #[serde(default)]
    pub height: Option<i32>,
    /// Token id when the output carries tokens.
    #[serde(default)]
    pub token_id: Option<TokenId>,
    /// Token amount carried by the output.
    #[serde(default)]
    pub slp_token: Option<SlpToken>,
}

impl Utxo {
    /// True when the output carries tokens or a mint baton and must not be
    /// spent as plain XEC.
    pub fn is_token(&self) -> bool {
        self.slp_token.is_some()
    }
}

// ---------------------------------------------------------------------------
// Indexer records
// ---------------------------------------------------------------------------

/// Block a transaction was mined in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    pub hash: String,
    pub height: i32,
    pub timestamp: i64,
}

/// Input of an indexed transaction, annotated with the spent output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainTxInput {
    pub prev_out: OutPoint,
    pub input_script: Script,
    /// Locking script of the spent output (absent for coinbase).
    #[serde(default)]
    pub output_script: Option<Script>,
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub sequence_no: u32,
    #[serde(default)]
    pub slp_token: Option<SlpToken>,
}

/// Output of an indexed transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainTxOutput {
    pub value: u64,
    pub output_script: Script,
    #[serde(default)]
    pub slp_token: Option<SlpToken>,
    #[serde(default)]
    pub spent_by: Option<OutPoint>,
}

/// SLP transaction type as reported by the indexer.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlpTxType {
    Genesis,
    Send,
    Mint,
    Burn,
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlpMeta {
    pub token_type: String,
    pub tx_type: SlpTxType,
    pub token_id: TokenId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SlpGenesisInfo {
    pub token_ticker: String,
    pub token_name: String,
    #[serde(default)]
    pub token_document_url: String,
    #[serde(default)]
    pub token_document_hash: String,
    pub decimals: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlpTxData {
    pub slp_meta: SlpMeta,
    #[serde(default)]
    pub genesis_info: Option<SlpGenesisInfo>,
}

/// A transaction as returned by the indexer's `/tx/{txid}` endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainTx {
    pub txid: TxId,
    pub version: i32,
    pub inputs: Vec<ChainTxInput>,
    pub outputs: Vec<ChainTxOutput>,
    #[serde(default)]
    pub lock_time: u32,
    #[serde(default)]
    pub slp_tx_data: Option<SlpTxData>,
    #[serde(default)]
    pub block: Option<BlockMetadata>,
    #[serde(default)]
    pub time_first_seen: i64,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub is_coinbase: bool,
}

impl ChainTx {
    /// Block height, `None` while in the mempool.
    pub fn height(&self) -> Option<i32> {
        self.block.as_ref().map(|b| b.height)
    }

    /// Block timestamp, falling back to first-seen time for mempool txs.
    pub fn timestamp(&self) -> i64 {
        self.block
            .as_ref()
            .map(|b| b.timestamp)
            .unwrap_or(self.time_first_seen)
    }
}

/// One page of an address's transaction history, newest first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub txs: Vec<ChainTx>,
    pub num_pages: u32,
}

/// Token metadata returned by the indexer's `/token/{id}` endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub genesis_info: SlpGenesisInfo,
    #[serde(default)]
    pub block: Option<BlockMetadata>,
    #[serde(default)]
    pub time_first_seen: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TxInput::unsigned(OutPoint {
                txid: TxId([7u8; 32]),
                vout: 1,
            })],
            outputs: vec![
                TxOutput {
                    value: 1_000,
                    script: Script::p2pkh(&[0x11; 20]),
                },
                TxOutput {
                    value: 2_500,
                    script: Script::p2pkh(&[0x22; 20]),
                },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn txid_display_is_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let txid = TxId(bytes);
        let shown = txid.to_string();
        assert!(shown.ends_with("ab"));
        assert!(shown.starts_with("00"));
        assert_eq!(shown.parse::<TxId>().unwrap(), txid);
    }

    #[test]
    fn txid_parse_rejects_short_hex() {
        assert!(matches!(
            "1234f".parse::<TxId>(),
            Err(TransactionError::InvalidTxId(_))
        ));
    }

    #[test]
    fn serialize_layout() {
        let tx = sample_tx();
        let bytes = tx.serialize();
        // version
        assert_eq!(&bytes[..4], &2i32.to_le_bytes());
        // one input
        assert_eq!(bytes[4], 1);
        // empty script_sig + sequence + output count
        assert_eq!(bytes[4 + 1 + 32 + 4], 0);
        assert_eq!(bytes.len(), tx.size());
        // 4 + 1 + (32+4+1+4) + 1 + 2*(8+1+25) + 4
        assert_eq!(bytes.len(), 4 + 1 + 41 + 1 + 68 + 4);
    }

    #[test]
    fn deserialize_inverts_serialize() {
        let tx = sample_tx();
        let parsed = Transaction::deserialize(&tx.serialize()).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.txid(), tx.txid());
    }

    #[test]
    fn deserialize_truncated_fails() {
        let bytes = sample_tx().serialize();
        let err = Transaction::deserialize(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, TransactionError::Truncated(_)));
    }

    #[test]
    fn deserialize_trailing_fails() {
        let mut bytes = sample_tx().serialize();
        bytes.push(0);
        assert_eq!(
            Transaction::deserialize(&bytes).unwrap_err(),
            TransactionError::TrailingBytes(1)
        );
    }

    #[test]
    fn compact_size_boundaries() {
        for (n, len) in [(0xfcu64, 1), (0xfd, 3), (0xffff, 3), (0x1_0000, 5), (u64::MAX, 9)] {
            let mut buf = Vec::new();
            write_compact_size(&mut buf, n);
            assert_eq!(buf.len(), len);
            assert_eq!(compact_size_len(n), len);
        }
    }

    #[test]
    fn total_output_value_sums() {
        assert_eq!(sample_tx().total_output_value(), Some(3_500));
    }

    #[test]
    fn chain_tx_json_camel_case() {
        let json = serde_json::json!({
            "txid": "00".repeat(32),
            "version": 1,
            "inputs": [],
            "outputs": [{ "value": 546, "outputScript": "6a" }],
            "timeFirstSeen": 1333333337,
            "isCoinbase": false
        });
        let tx: ChainTx = serde_json::from_value(json).unwrap();
        assert_eq!(tx.height(), None);
        assert_eq!(tx.timestamp(), 1333333337);
        assert_eq!(tx.outputs[0].output_script.as_bytes(), &[0x6a]);
    }

    #[test]
    fn slp_tx_type_unknown_fallback() {
        let t: SlpTxType = serde_json::from_str("\"UNKNOWN_THING\"").unwrap();
        assert_eq!(t, SlpTxType::Unknown);
        let g: SlpTxType = serde_json::from_str("\"GENESIS\"").unwrap();
        assert_eq!(g, SlpTxType::Genesis);
    }
}
