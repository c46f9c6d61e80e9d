//! Transaction history: flattening per-address pages and classifying txs.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use xec_core::address::Address;
use xec_core::constants::Network;
use xec_core::script::Script;
use xec_core::traits::ChainClient;
use xec_core::types::{ChainTx, HistoryPage, SlpTxType, TokenId, TokenInfo, TxId};

use crate::amount::format_base_units_trimmed;
use crate::error::WalletError;
use crate::message::{MessageDecryptor, ParsedMessage, parse_op_return};

/// A history entry tagged with the wallet address it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub address: Address,
    pub tx: ChainTx,
}

/// Merge per-address history pages into one list.
///
/// Duplicate txids keep their first occurrence. Unconfirmed entries come
/// first, then confirmed entries by height descending; ties keep their
/// input order. At most `tx_count` entries are returned.
pub fn flatten_transactions(
    histories: &[(Address, Vec<HistoryPage>)],
    tx_count: usize,
) -> Vec<HistoryEntry> {
    let mut seen = HashSet::new();
    let mut entries: Vec<HistoryEntry> = histories
        .iter()
        .flat_map(|(address, pages)| {
            pages
                .iter()
                .flat_map(|page| page.txs.iter())
                .map(move |tx| HistoryEntry {
                    address: address.clone(),
                    tx: tx.clone(),
                })
        })
        .filter(|entry| seen.insert(entry.tx.txid))
        .collect();

    entries.sort_by_key(|e| match e.tx.height() {
        None => (0, 0),
        Some(h) => (1, -i64::from(h)),
    });
    entries.truncate(tx_count);
    entries
}

/// What a transaction did from the wallet's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TxCategory {
    SendCash,
    ReceiveCash,
    SendToken,
    ReceiveToken,
    TokenGenesis,
    TokenMint,
    TokenBurn,
}

impl TxCategory {
    pub fn is_token(&self) -> bool {
        !matches!(self, Self::SendCash | Self::ReceiveCash)
    }
}

/// Token quantities in base units, before decimals are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmounts {
    /// Token outputs not paying the wallet.
    pub sent: u64,
    /// Token outputs paying the wallet.
    pub received: u64,
    /// Token inputs minus token outputs, when positive.
    pub burned: u64,
}

/// Token details for display, with decimals applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTokenInfo {
    pub token_id: TokenId,
    pub ticker: String,
    pub name: String,
    pub decimals: u32,
    pub qty_sent: String,
    pub qty_received: String,
    pub qty_burned: String,
}

/// A display-ready history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTx {
    pub txid: TxId,
    pub category: TxCategory,
    /// Some input spends a wallet output.
    pub outgoing: bool,
    /// Satoshis paid to addresses outside the wallet.
    pub amount_sent: u64,
    /// Satoshis paid to the wallet.
    pub amount_received: u64,
    pub destination_address: Option<Address>,
    pub token_id: Option<TokenId>,
    pub token_amounts: Option<TokenAmounts>,
    pub token: Option<ParsedTokenInfo>,
    pub message: Option<ParsedMessage>,
    pub height: Option<i32>,
    pub block_hash: Option<String>,
    pub timestamp: i64,
}

impl ParsedTx {
    pub fn is_token_tx(&self) -> bool {
        self.token_id.is_some()
    }

    pub fn is_airdrop(&self) -> bool {
        self.message
            .as_ref()
            .is_some_and(|m| m.airdrop_token_id.is_some())
    }
}

fn pays_wallet(script: &Script, wallet_hashes: &HashSet<[u8; 20]>) -> bool {
    script
        .p2pkh_hash()
        .is_some_and(|h| wallet_hashes.contains(&h))
}

/// Classify `tx` relative to the wallet owning `wallet_hashes`.
pub fn parse_tx(
    tx: &ChainTx,
    wallet_hashes: &HashSet<[u8; 20]>,
    network: Network,
    decryptor: &dyn MessageDecryptor,
) -> ParsedTx {
    let outgoing = tx.inputs.iter().any(|input| {
        input
            .output_script
            .as_ref()
            .is_some_and(|s| pays_wallet(s, wallet_hashes))
    });

    let mut amount_sent = 0u64;
    let mut amount_received = 0u64;
    for output in &tx.outputs {
        if pays_wallet(&output.output_script, wallet_hashes) {
            amount_received = amount_received.saturating_add(output.value);
        } else {
            amount_sent = amount_sent.saturating_add(output.value);
        }
    }

    let destination_address = if outgoing {
        tx.outputs
            .iter()
            .filter(|o| !pays_wallet(&o.output_script, wallet_hashes))
            .find_map(|o| Address::from_script(&o.output_script, network))
    } else {
        tx.inputs
            .first()
            .and_then(|i| i.output_script.as_ref())
            .and_then(|s| Address::from_script(s, network))
    };

    let message = tx
        .outputs
        .iter()
        .find(|o| o.output_script.is_op_return())
        .and_then(|o| parse_op_return(&o.output_script, decryptor));

    let slp = tx.slp_tx_data.as_ref();
    let token_amounts = slp.map(|d| {
        let token_in: u64 = tx
            .inputs
            .iter()
            .filter_map(|i| i.slp_token)
            .fold(0, |acc, t| acc.saturating_add(t.amount));
        let mut amounts = TokenAmounts::default();
        let mut token_out = 0u64;
        for output in &tx.outputs {
            let Some(t) = output.slp_token else { continue };
            token_out = token_out.saturating_add(t.amount);
            if pays_wallet(&output.output_script, wallet_hashes) {
                amounts.received = amounts.received.saturating_add(t.amount);
            } else {
                amounts.sent = amounts.sent.saturating_add(t.amount);
            }
        }
        if !matches!(d.slp_meta.tx_type, SlpTxType::Genesis | SlpTxType::Mint) {
            amounts.burned = token_in.saturating_sub(token_out);
        }
        amounts
    });

    let category = match slp.map(|d| d.slp_meta.tx_type) {
        Some(SlpTxType::Genesis) => TxCategory::TokenGenesis,
        Some(SlpTxType::Mint) => TxCategory::TokenMint,
        Some(SlpTxType::Burn) => TxCategory::TokenBurn,
        Some(SlpTxType::Send) if token_amounts.is_some_and(|a| a.burned > 0) => TxCategory::TokenBurn,
        Some(SlpTxType::Send) if outgoing => TxCategory::SendToken,
        Some(SlpTxType::Send) => TxCategory::ReceiveToken,
        _ if outgoing => TxCategory::SendCash,
        _ => TxCategory::ReceiveCash,
    };
    let is_token = category.is_token();

    ParsedTx {
        txid: tx.txid,
        category,
        outgoing,
        amount_sent,
        amount_received,
        destination_address,
        token_id: slp.filter(|_| is_token).map(|d| d.slp_meta.token_id),
        token_amounts: token_amounts.filter(|_| is_token),
        token: None,
        message,
        height: tx.height(),
        block_hash: tx.block.as_ref().map(|b| b.hash.clone()),
        timestamp: tx.timestamp(),
    }
}

/// Apply the token's ticker, name and decimals to a parsed token tx.
///
/// Returns `None` for cash transactions.
pub fn parse_token_info(parsed: &ParsedTx, token_info: &TokenInfo) -> Option<ParsedTokenInfo> {
    let amounts = parsed.token_amounts?;
    let info = &token_info.genesis_info;
    let fmt = |v| format_base_units_trimmed(v, info.decimals);
    Some(ParsedTokenInfo {
        token_id: token_info.token_id,
        ticker: info.token_ticker.clone(),
        name: info.token_name.clone(),
        decimals: info.decimals,
        qty_sent: fmt(amounts.sent),
        qty_received: fmt(amounts.received),
        qty_burned: fmt(amounts.burned),
    })
}

/// Fetch and parse `txids` in order, resolving token metadata once per token.
///
/// The first failed fetch aborts the whole call.
pub async fn parse_tx_data(
    client: &dyn ChainClient,
    txids: &[TxId],
    wallet_hashes: &HashSet<[u8; 20]>,
    network: Network,
    decryptor: &dyn MessageDecryptor,
) -> Result<Vec<ParsedTx>, WalletError> {
    let mut token_cache: HashMap<TokenId, TokenInfo> = HashMap::new();
    let mut parsed = Vec::with_capacity(txids.len());

    for txid in txids {
        let tx = client.tx(txid).await?;
        let mut record = parse_tx(&tx, wallet_hashes, network, decryptor);

        if let Some(token_id) = record.token_id {
            if !token_cache.contains_key(&token_id) {
                let info = client.token(&token_id).await?;
                token_cache.insert(token_id, info);
            }
            record.token = token_cache
                .get(&token_id)
                .and_then(|info| parse_token_info(&record, info));
        }

        debug!(%txid, category = ?record.category, "parsed tx");
        parsed.push(record);
    }
    Ok(parsed)
}
