//! In-memory chain client for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use xec_core::address::Address;
use xec_core::error::ClientError;
use xec_core::traits::ChainClient;
use xec_core::types::{ChainTx, HistoryPage, TokenId, TokenInfo, Transaction, TxId, Utxo};

#[derive(Default)]
pub(crate) struct MockChainClient {
    utxos: Mutex<HashMap<[u8; 20], Vec<Utxo>>>,
    history: Mutex<HashMap<[u8; 20], Vec<ChainTx>>>,
    txs: Mutex<HashMap<TxId, ChainTx>>,
    tokens: Mutex<HashMap<TokenId, TokenInfo>>,
    broadcasts: Mutex<Vec<Transaction>>,
    reject_with: Mutex<Option<String>>,
}

impl MockChainClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_utxo(&self, address: &Address, utxo: Utxo) {
        self.utxos
            .lock()
            .unwrap()
            .entry(*address.hash())
            .or_default()
            .push(utxo);
    }

    /// Append to the address history (newest last) and index the tx.
    pub(crate) fn add_history(&self, address: &Address, tx: ChainTx) {
        self.txs.lock().unwrap().insert(tx.txid, tx.clone());
        self.history
            .lock()
            .unwrap()
            .entry(*address.hash())
            .or_default()
            .push(tx);
    }

    pub(crate) fn add_tx(&self, tx: ChainTx) {
        self.txs.lock().unwrap().insert(tx.txid, tx);
    }

    pub(crate) fn add_token(&self, info: TokenInfo) {
        self.tokens.lock().unwrap().insert(info.token_id, info);
    }

    pub(crate) fn reject_with(&self, msg: &str) {
        *self.reject_with.lock().unwrap() = Some(msg.to_string());
    }

    pub(crate) fn broadcasts(&self) -> Vec<Transaction> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn broadcast_tx(&self, raw_hex: &str) -> Result<TxId, ClientError> {
        if let Some(msg) = self.reject_with.lock().unwrap().clone() {
            return Err(ClientError::Rejected(msg));
        }
        let bytes = hex::decode(raw_hex).map_err(|e| ClientError::Transport(e.to_string()))?;
        let tx = Transaction::deserialize(&bytes).map_err(|e| ClientError::Rejected(e.to_string()))?;
        let txid = tx.txid();
        self.broadcasts.lock().unwrap().push(tx);
        Ok(txid)
    }

    async fn tx(&self, txid: &TxId) -> Result<ChainTx, ClientError> {
        self.txs
            .lock()
            .unwrap()
            .get(txid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("tx not found: {txid}")))
    }

    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, ClientError> {
        Ok(self
            .utxos
            .lock()
            .unwrap()
            .get(address.hash())
            .cloned()
            .unwrap_or_default())
    }

    async fn history(
        &self,
        address: &Address,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, ClientError> {
        let all: Vec<ChainTx> = self
            .history
            .lock()
            .unwrap()
            .get(address.hash())
            .map(|txs| txs.iter().rev().cloned().collect())
            .unwrap_or_default();
        let size = page_size.max(1) as usize;
        let num_pages = all.len().div_ceil(size) as u32;
        let txs = all
            .into_iter()
            .skip(page as usize * size)
            .take(size)
            .collect();
        Ok(HistoryPage { txs, num_pages })
    }

    async fn token(&self, token_id: &TokenId) -> Result<TokenInfo, ClientError> {
        self.tokens
            .lock()
            .unwrap()
            .get(token_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("token not found: {token_id}")))
    }
}
