//! Shared helpers for the end-to-end tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use xec_core::address::Address;
use xec_core::constants::Network;
use xec_core::crypto::verify_input;
use xec_core::error::ClientError;
use xec_core::script::Script;
use xec_core::slp::{self, GenesisParams, SlpMessage};
use xec_core::traits::ChainClient;
use xec_core::types::*;
use xec_wallet::{Seed, Wallet};

/// Height of the tip when a ledger is created.
pub const START_HEIGHT: i32 = 700_000;

const START_TIME: i64 = 1_650_000_000;

/// Deterministic wallet from a seed byte.
pub fn wallet(seed: u8) -> Wallet {
    Wallet::from_seed(Seed::from_bytes([seed; 32]), Network::Mainnet)
}

/// Address outside every test wallet.
pub fn external_address(byte: u8) -> Address {
    Address::p2pkh([byte; 20], Network::Mainnet)
}

#[derive(Default)]
struct State {
    height: i32,
    clock: i64,
    utxos: Vec<Utxo>,
    txs: HashMap<TxId, ChainTx>,
    /// Oldest first.
    history: HashMap<[u8; 20], Vec<TxId>>,
    tokens: HashMap<TokenId, TokenInfo>,
    broadcasts: Vec<Transaction>,
    reject_with: Option<String>,
    funding_nonce: u32,
}

/// In-memory indexer.
///
/// Broadcasts are checked (inputs exist, signatures verify, no inflation),
/// then applied: spent outputs leave the UTXO set, new P2PKH outputs join it
/// with their SLP token amounts, and the tx lands in the history of every
/// address it touches. Everything stays unconfirmed until [`Ledger::mine`].
pub struct Ledger {
    state: Mutex<State>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                height: START_HEIGHT,
                clock: START_TIME,
                ..Default::default()
            }),
        }
    }

    /// Pay `value` to `address` from [`external_address`]`(0xEE)`, confirmed.
    pub fn fund(&self, address: &Address, value: u64) -> OutPoint {
        let mut s = self.state.lock().unwrap();
        s.funding_nonce += 1;
        let tx = Transaction {
            version: 2,
            inputs: vec![TxInput::unsigned(OutPoint {
                txid: TxId([0xEE; 32]),
                vout: s.funding_nonce,
            })],
            outputs: vec![TxOutput {
                value,
                script: address.script(),
            }],
            lock_time: 0,
        };
        let spent = vec![ChainTxInput {
            prev_out: tx.inputs[0].prev_out,
            input_script: Script::default(),
            output_script: Some(external_address(0xEE).script()),
            value: value + 1_000,
            sequence_no: 0xffff_ffff,
            slp_token: None,
        }];
        let txid = apply(&mut s, &tx, spent);
        confirm(&mut s);
        OutPoint { txid, vout: 0 }
    }

    /// Confirm every pending transaction in a new block.
    pub fn mine(&self) {
        confirm(&mut self.state.lock().unwrap());
    }

    /// Make every following broadcast fail with `msg`.
    pub fn reject_with(&self, msg: &str) {
        self.state.lock().unwrap().reject_with = Some(msg.to_string());
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn height(&self) -> i32 {
        self.state.lock().unwrap().height
    }

    pub fn utxo_count(&self) -> usize {
        self.state.lock().unwrap().utxos.len()
    }
}

/// Attach `block` to every pending tx and UTXO.
fn confirm(s: &mut State) {
    s.height += 1;
    s.clock += 600;
    let block = BlockMetadata {
        hash: format!("{:064x}", s.height),
        height: s.height,
        timestamp: s.clock,
    };
    for tx in s.txs.values_mut().filter(|t| t.block.is_none()) {
        tx.block = Some(block.clone());
    }
    for utxo in s.utxos.iter_mut().filter(|u| u.height.is_none()) {
        utxo.height = Some(block.height);
    }
}

fn set_token(slots: &mut [Option<SlpToken>], vout: usize, amount: u64, is_mint_baton: bool) {
    if let Some(slot) = slots.get_mut(vout) {
        *slot = Some(SlpToken {
            amount,
            is_mint_baton,
        });
    }
}

fn genesis_info(p: &GenesisParams) -> SlpGenesisInfo {
    SlpGenesisInfo {
        token_ticker: p.ticker.clone(),
        token_name: p.name.clone(),
        token_document_url: p.document_url.clone(),
        token_document_hash: p.document_hash.map(hex::encode).unwrap_or_default(),
        decimals: p.decimals.into(),
    }
}

fn apply(s: &mut State, tx: &Transaction, inputs: Vec<ChainTxInput>) -> TxId {
    let txid = tx.txid();
    let message = tx
        .outputs
        .first()
        .filter(|o| o.script.is_op_return())
        .and_then(|o| slp::parse(&o.script).ok());

    let mut tokens: Vec<Option<SlpToken>> = vec![None; tx.outputs.len()];
    let token_id = match &message {
        Some(SlpMessage::Genesis(p)) => {
            set_token(&mut tokens, 1, p.initial_quantity, false);
            if let Some(v) = p.mint_baton_vout {
                set_token(&mut tokens, v.into(), 0, true);
            }
            Some(txid)
        }
        Some(SlpMessage::Mint {
            token_id,
            mint_baton_vout,
            quantity,
        }) => {
            set_token(&mut tokens, 1, *quantity, false);
            if let Some(v) = mint_baton_vout {
                set_token(&mut tokens, (*v).into(), 0, true);
            }
            Some(*token_id)
        }
        Some(SlpMessage::Send { token_id, amounts }) => {
            for (i, amount) in amounts.iter().enumerate() {
                set_token(&mut tokens, i + 1, *amount, false);
            }
            Some(*token_id)
        }
        None => None,
    };

    let slp_tx_data = message.as_ref().zip(token_id).map(|(m, token_id)| SlpTxData {
        slp_meta: SlpMeta {
            token_type: "FUNGIBLE".to_string(),
            tx_type: match m {
                SlpMessage::Genesis(_) => SlpTxType::Genesis,
                SlpMessage::Mint { .. } => SlpTxType::Mint,
                SlpMessage::Send { .. } => SlpTxType::Send,
            },
            token_id,
        },
        genesis_info: match m {
            SlpMessage::Genesis(p) => Some(genesis_info(p)),
            _ => None,
        },
    });

    s.clock += 1;
    if let Some(SlpMessage::Genesis(p)) = &message {
        s.tokens.insert(
            txid,
            TokenInfo {
                token_id: txid,
                genesis_info: genesis_info(p),
                block: None,
                time_first_seen: s.clock,
            },
        );
    }

    let spent: Vec<OutPoint> = inputs.iter().map(|i| i.prev_out).collect();
    s.utxos.retain(|u| !spent.contains(&u.outpoint));
    for (vout, output) in tx.outputs.iter().enumerate() {
        if output.script.p2pkh_hash().is_none() {
            continue;
        }
        s.utxos.push(Utxo {
            outpoint: OutPoint {
                txid,
                vout: vout as u32,
            },
            value: output.value,
            script: output.script.clone(),
            height: None,
            token_id: tokens[vout].and(token_id),
            slp_token: tokens[vout],
        });
    }

    let touched: Vec<[u8; 20]> = inputs
        .iter()
        .filter_map(|i| i.output_script.as_ref().and_then(Script::p2pkh_hash))
        .chain(tx.outputs.iter().filter_map(|o| o.script.p2pkh_hash()))
        .collect();
    for hash in touched {
        let entry = s.history.entry(hash).or_default();
        if !entry.contains(&txid) {
            entry.push(txid);
        }
    }

    let chain_tx = ChainTx {
        txid,
        version: tx.version,
        inputs,
        outputs: tx
            .outputs
            .iter()
            .zip(&tokens)
            .map(|(o, t)| ChainTxOutput {
                value: o.value,
                output_script: o.script.clone(),
                slp_token: *t,
                spent_by: None,
            })
            .collect(),
        lock_time: tx.lock_time,
        slp_tx_data,
        block: None,
        time_first_seen: s.clock,
        size: tx.size() as u32,
        is_coinbase: false,
    };
    s.txs.insert(txid, chain_tx);
    txid
}

#[async_trait]
impl ChainClient for Ledger {
    async fn broadcast_tx(&self, raw_hex: &str) -> Result<TxId, ClientError> {
        let mut s = self.state.lock().unwrap();
        if let Some(msg) = s.reject_with.clone() {
            return Err(ClientError::Rejected(msg));
        }
        let bytes = hex::decode(raw_hex).map_err(|e| ClientError::Transport(e.to_string()))?;
        let tx = Transaction::deserialize(&bytes)
            .map_err(|e| ClientError::Rejected(format!("TX decode failed: {e}")))?;

        let mut inputs = Vec::with_capacity(tx.inputs.len());
        for (index, input) in tx.inputs.iter().enumerate() {
            let utxo = s
                .utxos
                .iter()
                .find(|u| u.outpoint == input.prev_out)
                .cloned()
                .ok_or_else(|| {
                    ClientError::Rejected("bad-txns-inputs-missingorspent".to_string())
                })?;
            verify_input(&tx, index, utxo.value, &utxo.script).map_err(|_| {
                ClientError::Rejected("mandatory-script-verify-flag-failed".to_string())
            })?;
            inputs.push(ChainTxInput {
                prev_out: input.prev_out,
                input_script: input.script_sig.clone(),
                output_script: Some(utxo.script),
                value: utxo.value,
                sequence_no: input.sequence,
                slp_token: utxo.slp_token,
            });
        }

        let value_in: u64 = inputs.iter().map(|i| i.value).sum();
        let value_out = tx
            .total_output_value()
            .ok_or_else(|| ClientError::Rejected("bad-txns-txouttotal-toolarge".to_string()))?;
        if value_out > value_in {
            return Err(ClientError::Rejected("bad-txns-in-belowout".to_string()));
        }

        let txid = apply(&mut s, &tx, inputs);
        s.broadcasts.push(tx);
        Ok(txid)
    }

    async fn tx(&self, txid: &TxId) -> Result<ChainTx, ClientError> {
        self.state
            .lock()
            .unwrap()
            .txs
            .get(txid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Transaction not found: {txid}")))
    }

    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, ClientError> {
        let script = address.script();
        Ok(self
            .state
            .lock()
            .unwrap()
            .utxos
            .iter()
            .filter(|u| u.script == script)
            .cloned()
            .collect())
    }

    async fn history(
        &self,
        address: &Address,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, ClientError> {
        let s = self.state.lock().unwrap();
        let all: Vec<ChainTx> = s
            .history
            .get(address.hash())
            .map(|ids| ids.iter().rev().filter_map(|id| s.txs.get(id).cloned()).collect())
            .unwrap_or_default();
        let size = page_size.max(1) as usize;
        Ok(HistoryPage {
            num_pages: all.len().div_ceil(size) as u32,
            txs: all
                .into_iter()
                .skip(page as usize * size)
                .take(size)
                .collect(),
        })
    }

    async fn token(&self, token_id: &TokenId) -> Result<TokenInfo, ClientError> {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(token_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Token not found: {token_id}")))
    }
}
