//! Trait interfaces between the wallet and the outside world.
//!
//! - [`ChainClient`] — indexer/node access (xec-client implements over HTTP)

use async_trait::async_trait;

use crate::address::Address;
use crate::error::ClientError;
use crate::types::{ChainTx, HistoryPage, TokenId, TokenInfo, TxId, Utxo};

/// Access to a chain indexer.
///
/// Every failure is reported immediately; implementations do not retry.
/// Node rejections must carry the node's message unchanged in
/// [`ClientError::Rejected`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit a raw transaction (lowercase hex). Returns the accepted txid.
    async fn broadcast_tx(&self, raw_hex: &str) -> Result<TxId, ClientError>;

    /// Fetch a transaction with its spent-output annotations.
    async fn tx(&self, txid: &TxId) -> Result<ChainTx, ClientError>;

    /// Unspent outputs paying to `address`.
    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, ClientError>;

    /// One page of `address`'s history, newest first.
    async fn history(
        &self,
        address: &Address,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, ClientError>;

    /// Genesis metadata of a token.
    async fn token(&self, token_id: &TokenId) -> Result<TokenInfo, ClientError>;
}
