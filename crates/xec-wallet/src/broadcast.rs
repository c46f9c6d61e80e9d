//! Transaction broadcast.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use xec_core::constants::Network;
use xec_core::traits::ChainClient;
use xec_core::types::{Transaction, TxId};

use crate::error::WalletError;

/// Outcome of a successful broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
    pub txid: TxId,
    /// `<explorer>/tx/<txid>` for the network the tx was sent on.
    pub explorer_url: String,
}

/// Submit a signed transaction.
///
/// Node rejections come back as [`WalletError::Network`] carrying the
/// node's message unchanged.
pub async fn broadcast(
    client: &dyn ChainClient,
    tx: &Transaction,
    network: Network,
) -> Result<BroadcastResult, WalletError> {
    let raw = tx.to_hex();
    let txid = client.broadcast_tx(&raw).await.map_err(|e| {
        warn!(error = %e, "broadcast rejected");
        WalletError::from(e)
    })?;

    if txid != tx.txid() {
        warn!(%txid, expected = %tx.txid(), "node returned unexpected txid");
    }

    let explorer_url = network.explorer_tx_url(&txid.to_string());
    info!(%txid, size = raw.len() / 2, "transaction broadcast");
    Ok(BroadcastResult { txid, explorer_url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xec_core::script::Script;
    use xec_core::types::{OutPoint, TxInput, TxOutput};

    use crate::mock::MockChainClient;

    fn tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TxInput::unsigned(OutPoint {
                txid: TxId([1; 32]),
                vout: 0,
            })],
            outputs: vec![TxOutput {
                value: 1_000,
                script: Script::p2pkh(&[2; 20]),
            }],
            lock_time: 0,
        }
    }

    #[tokio::test]
    async fn returns_txid_and_explorer_link() {
        let client = MockChainClient::new();
        let tx = tx();
        let result = broadcast(&client, &tx, Network::Mainnet).await.unwrap();
        assert_eq!(result.txid, tx.txid());
        assert_eq!(
            result.explorer_url,
            format!("https://explorer.bitcoinabc.org/tx/{}", tx.txid())
        );
        assert_eq!(client.broadcasts(), vec![tx]);
    }

    #[tokio::test]
    async fn testnet_link() {
        let client = MockChainClient::new();
        let result = broadcast(&client, &tx(), Network::Testnet).await.unwrap();
        assert!(result.explorer_url.starts_with("https://texplorer.bitcoinabc.org/tx/"));
    }

    #[tokio::test]
    async fn node_errors_pass_through() {
        for msg in [
            "insufficient priority (code 66)",
            "txn-mempool-conflict (code 18)",
            "too-long-mempool-chain, too many unconfirmed ancestors [limit: 50] (code 64)",
        ] {
            let client = MockChainClient::new();
            client.reject_with(msg);
            let err = broadcast(&client, &tx(), Network::Mainnet).await.unwrap_err();
            assert_eq!(err, WalletError::Network(msg.to_string()));
            assert_eq!(err.to_string(), msg);
        }
    }
}
