//! [`ChainClient`] over the indexer's JSON REST interface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use xec_core::address::Address;
use xec_core::error::ClientError;
use xec_core::script::Script;
use xec_core::traits::ChainClient;
use xec_core::types::{ChainTx, HistoryPage, OutPoint, SlpToken, TokenId, TokenInfo, TxId, Utxo};

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpChainClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastRequest<'a> {
    raw_tx: &'a str,
}

#[derive(Deserialize)]
struct BroadcastResponse {
    txid: TxId,
}

#[derive(Deserialize)]
struct ErrorBody {
    msg: String,
}

#[derive(Deserialize)]
struct UtxosResponse {
    #[serde(default)]
    utxos: Vec<ScriptUtxos>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptUtxos {
    output_script: Script,
    utxos: Vec<IndexedUtxo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexedUtxo {
    outpoint: OutPoint,
    /// `-1` while unconfirmed.
    block_height: i32,
    value: u64,
    #[serde(default)]
    slp_meta: Option<UtxoSlpMeta>,
    #[serde(default)]
    slp_token: Option<SlpToken>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UtxoSlpMeta {
    token_id: TokenId,
}

impl IndexedUtxo {
    fn into_utxo(self, script: &Script) -> Utxo {
        Utxo {
            outpoint: self.outpoint,
            value: self.value,
            script: script.clone(),
            height: (self.block_height >= 0).then_some(self.block_height),
            token_id: self.slp_meta.map(|m| m.token_id),
            slp_token: self.slp_token,
        }
    }
}

impl HttpChainClient {
    /// Client for the indexer rooted at `base_url` (trailing slash optional).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        debug!(path, "indexer GET");
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json().await.map_err(transport);
    }
    let body = resp.text().await.map_err(transport)?;
    Err(error_from_body(status, &body))
}

/// Map a non-2xx response to a [`ClientError`], keeping the indexer's
/// message verbatim.
fn error_from_body(status: StatusCode, body: &str) -> ClientError {
    let msg = match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e.msg,
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body.trim().to_string(),
    };
    if status == StatusCode::NOT_FOUND {
        ClientError::NotFound(msg)
    } else {
        ClientError::Rejected(msg)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn broadcast_tx(&self, raw_hex: &str) -> Result<TxId, ClientError> {
        let resp = self
            .client
            .post(self.url("/broadcast-tx"))
            .json(&BroadcastRequest { raw_tx: raw_hex })
            .send()
            .await
            .map_err(transport)?;
        // A 404 here is a node rejection, never a missing resource.
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.map_err(transport)?;
            return Err(match error_from_body(status, &body) {
                ClientError::NotFound(msg) => ClientError::Rejected(msg),
                other => other,
            });
        }
        let body: BroadcastResponse = resp.json().await.map_err(transport)?;
        Ok(body.txid)
    }

    async fn tx(&self, txid: &TxId) -> Result<ChainTx, ClientError> {
        self.get(&format!("/tx/{txid}")).await
    }

    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, ClientError> {
        let hash = hex::encode(address.hash());
        let resp: UtxosResponse = self.get(&format!("/script/p2pkh/{hash}/utxos")).await?;
        Ok(resp
            .utxos
            .into_iter()
            .flat_map(|group| {
                let script = group.output_script;
                group
                    .utxos
                    .into_iter()
                    .map(move |u| u.into_utxo(&script))
            })
            .collect())
    }

    async fn history(
        &self,
        address: &Address,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, ClientError> {
        let hash = hex::encode(address.hash());
        self.get(&format!(
            "/script/p2pkh/{hash}/history?page={page}&page_size={page_size}"
        ))
        .await
    }

    async fn token(&self, token_id: &TokenId) -> Result<TokenInfo, ClientError> {
        self.get(&format!("/token/{token_id}")).await
    }
}
