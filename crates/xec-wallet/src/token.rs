//! eToken (SLP type 1) operations: create, send, mint and burn.
//!
//! Token outputs always carry [`ETOKEN_SATS`] and go to the wallet's
//! receive address unless they pay a recipient. Token inputs are committed
//! to the transaction up front; XEC coin selection then covers the token
//! outputs and the fee.

use serde::{Deserialize, Serialize};
use tracing::info;

use xec_core::address::Address;
use xec_core::constants::ETOKEN_SATS;
use xec_core::slp::{self, GenesisParams};
use xec_core::traits::ChainClient;
use xec_core::types::{TokenId, Utxo};

use crate::amount::to_base_units;
use crate::broadcast::{BroadcastResult, broadcast};
use crate::builder::TransactionBuilder;
use crate::error::WalletError;
use crate::fee::FeeRate;
use crate::keys::KeyChain;
use crate::wallet::Wallet;

/// Output index of the mint baton in GENESIS and MINT transactions.
const BATON_VOUT: u8 = 2;

/// User input for a new token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfig {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub document_url: String,
    #[serde(default)]
    pub document_hash: Option<[u8; 32]>,
    pub decimals: u8,
    /// Initial supply as decimal text, e.g. `"1000.5"`.
    pub initial_quantity: String,
    /// Keep a mint baton for later issuance.
    #[serde(default)]
    pub mint_baton: bool,
}

/// Token UTXOs of `token_id` picked in order until they cover `need`.
struct TokenSelection {
    inputs: Vec<Utxo>,
    total: u64,
}

fn token_utxos<'a>(utxos: &'a [Utxo], token_id: &TokenId) -> impl Iterator<Item = &'a Utxo> {
    utxos
        .iter()
        .filter(move |u| u.token_id.as_ref() == Some(token_id))
}

fn select_tokens(utxos: &[Utxo], token_id: &TokenId, need: u64) -> Result<TokenSelection, WalletError> {
    let mut candidates = token_utxos(utxos, token_id)
        .filter(|u| u.slp_token.is_some_and(|t| !t.is_mint_baton))
        .peekable();
    if candidates.peek().is_none() {
        return Err(WalletError::NoTokenUtxos);
    }

    let mut selection = TokenSelection {
        inputs: Vec::new(),
        total: 0,
    };
    for utxo in candidates {
        if selection.total >= need && !selection.inputs.is_empty() {
            break;
        }
        let amount = utxo.slp_token.map_or(0, |t| t.amount);
        selection.total = selection.total.saturating_add(amount);
        selection.inputs.push(utxo.clone());
    }

    if selection.total < need {
        return Err(WalletError::InsufficientTokenFunds {
            have: selection.total,
            need,
        });
    }
    Ok(selection)
}

async fn token_amount(
    client: &dyn ChainClient,
    token_id: &TokenId,
    amount: &str,
) -> Result<u64, WalletError> {
    let info = client.token(token_id).await?;
    let qty = to_base_units(amount, info.genesis_info.decimals)?;
    if qty == 0 {
        return Err(WalletError::InvalidAmount(format!("{amount} must be positive")));
    }
    Ok(qty)
}

async fn sign_and_broadcast(
    client: &dyn ChainClient,
    wallet: &Wallet,
    keychain: &KeyChain,
    builder: &TransactionBuilder,
    utxos: &[Utxo],
) -> Result<BroadcastResult, WalletError> {
    let unsigned = builder.build(utxos, wallet.change_address()?)?;
    let tx = TransactionBuilder::sign(unsigned, keychain)?;
    broadcast(client, &tx, wallet.network()).await
}

/// Issue a new token. The returned txid is the token id.
pub async fn create_token(
    client: &dyn ChainClient,
    wallet: &Wallet,
    utxos: &[Utxo],
    fee_rate: FeeRate,
    config: &GenesisConfig,
) -> Result<BroadcastResult, WalletError> {
    let keychain = wallet.signing_keychain()?;
    let own = wallet.change_address()?.clone();

    let params = GenesisParams {
        ticker: config.ticker.clone(),
        name: config.name.clone(),
        document_url: config.document_url.clone(),
        document_hash: config.document_hash,
        decimals: config.decimals,
        mint_baton_vout: config.mint_baton.then_some(BATON_VOUT),
        initial_quantity: to_base_units(&config.initial_quantity, u32::from(config.decimals))?,
    };
    let script = slp::genesis(&params)?;

    let mut builder = TransactionBuilder::new();
    builder
        .set_fee_rate(fee_rate)
        .set_op_return(script)
        .add_recipient(&own, ETOKEN_SATS);
    if config.mint_baton {
        builder.add_recipient(&own, ETOKEN_SATS);
    }

    let result = sign_and_broadcast(client, wallet, keychain, &builder, utxos).await?;
    info!(token_id = %result.txid, ticker = %config.ticker, "token created");
    Ok(result)
}

/// Send `amount` (decimal text) of a token to `destination`.
pub async fn send_token(
    client: &dyn ChainClient,
    wallet: &Wallet,
    utxos: &[Utxo],
    fee_rate: FeeRate,
    token_id: &TokenId,
    destination: &Address,
    amount: &str,
) -> Result<BroadcastResult, WalletError> {
    let keychain = wallet.signing_keychain()?;
    if token_utxos(utxos, token_id).next().is_none() {
        return Err(WalletError::NoTokenUtxos);
    }
    let qty = token_amount(client, token_id, amount).await?;
    let selection = select_tokens(utxos, token_id, qty)?;
    let change = selection.total - qty;

    let amounts: Vec<u64> = if change > 0 { vec![qty, change] } else { vec![qty] };
    let mut builder = TransactionBuilder::new();
    builder
        .set_fee_rate(fee_rate)
        .set_op_return(slp::send(token_id, &amounts)?)
        .add_recipient(destination, ETOKEN_SATS);
    if change > 0 {
        builder.add_recipient(wallet.change_address()?, ETOKEN_SATS);
    }
    for input in selection.inputs {
        builder.add_input(input);
    }

    let result = sign_and_broadcast(client, wallet, keychain, &builder, utxos).await?;
    info!(%token_id, qty, change, txid = %result.txid, "token sent");
    Ok(result)
}

/// Issue `amount` more of a token using the wallet's mint baton.
///
/// New tokens go to output 1 and the baton moves to output 2, both ours.
pub async fn mint_token(
    client: &dyn ChainClient,
    wallet: &Wallet,
    utxos: &[Utxo],
    fee_rate: FeeRate,
    token_id: &TokenId,
    amount: &str,
) -> Result<BroadcastResult, WalletError> {
    let keychain = wallet.signing_keychain()?;
    let baton = token_utxos(utxos, token_id)
        .find(|u| u.slp_token.is_some_and(|t| t.is_mint_baton))
        .cloned()
        .ok_or(WalletError::NoMintBaton)?;
    let qty = token_amount(client, token_id, amount).await?;
    let own = wallet.change_address()?;

    let mut builder = TransactionBuilder::new();
    builder
        .set_fee_rate(fee_rate)
        .set_op_return(slp::mint(token_id, Some(BATON_VOUT), qty)?)
        .add_recipient(own, ETOKEN_SATS)
        .add_recipient(own, ETOKEN_SATS)
        .add_input(baton);

    let result = sign_and_broadcast(client, wallet, keychain, &builder, utxos).await?;
    info!(%token_id, qty, txid = %result.txid, "token minted");
    Ok(result)
}

/// Destroy `amount` of a token by spending it without re-creating it.
///
/// The burn is a SEND carrying only the remainder back to the wallet.
pub async fn burn_token(
    client: &dyn ChainClient,
    wallet: &Wallet,
    utxos: &[Utxo],
    fee_rate: FeeRate,
    token_id: &TokenId,
    amount: &str,
) -> Result<BroadcastResult, WalletError> {
    let keychain = wallet.signing_keychain()?;
    if token_utxos(utxos, token_id).next().is_none() {
        return Err(WalletError::NoTokenUtxos);
    }
    let qty = token_amount(client, token_id, amount).await?;
    let selection = select_tokens(utxos, token_id, qty)?;
    let remainder = selection.total - qty;

    let mut builder = TransactionBuilder::new();
    builder
        .set_fee_rate(fee_rate)
        .set_op_return(slp::send(token_id, &[remainder])?)
        .add_recipient(wallet.change_address()?, ETOKEN_SATS);
    for input in selection.inputs {
        builder.add_input(input);
    }

    let result = sign_and_broadcast(client, wallet, keychain, &builder, utxos).await?;
    info!(%token_id, burned = qty, remainder, txid = %result.txid, "token burned");
    Ok(result)
}
