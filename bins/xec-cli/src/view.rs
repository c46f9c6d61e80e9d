//! Terminal views over a wallet snapshot.
//!
//! Every renderer is a pure function of its inputs and returns the text to
//! print; the command handlers own all I/O.

use std::collections::HashMap;
use std::fmt::Write;

use qrcode::QrCode;
use qrcode::render::unicode;
use tracing::warn;

use xec_core::constants::CASH_DECIMALS;
use xec_core::types::{TokenId, TokenInfo};
use xec_wallet::amount::format_base_units;
use xec_wallet::history::ParsedTx;
use xec_wallet::{Balances, TokenHolding, TxCategory, Wallet};

pub const LOADING: &str = "Loading...";
pub const ZERO_BALANCE_NOTICE: &str =
    "You currently have 0 XEC\nDeposit some funds to use this feature";
pub const NO_WALLET_NOTICE: &str =
    "No wallet loaded. Create or restore a wallet to receive XEC.";

/// Read-only view of the wallet state shared by the renderers.
#[derive(Clone, Copy, Default)]
pub struct WalletContext<'a> {
    pub wallet: Option<&'a Wallet>,
    pub balances: Option<Balances>,
    pub loading: bool,
}

impl<'a> WalletContext<'a> {
    pub fn from_wallet(wallet: &'a Wallet) -> Self {
        Self {
            wallet: Some(wallet),
            balances: wallet.balances().copied(),
            loading: false,
        }
    }
}

pub fn format_xec(sats: u64) -> String {
    format!("{} XEC", format_base_units(sats, CASH_DECIMALS))
}

pub fn render_balance(ctx: &WalletContext<'_>) -> String {
    if ctx.loading {
        return LOADING.to_string();
    }
    match ctx.balances {
        Some(b) if b.total_sats > 0 => format_xec(b.total_sats),
        _ => ZERO_BALANCE_NOTICE.to_string(),
    }
}

/// Receive screen: QR code above the address.
///
/// With `token_mode` the address carries the `etoken:` prefix.
pub fn render_receive(ctx: &WalletContext<'_>, token_mode: bool) -> String {
    let Some(address) = ctx.wallet.and_then(Wallet::receive_address) else {
        return NO_WALLET_NOTICE.to_string();
    };
    let shown = if token_mode {
        address.encode_token()
    } else {
        address.encode()
    };

    let mut out = String::new();
    if let Some(qr) = render_qr(&shown) {
        let _ = writeln!(out, "{qr}");
    }
    out.push_str(&shown);
    out
}

fn render_qr(data: &str) -> Option<String> {
    match QrCode::new(data.as_bytes()) {
        Ok(code) => Some(
            code.render::<unicode::Dense1x2>()
                .dark_color(unicode::Dense1x2::Light)
                .light_color(unicode::Dense1x2::Dark)
                .quiet_zone(true)
                .build(),
        ),
        Err(e) => {
            warn!(error = %e, "cannot encode QR code");
            None
        }
    }
}

pub fn render_tokens(holdings: &[TokenHolding], infos: &HashMap<TokenId, TokenInfo>) -> String {
    if holdings.is_empty() {
        return "No eTokens in this wallet".to_string();
    }
    let mut out = String::new();
    for holding in holdings {
        let baton = if holding.has_baton { "  [mint baton]" } else { "" };
        match infos.get(&holding.token_id) {
            Some(info) => {
                let g = &info.genesis_info;
                let _ = writeln!(
                    out,
                    "{:<10} {:>24}  {}  {}{baton}",
                    g.token_ticker,
                    format_base_units(holding.amount, g.decimals),
                    g.token_name,
                    holding.token_id,
                );
            }
            None => {
                let _ = writeln!(out, "{:<10} {:>24}  {}{baton}", "?", holding.amount, holding.token_id);
            }
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn qty_or_raw(formatted: Option<&str>, raw: u64) -> String {
    formatted.map_or_else(|| raw.to_string(), str::to_string)
}

fn describe(tx: &ParsedTx) -> String {
    let token = tx.token.as_ref();
    let ticker = token.map_or("tokens", |t| t.ticker.as_str());
    let amounts = tx.token_amounts.unwrap_or_default();
    let sent = qty_or_raw(token.map(|t| t.qty_sent.as_str()), amounts.sent);
    let received = qty_or_raw(token.map(|t| t.qty_received.as_str()), amounts.received);
    let burned = qty_or_raw(token.map(|t| t.qty_burned.as_str()), amounts.burned);
    let peer = tx
        .destination_address
        .as_ref()
        .map(|a| a.encode())
        .unwrap_or_default();

    match tx.category {
        TxCategory::SendCash => format!("Sent -{} to {peer}", format_xec(tx.amount_sent)),
        TxCategory::ReceiveCash => {
            format!("Received +{} from {peer}", format_xec(tx.amount_received))
        }
        TxCategory::SendToken => format!("Sent {sent} {ticker} to {peer}"),
        TxCategory::ReceiveToken => format!("Received {received} {ticker} from {peer}"),
        TxCategory::TokenGenesis => format!("Created {received} {ticker}"),
        TxCategory::TokenMint => format!("Minted {received} {ticker}"),
        TxCategory::TokenBurn => format!("Burned {burned} {ticker}"),
    }
}

pub fn render_history(records: &[ParsedTx]) -> String {
    if records.is_empty() {
        return "No transactions yet".to_string();
    }
    let mut out = String::new();
    for tx in records {
        let when = chrono::DateTime::from_timestamp(tx.timestamp, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = if tx.height.is_none() { " (unconfirmed)" } else { "" };
        let airdrop = if tx.is_airdrop() { "[airdrop] " } else { "" };
        let _ = writeln!(out, "{when}{status}  {airdrop}{}", describe(tx));
        let _ = writeln!(out, "    {}", tx.txid);
        if let Some(msg) = &tx.message {
            let tag = if msg.is_encrypted { " (encrypted)" } else { "" };
            let _ = writeln!(out, "    message{tag}: {}", msg.text);
        }
    }
    out.truncate(out.trim_end().len());
    out
}
