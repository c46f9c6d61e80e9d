//! SLP token type 1 OP_RETURN scripts.
//!
//! Layout after `OP_RETURN`:
//!
//! ```text
//! "SLP\0" <token_type> "GENESIS" <ticker> <name> <doc_url> <doc_hash> <decimals> <baton_vout> <qty>
//! "SLP\0" <token_type> "MINT"    <token_id> <baton_vout> <qty>
//! "SLP\0" <token_type> "SEND"    <token_id> <qty_1> ... <qty_n>
//! ```
//!
//! Quantities are 8-byte big-endian. Empty pushes are written as
//! `OP_PUSHDATA1 0x00`. The token id is pushed in display byte order.

use serde::{Deserialize, Serialize};

use crate::constants::app_prefix;
use crate::error::SlpError;
use crate::script::{OP_PUSHDATA1, OP_RETURN, Script, push_data};
use crate::types::TokenId;

/// The only token type this wallet creates and understands.
pub const TOKEN_TYPE_1: u8 = 0x01;

/// Most token outputs a single SEND may address.
pub const MAX_SEND_OUTPUTS: usize = 19;

/// Highest allowed decimals value.
pub const MAX_DECIMALS: u8 = 9;

const GENESIS: &[u8] = b"GENESIS";
const MINT: &[u8] = b"MINT";
const SEND: &[u8] = b"SEND";

/// Parameters of a new token.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisParams {
    pub ticker: String,
    pub name: String,
    pub document_url: String,
    #[serde(default)]
    pub document_hash: Option<[u8; 32]>,
    pub decimals: u8,
    /// Output index receiving the mint baton, `None` for a fixed supply.
    #[serde(default)]
    pub mint_baton_vout: Option<u8>,
    /// Initial supply in base units, sent to output 1.
    pub initial_quantity: u64,
}

/// A parsed SLP message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlpMessage {
    Genesis(GenesisParams),
    Mint {
        token_id: TokenId,
        mint_baton_vout: Option<u8>,
        quantity: u64,
    },
    Send {
        token_id: TokenId,
        /// Quantity for outputs 1..=n, in order.
        amounts: Vec<u64>,
    },
}

impl SlpMessage {
    /// Token id of a MINT or SEND. GENESIS has none until mined.
    pub fn token_id(&self) -> Option<TokenId> {
        match self {
            Self::Genesis(_) => None,
            Self::Mint { token_id, .. } | Self::Send { token_id, .. } => Some(*token_id),
        }
    }
}

/// Build a GENESIS script.
pub fn genesis(params: &GenesisParams) -> Result<Script, SlpError> {
    if params.decimals > MAX_DECIMALS {
        return Err(SlpError::InvalidField {
            field: "decimals",
            reason: format!("{} > {MAX_DECIMALS}", params.decimals),
        });
    }
    if let Some(vout) = params.mint_baton_vout {
        check_baton_vout(vout)?;
    }
    let mut s = header(GENESIS)?;
    slp_push(&mut s, params.ticker.as_bytes())?;
    slp_push(&mut s, params.name.as_bytes())?;
    slp_push(&mut s, params.document_url.as_bytes())?;
    slp_push(&mut s, params.document_hash.as_ref().map_or(&[][..], |h| &h[..]))?;
    slp_push(&mut s, &[params.decimals])?;
    match params.mint_baton_vout {
        Some(vout) => slp_push(&mut s, &[vout])?,
        None => slp_push(&mut s, &[])?,
    }
    slp_push(&mut s, &params.initial_quantity.to_be_bytes())?;
    Ok(Script::from_bytes(s))
}

/// Build a SEND script for outputs 1..=amounts.len().
pub fn send(token_id: &TokenId, amounts: &[u64]) -> Result<Script, SlpError> {
    if amounts.is_empty() || amounts.len() > MAX_SEND_OUTPUTS {
        return Err(SlpError::TooManyOutputs(amounts.len()));
    }
    let mut s = header(SEND)?;
    slp_push(&mut s, &token_id.to_display_bytes())?;
    for amount in amounts {
        slp_push(&mut s, &amount.to_be_bytes())?;
    }
    Ok(Script::from_bytes(s))
}

/// Build a MINT script. New tokens go to output 1.
pub fn mint(
    token_id: &TokenId,
    mint_baton_vout: Option<u8>,
    quantity: u64,
) -> Result<Script, SlpError> {
    if let Some(vout) = mint_baton_vout {
        check_baton_vout(vout)?;
    }
    let mut s = header(MINT)?;
    slp_push(&mut s, &token_id.to_display_bytes())?;
    match mint_baton_vout {
        Some(vout) => slp_push(&mut s, &[vout])?,
        None => slp_push(&mut s, &[])?,
    }
    slp_push(&mut s, &quantity.to_be_bytes())?;
    Ok(Script::from_bytes(s))
}

/// Parse an OP_RETURN script as an SLP type 1 message.
pub fn parse(script: &Script) -> Result<SlpMessage, SlpError> {
    let chunks = script.op_return_data().map_err(|_| SlpError::NotSlp)?;
    let mut it = chunks.into_iter();

    if it.next().as_deref() != Some(&app_prefix::ETOKEN[..]) {
        return Err(SlpError::NotSlp);
    }

    let token_type = it.next().ok_or(SlpError::NotSlp)?;
    let token_type = match token_type.as_slice() {
        [t] => *t as u16,
        [hi, lo] => u16::from_be_bytes([*hi, *lo]),
        _ => {
            return Err(SlpError::InvalidField {
                field: "token_type",
                reason: format!("{} bytes", token_type.len()),
            });
        }
    };
    if token_type != TOKEN_TYPE_1 as u16 {
        return Err(SlpError::UnsupportedTokenType(token_type));
    }

    let tx_type = it.next().ok_or(SlpError::NotSlp)?;
    let rest: Vec<Vec<u8>> = it.collect();

    match tx_type.as_slice() {
        GENESIS => parse_genesis(&rest),
        MINT => parse_mint(&rest),
        SEND => parse_send(&rest),
        other => Err(SlpError::UnknownTxType(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn parse_genesis(f: &[Vec<u8>]) -> Result<SlpMessage, SlpError> {
    if f.len() != 7 {
        return Err(field_count("genesis", 7, f.len()));
    }
    let document_hash = match f[3].len() {
        0 => None,
        32 => {
            let mut h = [0u8; 32];
            h.copy_from_slice(&f[3]);
            Some(h)
        }
        n => return Err(invalid("document_hash", format!("{n} bytes"))),
    };
    let decimals = match f[4].as_slice() {
        [d] if *d <= MAX_DECIMALS => *d,
        _ => return Err(invalid("decimals", hex::encode(&f[4]))),
    };
    Ok(SlpMessage::Genesis(GenesisParams {
        ticker: String::from_utf8_lossy(&f[0]).into_owned(),
        name: String::from_utf8_lossy(&f[1]).into_owned(),
        document_url: String::from_utf8_lossy(&f[2]).into_owned(),
        document_hash,
        decimals,
        mint_baton_vout: parse_baton_vout(&f[5])?,
        initial_quantity: parse_qty("initial_quantity", &f[6])?,
    }))
}

fn parse_mint(f: &[Vec<u8>]) -> Result<SlpMessage, SlpError> {
    if f.len() != 3 {
        return Err(field_count("mint", 3, f.len()));
    }
    Ok(SlpMessage::Mint {
        token_id: parse_token_id(&f[0])?,
        mint_baton_vout: parse_baton_vout(&f[1])?,
        quantity: parse_qty("quantity", &f[2])?,
    })
}

fn parse_send(f: &[Vec<u8>]) -> Result<SlpMessage, SlpError> {
    if f.len() < 2 {
        return Err(field_count("send", 2, f.len()));
    }
    let amounts = f[1..]
        .iter()
        .map(|q| parse_qty("amount", q))
        .collect::<Result<Vec<_>, _>>()?;
    if amounts.len() > MAX_SEND_OUTPUTS {
        return Err(SlpError::TooManyOutputs(amounts.len()));
    }
    Ok(SlpMessage::Send {
        token_id: parse_token_id(&f[0])?,
        amounts,
    })
}

fn header(tx_type: &[u8]) -> Result<Vec<u8>, SlpError> {
    let mut s = vec![OP_RETURN];
    slp_push(&mut s, &app_prefix::ETOKEN)?;
    slp_push(&mut s, &[TOKEN_TYPE_1])?;
    slp_push(&mut s, tx_type)?;
    Ok(s)
}

/// Like `push_data` but empty pushes use `OP_PUSHDATA1 0x00`.
fn slp_push(buf: &mut Vec<u8>, data: &[u8]) -> Result<(), SlpError> {
    if data.is_empty() {
        buf.extend_from_slice(&[OP_PUSHDATA1, 0x00]);
        Ok(())
    } else {
        Ok(push_data(buf, data)?)
    }
}

fn check_baton_vout(vout: u8) -> Result<(), SlpError> {
    if vout < 2 {
        return Err(invalid("mint_baton_vout", format!("{vout} < 2")));
    }
    Ok(())
}

fn parse_baton_vout(b: &[u8]) -> Result<Option<u8>, SlpError> {
    match b {
        [] => Ok(None),
        [v] if *v >= 2 => Ok(Some(*v)),
        _ => Err(invalid("mint_baton_vout", hex::encode(b))),
    }
}

fn parse_qty(field: &'static str, b: &[u8]) -> Result<u64, SlpError> {
    let arr: [u8; 8] = b
        .try_into()
        .map_err(|_| invalid(field, format!("{} bytes", b.len())))?;
    Ok(u64::from_be_bytes(arr))
}

fn parse_token_id(b: &[u8]) -> Result<TokenId, SlpError> {
    let arr: [u8; 32] = b
        .try_into()
        .map_err(|_| invalid("token_id", format!("{} bytes", b.len())))?;
    Ok(TokenId::from_display_bytes(arr))
}

fn invalid(field: &'static str, reason: String) -> SlpError {
    SlpError::InvalidField { field, reason }
}

fn field_count(kind: &'static str, want: usize, got: usize) -> SlpError {
    invalid(kind, format!("expected {want} fields, got {got}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_id() -> TokenId {
        "bef614aac85c0c866f4d39e4d12a96851267d38d1bca5bdd6488bbd42e28b6b1"
            .parse()
            .unwrap()
    }

    fn params() -> GenesisParams {
        GenesisParams {
            ticker: "TBS".into(),
            name: "TestBits".into(),
            document_url: "https://cashtab.com/".into(),
            document_hash: None,
            decimals: 9,
            mint_baton_vout: Some(2),
            initial_quantity: 100_000_000_000_000,
        }
    }

    #[test]
    fn genesis_prefix_bytes() {
        let s = genesis(&params()).unwrap();
        assert!(s.to_hex().starts_with("6a04534c500001010747454e45534953"));
    }

    #[test]
    fn genesis_parses_back() {
        let s = genesis(&params()).unwrap();
        assert_eq!(parse(&s).unwrap(), SlpMessage::Genesis(params()));
    }

    #[test]
    fn genesis_empty_fields_use_pushdata1() {
        let p = GenesisParams {
            document_url: String::new(),
            mint_baton_vout: None,
            ..params()
        };
        let hex = genesis(&p).unwrap().to_hex();
        // empty url, empty hash, decimals 9, empty baton, quantity
        assert!(hex.contains("4c004c0001094c0008"));
    }

    #[test]
    fn genesis_rejects_decimals_above_nine() {
        let p = GenesisParams {
            decimals: 10,
            ..params()
        };
        assert!(matches!(
            genesis(&p),
            Err(SlpError::InvalidField { field: "decimals", .. })
        ));
    }

    #[test]
    fn genesis_rejects_baton_at_output_one() {
        let p = GenesisParams {
            mint_baton_vout: Some(1),
            ..params()
        };
        assert!(genesis(&p).is_err());
    }

    #[test]
    fn send_layout() {
        let s = send(&token_id(), &[3_000, 7]).unwrap();
        let hex = s.to_hex();
        assert!(hex.starts_with("6a04534c500001010453454e4420"));
        assert!(hex.contains("bef614aac85c0c866f4d39e4d12a96851267d38d1bca5bdd6488bbd42e28b6b1"));
        assert!(hex.ends_with("080000000000000bb8080000000000000007"));
    }

    #[test]
    fn send_parses_back() {
        let s = send(&token_id(), &[1, 2, 3]).unwrap();
        assert_eq!(
            parse(&s).unwrap(),
            SlpMessage::Send {
                token_id: token_id(),
                amounts: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn send_output_limits() {
        assert_eq!(send(&token_id(), &[]), Err(SlpError::TooManyOutputs(0)));
        assert_eq!(send(&token_id(), &[1; 20]), Err(SlpError::TooManyOutputs(20)));
        assert!(send(&token_id(), &[1; 19]).is_ok());
    }

    #[test]
    fn mint_parses_back() {
        let s = mint(&token_id(), Some(2), 500).unwrap();
        let msg = parse(&s).unwrap();
        assert_eq!(msg.token_id(), Some(token_id()));
        assert_eq!(
            msg,
            SlpMessage::Mint {
                token_id: token_id(),
                mint_baton_vout: Some(2),
                quantity: 500
            }
        );
    }

    #[test]
    fn mint_without_baton() {
        let s = mint(&token_id(), None, 1).unwrap();
        assert!(matches!(
            parse(&s).unwrap(),
            SlpMessage::Mint { mint_baton_vout: None, .. }
        ));
    }

    #[test]
    fn non_slp_prefix_rejected() {
        let s = Script::op_return([&app_prefix::CASHTAB[..], b"hi"]).unwrap();
        assert_eq!(parse(&s), Err(SlpError::NotSlp));
        assert_eq!(parse(&Script::p2pkh(&[0; 20])), Err(SlpError::NotSlp));
    }

    #[test]
    fn unsupported_token_type() {
        let s = Script::op_return([&app_prefix::ETOKEN[..], &[0x81], b"SEND"]).unwrap();
        assert_eq!(parse(&s), Err(SlpError::UnsupportedTokenType(0x81)));
    }

    #[test]
    fn unknown_tx_type() {
        let s = Script::op_return([&app_prefix::ETOKEN[..], &[0x01], b"COMMIT"]).unwrap();
        assert_eq!(parse(&s), Err(SlpError::UnknownTxType("COMMIT".into())));
    }

    #[test]
    fn short_quantity_rejected() {
        let tid = token_id().to_display_bytes();
        let s = Script::op_return([
            &app_prefix::ETOKEN[..],
            &[0x01],
            b"SEND",
            &tid[..],
            &[0, 1, 2],
        ])
        .unwrap();
        assert!(matches!(
            parse(&s),
            Err(SlpError::InvalidField { field: "amount", .. })
        ));
    }
}
