//! OP_RETURN message payloads.
//!
//! ```text
//! cashtab    6a 04 00746162 <utf8>
//! encrypted  6a 04 65746162 <epk || iv || ct || mac>
//! airdrop    6a 04 64726f70 <token id> [04 00746162 <utf8>]
//! ```
//!
//! Any other OP_RETURN is shown as its pushes decoded as lossy UTF-8 and
//! joined with spaces. eToken scripts are not messages.

use serde::{Deserialize, Serialize};

use xec_core::constants::app_prefix::{AIRDROP, CASHTAB, CASHTAB_ENCRYPTED, ETOKEN};
use xec_core::constants::{ENCRYPTED_MSG_BYTE_LIMIT, UNENCRYPTED_MSG_BYTE_LIMIT};
use xec_core::script::Script;
use xec_core::types::TokenId;

use crate::error::WalletError;

/// Shown in place of an encrypted message the wallet cannot open.
pub const UNDECRYPTABLE_MESSAGE: &str = "Only the message recipient can view this encrypted message";

/// Opens encrypted message payloads.
pub trait MessageDecryptor: Send + Sync {
    /// Plaintext of `payload`, or `None` if no key of ours opens it.
    fn decrypt(&self, payload: &[u8]) -> Option<Vec<u8>>;
}

/// Decryptor for contexts without keys, such as watch-only wallets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecryptor;

impl MessageDecryptor for NoDecryptor {
    fn decrypt(&self, _payload: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

/// A decoded OP_RETURN message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub text: String,
    /// Written with one of the cashtab prefixes.
    pub is_cashtab: bool,
    pub is_encrypted: bool,
    /// Only meaningful when `is_encrypted`.
    pub decryption_success: bool,
    pub airdrop_token_id: Option<TokenId>,
}

/// Reject messages over the plaintext or pre-encryption byte limit.
pub fn check_message_len(text: &str, encrypted: bool) -> Result<(), WalletError> {
    let limit = if encrypted {
        ENCRYPTED_MSG_BYTE_LIMIT
    } else {
        UNENCRYPTED_MSG_BYTE_LIMIT
    };
    if text.len() > limit {
        return Err(WalletError::MessageTooLong {
            len: text.len(),
            limit,
        });
    }
    Ok(())
}

/// Plain cashtab message script.
pub fn cashtab_message(text: &str) -> Result<Script, WalletError> {
    check_message_len(text, false)?;
    Ok(Script::op_return([&CASHTAB[..], text.as_bytes()])?)
}

/// Encrypted message script carrying a serialized ECIES payload.
pub fn encrypted_message(payload: &[u8]) -> Result<Script, WalletError> {
    Ok(Script::op_return([&CASHTAB_ENCRYPTED[..], payload])?)
}

/// Airdrop script tagging `token_id`, optionally followed by a cashtab message.
pub fn airdrop_message(token_id: &TokenId, text: Option<&str>) -> Result<Script, WalletError> {
    let id = token_id.to_display_bytes();
    let mut pushes: Vec<&[u8]> = vec![&AIRDROP[..], &id[..]];
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        check_message_len(text, false)?;
        pushes.push(&CASHTAB[..]);
        pushes.push(text.as_bytes());
    }
    Ok(Script::op_return(pushes)?)
}

/// Decode an OP_RETURN script as a message.
///
/// Returns `None` for non-OP_RETURN scripts, eToken scripts and empty data.
pub fn parse_op_return(script: &Script, decryptor: &dyn MessageDecryptor) -> Option<ParsedMessage> {
    let pushes = script.op_return_data().ok()?;
    let (prefix, rest) = pushes.split_first()?;

    match prefix.as_slice() {
        p if p == ETOKEN => None,
        p if p == CASHTAB => Some(ParsedMessage {
            text: join_lossy(rest),
            is_cashtab: true,
            ..Default::default()
        }),
        p if p == CASHTAB_ENCRYPTED => {
            let opened = rest.first().and_then(|payload| decryptor.decrypt(payload));
            Some(ParsedMessage {
                decryption_success: opened.is_some(),
                text: opened.map_or_else(
                    || UNDECRYPTABLE_MESSAGE.to_string(),
                    |plain| String::from_utf8_lossy(&plain).into_owned(),
                ),
                is_cashtab: true,
                is_encrypted: true,
                airdrop_token_id: None,
            })
        }
        p if p == AIRDROP => {
            let airdrop_token_id = rest
                .first()
                .and_then(|id| <[u8; 32]>::try_from(id.as_slice()).ok())
                .map(TokenId::from_display_bytes);
            let text = match rest.get(1) {
                Some(tag) if tag.as_slice() == CASHTAB => join_lossy(&rest[2..]),
                _ => String::new(),
            };
            Some(ParsedMessage {
                text,
                is_cashtab: true,
                airdrop_token_id,
                ..Default::default()
            })
        }
        _ => Some(ParsedMessage {
            text: join_lossy(&pushes),
            ..Default::default()
        }),
    }
}

fn join_lossy(pushes: &[Vec<u8>]) -> String {
    pushes
        .iter()
        .map(|p| String::from_utf8_lossy(p))
        .collect::<Vec<_>>()
        .join(" ")
}
