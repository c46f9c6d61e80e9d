//! Error types for the XEC wallet core.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("truncated transaction data at byte {0}")] Truncated(usize),
    #[error("trailing bytes after transaction: {0}")] TrailingBytes(usize),
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error("value overflow")] ValueOverflow,
    #[error("invalid txid: {0}")] InvalidTxId(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("truncated push at byte {0}")] Truncated(usize),
    #[error("not an OP_RETURN script")] NotOpReturn,
    #[error("not a P2PKH script")] NotP2pkh,
    #[error("push too large: {0} bytes")] PushTooLarge(usize),
    #[error("invalid hex: {0}")] InvalidHex(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid secret key bytes")] InvalidSecretKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("public key does not match the spent output")] PubkeyHashMismatch,
    #[error("invalid WIF: {0}")] InvalidWif(String),
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("unknown prefix: {0}")] UnknownPrefix(String),
    #[error("missing prefix")] MissingPrefix,
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid version: {0}")] InvalidVersion(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("mixed case")] MixedCase,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlpError {
    #[error("not an SLP script")] NotSlp,
    #[error("unsupported token type: {0}")] UnsupportedTokenType(u16),
    #[error("unknown transaction type: {0}")] UnknownTxType(String),
    #[error("invalid field {field}: {reason}")] InvalidField { field: &'static str, reason: String },
    #[error("too many SEND outputs: {0}")] TooManyOutputs(usize),
    #[error(transparent)] Script(#[from] ScriptError),
}

/// Failures reported by a [`ChainClient`](crate::traits::ChainClient).
///
/// Display is the bare message so node rejections reach the user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The node or indexer refused the request (e.g. `txn-mempool-conflict (code 18)`).
    #[error("{0}")] Rejected(String),
    /// The requested resource does not exist on the indexer.
    #[error("{0}")] NotFound(String),
    /// Connection or decoding failure.
    #[error("{0}")] Transport(String),
}

#[derive(Error, Debug)]
pub enum XecError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Script(#[from] ScriptError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Address(#[from] AddressError),
    #[error(transparent)] Slp(#[from] SlpError),
    #[error(transparent)] Client(#[from] ClientError),
}
