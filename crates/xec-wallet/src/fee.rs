//! Transaction size and fee estimation.
//!
//! Sizes use the fixed P2PKH estimate of 148 bytes per input and 34 bytes
//! per output plus 10 bytes of overhead. Rates are kept in milli-satoshis
//! per byte so `1.01 sat/B` stays exact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use xec_core::constants::DEFAULT_FEE_MSATS_PER_BYTE;
use xec_core::script::Script;
use xec_core::types::compact_size_len;

use crate::amount::{format_base_units_trimmed, to_base_units};
use crate::error::WalletError;

/// Fixed transaction overhead in bytes.
pub const TX_OVERHEAD_BYTES: usize = 10;

/// Estimated size of a signed P2PKH input.
pub const P2PKH_INPUT_BYTES: usize = 148;

/// Size of a P2PKH output.
pub const P2PKH_OUTPUT_BYTES: usize = 34;

/// Fee rate in milli-satoshis per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const fn from_msats_per_byte(msats: u64) -> Self {
        Self(msats)
    }

    pub fn msats_per_byte(&self) -> u64 {
        self.0
    }

    /// Fee in satoshis for `bytes`, rounded up.
    pub fn fee_for_bytes(&self, bytes: usize) -> u64 {
        (bytes as u64).saturating_mul(self.0).div_ceil(1_000)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(DEFAULT_FEE_MSATS_PER_BYTE)
    }
}

impl FromStr for FeeRate {
    type Err = WalletError;

    /// Parse a decimal sat/byte rate such as `"1.01"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_base_units(s, 3)
            .map(Self)
            .map_err(|_| WalletError::InvalidFeeRate(s.to_string()))
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/B", format_base_units_trimmed(self.0, 3))
    }
}

/// Estimated size of a transaction with only P2PKH inputs and outputs.
pub fn byte_count(p2pkh_inputs: usize, p2pkh_outputs: usize) -> usize {
    TX_OVERHEAD_BYTES + P2PKH_INPUT_BYTES * p2pkh_inputs + P2PKH_OUTPUT_BYTES * p2pkh_outputs
}

/// Fee for `input_count` P2PKH inputs and `output_count` P2PKH outputs.
///
/// ```
/// use xec_wallet::fee::{FeeRate, calc_fee};
/// let rate: FeeRate = "1.01".parse().unwrap();
/// assert_eq!(calc_fee(2, 2, rate), 378);
/// ```
pub fn calc_fee(input_count: usize, output_count: usize, rate: FeeRate) -> u64 {
    rate.fee_for_bytes(byte_count(input_count, output_count))
}

/// Serialized size of a zero-value output carrying `script`.
pub fn op_return_output_size(script: &Script) -> usize {
    8 + compact_size_len(script.len() as u64) + script.len()
}
