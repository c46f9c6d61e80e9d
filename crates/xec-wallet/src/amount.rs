//! Exact decimal amounts.
//!
//! User input such as `"12.34"` XEC or `"0.000000001"` tokens is converted
//! to integer base units without floating point.

use xec_core::constants::{CASH_DECIMALS, DUST_SATS};

use crate::error::WalletError;

/// Parse a non-negative decimal string into base units.
///
/// ```
/// use xec_wallet::amount::to_base_units;
/// assert_eq!(to_base_units("12.34", 2).unwrap(), 1234);
/// assert_eq!(to_base_units("5", 2).unwrap(), 500);
/// assert!(to_base_units("0.001", 2).is_err());
/// ```
pub fn to_base_units(s: &str, decimals: u32) -> Result<u64, WalletError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(WalletError::InvalidAmount("empty".into()));
    }
    if s.starts_with('-') {
        return Err(WalletError::InvalidAmount(format!("negative: {s}")));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(WalletError::InvalidAmount(s.to_string()));
    }
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(WalletError::InvalidAmount(format!("not a number: {s}")));
    }
    if frac_part.len() > decimals as usize {
        return Err(WalletError::InvalidAmount(format!(
            "{s} has more than {decimals} decimal places"
        )));
    }

    let overflow = || WalletError::InvalidAmount(format!("too large: {s}"));
    let scale = 10u64.checked_pow(decimals).ok_or_else(overflow)?;

    let int_value = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<u64>().map_err(|_| overflow())?
    };

    let mut frac_value: u64 = 0;
    if !frac_part.is_empty() {
        let padded = format!("{frac_part:0<width$}", width = decimals as usize);
        frac_value = padded.parse::<u64>().map_err(|_| overflow())?;
    }

    int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(overflow)
}

/// Parse an XEC amount typed for a payment into satoshis.
///
/// Text that is not a number fails with `InvalidSendValue`. Any number
/// below [`DUST_SATS`] fails with `Dust`, compared at full precision, so
/// `"0"`, `"-3"` and `"5.49999999"` are all dust. Sub-satoshi precision on
/// an amount at or above the dust limit fails with `InvalidAmount`.
///
/// ```
/// use xec_wallet::amount::parse_xec_amount;
/// assert_eq!(parse_xec_amount("5.5").unwrap(), 550);
/// assert_eq!(parse_xec_amount("5.49999999").unwrap_err().to_string(), "dust");
/// ```
pub fn parse_xec_amount(s: &str) -> Result<u64, WalletError> {
    let s = s.trim();
    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let numeric = !(int_part.is_empty() && frac_part.is_empty())
        && all_digits(int_part)
        && all_digits(frac_part);
    if !numeric {
        return Err(WalletError::InvalidSendValue);
    }
    if negative {
        return Err(WalletError::Dust);
    }

    // Satoshis truncated toward zero; anything past the cents only adds
    // less than one satoshi, so the dust comparison stays exact.
    let cents = CASH_DECIMALS as usize;
    let (kept, extra) = frac_part.split_at(frac_part.len().min(cents));
    let sats = to_base_units(&format!("{int_part}.{kept}"), CASH_DECIMALS)?;
    if sats < DUST_SATS {
        return Err(WalletError::Dust);
    }
    if extra.bytes().any(|b| b != b'0') {
        return Err(WalletError::InvalidAmount(format!(
            "{s} has more than {CASH_DECIMALS} decimal places"
        )));
    }
    Ok(sats)
}

/// Format base units with exactly `decimals` fractional digits.
///
/// ```
/// use xec_wallet::amount::format_base_units;
/// assert_eq!(format_base_units(123_456, 2), "1,234.56");
/// assert_eq!(format_base_units(5, 0), "5");
/// ```
pub fn format_base_units(value: u64, decimals: u32) -> String {
    let (int_part, frac_part) = split(value, decimals);
    let grouped = group_thousands(&int_part.to_string());
    if decimals == 0 {
        grouped
    } else {
        format!("{grouped}.{frac_part:0>width$}", width = decimals as usize)
    }
}

/// Format base units without grouping, dropping trailing fractional zeros.
///
/// ```
/// use xec_wallet::amount::format_base_units_trimmed;
/// assert_eq!(format_base_units_trimmed(1_500_000_000, 9), "1.5");
/// assert_eq!(format_base_units_trimmed(2_000, 3), "2");
/// ```
pub fn format_base_units_trimmed(value: u64, decimals: u32) -> String {
    let (int_part, frac_part) = split(value, decimals);
    if decimals == 0 || frac_part == 0 {
        return int_part.to_string();
    }
    let frac = format!("{frac_part:0>width$}", width = decimals as usize);
    format!("{int_part}.{}", frac.trim_end_matches('0'))
}

fn split(value: u64, decimals: u32) -> (u64, u64) {
    match 10u64.checked_pow(decimals) {
        Some(scale) => (value / scale, value % scale),
        None => (0, value),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
