//! Greedy coin selection.
//!
//! UTXOs are consumed in the order the wallet supplies them. After each
//! added input the fee is recomputed for the current input count, and
//! selection stops as soon as `total - target - fee >= 0`. Token-carrying
//! outputs are never picked as plain XEC.

use tracing::debug;

use xec_core::constants::DUST_SATS;
use xec_core::types::Utxo;

use crate::error::WalletError;
use crate::fee::{FeeRate, calc_fee};

/// What the selected inputs must pay for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTarget {
    /// Sum of all non-change outputs in satoshis.
    pub amount: u64,
    /// P2PKH outputs counted in the size estimate, including the change slot.
    pub p2pkh_outputs: usize,
    /// Extra bytes for non-P2PKH outputs (e.g. OP_RETURN).
    pub extra_bytes: usize,
    /// Inputs already committed to the transaction (e.g. token UTXOs).
    pub fixed_inputs: usize,
    /// Value of the committed inputs in satoshis.
    pub fixed_value: u64,
}

impl SelectionTarget {
    /// Plain send of `amount` to `recipients` outputs plus change.
    pub fn send(amount: u64, recipients: usize) -> Self {
        Self {
            amount,
            p2pkh_outputs: recipients + 1,
            extra_bytes: 0,
            fixed_inputs: 0,
            fixed_value: 0,
        }
    }
}

/// Result of coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// UTXOs chosen, in input order.
    pub selected: Vec<Utxo>,
    /// Value of selected plus committed inputs.
    pub total_in: u64,
    /// Fee paid.
    pub fee: u64,
    /// `total_in - amount - fee`.
    pub change: u64,
}

impl CoinSelection {
    /// Change worth its own output. Smaller change is left to the fee.
    pub fn change_output(&self) -> Option<u64> {
        (self.change >= DUST_SATS).then_some(self.change)
    }
}

/// Greedy coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select UTXOs from `utxos` to cover `target` at `rate`.
    ///
    /// Fails with [`WalletError::InsufficientFunds`] when every spendable
    /// UTXO together still falls short.
    pub fn select(
        utxos: &[Utxo],
        target: &SelectionTarget,
        rate: FeeRate,
    ) -> Result<CoinSelection, WalletError> {
        let fee_at = |inputs: usize| {
            calc_fee(inputs, target.p2pkh_outputs, rate)
                .saturating_add(rate.fee_for_bytes(target.extra_bytes))
        };
        let remainder = |total: u64, fee: u64| {
            total
                .checked_sub(target.amount)
                .and_then(|r| r.checked_sub(fee))
        };

        let mut selected = Vec::new();
        let mut total = target.fixed_value;

        if target.fixed_inputs > 0 {
            let fee = fee_at(target.fixed_inputs);
            if let Some(change) = remainder(total, fee) {
                return Ok(CoinSelection {
                    selected,
                    total_in: total,
                    fee,
                    change,
                });
            }
        }

        for utxo in utxos.iter().filter(|u| !u.is_token()) {
            selected.push(utxo.clone());
            total = total.saturating_add(utxo.value);

            let fee = fee_at(target.fixed_inputs + selected.len());
            if let Some(change) = remainder(total, fee) {
                debug!(
                    inputs = selected.len(),
                    total,
                    fee,
                    change,
                    "coin selection complete"
                );
                return Ok(CoinSelection {
                    selected,
                    total_in: total,
                    fee,
                    change,
                });
            }
        }

        debug!(
            have = total,
            need = target.amount,
            "coin selection failed"
        );
        Err(WalletError::InsufficientFunds)
    }
}
