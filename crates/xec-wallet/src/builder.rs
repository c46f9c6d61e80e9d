//! Transaction builder with coin selection and signing.
//!
//! 1. Add recipients, an optional OP_RETURN and any committed inputs
//! 2. Build an unsigned transaction (performs coin selection)
//! 3. Sign every input with the wallet's keychain

use xec_core::address::Address;
use xec_core::constants::Network;
use xec_core::crypto::sign_input;
use xec_core::script::Script;
use xec_core::types::{Transaction, TxInput, TxOutput, Utxo};

use crate::amount::parse_xec_amount;
use crate::coin_selection::{CoinSelection, CoinSelector, SelectionTarget};
use crate::error::WalletError;
use crate::fee::{FeeRate, op_return_output_size};
use crate::keys::KeyChain;

/// Transaction version used for every wallet transaction.
pub const TX_VERSION: i32 = 2;

/// A transaction recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: Address,
    /// Amount in satoshis.
    pub amount: u64,
}

impl Recipient {
    /// Parse one-to-many input: one `address,amount` pair per line, amounts in XEC.
    ///
    /// Blank lines are ignored. An address without a prefix is read on
    /// `network`.
    pub fn parse_lines(text: &str, network: Network) -> Result<Vec<Self>, WalletError> {
        let mut out = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (addr, amount) = line
                .split_once(',')
                .ok_or_else(|| WalletError::InvalidAmount(format!("missing amount: {line}")))?;
            let address = Address::decode_for_network(addr.trim(), network)
                .map_err(|e| WalletError::InvalidAddress(format!("{addr}: {e}")))?;
            let amount = parse_xec_amount(amount).map_err(|e| match e {
                WalletError::InvalidSendValue => {
                    WalletError::InvalidAmount(format!("not a number: {line}"))
                }
                other => other,
            })?;
            out.push(Self { address, amount });
        }
        Ok(out)
    }
}

/// An unsigned transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    /// The transaction with empty input scripts.
    pub tx: Transaction,
    /// The coin selection used to fund it.
    pub selection: CoinSelection,
    /// Value and locking script of the output spent by each input.
    pub spent: Vec<(u64, Script)>,
}

/// Builder for constructing and signing transactions.
///
/// # Example
/// ```ignore
/// let unsigned = TransactionBuilder::new()
///     .add_recipient(&address, 10_000)
///     .build(&utxos, &change_address)?;
/// let signed = TransactionBuilder::sign(unsigned, &keychain)?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    op_return: Option<Script>,
    outputs: Vec<TxOutput>,
    fixed_inputs: Vec<Utxo>,
    fee_rate: FeeRate,
    lock_time: u32,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            op_return: None,
            outputs: Vec::new(),
            fixed_inputs: Vec::new(),
            fee_rate: FeeRate::default(),
            lock_time: 0,
        }
    }

    /// Pay `amount` satoshis to `address`.
    pub fn add_recipient(&mut self, address: &Address, amount: u64) -> &mut Self {
        self.outputs.push(TxOutput {
            value: amount,
            script: address.script(),
        });
        self
    }

    /// Append a raw output after any recipients added so far.
    pub fn add_output(&mut self, output: TxOutput) -> &mut Self {
        self.outputs.push(output);
        self
    }

    /// Spend `utxo` regardless of coin selection (token and baton inputs).
    pub fn add_input(&mut self, utxo: Utxo) -> &mut Self {
        self.fixed_inputs.push(utxo);
        self
    }

    /// Data output placed at index 0.
    pub fn set_op_return(&mut self, script: Script) -> &mut Self {
        self.op_return = Some(script);
        self
    }

    pub fn set_fee_rate(&mut self, rate: FeeRate) -> &mut Self {
        self.fee_rate = rate;
        self
    }

    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self
    }

    /// Select coins from `utxos` and lay out the unsigned transaction.
    ///
    /// Output order: OP_RETURN (if any), added outputs, then change to
    /// `change_address` when it clears the dust limit.
    pub fn build(
        &self,
        utxos: &[Utxo],
        change_address: &Address,
    ) -> Result<UnsignedTransaction, WalletError> {
        if self.outputs.is_empty() && self.op_return.is_none() {
            return Err(WalletError::BuildError("no outputs".into()));
        }

        let amount = self
            .outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
            .ok_or_else(|| WalletError::InvalidAmount("total amount overflow".into()))?;
        let fixed_value = self
            .fixed_inputs
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.value))
            .ok_or_else(|| WalletError::InvalidAmount("input total overflow".into()))?;

        let target = SelectionTarget {
            amount,
            p2pkh_outputs: self.outputs.len() + 1,
            extra_bytes: self.op_return.as_ref().map_or(0, op_return_output_size),
            fixed_inputs: self.fixed_inputs.len(),
            fixed_value,
        };

        let available: Vec<Utxo> = utxos
            .iter()
            .filter(|u| !self.fixed_inputs.iter().any(|f| f.outpoint == u.outpoint))
            .cloned()
            .collect();
        let selection = CoinSelector::select(&available, &target, self.fee_rate)?;

        let mut inputs = Vec::with_capacity(self.fixed_inputs.len() + selection.selected.len());
        let mut spent = Vec::with_capacity(inputs.capacity());
        for utxo in self.fixed_inputs.iter().chain(selection.selected.iter()) {
            inputs.push(TxInput::unsigned(utxo.outpoint));
            spent.push((utxo.value, utxo.script.clone()));
        }

        let mut outputs = Vec::with_capacity(self.outputs.len() + 2);
        if let Some(script) = &self.op_return {
            outputs.push(TxOutput {
                value: 0,
                script: script.clone(),
            });
        }
        outputs.extend(self.outputs.iter().cloned());
        if let Some(change) = selection.change_output() {
            outputs.push(TxOutput {
                value: change,
                script: change_address.script(),
            });
        }

        let tx = Transaction {
            version: TX_VERSION,
            inputs,
            outputs,
            lock_time: self.lock_time,
        };

        Ok(UnsignedTransaction {
            tx,
            selection,
            spent,
        })
    }

    /// Sign every input, finding each key by the spent output's hash160.
    pub fn sign(
        unsigned: UnsignedTransaction,
        keychain: &KeyChain,
    ) -> Result<Transaction, WalletError> {
        let mut tx = unsigned.tx;

        for (i, (value, script)) in unsigned.spent.iter().enumerate() {
            let hash = script
                .p2pkh_hash()
                .ok_or_else(|| WalletError::KeyNotFound(format!("non-P2PKH input {i}")))?;
            let kp = keychain
                .keypair_for_pubkey_hash(&hash)
                .ok_or_else(|| WalletError::KeyNotFound(format!("pubkey hash {}", hex::encode(hash))))?;
            sign_input(&mut tx, i, kp, *value, script)?;
        }

        Ok(tx)
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xec_core::constants::DUST_SATS;
    use xec_core::crypto::verify_input;
    use xec_core::types::{OutPoint, TxId};

    use crate::keys::Seed;

    fn setup() -> (KeyChain, Vec<Utxo>, Address) {
        let mut kc = KeyChain::new(Seed::from_bytes([1u8; 32]), Network::Mainnet);
        let owner = kc.address_at(0);
        let utxos = (0..3)
            .map(|i| Utxo {
                outpoint: OutPoint {
                    txid: TxId([i + 1; 32]),
                    vout: 0,
                },
                value: 10_000,
                script: owner.script(),
                height: Some(700_000),
                token_id: None,
                slp_token: None,
            })
            .collect();
        (kc, utxos, owner)
    }

    fn recipient() -> Address {
        Address::p2pkh([0xAA; 20], Network::Mainnet)
    }

    #[test]
    fn build_single_recipient_with_change() {
        let (_, utxos, owner) = setup();
        let unsigned = TransactionBuilder::new()
            .add_recipient(&recipient(), 5_000)
            .build(&utxos, &owner)
            .unwrap();

        assert_eq!(unsigned.tx.inputs.len(), 1);
        assert_eq!(unsigned.tx.outputs.len(), 2);
        assert_eq!(unsigned.tx.outputs[0].value, 5_000);
        assert_eq!(unsigned.tx.outputs[1].value, 10_000 - 5_000 - 229);
        assert_eq!(unsigned.tx.outputs[1].script, owner.script());
    }

    #[test]
    fn op_return_is_first_output() {
        let (_, utxos, owner) = setup();
        let data = Script::op_return([b"hi".as_slice()]).unwrap();
        let unsigned = TransactionBuilder::new()
            .set_op_return(data.clone())
            .add_recipient(&recipient(), 1_000)
            .build(&utxos, &owner)
            .unwrap();
        assert_eq!(unsigned.tx.outputs[0].script, data);
        assert_eq!(unsigned.tx.outputs[0].value, 0);
        assert_eq!(unsigned.tx.outputs[1].value, 1_000);
    }

    #[test]
    fn dust_change_dropped() {
        let (_, utxos, owner) = setup();
        let unsigned = TransactionBuilder::new()
            .add_recipient(&recipient(), 10_000 - 229 - (DUST_SATS - 1))
            .build(&utxos[..1], &owner)
            .unwrap();
        assert_eq!(unsigned.tx.outputs.len(), 1);
    }

    #[test]
    fn multi_input_signing_verifies() {
        let (kc, utxos, owner) = setup();
        let unsigned = TransactionBuilder::new()
            .add_recipient(&recipient(), 15_000)
            .add_recipient(&Address::p2pkh([0xBB; 20], Network::Mainnet), 3_000)
            .build(&utxos, &owner)
            .unwrap();
        let spent = unsigned.spent.clone();
        let tx = TransactionBuilder::sign(unsigned, &kc).unwrap();

        assert_eq!(tx.inputs.len(), 2);
        for (i, (value, script)) in spent.iter().enumerate() {
            verify_input(&tx, i, *value, script).unwrap();
        }
    }

    #[test]
    fn sign_with_foreign_key_fails() {
        let (_, utxos, owner) = setup();
        let unsigned = TransactionBuilder::new()
            .add_recipient(&recipient(), 1_000)
            .build(&utxos, &owner)
            .unwrap();
        let other = KeyChain::new(Seed::from_bytes([2u8; 32]), Network::Mainnet);
        assert!(matches!(
            TransactionBuilder::sign(unsigned, &other),
            Err(WalletError::KeyNotFound(_))
        ));
    }

    #[test]
    fn committed_inputs_come_first() {
        let (_, utxos, owner) = setup();
        let committed = utxos[2].clone();
        let unsigned = TransactionBuilder::new()
            .add_input(committed.clone())
            .add_recipient(&recipient(), 15_000)
            .build(&utxos, &owner)
            .unwrap();
        assert_eq!(unsigned.tx.inputs[0].prev_out, committed.outpoint);
        assert_eq!(unsigned.tx.inputs.len(), 2);
        assert_ne!(unsigned.tx.inputs[1].prev_out, committed.outpoint);
    }

    #[test]
    fn no_outputs_rejected() {
        let (_, utxos, owner) = setup();
        assert!(matches!(
            TransactionBuilder::new().build(&utxos, &owner),
            Err(WalletError::BuildError(_))
        ));
    }

    #[test]
    fn parse_one_to_many_lines() {
        let a = Address::p2pkh([0x01; 20], Network::Mainnet);
        let b = Address::p2pkh([0x02; 20], Network::Mainnet);
        let text = format!("{a}, 10\n\n{b},5.5\n");
        let parsed = Recipient::parse_lines(&text, Network::Mainnet).unwrap();
        assert_eq!(
            parsed,
            vec![
                Recipient { address: a, amount: 1_000 },
                Recipient { address: b, amount: 550 },
            ]
        );
    }

    #[test]
    fn parse_lines_rejects_missing_amount() {
        let a = Address::p2pkh([0x01; 20], Network::Mainnet);
        assert!(Recipient::parse_lines(&a.to_string(), Network::Mainnet).is_err());
        assert!(matches!(
            Recipient::parse_lines("nonsense,1", Network::Mainnet),
            Err(WalletError::InvalidAddress(_))
        ));
    }

    #[test]
    fn parse_lines_flags_dust_at_full_precision() {
        let a = Address::p2pkh([0x01; 20], Network::Mainnet);
        for amount in ["0", "5.49999999"] {
            assert_eq!(
                Recipient::parse_lines(&format!("{a},{amount}"), Network::Mainnet),
                Err(WalletError::Dust),
                "{amount}"
            );
        }
        assert!(matches!(
            Recipient::parse_lines(&format!("{a},ten"), Network::Mainnet),
            Err(WalletError::InvalidAmount(_))
        ));
    }
}
