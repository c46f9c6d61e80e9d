//! Sending XEC to one or many recipients, with an optional message.

use tracing::info;

use xec_core::address::Address;
use xec_core::constants::DUST_SATS;
use xec_core::script::Script;
use xec_core::traits::ChainClient;
use xec_core::types::{TokenId, Utxo};

use crate::amount::parse_xec_amount;
use crate::broadcast::{BroadcastResult, broadcast};
use crate::builder::{Recipient, TransactionBuilder};
use crate::ecies::handle_encrypted_op_return;
use crate::error::WalletError;
use crate::fee::FeeRate;
use crate::message::{airdrop_message, cashtab_message, check_message_len, encrypted_message};
use crate::wallet::Wallet;

/// Who receives the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// One recipient. The amount is XEC text as typed by the user.
    Single {
        address: Address,
        amount: Option<String>,
    },
    /// Several recipients with amounts already in satoshis.
    OneToMany(Vec<Recipient>),
}

/// A send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub destination: Destination,
    pub message: Option<String>,
    /// Encrypt `message` to the single recipient.
    pub encrypt: bool,
    /// Tag the transaction as an airdrop to holders of this token.
    pub airdrop_token_id: Option<TokenId>,
}

impl SendRequest {
    /// Plain single-recipient send.
    pub fn single(address: Address, amount: &str) -> Self {
        Self {
            destination: Destination::Single {
                address,
                amount: Some(amount.to_string()),
            },
            message: None,
            encrypt: false,
            airdrop_token_id: None,
        }
    }

    pub fn one_to_many(recipients: Vec<Recipient>) -> Self {
        Self {
            destination: Destination::OneToMany(recipients),
            message: None,
            encrypt: false,
            airdrop_token_id: None,
        }
    }
}

/// Validate amounts in order: single value first, then dust.
fn resolve_recipients(destination: &Destination) -> Result<Vec<Recipient>, WalletError> {
    let recipients = match destination {
        Destination::Single { address, amount } => {
            let amount = amount
                .as_deref()
                .ok_or(WalletError::InvalidSendValue)
                .and_then(parse_xec_amount)?;
            vec![Recipient {
                address: address.clone(),
                amount,
            }]
        }
        Destination::OneToMany(recipients) => {
            if recipients.is_empty() {
                return Err(WalletError::BuildError("no recipients".into()));
            }
            recipients.clone()
        }
    };

    if recipients.iter().any(|r| r.amount < DUST_SATS) {
        return Err(WalletError::Dust);
    }
    Ok(recipients)
}

async fn message_script(
    client: &dyn ChainClient,
    request: &SendRequest,
    recipients: &[Recipient],
) -> Result<Option<Script>, WalletError> {
    let message = request.message.as_deref().filter(|m| !m.is_empty());

    if let Some(token_id) = &request.airdrop_token_id {
        return airdrop_message(token_id, message).map(Some);
    }
    let Some(message) = message else {
        return Ok(None);
    };
    if !request.encrypt {
        return cashtab_message(message).map(Some);
    }

    let [recipient] = recipients else {
        return Err(WalletError::BuildError(
            "encrypted messages need a single recipient".into(),
        ));
    };
    check_message_len(message, true)?;
    let payload = handle_encrypted_op_return(client, &recipient.address, message.as_bytes()).await?;
    encrypted_message(&payload.to_bytes()).map(Some)
}

/// Build, sign and broadcast an XEC payment funded from `utxos`.
///
/// Fails with `"Invalid singleSendValue"`, `"dust"` or
/// `"Insufficient funds"` (checked in that order) before anything is
/// broadcast. Node errors pass through unchanged.
pub async fn send_xec(
    client: &dyn ChainClient,
    wallet: &Wallet,
    utxos: &[Utxo],
    fee_rate: FeeRate,
    request: &SendRequest,
) -> Result<BroadcastResult, WalletError> {
    let recipients = resolve_recipients(&request.destination)?;
    let keychain = wallet.signing_keychain()?;
    let op_return = message_script(client, request, &recipients).await?;

    let mut builder = TransactionBuilder::new();
    builder.set_fee_rate(fee_rate);
    if let Some(script) = op_return {
        builder.set_op_return(script);
    }
    for r in &recipients {
        builder.add_recipient(&r.address, r.amount);
    }

    let unsigned = builder.build(utxos, wallet.change_address()?)?;
    info!(
        recipients = recipients.len(),
        inputs = unsigned.tx.inputs.len(),
        fee = unsigned.selection.fee,
        "sending XEC"
    );
    let tx = TransactionBuilder::sign(unsigned, keychain)?;
    broadcast(client, &tx, wallet.network()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use xec_core::constants::Network;
    use xec_core::constants::app_prefix::{AIRDROP, CASHTAB, CASHTAB_ENCRYPTED};
    use xec_core::crypto::KeyPair;
    use xec_core::types::{ChainTx, ChainTxInput, OutPoint, TxId};

    use crate::keys::Seed;
    use crate::message::{MessageDecryptor, NoDecryptor, parse_op_return};
    use crate::mock::MockChainClient;

    fn funded(values: &[u64]) -> (Wallet, Vec<Utxo>) {
        let wallet = Wallet::from_seed(Seed::from_bytes([11u8; 32]), Network::Mainnet);
        let owner = wallet.receive_address().unwrap().clone();
        let utxos = values
            .iter()
            .enumerate()
            .map(|(i, v)| Utxo {
                outpoint: OutPoint {
                    txid: TxId([i as u8 + 1; 32]),
                    vout: 1,
                },
                value: *v,
                script: owner.script(),
                height: Some(800_000),
                token_id: None,
                slp_token: None,
            })
            .collect();
        (wallet, utxos)
    }

    fn dest() -> Address {
        Address::p2pkh([0x33; 20], Network::Mainnet)
    }

    #[tokio::test]
    async fn single_send_builds_pays_and_changes() {
        let (wallet, utxos) = funded(&[100_000]);
        let client = MockChainClient::new();
        let result = send_xec(
            &client,
            &wallet,
            &utxos,
            FeeRate::default(),
            &SendRequest::single(dest(), "100"),
        )
        .await
        .unwrap();

        let sent = client.broadcasts();
        assert_eq!(sent.len(), 1);
        let tx = &sent[0];
        assert_eq!(result.txid, tx.txid());
        assert!(result.explorer_url.ends_with(&format!("/tx/{}", tx.txid())));
        assert_eq!(tx.outputs[0].value, 10_000);
        assert_eq!(tx.outputs[0].script, dest().script());
        assert_eq!(tx.outputs[1].value, 100_000 - 10_000 - 229);
        assert_eq!(&tx.outputs[1].script, &wallet.change_address().unwrap().script());
    }

    #[tokio::test]
    async fn validation_order() {
        let (wallet, utxos) = funded(&[1_000]);
        let client = MockChainClient::new();
        let rate = FeeRate::default();

        for bad in [None, Some("abc"), Some(""), Some("1,5")] {
            let req = SendRequest {
                destination: Destination::Single {
                    address: dest(),
                    amount: bad.map(str::to_string),
                },
                ..SendRequest::single(dest(), "1")
            };
            let err = send_xec(&client, &wallet, &utxos, rate, &req).await.unwrap_err();
            assert_eq!(err.to_string(), "Invalid singleSendValue", "{bad:?}");
        }

        for dust in ["0", "-3", "5.49", "5.49999999"] {
            let err = send_xec(&client, &wallet, &utxos, rate, &SendRequest::single(dest(), dust))
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "dust", "{dust}");
        }

        let err = send_xec(&client, &wallet, &utxos, rate, &SendRequest::single(dest(), "1000"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient funds");
        assert!(client.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn one_to_many_with_dust_rejected() {
        let (wallet, utxos) = funded(&[100_000]);
        let client = MockChainClient::new();
        let req = SendRequest::one_to_many(vec![
            Recipient { address: dest(), amount: 1_000 },
            Recipient { address: Address::p2pkh([0x44; 20], Network::Mainnet), amount: 549 },
        ]);
        let err = send_xec(&client, &wallet, &utxos, FeeRate::default(), &req)
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::Dust);
    }

    #[tokio::test]
    async fn one_to_many_pays_everyone() {
        let (wallet, utxos) = funded(&[3_000, 3_000]);
        let client = MockChainClient::new();
        let other = Address::p2pkh([0x44; 20], Network::Mainnet);
        let req = SendRequest::one_to_many(vec![
            Recipient { address: dest(), amount: 2_000 },
            Recipient { address: other.clone(), amount: 3_000 },
        ]);
        send_xec(&client, &wallet, &utxos, FeeRate::default(), &req)
            .await
            .unwrap();
        let tx = &client.broadcasts()[0];
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 2_000);
        assert_eq!(tx.outputs[1].script, other.script());
        // 6000 - 5000 - 413 = 587 change, above dust
        assert_eq!(tx.outputs[2].value, 587);
    }

    #[tokio::test]
    async fn cashtab_message_is_first_output() {
        let (wallet, utxos) = funded(&[100_000]);
        let client = MockChainClient::new();
        let req = SendRequest {
            message: Some("thanks".into()),
            ..SendRequest::single(dest(), "10")
        };
        send_xec(&client, &wallet, &utxos, FeeRate::default(), &req)
            .await
            .unwrap();
        let tx = &client.broadcasts()[0];
        let data = tx.outputs[0].script.op_return_data().unwrap();
        assert_eq!(data[0], CASHTAB);
        assert_eq!(tx.outputs[0].value, 0);
        assert_eq!(tx.outputs[1].value, 1_000);
    }

    #[tokio::test]
    async fn airdrop_tag() {
        let (wallet, utxos) = funded(&[100_000]);
        let client = MockChainClient::new();
        let token = TxId([0x5A; 32]);
        let req = SendRequest {
            message: Some("for holders".into()),
            airdrop_token_id: Some(token),
            ..SendRequest::single(dest(), "10")
        };
        send_xec(&client, &wallet, &utxos, FeeRate::default(), &req)
            .await
            .unwrap();
        let script = &client.broadcasts()[0].outputs[0].script;
        assert_eq!(script.op_return_data().unwrap()[0], AIRDROP);
        let parsed = parse_op_return(script, &NoDecryptor).unwrap();
        assert_eq!(parsed.airdrop_token_id, Some(token));
        assert_eq!(parsed.text, "for holders");
    }

    #[tokio::test]
    async fn encrypted_message_readable_by_recipient_only() {
        let (wallet, utxos) = funded(&[100_000]);
        let client = MockChainClient::new();

        let recipient_wallet = Wallet::from_seed(Seed::from_bytes([12u8; 32]), Network::Mainnet);
        let recipient = recipient_wallet.receive_address().unwrap().clone();
        let kp: &KeyPair = recipient_wallet
            .keychain()
            .unwrap()
            .keypair_for_pubkey_hash(recipient.hash())
            .unwrap();
        client.add_history(
            &recipient,
            ChainTx {
                txid: TxId([0x77; 32]),
                version: 2,
                inputs: vec![ChainTxInput {
                    prev_out: OutPoint { txid: TxId([0x78; 32]), vout: 0 },
                    input_script: Script::p2pkh_unlock(&[0x30; 70], &kp.public_key().serialize())
                        .unwrap(),
                    output_script: Some(recipient.script()),
                    value: 5_000,
                    sequence_no: 0xffff_ffff,
                    slp_token: None,
                }],
                outputs: vec![],
                lock_time: 0,
                slp_tx_data: None,
                block: None,
                time_first_seen: 0,
                size: 0,
                is_coinbase: false,
            },
        );

        let req = SendRequest {
            message: Some("psst".into()),
            encrypt: true,
            ..SendRequest::single(recipient.clone(), "10")
        };
        send_xec(&client, &wallet, &utxos, FeeRate::default(), &req)
            .await
            .unwrap();

        let script = &client.broadcasts()[0].outputs[0].script;
        assert_eq!(script.op_return_data().unwrap()[0], CASHTAB_ENCRYPTED);

        let kc = recipient_wallet.keychain().unwrap();
        let opened = parse_op_return(script, kc as &dyn MessageDecryptor).unwrap();
        assert!(opened.decryption_success);
        assert_eq!(opened.text, "psst");

        let sealed = parse_op_return(script, &NoDecryptor).unwrap();
        assert!(!sealed.decryption_success);
    }

    #[tokio::test]
    async fn encrypt_without_known_key_fails() {
        let (wallet, utxos) = funded(&[100_000]);
        let client = MockChainClient::new();
        let req = SendRequest {
            message: Some("psst".into()),
            encrypt: true,
            ..SendRequest::single(dest(), "10")
        };
        let err = send_xec(&client, &wallet, &utxos, FeeRate::default(), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::PublicKeyNotFound(_)));
    }

    #[tokio::test]
    async fn watch_only_rejected() {
        let (_, utxos) = funded(&[100_000]);
        let wallet = Wallet::watch_only(vec![dest()]).unwrap();
        let client = MockChainClient::new();
        let err = send_xec(&client, &wallet, &utxos, FeeRate::default(), &SendRequest::single(dest(), "10"))
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::InvalidWallet);
    }

    #[tokio::test]
    async fn node_rejection_verbatim() {
        let (wallet, utxos) = funded(&[100_000]);
        let client = MockChainClient::new();
        client.reject_with("txn-mempool-conflict (code 18)");
        let err = send_xec(&client, &wallet, &utxos, FeeRate::default(), &SendRequest::single(dest(), "10"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "txn-mempool-conflict (code 18)");
    }
}
