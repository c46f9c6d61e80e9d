//! ECIES message encryption compatible with ecies-lite defaults.
//!
//! ```text
//! h       = SHA256(ECDH(ephemeral, recipient).x)
//! ct      = AES-128-CBC(h[0..16], iv, PKCS7(msg))
//! mac     = HMAC-SHA256(h[16..32], epk || iv || ct)
//! payload = epk (65, uncompressed) || iv (16) || ct || mac (32)
//! ```

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use xec_core::address::Address;
use xec_core::crypto::{KeyPair, PublicKey, ecdh_x, sha256};
use xec_core::traits::ChainClient;

use crate::error::WalletError;
use crate::keys::KeyChain;
use crate::message::MessageDecryptor;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

const EPK_LEN: usize = 65;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const BLOCK_LEN: usize = 16;

/// History page size used while searching for a public key.
const PUBKEY_SCAN_PAGE_SIZE: u32 = 25;

/// An encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EciesPayload {
    /// Ephemeral public key, uncompressed.
    pub epk: [u8; EPK_LEN],
    pub iv: [u8; IV_LEN],
    pub ct: Vec<u8>,
    pub mac: [u8; MAC_LEN],
}

impl EciesPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EPK_LEN + IV_LEN + self.ct.len() + MAC_LEN);
        out.extend_from_slice(&self.epk);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ct);
        out.extend_from_slice(&self.mac);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let min = EPK_LEN + IV_LEN + BLOCK_LEN + MAC_LEN;
        if bytes.len() < min {
            return Err(WalletError::Decryption(format!(
                "payload too short: {} < {min}",
                bytes.len()
            )));
        }
        let ct_len = bytes.len() - EPK_LEN - IV_LEN - MAC_LEN;
        if ct_len % BLOCK_LEN != 0 {
            return Err(WalletError::Decryption(format!(
                "ciphertext length {ct_len} is not a multiple of {BLOCK_LEN}"
            )));
        }

        let (epk, rest) = bytes.split_at(EPK_LEN);
        let (iv, rest) = rest.split_at(IV_LEN);
        let (ct, mac) = rest.split_at(ct_len);

        let mut payload = Self {
            epk: [0u8; EPK_LEN],
            iv: [0u8; IV_LEN],
            ct: ct.to_vec(),
            mac: [0u8; MAC_LEN],
        };
        payload.epk.copy_from_slice(epk);
        payload.iv.copy_from_slice(iv);
        payload.mac.copy_from_slice(mac);
        Ok(payload)
    }

    fn mac_input(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(EPK_LEN + IV_LEN + self.ct.len());
        data.extend_from_slice(&self.epk);
        data.extend_from_slice(&self.iv);
        data.extend_from_slice(&self.ct);
        data
    }
}

fn shared_keys(secret: &KeyPair, public: &PublicKey) -> ([u8; 16], [u8; 16]) {
    let h = sha256(&ecdh_x(secret, public));
    let mut enc = [0u8; 16];
    let mut mac = [0u8; 16];
    enc.copy_from_slice(&h[..16]);
    mac.copy_from_slice(&h[16..]);
    (enc, mac)
}

/// Encrypt `msg` to `recipient` with a fresh ephemeral key and IV.
pub fn encrypt(recipient: &PublicKey, msg: &[u8]) -> Result<EciesPayload, WalletError> {
    use rand::RngCore;
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    encrypt_with(&KeyPair::generate(), iv, recipient, msg)
}

fn encrypt_with(
    ephemeral: &KeyPair,
    iv: [u8; IV_LEN],
    recipient: &PublicKey,
    msg: &[u8],
) -> Result<EciesPayload, WalletError> {
    let (enc_key, mac_key) = shared_keys(ephemeral, recipient);

    let ct = Aes128CbcEnc::new_from_slices(&enc_key, &iv)
        .map_err(|e| WalletError::Encryption(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(msg);

    let mut payload = EciesPayload {
        epk: ephemeral.public_key().serialize_uncompressed(),
        iv,
        ct,
        mac: [0u8; MAC_LEN],
    };

    let mut mac = HmacSha256::new_from_slice(&mac_key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    mac.update(&payload.mac_input());
    payload.mac.copy_from_slice(&mac.finalize().into_bytes());
    Ok(payload)
}

/// Decrypt `payload` with `keypair`. The MAC is checked before decryption.
pub fn decrypt(keypair: &KeyPair, payload: &EciesPayload) -> Result<Vec<u8>, WalletError> {
    let epk = PublicKey::from_slice(&payload.epk)?;
    let (enc_key, mac_key) = shared_keys(keypair, &epk);

    let mut mac = HmacSha256::new_from_slice(&mac_key)
        .map_err(|e| WalletError::Decryption(e.to_string()))?;
    mac.update(&payload.mac_input());
    mac.verify_slice(&payload.mac)
        .map_err(|_| WalletError::Decryption("bad MAC".into()))?;

    Aes128CbcDec::new_from_slices(&enc_key, &payload.iv)
        .map_err(|e| WalletError::Decryption(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(&payload.ct)
        .map_err(|_| WalletError::Decryption("bad padding".into()))
}

/// Public key of `address`, found in an input that spends one of its
/// outputs. Addresses that never spent have no known key.
pub async fn recipient_public_key(
    client: &dyn ChainClient,
    address: &Address,
) -> Result<PublicKey, WalletError> {
    let locking = address.script();
    let mut page = 0;
    loop {
        let history = client.history(address, page, PUBKEY_SCAN_PAGE_SIZE).await?;
        let found = history
            .txs
            .iter()
            .flat_map(|tx| tx.inputs.iter())
            .filter(|input| input.output_script.as_ref() == Some(&locking))
            .find_map(|input| input.input_script.p2pkh_unlock_pubkey())
            .and_then(|pk| PublicKey::from_slice(&pk).ok());

        if let Some(pk) = found {
            debug!(%address, page, "recipient public key found");
            return Ok(pk);
        }
        page += 1;
        if page >= history.num_pages {
            return Err(WalletError::PublicKeyNotFound(address.to_string()));
        }
    }
}

/// Look up the recipient's public key and encrypt `msg` to it.
pub async fn handle_encrypted_op_return(
    client: &dyn ChainClient,
    address: &Address,
    msg: &[u8],
) -> Result<EciesPayload, WalletError> {
    let pk = recipient_public_key(client, address).await?;
    encrypt(&pk, msg)
}

impl MessageDecryptor for KeyChain {
    fn decrypt(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let payload = EciesPayload::from_bytes(payload).ok()?;
        self.keypairs().find_map(|kp| decrypt(kp, &payload).ok())
    }
}
