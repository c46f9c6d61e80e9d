//! secp256k1 keys, hashing and transaction signatures.
//!
//! # Signing scheme
//!
//! Inputs are signed with `SIGHASH_ALL | SIGHASH_FORKID` over the BIP143
//! preimage, which commits to:
//! - version and lock_time
//! - the hash of all outpoints and of all sequence numbers
//! - the outpoint, script and value of the output being spent
//! - the hash of all outputs
//!
//! Each input can be signed independently and in any order.

use ripemd::Ripemd160;
use secp256k1::{Message, Secp256k1, ecdsa};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::constants::Network;
use crate::error::CryptoError;
use crate::script::Script;
use crate::types::{Transaction, write_compact_size};

/// `SIGHASH_ALL | SIGHASH_FORKID`.
pub const SIGHASH_ALL_FORKID: u32 = 0x41;

const WIF_MAINNET: u8 = 0x80;
const WIF_TESTNET: u8 = 0xef;
const WIF_COMPRESSED: u8 = 0x01;

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256, used for txids and signature hashes.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// `RIPEMD160(SHA256(data))`, the hash committed to by P2PKH outputs.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// secp256k1 keypair for signing inputs.
#[derive(Clone)]
pub struct KeyPair {
    secret: secp256k1::SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a random keypair from the thread RNG.
    pub fn generate() -> Self {
        let secp = Secp256k1::signing_only();
        let (secret, _) = secp.generate_keypair(&mut secp256k1::rand::thread_rng());
        Self::from_secret_key(secret)
    }

    /// Create a keypair from 32 bytes of secret key material.
    ///
    /// Fails when the bytes are zero or not below the curve order.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let secret =
            secp256k1::SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self::from_secret_key(secret))
    }

    fn from_secret_key(secret: secp256k1::SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = PublicKey(secp256k1::PublicKey::from_secret_key(&secp, &secret));
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Raw secret key bytes. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    pub(crate) fn secret_key(&self) -> &secp256k1::SecretKey {
        &self.secret
    }

    /// hash160 of the compressed public key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        self.public.pubkey_hash()
    }

    /// Sign a 32-byte digest, returning a DER-encoded low-S signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(*digest);
        secp.sign_ecdsa(&msg, &self.secret).serialize_der().to_vec()
    }

    /// Wallet Import Format with the compressed-key flag.
    pub fn to_wif(&self, network: Network) -> String {
        let version = match network {
            Network::Mainnet => WIF_MAINNET,
            Network::Testnet => WIF_TESTNET,
        };
        let mut data = Vec::with_capacity(34);
        data.push(version);
        data.extend_from_slice(&self.secret_bytes());
        data.push(WIF_COMPRESSED);
        bs58::encode(data).with_check().into_string()
    }

    /// Parse a compressed-key WIF for either network.
    pub fn from_wif(wif: &str) -> Result<Self, CryptoError> {
        let data = bs58::decode(wif.trim())
            .with_check(None)
            .into_vec()
            .map_err(|e| CryptoError::InvalidWif(e.to_string()))?;
        if data.len() != 34 || data[33] != WIF_COMPRESSED {
            return Err(CryptoError::InvalidWif("expected compressed key".into()));
        }
        if data[0] != WIF_MAINNET && data[0] != WIF_TESTNET {
            return Err(CryptoError::InvalidWif(format!("version byte {:#04x}", data[0])));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&data[1..33]);
        Self::from_secret_bytes(bytes)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public)
            .finish_non_exhaustive()
    }
}

/// Compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    /// Parse a compressed (33-byte) or uncompressed (65-byte) key.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        secp256k1::PublicKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// 33-byte compressed encoding.
    pub fn serialize(&self) -> [u8; 33] {
        self.0.serialize()
    }

    /// 65-byte uncompressed encoding.
    pub fn serialize_uncompressed(&self) -> [u8; 65] {
        self.0.serialize_uncompressed()
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.serialize())
    }

    pub(crate) fn inner(&self) -> &secp256k1::PublicKey {
        &self.0
    }

    /// Verify a DER signature over a 32-byte digest.
    pub fn verify_digest(&self, digest: &[u8; 32], der: &[u8]) -> Result<(), CryptoError> {
        let sig = ecdsa::Signature::from_der(der).map_err(|_| CryptoError::InvalidSignature)?;
        let secp = Secp256k1::verification_only();
        secp.verify_ecdsa(&Message::from_digest(*digest), &sig, &self.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.serialize()))
    }
}

/// x-coordinate of the ECDH shared point between `secret` and `public`.
pub fn ecdh_x(secret: &KeyPair, public: &PublicKey) -> [u8; 32] {
    let point = secp256k1::ecdh::shared_secret_point(public.inner(), secret.secret_key());
    let mut x = [0u8; 32];
    x.copy_from_slice(&point[..32]);
    x
}

/// BIP143 signature hash with the fork id for input `input_index`.
pub fn signing_hash(
    tx: &Transaction,
    input_index: usize,
    prev_value: u64,
    prev_script: &Script,
) -> Result<[u8; 32], CryptoError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        })?;

    let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for i in &tx.inputs {
        prevouts.extend_from_slice(i.prev_out.txid.as_bytes());
        prevouts.extend_from_slice(&i.prev_out.vout.to_le_bytes());
        sequences.extend_from_slice(&i.sequence.to_le_bytes());
    }

    let mut outputs = Vec::new();
    for o in &tx.outputs {
        outputs.extend_from_slice(&o.value.to_le_bytes());
        write_compact_size(&mut outputs, o.script.len() as u64);
        outputs.extend_from_slice(o.script.as_bytes());
    }

    let mut preimage = Vec::with_capacity(160 + prev_script.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&sha256d(&prevouts));
    preimage.extend_from_slice(&sha256d(&sequences));
    preimage.extend_from_slice(input.prev_out.txid.as_bytes());
    preimage.extend_from_slice(&input.prev_out.vout.to_le_bytes());
    write_compact_size(&mut preimage, prev_script.len() as u64);
    preimage.extend_from_slice(prev_script.as_bytes());
    preimage.extend_from_slice(&prev_value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&sha256d(&outputs));
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&SIGHASH_ALL_FORKID.to_le_bytes());

    Ok(sha256d(&preimage))
}

/// Sign a P2PKH input in place, writing `<sig||0x41> <pubkey>`.
pub fn sign_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
    prev_value: u64,
    prev_script: &Script,
) -> Result<(), CryptoError> {
    let sighash = signing_hash(tx, input_index, prev_value, prev_script)?;
    let mut sig = keypair.sign_digest(&sighash);
    sig.push(SIGHASH_ALL_FORKID as u8);
    let script_sig = Script::p2pkh_unlock(&sig, &keypair.public_key().serialize())
        .map_err(|_| CryptoError::InvalidSignature)?;
    tx.inputs[input_index].script_sig = script_sig;
    Ok(())
}

/// Verify a signed P2PKH input against the output it spends.
///
/// Checks that:
/// 1. The unlocking script is `<sig> <pubkey>` with a forkid sighash byte
/// 2. The public key hashes to the spent output's hash160
/// 3. The signature verifies against the BIP143 sighash
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    prev_value: u64,
    prev_script: &Script,
) -> Result<(), CryptoError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        })?;

    let expected = prev_script
        .p2pkh_hash()
        .ok_or(CryptoError::PubkeyHashMismatch)?;

    let ops = input
        .script_sig
        .ops()
        .map_err(|_| CryptoError::InvalidSignature)?;
    let (sig, pk) = match ops.as_slice() {
        [crate::script::ScriptOp::Push(sig), crate::script::ScriptOp::Push(pk)] => (sig, pk),
        _ => return Err(CryptoError::InvalidSignature),
    };

    let pk = PublicKey::from_slice(pk)?;
    if pk.pubkey_hash() != expected {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let (hash_type, der) = sig.split_last().ok_or(CryptoError::InvalidSignature)?;
    if *hash_type as u32 != SIGHASH_ALL_FORKID {
        return Err(CryptoError::InvalidSignature);
    }

    let sighash = signing_hash(tx, input_index, prev_value, prev_script)?;
    pk.verify_digest(&sighash, der)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutPoint, TxId, TxInput, TxOutput};

    fn one() -> KeyPair {
        let mut b = [0u8; 32];
        b[31] = 1;
        KeyPair::from_secret_bytes(b).unwrap()
    }

    fn spend_tx(kp: &KeyPair) -> (Transaction, Script) {
        let prev_script = Script::p2pkh(&kp.pubkey_hash());
        let tx = Transaction {
            version: 2,
            inputs: vec![
                TxInput::unsigned(OutPoint {
                    txid: TxId([1u8; 32]),
                    vout: 0,
                }),
                TxInput::unsigned(OutPoint {
                    txid: TxId([2u8; 32]),
                    vout: 3,
                }),
            ],
            outputs: vec![TxOutput {
                value: 9_000,
                script: Script::p2pkh(&[0x99; 20]),
            }],
            lock_time: 0,
        };
        (tx, prev_script)
    }

    #[test]
    fn generator_point_pubkey() {
        let kp = one();
        assert_eq!(
            kp.public_key().to_string(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(
            hex::encode(kp.pubkey_hash()),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn wif_known_vector() {
        let kp = one();
        let wif = kp.to_wif(Network::Mainnet);
        assert_eq!(wif, "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn");
        assert_eq!(KeyPair::from_wif(&wif).unwrap().secret_bytes(), kp.secret_bytes());
    }

    #[test]
    fn wif_testnet_roundtrip() {
        let kp = KeyPair::generate();
        let wif = kp.to_wif(Network::Testnet);
        assert_eq!(
            KeyPair::from_wif(&wif).unwrap().public_key(),
            kp.public_key()
        );
    }

    #[test]
    fn wif_bad_checksum_rejected() {
        let mut wif = one().to_wif(Network::Mainnet);
        wif.pop();
        wif.push('X');
        assert!(matches!(KeyPair::from_wif(&wif), Err(CryptoError::InvalidWif(_))));
    }

    #[test]
    fn zero_secret_rejected() {
        assert_eq!(
            KeyPair::from_secret_bytes([0u8; 32]).unwrap_err(),
            CryptoError::InvalidSecretKey
        );
    }

    #[test]
    fn debug_hides_secret() {
        let kp = KeyPair::generate();
        let debug = format!("{kp:?}");
        assert!(!debug.contains(&hex::encode(kp.secret_bytes())));
    }

    #[test]
    fn hash_functions() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(sha256d(b"abc"), sha256(&sha256(b"abc")));
    }

    #[test]
    fn pubkey_uncompressed_roundtrip() {
        let kp = KeyPair::generate();
        let full = kp.public_key().serialize_uncompressed();
        assert_eq!(full[0], 0x04);
        assert_eq!(&PublicKey::from_slice(&full).unwrap(), kp.public_key());
    }

    #[test]
    fn ecdh_is_symmetric() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_eq!(ecdh_x(&a, b.public_key()), ecdh_x(&b, a.public_key()));
    }

    #[test]
    fn sign_and_verify_all_inputs() {
        let kp = KeyPair::generate();
        let (mut tx, prev_script) = spend_tx(&kp);
        sign_input(&mut tx, 1, &kp, 4_000, &prev_script).unwrap();
        sign_input(&mut tx, 0, &kp, 6_000, &prev_script).unwrap();
        verify_input(&tx, 0, 6_000, &prev_script).unwrap();
        verify_input(&tx, 1, 4_000, &prev_script).unwrap();
    }

    #[test]
    fn sighash_commits_to_value() {
        let kp = KeyPair::generate();
        let (mut tx, prev_script) = spend_tx(&kp);
        sign_input(&mut tx, 0, &kp, 6_000, &prev_script).unwrap();
        assert_eq!(
            verify_input(&tx, 0, 6_001, &prev_script).unwrap_err(),
            CryptoError::VerificationFailed
        );
    }

    #[test]
    fn tampered_output_fails() {
        let kp = KeyPair::generate();
        let (mut tx, prev_script) = spend_tx(&kp);
        sign_input(&mut tx, 0, &kp, 6_000, &prev_script).unwrap();
        tx.outputs[0].value -= 1;
        assert_eq!(
            verify_input(&tx, 0, 6_000, &prev_script).unwrap_err(),
            CryptoError::VerificationFailed
        );
    }

    #[test]
    fn wrong_owner_fails() {
        let kp = KeyPair::generate();
        let (mut tx, _) = spend_tx(&kp);
        let other_script = Script::p2pkh(&[0x01; 20]);
        sign_input(&mut tx, 0, &kp, 6_000, &other_script).unwrap();
        assert_eq!(
            verify_input(&tx, 0, 6_000, &other_script).unwrap_err(),
            CryptoError::PubkeyHashMismatch
        );
    }

    #[test]
    fn signature_ends_with_forkid_byte() {
        let kp = KeyPair::generate();
        let (mut tx, prev_script) = spend_tx(&kp);
        sign_input(&mut tx, 0, &kp, 6_000, &prev_script).unwrap();
        let ops = tx.inputs[0].script_sig.ops().unwrap();
        match &ops[0] {
            crate::script::ScriptOp::Push(sig) => assert_eq!(*sig.last().unwrap(), 0x41),
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn index_out_of_bounds() {
        let kp = KeyPair::generate();
        let (mut tx, prev_script) = spend_tx(&kp);
        assert_eq!(
            sign_input(&mut tx, 5, &kp, 1, &prev_script).unwrap_err(),
            CryptoError::InputIndexOutOfBounds { index: 5, len: 2 }
        );
    }
}
