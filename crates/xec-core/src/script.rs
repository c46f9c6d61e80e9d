//! Script construction and inspection.
//!
//! Only the script shapes a light wallet needs are understood: P2PKH
//! locking/unlocking scripts and OP_RETURN data carriers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::ScriptError;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Largest push the builder will emit.
const MAX_PUSH: usize = 0xffff;

/// A raw script.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Script(Vec<u8>);

/// A single parsed script element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// Data push (including the empty push `OP_0`).
    Push(Vec<u8>),
    /// Any non-push opcode.
    Op(u8),
}

impl Script {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, ScriptError> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| ScriptError::InvalidHex(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn p2pkh(hash160: &[u8; 20]) -> Self {
        let mut s = Vec::with_capacity(25);
        s.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
        s.extend_from_slice(hash160);
        s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(s)
    }

    /// `OP_HASH160 <hash> OP_EQUAL`.
    pub fn p2sh(hash160: &[u8; 20]) -> Self {
        let mut s = Vec::with_capacity(23);
        s.extend_from_slice(&[OP_HASH160, 20]);
        s.extend_from_slice(hash160);
        s.push(OP_EQUAL);
        Self(s)
    }

    /// `OP_RETURN <push>...`.
    pub fn op_return<I, P>(pushes: I) -> Result<Self, ScriptError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut s = vec![OP_RETURN];
        for p in pushes {
            push_data(&mut s, p.as_ref())?;
        }
        Ok(Self(s))
    }

    /// Unlocking script for a P2PKH input: `<sig> <pubkey>`.
    pub fn p2pkh_unlock(signature: &[u8], public_key: &[u8]) -> Result<Self, ScriptError> {
        let mut s = Vec::with_capacity(signature.len() + public_key.len() + 2);
        push_data(&mut s, signature)?;
        push_data(&mut s, public_key)?;
        Ok(Self(s))
    }

    /// Parse into ops. Fails on a push that runs past the end.
    pub fn ops(&self) -> Result<Vec<ScriptOp>, ScriptError> {
        let b = &self.0;
        let mut ops = Vec::new();
        let mut i = 0;
        while i < b.len() {
            let op = b[i];
            i += 1;
            let len = match op {
                0x01..=0x4b => op as usize,
                OP_PUSHDATA1 => {
                    let n = *b.get(i).ok_or(ScriptError::Truncated(i))? as usize;
                    i += 1;
                    n
                }
                OP_PUSHDATA2 => {
                    if i + 2 > b.len() {
                        return Err(ScriptError::Truncated(i));
                    }
                    let n = u16::from_le_bytes([b[i], b[i + 1]]) as usize;
                    i += 2;
                    n
                }
                OP_PUSHDATA4 => {
                    if i + 4 > b.len() {
                        return Err(ScriptError::Truncated(i));
                    }
                    let n = u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]) as usize;
                    i += 4;
                    n
                }
                OP_0 => {
                    ops.push(ScriptOp::Push(Vec::new()));
                    continue;
                }
                other => {
                    ops.push(ScriptOp::Op(other));
                    continue;
                }
            };
            if i + len > b.len() {
                return Err(ScriptError::Truncated(i));
            }
            ops.push(ScriptOp::Push(b[i..i + len].to_vec()));
            i += len;
        }
        Ok(ops)
    }

    /// The hash160 of a P2PKH locking script, if this is one.
    pub fn p2pkh_hash(&self) -> Option<[u8; 20]> {
        let b = &self.0;
        if b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == 20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
        {
            let mut h = [0u8; 20];
            h.copy_from_slice(&b[3..23]);
            Some(h)
        } else {
            None
        }
    }

    /// The hash160 of a P2SH locking script, if this is one.
    pub fn p2sh_hash(&self) -> Option<[u8; 20]> {
        let b = &self.0;
        if b.len() == 23 && b[0] == OP_HASH160 && b[1] == 20 && b[22] == OP_EQUAL {
            let mut h = [0u8; 20];
            h.copy_from_slice(&b[2..22]);
            Some(h)
        } else {
            None
        }
    }

    pub fn is_op_return(&self) -> bool {
        self.0.first() == Some(&OP_RETURN)
    }

    /// Data chunks following OP_RETURN. Non-push opcodes are rejected.
    pub fn op_return_data(&self) -> Result<Vec<Vec<u8>>, ScriptError> {
        if !self.is_op_return() {
            return Err(ScriptError::NotOpReturn);
        }
        let tail = Script(self.0[1..].to_vec());
        tail.ops()?
            .into_iter()
            .map(|op| match op {
                ScriptOp::Push(data) => Ok(data),
                ScriptOp::Op(_) => Err(ScriptError::NotOpReturn),
            })
            .collect()
    }

    /// Public key revealed by a P2PKH unlocking script (`<sig> <pubkey>`).
    pub fn p2pkh_unlock_pubkey(&self) -> Option<Vec<u8>> {
        match self.ops().ok()?.as_slice() {
            [ScriptOp::Push(sig), ScriptOp::Push(pk)]
                if !sig.is_empty() && (pk.len() == 33 || pk.len() == 65) =>
            {
                Some(pk.clone())
            }
            _ => None,
        }
    }
}

/// Append a minimally encoded data push.
pub fn push_data(buf: &mut Vec<u8>, data: &[u8]) -> Result<(), ScriptError> {
    let len = data.len();
    match len {
        0 => buf.push(OP_0),
        1..=0x4b => buf.push(len as u8),
        0x4c..=0xff => buf.extend_from_slice(&[OP_PUSHDATA1, len as u8]),
        0x100..=MAX_PUSH => {
            buf.push(OP_PUSHDATA2);
            buf.extend_from_slice(&(len as u16).to_le_bytes());
        }
        _ => return Err(ScriptError::PushTooLarge(len)),
    }
    buf.extend_from_slice(data);
    Ok(())
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p2pkh_shape() {
        let s = Script::p2pkh(&[0xAB; 20]);
        assert_eq!(s.len(), 25);
        assert_eq!(&s.to_hex()[..6], "76a914");
        assert!(s.to_hex().ends_with("88ac"));
        assert_eq!(s.p2pkh_hash(), Some([0xAB; 20]));
        assert_eq!(s.p2sh_hash(), None);
    }

    #[test]
    fn p2sh_shape() {
        let s = Script::p2sh(&[0x01; 20]);
        assert_eq!(s.p2sh_hash(), Some([0x01; 20]));
        assert_eq!(s.p2pkh_hash(), None);
    }

    #[test]
    fn op_return_cashtab_message() {
        let s = Script::op_return([&[0x00, 0x74, 0x61, 0x62][..], b"hello"]).unwrap();
        assert_eq!(s.to_hex(), "6a04007461620568656c6c6f");
        let data = s.op_return_data().unwrap();
        assert_eq!(data, vec![vec![0x00, 0x74, 0x61, 0x62], b"hello".to_vec()]);
    }

    #[test]
    fn pushdata1_used_above_75_bytes() {
        let payload = vec![0x42u8; 80];
        let s = Script::op_return([payload.as_slice()]).unwrap();
        assert_eq!(s.as_bytes()[1], OP_PUSHDATA1);
        assert_eq!(s.as_bytes()[2], 80);
        assert_eq!(s.op_return_data().unwrap(), vec![payload]);
    }

    #[test]
    fn pushdata2_used_above_255_bytes() {
        let payload = vec![0x01u8; 300];
        let s = Script::op_return([payload.as_slice()]).unwrap();
        assert_eq!(s.as_bytes()[1], OP_PUSHDATA2);
        assert_eq!(s.op_return_data().unwrap()[0].len(), 300);
    }

    #[test]
    fn empty_push_is_op_0() {
        let s = Script::op_return([&[][..]]).unwrap();
        assert_eq!(s.as_bytes(), &[OP_RETURN, OP_0]);
        assert_eq!(s.op_return_data().unwrap(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn truncated_push_rejected() {
        let s = Script::from_bytes(vec![OP_RETURN, 0x05, 0x01, 0x02]);
        assert!(matches!(s.op_return_data(), Err(ScriptError::Truncated(_))));
    }

    #[test]
    fn non_op_return_rejected() {
        let s = Script::p2pkh(&[0; 20]);
        assert_eq!(s.op_return_data(), Err(ScriptError::NotOpReturn));
    }

    #[test]
    fn unlock_pubkey_extraction() {
        let sig = vec![0x30; 71];
        let pk = vec![0x02; 33];
        let s = Script::p2pkh_unlock(&sig, &pk).unwrap();
        assert_eq!(s.p2pkh_unlock_pubkey(), Some(pk));
        assert_eq!(Script::from_bytes(vec![0x51]).p2pkh_unlock_pubkey(), None);
    }

    #[test]
    fn serde_hex() {
        let s = Script::p2pkh(&[0x10; 20]);
        let json = serde_json::to_string(&s).unwrap();
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert!(serde_json::from_str::<Script>("\"zz\"").is_err());
    }
}
