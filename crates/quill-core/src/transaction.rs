//! Canonical transaction requests and their device-native projection
//!
//! The canonical request mirrors the web3-style transaction dict used
//! network-wide (`from`, `to`, `value`, `gas`, `gasPrice`, `nonce`,
//! `chainId`, `data`). Signing sessions translate it into the device field
//! vocabulary, and translate the device's raw `(v, r, s)` back into an
//! RLP-encodable signed transaction ready for broadcast.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::Encodable;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A canonical Ethereum transaction request.
///
/// `chain_id` is optional at the type level but must be present before a
/// device signing call is attempted (EIP-155).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender address; must resolve in the session address cache
    pub from: Address,

    /// Recipient address (None for contract creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,

    /// Transfer value in wei
    pub value: U256,

    /// Gas limit
    pub gas: u64,

    /// Gas price in wei
    pub gas_price: U256,

    /// Transaction nonce
    pub nonce: u64,

    /// EIP-155 chain id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,

    /// Optional call data, hex-prefixed in the JSON form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl TransactionRequest {
    /// Deserialize from the web3-style JSON dict
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to the web3-style JSON dict
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validate the request and project it into the device field vocabulary.
    ///
    /// Consumes the `from` field and returns it alongside the device view:
    /// the sender is resolved against the address cache by the session, not
    /// sent to the device. Field renames: `gas` -> `gas_limit`, `gasPrice` ->
    /// `gas_price`, `chainId` -> `chain_id`.
    pub fn into_device(self) -> Result<(Address, DeviceTransaction)> {
        let chain_id = self.chain_id.ok_or_else(|| {
            Error::MalformedTransaction(
                "invalid EIP-155 request: the chainId field is missing".to_string(),
            )
        })?;
        let device = DeviceTransaction {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas,
            to: self.to,
            value: self.value,
            data: self.data.map(|b| b.to_vec()).unwrap_or_default(),
            chain_id,
        };
        Ok((self.from, device))
    }
}

/// A transaction reshaped into the device-native field vocabulary.
///
/// Transient: constructed per signing call and discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl DeviceTransaction {
    /// RLP encoding of the EIP-155 signing preimage:
    /// `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`.
    ///
    /// This is the byte stream the APDU device family consumes.
    pub fn unsigned_rlp(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        rlp_list(&mut buf, |buf| {
            self.nonce.encode(buf);
            rlp_quantity(&self.gas_price, buf);
            self.gas_limit.encode(buf);
            rlp_optional_address(&self.to, buf);
            rlp_quantity(&self.value, buf);
            self.data.as_slice().encode(buf);
            self.chain_id.encode(buf);
            0u8.encode(buf);
            0u8.encode(buf);
        });
        buf
    }
}

/// Raw signature components as produced by a signing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    /// Recovery id / parity byte, already EIP-155 adjusted by the device
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl TxSignature {
    pub fn new(v: u64, r: U256, s: U256) -> Self {
        Self { v, r, s }
    }

    /// Build from device byte strings: `r` and `s` arrive as big-endian
    /// unsigned integers of at most 32 bytes, `v` as a small integer
    /// (EIP-155 adjusted values exceed one byte for large chain ids).
    pub fn from_device(v: u64, r: &[u8], s: &[u8]) -> Result<Self> {
        if r.len() > 32 || s.len() > 32 {
            return Err(Error::MalformedTransaction(format!(
                "oversized signature component: r={} bytes, s={} bytes",
                r.len(),
                s.len()
            )));
        }
        Ok(Self {
            v,
            r: U256::from_be_slice(r),
            s: U256::from_be_slice(s),
        })
    }
}

/// A signed transaction, shaped like an unsigned legacy transaction plus
/// `(v, r, s)`. The chain id is gone: EIP-155 folds it into `v`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl SignedTransaction {
    /// Combine the device view with the device signature, reversing the
    /// field renames and dropping `chain_id`.
    pub fn from_parts(tx: DeviceTransaction, signature: TxSignature) -> Self {
        Self {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas: tx.gas_limit,
            to: tx.to,
            value: tx.value,
            data: Bytes::from(tx.data),
            v: signature.v,
            r: signature.r,
            s: signature.s,
        }
    }

    /// Canonical RLP byte encoding:
    /// `[nonce, gasPrice, gas, to, value, data, v, r, s]`.
    pub fn rlp_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(128);
        rlp_list(&mut buf, |buf| {
            self.nonce.encode(buf);
            rlp_quantity(&self.gas_price, buf);
            self.gas.encode(buf);
            rlp_optional_address(&self.to, buf);
            rlp_quantity(&self.value, buf);
            self.data.as_ref().encode(buf);
            self.v.encode(buf);
            rlp_quantity(&self.r, buf);
            rlp_quantity(&self.s, buf);
        });
        Bytes::from(buf)
    }
}

/// The result of a signing call: either the broadcast-ready RLP bytes or the
/// structured transaction, depending on the caller's `rlp_encoded` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedOutput {
    Rlp(Bytes),
    Transaction(SignedTransaction),
}

impl SignedOutput {
    /// The RLP byte encoding, computing it for the structured variant.
    pub fn into_rlp(self) -> Bytes {
        match self {
            Self::Rlp(bytes) => bytes,
            Self::Transaction(tx) => tx.rlp_bytes(),
        }
    }
}

/// Encode an RLP list, writing elements through the closure.
fn rlp_list<F>(out: &mut Vec<u8>, f: F)
where
    F: FnOnce(&mut Vec<u8>),
{
    let mut payload = Vec::new();
    f(&mut payload);
    alloy_rlp::Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(out);
    out.extend_from_slice(&payload);
}

/// Encode a U256 as an RLP quantity (minimal big-endian, no leading zeros).
fn rlp_quantity(value: &U256, out: &mut Vec<u8>) {
    let bytes = value.to_be_bytes::<32>();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(32);
    let trimmed = &bytes[start..];
    if trimmed.is_empty() {
        out.push(0x80);
    } else {
        trimmed.encode(out);
    }
}

/// Encode an optional recipient: empty byte string for contract creation.
fn rlp_optional_address(addr: &Option<Address>, out: &mut Vec<u8>) {
    match addr {
        Some(a) => a.encode(out),
        None => out.push(0x80),
    }
}
