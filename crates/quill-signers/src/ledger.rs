//! APDU device family session
//!
//! The transaction signing protocol is defined as follows:
//!
//! ```text
//!    CLA | INS | P1 | P2 | Lc  | data
//!    ----+-----+----+----+-----+---------
//!     E0 | 04  | 00: first transaction data block
//!                80: subsequent transaction data block
//!                   | 00 | var | variable
//! ```
//!
//! The first data block starts with the count of BIP-32 derivation
//! elements (one byte), the big-endian elements themselves, then the RLP
//! transaction stream. A single exchange carries at most 255 payload
//! bytes, so larger streams are chunked; only the final response carries
//! the 65-byte `v || r || s` signature.
//!
//! This family has no message-signing entry point.

use std::sync::{Mutex, PoisonError};

use alloy_primitives::{Address, Bytes};
use tracing::debug;

use quill_core::{DerivationPath, SignedOutput, SignedTransaction, TransactionRequest, TxSignature};

use crate::cache::AddressCache;
use crate::config::SignerConfig;
use crate::error::{Result, SignerError};
use crate::signer::Signer;
use crate::transport::{LedgerHid, Transport};

// Ethereum app opcodes
const CLA: u8 = 0xe0;
const INS_GET_ADDRESS: u8 = 0x02;
const INS_SIGN_TX: u8 = 0x04;
const INS_GET_VERSION: u8 = 0x06;

// get address protocol
const P1_RETURN_ADDRESS: u8 = 0x00;
const P1_RETURN_AND_VERIFY_ADDRESS: u8 = 0x01;
const P2_NO_CHAIN_CODE: u8 = 0x00;

// transaction protocol
const P1_FIRST_TRANS_DATA_BLOCK: u8 = 0x00;
const P1_SUBSEQUENT_TRANS_DATA_BLOCK: u8 = 0x80;
const P2_UNUSED: u8 = 0x00;

/// Per-exchange payload capacity of the APDU channel.
const APDU_CHUNK_SIZE: usize = 255;

/// Success status word.
const SW_OK: u16 = 0x9000;

/// A signing session bound to one APDU hardware wallet.
pub struct LedgerSigner<T: Transport = LedgerHid> {
    transport: Mutex<T>,
    cache: AddressCache,
}

impl LedgerSigner {
    /// URI scheme this family registers under.
    pub const URI_SCHEME: &'static str = "ledger";

    /// Open the first connected device and derive the default address set.
    pub fn open() -> Result<Self> {
        Self::with_transport(LedgerHid::open()?, &SignerConfig::default())
    }
}

impl<T: Transport> LedgerSigner<T> {
    /// Build a session over an already-open transport and populate the
    /// address cache (no on-device confirmation for the bulk pre-fetch).
    pub fn with_transport(mut transport: T, config: &SignerConfig) -> Result<Self> {
        let cache = AddressCache::populate(config.address_cache_size, |path| {
            Self::fetch_address(&mut transport, path, false)
        })?;
        debug!(accounts = cache.len(), "populated ledger address cache");

        Ok(Self {
            transport: Mutex::new(transport),
            cache,
        })
    }

    /// Ethereum app version triple, straight from the device.
    pub fn app_version(&self) -> Result<(u8, u8, u8)> {
        let mut transport = self.lock_transport();
        let response = Self::call(&mut *transport, apdu(INS_GET_VERSION, 0x00, 0x00, &[]))?;
        if response.len() < 4 {
            return Err(SignerError::Device(
                "short version response from device".to_string(),
            ));
        }
        Ok((response[1], response[2], response[3]))
    }

    /// Derive the address at an arbitrary account index, optionally asking
    /// the device to display it for verification. Does not touch the
    /// session cache.
    pub fn derive_account(&self, index: u32, display: bool) -> Result<Address> {
        let path = self.cache.resolve(Some(index), None)?;
        let mut transport = self.lock_transport();
        Self::fetch_address(&mut *transport, &path, display)
    }

    fn lock_transport(&self) -> std::sync::MutexGuard<'_, T> {
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// One APDU round; a non-success status word is a typed device failure.
    fn call(transport: &mut T, request: Vec<u8>) -> Result<Vec<u8>> {
        let mut response = transport.exchange(&request)?;
        if response.len() < 2 {
            return Err(SignerError::Device(
                "truncated APDU response from device".to_string(),
            ));
        }
        let sw2 = response.pop().unwrap_or_default();
        let sw1 = response.pop().unwrap_or_default();
        match u16::from_be_bytes([sw1, sw2]) {
            SW_OK => Ok(response),
            0x6985 => Err(SignerError::Device(
                "request rejected on the device".to_string(),
            )),
            0x6511 | 0x6d00 | 0x6e00 => Err(SignerError::Device(
                "the Ethereum app is not open on the device".to_string(),
            )),
            sw => Err(SignerError::Device(format!(
                "unexpected status word 0x{sw:04x}"
            ))),
        }
    }

    fn fetch_address(transport: &mut T, path: &DerivationPath, display: bool) -> Result<Address> {
        let p1 = if display {
            P1_RETURN_AND_VERIFY_ADDRESS
        } else {
            P1_RETURN_ADDRESS
        };
        let response = Self::call(
            transport,
            apdu(INS_GET_ADDRESS, p1, P2_NO_CHAIN_CODE, &path_payload(path)),
        )?;

        // Response layout: pubkey length, pubkey, address length, then the
        // address as ASCII hex without a 0x prefix.
        let malformed =
            || SignerError::Device("malformed address response from device".to_string());
        let pubkey_len = *response.first().ok_or_else(malformed)? as usize;
        let addr_offset = 1 + pubkey_len;
        let addr_len = *response.get(addr_offset).ok_or_else(malformed)? as usize;
        let ascii = response
            .get(addr_offset + 1..addr_offset + 1 + addr_len)
            .ok_or_else(malformed)?;
        let raw = hex::decode(ascii).map_err(|_| malformed())?;
        if raw.len() != 20 {
            return Err(SignerError::Device(format!(
                "invalid address length: {}",
                raw.len()
            )));
        }
        Ok(Address::from_slice(&raw))
    }
}

impl<T: Transport> Signer for LedgerSigner<T> {
    fn accounts(&self) -> Vec<Address> {
        self.cache.accounts()
    }

    fn sign_message(&self, _address: &Address, _message: &[u8]) -> Result<Bytes> {
        Err(SignerError::Unsupported(
            "message signing is not available on this device family".to_string(),
        ))
    }

    fn sign_transaction(
        &self,
        request: TransactionRequest,
        rlp_encoded: bool,
    ) -> Result<SignedOutput> {
        // Validates the request (EIP-155 chain id included) and consumes the
        // sender before any device exchange happens.
        let (from, tx) = request.into_device()?;
        let path = self.cache.lookup(&from)?.clone();
        debug!(chain_id = tx.chain_id, "signing transaction on ledger device");

        // First block: derivation element count, the encoded path, then the
        // RLP stream. The count byte rides in the first chunk only.
        let mut payload = path_payload(&path);
        payload.extend_from_slice(&tx.unsigned_rlp());

        // One non-interruptible critical section for the whole chunk train.
        let response = {
            let mut transport = self.lock_transport();
            let mut p1 = P1_FIRST_TRANS_DATA_BLOCK;
            let mut remaining = payload.as_slice();
            let mut response = Vec::new();
            while !remaining.is_empty() {
                let take = remaining.len().min(APDU_CHUNK_SIZE);
                let (chunk, rest) = remaining.split_at(take);
                response = Self::call(&mut *transport, apdu(INS_SIGN_TX, p1, P2_UNUSED, chunk))?;
                remaining = rest;
                p1 = P1_SUBSEQUENT_TRANS_DATA_BLOCK;
            }
            response
        };

        // Only the final exchange carries data: v (one byte), r, s.
        if response.len() < 65 {
            return Err(SignerError::Device(format!(
                "short signature response: {} bytes",
                response.len()
            )));
        }
        let signature =
            TxSignature::from_device(u64::from(response[0]), &response[1..33], &response[33..65])?;

        let signed = SignedTransaction::from_parts(tx, signature);
        Ok(if rlp_encoded {
            SignedOutput::Rlp(signed.rlp_bytes())
        } else {
            SignedOutput::Transaction(signed)
        })
    }

    fn lock_account(&self, _address: &Address) -> Result<()> {
        // The physical device manages its own unlock state.
        Ok(())
    }

    fn unlock_account(&self, _address: &Address, _password: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn is_device(&self) -> bool {
        true
    }
}

/// Serialize an APDU: header, then the one-byte payload length, then data.
fn apdu(ins: u8, p1: u8, p2: u8, data: &[u8]) -> Vec<u8> {
    debug_assert!(data.len() <= APDU_CHUNK_SIZE);
    let mut bytes = Vec::with_capacity(5 + data.len());
    bytes.push(CLA);
    bytes.push(ins);
    bytes.push(p1);
    bytes.push(p2);
    bytes.push(data.len() as u8);
    bytes.extend_from_slice(data);
    bytes
}

/// Path element count prefix plus the big-endian encoded path.
fn path_payload(path: &DerivationPath) -> Vec<u8> {
    let encoded = path.to_bytes();
    let mut payload = Vec::with_capacity(1 + encoded.len());
    payload.push((encoded.len() / 4) as u8);
    payload.extend_from_slice(&encoded);
    payload
}
