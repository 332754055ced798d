//! Message-framed device family session
//!
//! Orchestrates the transport, the HD resolver and the address cache into
//! the [`Signer`] contract. This family signs both transactions and
//! personal messages; call data larger than the first exchange is pulled
//! by the device in chunks it sizes itself.

use std::sync::{Mutex, PoisonError};

use alloy_primitives::{Address, Bytes, U256};
use tracing::debug;

use quill_core::{DerivationPath, SignedOutput, SignedTransaction, TransactionRequest, TxSignature};

use crate::cache::AddressCache;
use crate::config::SignerConfig;
use crate::error::{Result, SignerError};
use crate::messages::{self, MessageKind};
use crate::signer::Signer;
use crate::transport::{Transport, TrezorHid};

/// Largest call-data slice carried by the opening sign request.
const INITIAL_DATA_CHUNK: usize = 1024;

/// A signing session bound to one message-framed hardware wallet.
pub struct TrezorSigner<T: Transport = TrezorHid> {
    transport: Mutex<T>,
    cache: AddressCache,
    device_id: Option<String>,
}

impl TrezorSigner {
    /// URI scheme this family registers under.
    pub const URI_SCHEME: &'static str = "trezor";

    /// Open the first connected device and derive the default address set.
    pub fn open() -> Result<Self> {
        Self::with_transport(TrezorHid::open()?, &SignerConfig::default())
    }
}

impl<T: Transport> TrezorSigner<T> {
    /// Build a session over an already-open transport: performs the
    /// identity handshake, then populates the address cache (no on-device
    /// display for the bulk pre-fetch).
    pub fn with_transport(mut transport: T, config: &SignerConfig) -> Result<Self> {
        let (kind, payload) =
            Self::call(&mut transport, MessageKind::Initialize, &messages::Initialize {})?;
        if kind != MessageKind::Features as u16 {
            return Err(SignerError::Device(format!(
                "unexpected handshake response type {kind}"
            )));
        }
        let features: messages::Features = messages::decode_payload(&payload)?;
        let device_id = features.device_id;

        let cache = AddressCache::populate(config.address_cache_size, |path| {
            Self::fetch_address(&mut transport, path, false)
        })?;
        debug!(accounts = cache.len(), "populated trezor address cache");

        Ok(Self {
            transport: Mutex::new(transport),
            cache,
            device_id,
        })
    }

    /// Device id captured during the handshake.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Derive the address at an arbitrary account index, optionally showing
    /// it on the device display. Does not touch the session cache.
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

    /// One request/response round, surfacing device `Failure` responses as
    /// typed errors.
    fn call<M: prost::Message>(
        transport: &mut T,
        kind: MessageKind,
        message: &M,
    ) -> Result<(u16, Vec<u8>)> {
        let response = transport.exchange(&messages::encode_wire(kind, message))?;
        let (kind, payload) = messages::decode_wire(&response)?;
        if kind == MessageKind::Failure as u16 {
            let failure: messages::Failure = messages::decode_payload(payload)?;
            return Err(SignerError::Device(
                failure
                    .message
                    .unwrap_or_else(|| "device returned an unspecified failure".to_string()),
            ));
        }
        Ok((kind, payload.to_vec()))
    }

    fn fetch_address(transport: &mut T, path: &DerivationPath, display: bool) -> Result<Address> {
        let request = messages::EthereumGetAddress {
            address_n: path.values(),
            show_display: Some(display),
        };
        let (kind, payload) = Self::call(transport, MessageKind::EthereumGetAddress, &request)?;
        if kind != MessageKind::EthereumAddress as u16 {
            return Err(SignerError::Device(format!(
                "unexpected response type {kind} to an address request"
            )));
        }
        let response: messages::EthereumAddress = messages::decode_payload(&payload)?;
        if response.address.len() != 20 {
            return Err(SignerError::Device(format!(
                "invalid address length: {}",
                response.address.len()
            )));
        }
        Ok(Address::from_slice(&response.address))
    }
}

impl<T: Transport> Signer for TrezorSigner<T> {
    fn accounts(&self) -> Vec<Address> {
        self.cache.accounts()
    }

    /// Sign a personal message at the path behind `address`. Requires the
    /// user to confirm on the device.
    fn sign_message(&self, address: &Address, message: &[u8]) -> Result<Bytes> {
        let path = self.cache.lookup(address)?.clone();
        let request = messages::EthereumSignMessage {
            address_n: path.values(),
            message: message.to_vec(),
        };

        let mut transport = self.lock_transport();
        let (kind, payload) =
            Self::call(&mut *transport, MessageKind::EthereumSignMessage, &request)?;
        if kind != MessageKind::EthereumMessageSignature as u16 {
            return Err(SignerError::Device(format!(
                "unexpected response type {kind} to a message signing request"
            )));
        }
        let response: messages::EthereumMessageSignature = messages::decode_payload(&payload)?;
        let signature = response.signature.ok_or_else(|| {
            SignerError::Device("message signing response carried no signature".to_string())
        })?;
        Ok(Bytes::from(signature))
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
        debug!(chain_id = tx.chain_id, "signing transaction on trezor device");

        let initial = tx.data.len().min(INITIAL_DATA_CHUNK);
        let sign_request = messages::EthereumSignTx {
            address_n: path.values(),
            nonce: Some(be_trimmed_u64(tx.nonce)),
            gas_price: Some(be_trimmed_u256(&tx.gas_price)),
            gas_limit: Some(be_trimmed_u64(tx.gas_limit)),
            value: Some(be_trimmed_u256(&tx.value)),
            data_initial_chunk: (!tx.data.is_empty()).then(|| tx.data[..initial].to_vec()),
            data_length: (!tx.data.is_empty()).then(|| tx.data.len() as u32),
            chain_id: Some(tx.chain_id),
            to: tx.to.map(|address| address.to_checksum(None)),
        };

        // The whole chunked exchange is one critical section: once the sign
        // request is out, the device is mid-transaction until the final
        // response arrives.
        let signature = {
            let mut transport = self.lock_transport();
            let mut sent = initial;
            let (mut kind, mut payload) =
                Self::call(&mut *transport, MessageKind::EthereumSignTx, &sign_request)?;
            loop {
                if kind != MessageKind::EthereumTxRequest as u16 {
                    return Err(SignerError::Device(format!(
                        "unexpected response type {kind} during transaction signing"
                    )));
                }
                let progress: messages::EthereumTxRequest = messages::decode_payload(&payload)?;
                match progress.data_length {
                    Some(requested) if requested > 0 => {
                        let end = (sent + requested as usize).min(tx.data.len());
                        let ack = messages::EthereumTxAck {
                            data_chunk: tx.data[sent..end].to_vec(),
                        };
                        sent = end;
                        (kind, payload) =
                            Self::call(&mut *transport, MessageKind::EthereumTxAck, &ack)?;
                    }
                    _ => {
                        let (v, r, s) = match (
                            progress.signature_v,
                            progress.signature_r,
                            progress.signature_s,
                        ) {
                            (Some(v), Some(r), Some(s)) => (v, r, s),
                            _ => {
                                return Err(SignerError::Device(
                                    "signing response carried no signature components".to_string(),
                                ))
                            }
                        };
                        break TxSignature::from_device(u64::from(v), &r, &s)?;
                    }
                }
            }
        };

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

/// Minimal big-endian byte string for a wire quantity (empty for zero).
fn be_trimmed_u256(value: &U256) -> Vec<u8> {
    let bytes = value.to_be_bytes::<32>();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(32);
    bytes[start..].to_vec()
}

fn be_trimmed_u64(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(8);
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_be_trimmed_quantities() {
        assert!(be_trimmed_u64(0).is_empty());
        assert_eq!(be_trimmed_u64(0x5208), vec![0x52, 0x08]);
        assert!(be_trimmed_u256(&U256::ZERO).is_empty());
        assert_eq!(
            be_trimmed_u256(&U256::from(1_000_000_000u64)),
            vec![0x3b, 0x9a, 0xca, 0x00]
        );
    }
}
