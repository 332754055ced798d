//! Quill Core - Transaction model, HD derivation paths, and RLP encoding
//!
//! This crate provides the pure (no I/O) layer shared by the Quill hardware
//! signing sessions: BIP-44 derivation path arithmetic, the canonical
//! transaction request and its device-native projection, and the RLP
//! serialization of signed Ethereum transactions.

pub mod error;
pub mod hd;
pub mod transaction;

pub use error::{Error, Result};
pub use hd::{DerivationPath, PathComponent, DERIVATION_ROOT};
pub use transaction::{
    DeviceTransaction, SignedOutput, SignedTransaction, TransactionRequest, TxSignature,
};

/// Number of path elements in the fixed derivation root (m/44'/60'/0'/0).
pub const DERIVATION_ROOT_DEPTH: usize = 4;
