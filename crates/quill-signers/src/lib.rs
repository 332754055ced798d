//! Quill Signers - hardware-wallet signing sessions
//!
//! This crate drives physical USB signing devices: it opens a device
//! transport, derives and caches BIP-44 addresses, and signs canonical
//! transaction requests by translating them into each device family's
//! native wire vocabulary.
//!
//! Two families are supported:
//!
//! - a message-framed family ([`TrezorSigner`]) speaking length-prefixed
//!   protobuf messages over 64-byte HID reports, and
//! - an APDU family ([`LedgerSigner`]) speaking ISO 7816-style commands
//!   chunked at 255 bytes per exchange.
//!
//! Callers usually go through the [`SignerRegistry`], which resolves a
//! signer URI (`trezor://`, `ledger://`, or a pass-through endpoint) to an
//! open session.

pub mod cache;
pub mod config;
pub mod error;
pub mod ledger;
pub mod messages;
pub mod signer;
pub mod software;
pub mod transport;
pub mod trezor;

pub use cache::AddressCache;
pub use config::{SignerConfig, DEFAULT_ADDRESS_CACHE_SIZE};
pub use error::{Result, SignerError};
pub use ledger::LedgerSigner;
pub use signer::{Signer, SignerRegistry, SignerUri};
pub use software::ProviderSigner;
pub use transport::{LedgerHid, Transport, TrezorHid};
pub use trezor::TrezorSigner;
