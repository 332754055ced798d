//! Session address cache
//!
//! A bounded, write-once mapping from derived address to HD path. Populated
//! eagerly while a session opens; read-only for the rest of the session
//! lifetime, so readers need no locking.

use alloy_primitives::Address;
use quill_core::{DerivationPath, Error};

use crate::error::Result;

/// Address-to-path cache, in ascending derivation-index order.
///
/// Index 0 is the conventional default account.
#[derive(Debug, Clone, Default)]
pub struct AddressCache {
    entries: Vec<(Address, DerivationPath)>,
}

impl AddressCache {
    /// Derive `size` consecutive account paths and fetch each address
    /// through `fetch` (a device round-trip, without on-device display).
    pub fn populate(
        size: usize,
        mut fetch: impl FnMut(&DerivationPath) -> Result<Address>,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(size);
        for index in 0..size {
            let path = DerivationPath::derive(index as u32);
            let address = fetch(&path)?;
            entries.push((address, path));
        }
        Ok(Self { entries })
    }

    /// Path for a cached address; fails for anything outside the
    /// pre-populated set.
    pub fn lookup(&self, address: &Address) -> Result<&DerivationPath> {
        self.entries
            .iter()
            .find(|(cached, _)| cached == address)
            .map(|(_, path)| path)
            .ok_or_else(|| Error::UnknownAddress(address.to_checksum(None)).into())
    }

    /// Resolve exactly one of an account index or a cached address into a
    /// path. An index derives a fresh path (cache bypass); an address must
    /// hit the cache.
    pub fn resolve(&self, index: Option<u32>, address: Option<&Address>) -> Result<DerivationPath> {
        match (index, address) {
            (Some(index), None) => Ok(DerivationPath::derive(index)),
            (None, Some(address)) => Ok(self.lookup(address)?.clone()),
            _ => Err(Error::AmbiguousArguments.into()),
        }
    }

    /// Cached addresses in insertion (derivation-index) order.
    pub fn accounts(&self) -> Vec<Address> {
        self.entries.iter().map(|(address, _)| *address).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
