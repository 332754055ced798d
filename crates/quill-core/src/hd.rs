//! Hierarchical Deterministic (HD) derivation paths
//!
//! Pure BIP-32/BIP-44 path arithmetic: account indices become derivation
//! paths, and paths become the big-endian byte encoding consumed by device
//! wire protocols. Nothing here touches a device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed derivation root for Ethereum accounts: purpose 44', coin 60',
/// account 0', external chain 0.
pub const DERIVATION_ROOT: &str = "44'/60'/0'/0";

/// HD derivation path component
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PathComponent {
    /// Index value
    pub index: u32,
    /// Whether this is a hardened derivation
    pub hardened: bool,
}

impl PathComponent {
    /// Create a normal (non-hardened) component
    pub fn normal(index: u32) -> Self {
        Self {
            index,
            hardened: false,
        }
    }

    /// Create a hardened component
    pub fn hardened(index: u32) -> Self {
        Self {
            index,
            hardened: true,
        }
    }

    /// Get the wire value (sets the high bit for hardened components)
    pub fn value(&self) -> u32 {
        if self.hardened {
            self.index | 0x8000_0000
        } else {
            self.index
        }
    }
}

impl FromStr for PathComponent {
    type Err = Error;

    /// Parse a `"N"` or `"N'"` token.
    fn from_str(token: &str) -> Result<Self> {
        let (digits, hardened) = match token.strip_suffix('\'') {
            Some(digits) => (digits, true),
            None => (token, false),
        };
        let index: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidPath(format!("invalid path element {token:?}")))?;
        if index & 0x8000_0000 != 0 {
            return Err(Error::InvalidPath(format!(
                "path element {index} exceeds the hardened bit"
            )));
        }
        Ok(Self { index, hardened })
    }
}

/// HD derivation path (e.g., 44'/60'/0'/0/3)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    pub components: Vec<PathComponent>,
}

impl DerivationPath {
    /// Create a new derivation path
    pub fn new(components: Vec<PathComponent>) -> Self {
        Self { components }
    }

    /// The fixed Ethereum derivation root as a path.
    pub fn root() -> Self {
        DERIVATION_ROOT
            .parse()
            .expect("derivation root constant parses")
    }

    /// Derive the account path for `index`: DERIVATION_ROOT/<index>.
    pub fn derive(index: u32) -> Self {
        let mut path = Self::root();
        path.components.push(PathComponent::normal(index));
        path
    }

    /// Number of components.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Wire values of every component, high bit set for hardened elements.
    pub fn values(&self) -> Vec<u32> {
        self.components.iter().map(PathComponent::value).collect()
    }

    /// Big-endian 4-byte encoding of each component, concatenated.
    ///
    /// Deterministic and time-invariant: the same path always yields the
    /// same `4 * depth()` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.components.len() * 4);
        for component in &self.components {
            bytes.extend_from_slice(&component.value().to_be_bytes());
        }
        bytes
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    /// Parse a `/`-separated path, with or without a leading `m/`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix("m/").unwrap_or(s);
        if s.is_empty() {
            return Err(Error::InvalidPath("empty derivation path".to_string()));
        }
        let components = s
            .split('/')
            .map(str::parse)
            .collect::<Result<Vec<PathComponent>>>()?;
        Ok(Self { components })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", component.index)?;
            if component.hardened {
                f.write_str("'")?;
            }
        }
        Ok(())
    }
}
