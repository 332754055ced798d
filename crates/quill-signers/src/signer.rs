//! Signer contract and URI dispatch
//!
//! [`Signer`] is the capability contract every signing backend implements;
//! the [`SignerRegistry`] resolves a signer URI scheme to a concrete,
//! opened session. Hardware schemes are registered by name; anything else
//! falls through to the pass-through provider construction.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes};

use quill_core::{SignedOutput, TransactionRequest};

use crate::error::{Result, SignerError};
use crate::ledger::LedgerSigner;
use crate::software::ProviderSigner;
use crate::trezor::TrezorSigner;

/// The signing capability contract.
///
/// Implemented independently by each device family and by the pass-through
/// provider; there is no shared base state.
pub trait Signer: Send {
    /// Addresses this signer can sign for, default account first.
    fn accounts(&self) -> Vec<Address>;

    /// Sign a personal message. Device families that lack a message-signing
    /// protocol fail with [`SignerError::Unsupported`] rather than
    /// silently no-op.
    fn sign_message(&self, address: &Address, message: &[u8]) -> Result<Bytes>;

    /// Sign a canonical transaction request; returns the RLP bytes when
    /// `rlp_encoded`, the structured transaction otherwise.
    fn sign_transaction(
        &self,
        request: TransactionRequest,
        rlp_encoded: bool,
    ) -> Result<SignedOutput>;

    /// No-op on hardware wallets: the device tracks its own lock state.
    fn lock_account(&self, address: &Address) -> Result<()>;

    /// No-op on hardware wallets.
    fn unlock_account(&self, address: &Address, password: Option<&str>) -> Result<()>;

    /// Whether this signer fronts a physical device.
    fn is_device(&self) -> bool;
}

/// A parsed signer URI.
///
/// Device URIs carry no meaningful authority, so `trezor://`, `trezor:`
/// and a bare `trezor` token are all equivalent: when the scheme component
/// is empty the path token stands in for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerUri {
    pub scheme: String,
    pub location: String,
}

impl SignerUri {
    /// Split a URI into scheme and location; never fails, unrecognized
    /// shapes simply resolve to no registered scheme.
    pub fn parse(uri: &str) -> Self {
        if let Some((scheme, location)) = uri.split_once("://") {
            Self {
                scheme: scheme.to_string(),
                location: location.to_string(),
            }
        } else if let Some((scheme, location)) = uri.split_once(':') {
            Self {
                scheme: scheme.to_string(),
                location: location.to_string(),
            }
        } else {
            Self {
                scheme: String::new(),
                location: uri.to_string(),
            }
        }
    }

    /// The scheme used for dispatch, falling back to the path component
    /// for scheme-less URIs.
    pub fn dispatch_scheme(&self) -> &str {
        if self.scheme.is_empty() {
            &self.location
        } else {
            &self.scheme
        }
    }
}

/// Constructor for one signer backend.
pub type SignerFactory = fn(&SignerUri) -> Result<Box<dyn Signer>>;

/// Maps URI schemes to signer constructors.
pub struct SignerRegistry {
    schemes: BTreeMap<String, SignerFactory>,
    fallback: Option<SignerFactory>,
}

impl SignerRegistry {
    /// An empty registry with no schemes and no fallback.
    pub fn empty() -> Self {
        Self {
            schemes: BTreeMap::new(),
            fallback: None,
        }
    }

    /// Register a scheme. Scheme keys are unique; a second registration of
    /// the same scheme fails fast.
    pub fn register(&mut self, scheme: &str, factory: SignerFactory) -> Result<()> {
        if self.schemes.contains_key(scheme) {
            return Err(SignerError::DuplicateScheme(scheme.to_string()));
        }
        self.schemes.insert(scheme.to_string(), factory);
        Ok(())
    }

    /// Set the pass-through constructor tried for unregistered schemes.
    pub fn set_fallback(&mut self, factory: SignerFactory) {
        self.fallback = Some(factory);
    }

    /// Registered scheme names, in sorted order.
    pub fn schemes(&self) -> Vec<&str> {
        self.schemes.keys().map(String::as_str).collect()
    }

    /// Resolve a signer URI to an opened signer.
    ///
    /// A registered scheme constructs (and opens) its session, propagating
    /// device errors. An unregistered scheme goes to the pass-through
    /// fallback; only if that also rejects the URI is the invalid-URI
    /// error re-raised, naming the available schemes.
    pub fn from_signer_uri(&self, uri: &str) -> Result<Box<dyn Signer>> {
        let parsed = SignerUri::parse(uri);
        if let Some(factory) = self.schemes.get(parsed.dispatch_scheme()) {
            return factory(&parsed);
        }

        let invalid = || {
            SignerError::InvalidSignerUri(format!(
                "{uri} is not a valid signer URI. Available schemes: {}",
                self.schemes().join(", ")
            ))
        };
        match self.fallback {
            Some(factory) => factory(&parsed).map_err(|err| match err {
                SignerError::InvalidSignerUri(_) => invalid(),
                other => other,
            }),
            None => Err(invalid()),
        }
    }
}

impl Default for SignerRegistry {
    /// Both hardware families plus the provider pass-through.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(TrezorSigner::URI_SCHEME, |_| {
                Ok(Box::new(TrezorSigner::open()?))
            })
            .expect("default schemes are distinct");
        registry
            .register(LedgerSigner::URI_SCHEME, |_| {
                Ok(Box::new(LedgerSigner::open()?))
            })
            .expect("default schemes are distinct");
        registry.set_fallback(|uri| Ok(Box::new(ProviderSigner::from_uri(uri)?)));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unopenable(_uri: &SignerUri) -> Result<Box<dyn Signer>> {
        Err(SignerError::NoDeviceDetected("not plugged in".to_string()))
    }

    #[test]
    fn test_uri_parse_shapes() {
        let full = SignerUri::parse("trezor://anything");
        assert_eq!(full.scheme, "trezor");
        assert_eq!(full.dispatch_scheme(), "trezor");

        let compact = SignerUri::parse("trezor:");
        assert_eq!(compact.scheme, "trezor");

        let bare = SignerUri::parse("trezor");
        assert_eq!(bare.scheme, "");
        assert_eq!(bare.dispatch_scheme(), "trezor");

        let endpoint = SignerUri::parse("https://localhost:8545");
        assert_eq!(endpoint.scheme, "https");
        assert_eq!(endpoint.location, "localhost:8545");
    }

    #[test]
    fn test_duplicate_scheme_fails_fast() {
        let mut registry = SignerRegistry::empty();
        registry.register("trezor", unopenable).unwrap();
        let err = registry.register("trezor", unopenable).unwrap_err();
        assert!(matches!(err, SignerError::DuplicateScheme(scheme) if scheme == "trezor"));
    }

    #[test]
    fn test_registered_scheme_errors_propagate() {
        let mut registry = SignerRegistry::empty();
        registry.register("trezor", unopenable).unwrap();
        // device errors are not converted into URI errors
        let err = registry.from_signer_uri("trezor://").unwrap_err();
        assert!(matches!(err, SignerError::NoDeviceDetected(_)));
        // the bare token dispatches the same way
        let err = registry.from_signer_uri("trezor").unwrap_err();
        assert!(matches!(err, SignerError::NoDeviceDetected(_)));
    }

    #[test]
    fn test_unregistered_scheme_falls_through() {
        let mut registry = SignerRegistry::empty();
        registry.register("trezor", unopenable).unwrap();
        registry.set_fallback(|uri| Ok(Box::new(ProviderSigner::from_uri(uri)?)));

        let signer = registry.from_signer_uri("https://localhost:8545").unwrap();
        assert!(!signer.is_device());
    }

    #[test]
    fn test_invalid_uri_names_available_schemes() {
        let mut registry = SignerRegistry::empty();
        registry.register("trezor", unopenable).unwrap();
        registry.register("ledger", unopenable).unwrap();
        registry.set_fallback(|uri| Ok(Box::new(ProviderSigner::from_uri(uri)?)));

        let err = registry.from_signer_uri("gibberish@nowhere").unwrap_err();
        match err {
            SignerError::InvalidSignerUri(message) => {
                assert!(message.contains("ledger, trezor"));
            }
            other => panic!("expected InvalidSignerUri, got {other:?}"),
        }
    }

    #[test]
    fn test_no_fallback_is_invalid_uri() {
        let registry = SignerRegistry::empty();
        let err = registry.from_signer_uri("anything").unwrap_err();
        assert!(matches!(err, SignerError::InvalidSignerUri(_)));
    }
}
