//! Provider pass-through signer
//!
//! The registry's fallback for URIs that name no device family: an RPC
//! provider endpoint (`http://…`, `ipc` socket path, …) whose node holds
//! the keys. Delegating calls to that node is the host application's
//! concern; this type only models the boundary so URI dispatch has a real
//! pass-through to construct and hand back.

use alloy_primitives::{Address, Bytes};

use quill_core::{SignedOutput, TransactionRequest};

use crate::error::{Result, SignerError};
use crate::signer::{Signer, SignerUri};

const ENDPOINT_SCHEMES: [&str; 6] = ["http", "https", "ws", "wss", "ipc", "file"];

/// A signer backed by an external provider endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSigner {
    scheme: String,
    endpoint: String,
}

impl ProviderSigner {
    /// Accept an endpoint-shaped URI; anything else is an invalid signer
    /// URI (which lets the registry re-raise with the scheme listing).
    pub fn from_uri(uri: &SignerUri) -> Result<Self> {
        let supported = ENDPOINT_SCHEMES.contains(&uri.scheme.as_str());
        if !supported || uri.location.is_empty() {
            return Err(SignerError::InvalidSignerUri(format!(
                "{}:{} is not a provider endpoint",
                uri.scheme, uri.location
            )));
        }
        Ok(Self {
            scheme: uri.scheme.clone(),
            endpoint: uri.location.clone(),
        })
    }

    /// The endpoint this signer would delegate to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    fn delegated<T>(&self) -> Result<T> {
        Err(SignerError::Unsupported(format!(
            "operation is delegated to the provider at {}://{}",
            self.scheme, self.endpoint
        )))
    }
}

impl Signer for ProviderSigner {
    fn accounts(&self) -> Vec<Address> {
        Vec::new()
    }

    fn sign_message(&self, _address: &Address, _message: &[u8]) -> Result<Bytes> {
        self.delegated()
    }

    fn sign_transaction(
        &self,
        _request: TransactionRequest,
        _rlp_encoded: bool,
    ) -> Result<SignedOutput> {
        self.delegated()
    }

    fn lock_account(&self, _address: &Address) -> Result<()> {
        Ok(())
    }

    fn unlock_account(&self, _address: &Address, _password: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn is_device(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_endpoint_uris() {
        let signer = ProviderSigner::from_uri(&SignerUri::parse("http://localhost:8545")).unwrap();
        assert_eq!(signer.scheme(), "http");
        assert_eq!(signer.endpoint(), "localhost:8545");
        assert!(!signer.is_device());
    }

    #[test]
    fn test_rejects_non_endpoint_uris() {
        for uri in ["keepkey://", "gibberish@nowhere", "http://"] {
            let err = ProviderSigner::from_uri(&SignerUri::parse(uri)).unwrap_err();
            assert!(matches!(err, SignerError::InvalidSignerUri(_)), "{uri}");
        }
    }

    #[test]
    fn test_signing_is_delegated() {
        let signer = ProviderSigner::from_uri(&SignerUri::parse("ipc:/var/run/node.ipc")).unwrap();
        assert!(matches!(
            signer.sign_message(&Address::ZERO, b"hello"),
            Err(SignerError::Unsupported(_))
        ));
    }
}
