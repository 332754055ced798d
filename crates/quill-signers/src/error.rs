//! Error types for the Quill signing sessions

use thiserror::Error;

/// Result type alias for signer operations
pub type Result<T> = std::result::Result<T, SignerError>;

/// Errors that can occur while resolving, opening, or driving a signer.
#[derive(Error, Debug)]
pub enum SignerError {
    /// Core library error (paths, cache resolution, transaction shape)
    #[error(transparent)]
    Core(#[from] quill_core::Error),

    /// URI scheme unparseable, or unregistered with no working pass-through
    #[error("Invalid signer URI: {0}")]
    InvalidSignerUri(String),

    /// Transport cannot find or reach the device
    #[error("No device detected: {0}")]
    NoDeviceDetected(String),

    /// Device channel is held by another process or session
    #[error("Device busy: {0}")]
    DeviceBusy(String),

    /// The device reported a protocol-level failure (rejection, locked app)
    #[error("Device failure: {0}")]
    Device(String),

    /// Operation unsupported by this device family
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A signer scheme was registered twice
    #[error("Duplicate signer scheme: {0}")]
    DuplicateScheme(String),
}
