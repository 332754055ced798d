//! Device transport adapters
//!
//! Every byte that reaches a physical device funnels through the single
//! [`Transport::exchange`] primitive. The concrete adapters wrap a `hidapi`
//! channel and translate its failure modes into the typed error set:
//! a device missing from enumeration (or vanishing mid-exchange) is
//! [`SignerError::NoDeviceDetected`], an enumerated device that cannot be
//! opened is [`SignerError::DeviceBusy`]. No `hidapi` error type escapes
//! this module.

mod ledger;
mod trezor;

pub use ledger::LedgerHid;
pub use trezor::TrezorHid;

use crate::error::{Result, SignerError};

/// A single physical-device communication channel.
///
/// `exchange` is blocking and strictly request/response; the USB channel
/// does not support interleaved exchanges, so sessions serialize calls.
pub trait Transport: Send {
    /// Send one request and block for the complete response.
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>>;

    /// Release the device handle. Idempotent.
    fn close(&mut self);
}

/// Blocking-read deadline for a single device response. Signing waits on a
/// human pressing a button, so this is generous.
pub(crate) const READ_TIMEOUT_MS: i32 = 60_000;

pub(crate) fn disconnected(context: &str) -> SignerError {
    SignerError::NoDeviceDetected(format!(
        "cannot communicate with the USB device ({context}): was it disconnected?"
    ))
}

pub(crate) fn closed() -> SignerError {
    SignerError::NoDeviceDetected("the transport has been closed".to_string())
}

/// Locate the first HID device for one of the given vendor ids and open it.
pub(crate) fn open_hid(api: &hidapi::HidApi, vendor_ids: &[u16], family: &str) -> Result<hidapi::HidDevice> {
    let info = api
        .device_list()
        .find(|info| vendor_ids.contains(&info.vendor_id()))
        .ok_or_else(|| {
            SignerError::NoDeviceDetected(format!(
                "could not find a {family} device to connect to: have you unlocked it?"
            ))
        })?;
    info.open_device(api).map_err(|err| {
        SignerError::DeviceBusy(format!(
            "the {family} USB device is held by another process: {err}"
        ))
    })
}

pub(crate) fn hid_api() -> Result<hidapi::HidApi> {
    hidapi::HidApi::new().map_err(|err| {
        SignerError::NoDeviceDetected(format!("cannot reach the USB HID subsystem: {err}"))
    })
}
