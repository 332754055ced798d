//! Ledger HID transport
//!
//! APDUs ride inside a 64-byte report framing: each report carries a
//! channel id, the APDU tag (0x05) and a big-endian sequence number; the
//! first report of a message additionally carries the total payload length.
//! `exchange` takes a whole APDU and returns the response data followed by
//! the two status-word bytes.

use super::{closed, disconnected, hid_api, open_hid, Transport, READ_TIMEOUT_MS};
use crate::error::{Result, SignerError};

const LEDGER_VENDOR_ID: u16 = 0x2c97;

const REPORT_SIZE: usize = 64;
const CHANNEL_ID: u16 = 0x0101;
const APDU_TAG: u8 = 0x05;

/// HID transport for the APDU device family.
pub struct LedgerHid {
    device: Option<hidapi::HidDevice>,
}

impl LedgerHid {
    /// Enumerate and open the first connected device of this family.
    pub fn open() -> Result<Self> {
        let api = hid_api()?;
        let device = open_hid(&api, &[LEDGER_VENDOR_ID], "ledger")?;
        Ok(Self {
            device: Some(device),
        })
    }

    fn write_apdu(device: &hidapi::HidDevice, apdu: &[u8]) -> Result<()> {
        let mut stream = Vec::with_capacity(2 + apdu.len());
        stream.extend_from_slice(&(apdu.len() as u16).to_be_bytes());
        stream.extend_from_slice(apdu);

        for (seq, chunk) in stream.chunks(REPORT_SIZE - 5).enumerate() {
            // leading zero byte is the HID report number
            let mut report = [0u8; REPORT_SIZE + 1];
            report[1..3].copy_from_slice(&CHANNEL_ID.to_be_bytes());
            report[3] = APDU_TAG;
            report[4..6].copy_from_slice(&(seq as u16).to_be_bytes());
            report[6..6 + chunk.len()].copy_from_slice(chunk);
            device
                .write(&report)
                .map_err(|_| disconnected("HID write failed"))?;
        }
        Ok(())
    }

    fn read_response(device: &hidapi::HidDevice) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        let mut expected: Option<usize> = None;
        let mut seq: u16 = 0;

        while expected.map_or(true, |total| response.len() < total) {
            let mut report = [0u8; REPORT_SIZE];
            let read = device
                .read_timeout(&mut report, READ_TIMEOUT_MS)
                .map_err(|_| disconnected("HID read failed"))?;
            if read == 0 {
                return Err(SignerError::NoDeviceDetected(
                    "the ledger device did not respond within the transport timeout".to_string(),
                ));
            }
            if read < 5 || report[0..2] != CHANNEL_ID.to_be_bytes() || report[2] != APDU_TAG {
                return Err(SignerError::Device(
                    "unexpected HID report framing in device response".to_string(),
                ));
            }
            if report[3..5] != seq.to_be_bytes() {
                return Err(SignerError::Device(format!(
                    "out-of-order HID report: expected sequence {seq}"
                )));
            }

            let mut offset = 5;
            if seq == 0 {
                if read < 7 {
                    return Err(SignerError::Device(
                        "short first HID report in device response".to_string(),
                    ));
                }
                expected = Some(u16::from_be_bytes([report[5], report[6]]) as usize);
                offset = 7;
            }
            response.extend_from_slice(&report[offset..read]);
            seq += 1;
        }

        let total = expected.unwrap_or(0);
        response.truncate(total);
        if response.len() < 2 {
            return Err(SignerError::Device(
                "truncated APDU response from device".to_string(),
            ));
        }
        Ok(response)
    }
}

impl Transport for LedgerHid {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let device = self.device.as_ref().ok_or_else(closed)?;
        Self::write_apdu(device, request)?;
        Self::read_response(device)
    }

    fn close(&mut self) {
        self.device = None;
    }
}
