//! Trezor HID transport
//!
//! Wire messages (big-endian message type and length, then the protobuf
//! payload) ride over 64-byte HID reports. Every report starts with `?`;
//! the first report of a message continues with the `##` magic and the
//! message header. `exchange` takes and returns whole wire messages; the
//! report slicing never splits the header across the magic.

use super::{closed, disconnected, hid_api, open_hid, Transport, READ_TIMEOUT_MS};
use crate::error::{Result, SignerError};

const TREZOR_VENDOR_IDS: [u16; 2] = [0x534c, 0x1209];

const REPORT_SIZE: usize = 64;
const REPORT_MAGIC: u8 = b'?';
const HEADER_MAGIC: [u8; 2] = [b'#', b'#'];

/// Minimum wire message: 2-byte type + 4-byte length.
const WIRE_HEADER_LEN: usize = 6;

/// HID transport for the message-framed device family.
pub struct TrezorHid {
    device: Option<hidapi::HidDevice>,
}

impl TrezorHid {
    /// Enumerate and open the first connected device of this family.
    pub fn open() -> Result<Self> {
        let api = hid_api()?;
        let device = open_hid(&api, &TREZOR_VENDOR_IDS, "trezor")?;
        Ok(Self {
            device: Some(device),
        })
    }

    fn write_message(device: &hidapi::HidDevice, wire: &[u8]) -> Result<()> {
        let mut stream = Vec::with_capacity(2 + wire.len());
        stream.extend_from_slice(&HEADER_MAGIC);
        stream.extend_from_slice(wire);

        for chunk in stream.chunks(REPORT_SIZE - 1) {
            // leading zero byte is the HID report number
            let mut report = [0u8; REPORT_SIZE + 1];
            report[1] = REPORT_MAGIC;
            report[2..2 + chunk.len()].copy_from_slice(chunk);
            device
                .write(&report)
                .map_err(|_| disconnected("HID write failed"))?;
        }
        Ok(())
    }

    fn read_message(device: &hidapi::HidDevice) -> Result<Vec<u8>> {
        let mut stream = Vec::new();
        let mut expected: Option<usize> = None;

        while expected.map_or(true, |total| stream.len() < total) {
            let mut report = [0u8; REPORT_SIZE];
            let read = device
                .read_timeout(&mut report, READ_TIMEOUT_MS)
                .map_err(|_| disconnected("HID read failed"))?;
            if read == 0 {
                return Err(SignerError::NoDeviceDetected(
                    "the trezor device did not respond within the transport timeout".to_string(),
                ));
            }
            if report[0] != REPORT_MAGIC {
                return Err(SignerError::Device(
                    "unexpected HID report framing in device response".to_string(),
                ));
            }

            if expected.is_none() {
                if read < 9 || report[1..3] != HEADER_MAGIC {
                    return Err(SignerError::Device(
                        "missing wire message header in device response".to_string(),
                    ));
                }
                let payload_len =
                    u32::from_be_bytes([report[5], report[6], report[7], report[8]]) as usize;
                expected = Some(WIRE_HEADER_LEN + payload_len);
                stream.extend_from_slice(&report[3..read]);
            } else {
                stream.extend_from_slice(&report[1..read]);
            }
        }

        let total = expected.unwrap_or(0);
        stream.truncate(total);
        Ok(stream)
    }
}

impl Transport for TrezorHid {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        if request.len() < WIRE_HEADER_LEN {
            return Err(SignerError::Device(
                "wire message shorter than its header".to_string(),
            ));
        }
        let device = self.device.as_ref().ok_or_else(closed)?;
        Self::write_message(device, request)?;
        Self::read_message(device)
    }

    fn close(&mut self) {
        self.device = None;
    }
}
