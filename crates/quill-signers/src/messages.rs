//! Wire vocabulary for the message-framed device family
//!
//! The device speaks length-prefixed protobuf messages. Only the handful of
//! messages this subsystem exchanges are defined, as `prost` derive structs;
//! unknown fields in device responses are skipped by the decoder.
//!
//! A wire message is `type (u16 BE) || payload length (u32 BE) || payload`.

use prost::Message;

use crate::error::{Result, SignerError};

/// Wire ids for the message types used by this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageKind {
    Initialize = 0,
    Success = 2,
    Failure = 3,
    Features = 17,
    EthereumGetAddress = 56,
    EthereumAddress = 57,
    EthereumSignTx = 58,
    EthereumTxRequest = 59,
    EthereumTxAck = 60,
    EthereumSignMessage = 64,
    EthereumMessageSignature = 66,
}

impl MessageKind {
    pub fn from_wire(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Initialize),
            2 => Some(Self::Success),
            3 => Some(Self::Failure),
            17 => Some(Self::Features),
            56 => Some(Self::EthereumGetAddress),
            57 => Some(Self::EthereumAddress),
            58 => Some(Self::EthereumSignTx),
            59 => Some(Self::EthereumTxRequest),
            60 => Some(Self::EthereumTxAck),
            64 => Some(Self::EthereumSignMessage),
            66 => Some(Self::EthereumMessageSignature),
            _ => None,
        }
    }
}

/// Session handshake request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Initialize {}

/// Device identity and firmware description (subset of the device fields).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Features {
    #[prost(string, optional, tag = "1")]
    pub vendor: Option<String>,
    #[prost(uint32, optional, tag = "2")]
    pub major_version: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub minor_version: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub patch_version: Option<u32>,
    #[prost(string, optional, tag = "6")]
    pub device_id: Option<String>,
}

/// Device-reported failure (user rejection, locked device, bad request).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Failure {
    #[prost(uint32, optional, tag = "1")]
    pub code: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub message: Option<String>,
}

/// Request the address at an HD path.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EthereumGetAddress {
    #[prost(uint32, repeated, packed = "false", tag = "1")]
    pub address_n: Vec<u32>,
    #[prost(bool, optional, tag = "2")]
    pub show_display: Option<bool>,
}

/// Address response, raw 20 bytes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EthereumAddress {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
}

/// Start a transaction signature. Numeric fields are minimal big-endian
/// byte strings; `data_initial_chunk` carries the first slice of call data
/// and `data_length` its total length.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EthereumSignTx {
    #[prost(uint32, repeated, packed = "false", tag = "1")]
    pub address_n: Vec<u32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub nonce: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub gas_price: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub gas_limit: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub value: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub data_initial_chunk: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "8")]
    pub data_length: Option<u32>,
    #[prost(uint64, optional, tag = "9")]
    pub chain_id: Option<u64>,
    #[prost(string, optional, tag = "11")]
    pub to: Option<String>,
}

/// Device progress message: either a request for `data_length` more bytes
/// of call data, or (on the final round) the signature components.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EthereumTxRequest {
    #[prost(uint32, optional, tag = "1")]
    pub data_length: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub signature_v: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub signature_r: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub signature_s: Option<Vec<u8>>,
}

/// Next slice of call data, answering an [`EthereumTxRequest`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EthereumTxAck {
    #[prost(bytes = "vec", tag = "1")]
    pub data_chunk: Vec<u8>,
}

/// Sign a personal message at an HD path.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EthereumSignMessage {
    #[prost(uint32, repeated, packed = "false", tag = "1")]
    pub address_n: Vec<u32>,
    #[prost(bytes = "vec", tag = "2")]
    pub message: Vec<u8>,
}

/// Message signature response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EthereumMessageSignature {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub address: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub signature: Option<Vec<u8>>,
}

/// Frame a message for the transport: type, payload length, payload.
pub fn encode_wire<M: Message>(kind: MessageKind, message: &M) -> Vec<u8> {
    let payload = message.encode_to_vec();
    let mut wire = Vec::with_capacity(6 + payload.len());
    wire.extend_from_slice(&(kind as u16).to_be_bytes());
    wire.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    wire.extend_from_slice(&payload);
    wire
}

/// Split a transport response into its message type and payload.
pub fn decode_wire(wire: &[u8]) -> Result<(u16, &[u8])> {
    if wire.len() < 6 {
        return Err(SignerError::Device(
            "wire message shorter than its header".to_string(),
        ));
    }
    let kind = u16::from_be_bytes([wire[0], wire[1]]);
    let len = u32::from_be_bytes([wire[2], wire[3], wire[4], wire[5]]) as usize;
    let payload = wire
        .get(6..6 + len)
        .ok_or_else(|| SignerError::Device("truncated wire message payload".to_string()))?;
    Ok((kind, payload))
}

/// Decode a payload, mapping protobuf errors to a device failure.
pub fn decode_payload<M: Message + Default>(payload: &[u8]) -> Result<M> {
    M::decode(payload).map_err(|err| {
        SignerError::Device(format!("undecodable message payload from device: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        let request = EthereumGetAddress {
            address_n: vec![0x8000_002c, 0x8000_003c, 0x8000_0000, 0, 5],
            show_display: Some(false),
        };
        let wire = encode_wire(MessageKind::EthereumGetAddress, &request);

        let (kind, payload) = decode_wire(&wire).unwrap();
        assert_eq!(kind, MessageKind::EthereumGetAddress as u16);
        let decoded: EthereumGetAddress = decode_payload(payload).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_wire_header_layout() {
        let wire = encode_wire(MessageKind::Initialize, &Initialize {});
        assert_eq!(wire, vec![0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let mut wire = encode_wire(
            MessageKind::EthereumTxAck,
            &EthereumTxAck {
                data_chunk: vec![1, 2, 3],
            },
        );
        wire.pop();
        assert!(decode_wire(&wire).is_err());
        assert!(decode_wire(&[0, 2]).is_err());
    }

    #[test]
    fn test_message_kind_from_wire() {
        assert_eq!(MessageKind::from_wire(59), Some(MessageKind::EthereumTxRequest));
        assert_eq!(MessageKind::from_wire(999), None);
    }
}
