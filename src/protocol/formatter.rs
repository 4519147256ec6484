//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Encoding and decoding of wire frames.

use super::ProtocolMessage;
use thiserror::Error;

/// Frame tag for an open-connection request.
const TAG_OPEN: u8 = 0x10;
/// Frame tag for a close-connection request.
const TAG_CLOSE: u8 = 0x20;
/// Frame tag for an application data frame.
const TAG_DATA: u8 = 0x40;

/// Error raised while encoding a frame.
///
/// Decoding never errors; malformed input is reported through
/// [`ProtocolMessage::Unknown`] instead.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The response receiver id does not fit the frame's length field.
    #[error("response receiver id of {len} bytes exceeds the frame limit of {max} bytes")]
    ReceiverIdTooLong {
        /// Byte length of the offending id.
        len: usize,
        /// Maximum encodable id length.
        max: usize,
    },
}

/// Encodes and decodes the three wire frame kinds.
///
/// Encoding must be symmetric with decoding for the same formatter instance;
/// different formatter implementations need not interoperate. Implementations
/// are pure transforms: no I/O, no side effects.
///
/// # Decode contract
///
/// - empty/unreadable payload (the peer closed the connection) → `None`
/// - malformed non-empty payload → `Some(ProtocolMessage::Unknown)`
/// - anything else → the decoded frame
pub trait ProtocolFormatter: Send + Sync {
    /// Encodes an open-connection frame for the given response receiver.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the receiver id cannot be represented.
    fn encode_open_connection(&self, response_receiver_id: &str) -> Result<Vec<u8>, ProtocolError>;

    /// Encodes a close-connection frame for the given response receiver.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the receiver id cannot be represented.
    fn encode_close_connection(&self, response_receiver_id: &str)
        -> Result<Vec<u8>, ProtocolError>;

    /// Encodes an application data frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the receiver id cannot be represented.
    fn encode_message(
        &self,
        response_receiver_id: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Decodes a transport payload into a frame.
    ///
    /// Never panics and never errors; see the decode contract on the trait.
    fn decode(&self, payload: &[u8]) -> Option<ProtocolMessage>;
}

/// The default binary frame encoding.
///
/// ```text
/// +-----------+----------------+------------+------------------+
/// | tag (1 B) | id len (2 B BE) | id (utf8) | payload (N bytes) |
/// +-----------+----------------+------------+------------------+
/// ```
///
/// OPEN and CLOSE frames carry no payload; trailing bytes on them are treated
/// as malformed. The payload of a DATA frame is opaque.
///
/// # Examples
///
/// ```rust
/// use crosswire::protocol::{BinaryProtocolFormatter, ProtocolFormatter, ProtocolMessage};
///
/// let formatter = BinaryProtocolFormatter::new();
/// let encoded = formatter.encode_message("client-1", b"hello").unwrap();
///
/// let decoded = formatter.decode(&encoded).unwrap();
/// assert_eq!(
///     decoded,
///     ProtocolMessage::Data {
///         response_receiver_id: "client-1".to_string(),
///         payload: b"hello".to_vec(),
///     }
/// );
///
/// // An empty payload means the peer closed the connection.
/// assert!(formatter.decode(&[]).is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryProtocolFormatter;

impl BinaryProtocolFormatter {
    /// Creates a new binary formatter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn encode_frame(
        tag: u8,
        response_receiver_id: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let id = response_receiver_id.as_bytes();
        if id.len() > u16::MAX as usize {
            return Err(ProtocolError::ReceiverIdTooLong {
                len: id.len(),
                max: u16::MAX as usize,
            });
        }

        let mut frame = Vec::with_capacity(3 + id.len() + payload.len());
        frame.push(tag);
        frame.extend_from_slice(&(id.len() as u16).to_be_bytes());
        frame.extend_from_slice(id);
        frame.extend_from_slice(payload);
        Ok(frame)
    }
}

impl ProtocolFormatter for BinaryProtocolFormatter {
    fn encode_open_connection(&self, response_receiver_id: &str) -> Result<Vec<u8>, ProtocolError> {
        Self::encode_frame(TAG_OPEN, response_receiver_id, &[])
    }

    fn encode_close_connection(
        &self,
        response_receiver_id: &str,
    ) -> Result<Vec<u8>, ProtocolError> {
        Self::encode_frame(TAG_CLOSE, response_receiver_id, &[])
    }

    fn encode_message(
        &self,
        response_receiver_id: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        Self::encode_frame(TAG_DATA, response_receiver_id, payload)
    }

    fn decode(&self, payload: &[u8]) -> Option<ProtocolMessage> {
        if payload.is_empty() {
            return None;
        }
        if payload.len() < 3 {
            return Some(ProtocolMessage::Unknown);
        }

        let tag = payload[0];
        let id_len = u16::from_be_bytes([payload[1], payload[2]]) as usize;
        let body = &payload[3..];
        if body.len() < id_len {
            return Some(ProtocolMessage::Unknown);
        }

        let Ok(response_receiver_id) = std::str::from_utf8(&body[..id_len]) else {
            return Some(ProtocolMessage::Unknown);
        };
        let response_receiver_id = response_receiver_id.to_string();
        let rest = &body[id_len..];

        Some(match tag {
            TAG_OPEN if rest.is_empty() => ProtocolMessage::OpenConnection {
                response_receiver_id,
            },
            TAG_CLOSE if rest.is_empty() => ProtocolMessage::CloseConnection {
                response_receiver_id,
            },
            TAG_DATA => ProtocolMessage::Data {
                response_receiver_id,
                payload: rest.to_vec(),
            },
            _ => ProtocolMessage::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_connection_round_trip() {
        let formatter = BinaryProtocolFormatter::new();
        let encoded = formatter.encode_open_connection("addr1_client").unwrap();
        assert_eq!(
            formatter.decode(&encoded),
            Some(ProtocolMessage::OpenConnection {
                response_receiver_id: "addr1_client".to_string(),
            })
        );
    }

    #[test]
    fn test_close_connection_round_trip() {
        let formatter = BinaryProtocolFormatter::new();
        let encoded = formatter.encode_close_connection("addr1_client").unwrap();
        assert_eq!(
            formatter.decode(&encoded),
            Some(ProtocolMessage::CloseConnection {
                response_receiver_id: "addr1_client".to_string(),
            })
        );
    }

    #[test]
    fn test_data_round_trip() {
        let formatter = BinaryProtocolFormatter::new();
        let encoded = formatter.encode_message("addr1_client", b"hello").unwrap();
        assert_eq!(
            formatter.decode(&encoded),
            Some(ProtocolMessage::Data {
                response_receiver_id: "addr1_client".to_string(),
                payload: b"hello".to_vec(),
            })
        );
    }

    #[test]
    fn test_data_round_trip_empty_payload() {
        let formatter = BinaryProtocolFormatter::new();
        let encoded = formatter.encode_message("r", &[]).unwrap();
        assert_eq!(
            formatter.decode(&encoded),
            Some(ProtocolMessage::Data {
                response_receiver_id: "r".to_string(),
                payload: Vec::new(),
            })
        );
    }

    #[test]
    fn test_empty_payload_decodes_to_none() {
        let formatter = BinaryProtocolFormatter::new();
        assert_eq!(formatter.decode(&[]), None);
    }

    #[test]
    fn test_garbage_decodes_to_unknown() {
        let formatter = BinaryProtocolFormatter::new();
        assert_eq!(
            formatter.decode(b"\xffgarbage"),
            Some(ProtocolMessage::Unknown)
        );
    }

    #[test]
    fn test_truncated_frame_decodes_to_unknown() {
        let formatter = BinaryProtocolFormatter::new();
        let mut encoded = formatter.encode_open_connection("receiver").unwrap();
        encoded.truncate(5);
        assert_eq!(formatter.decode(&encoded), Some(ProtocolMessage::Unknown));
    }

    #[test]
    fn test_invalid_utf8_id_decodes_to_unknown() {
        let formatter = BinaryProtocolFormatter::new();
        let frame = vec![0x10, 0x00, 0x02, 0xff, 0xfe];
        assert_eq!(formatter.decode(&frame), Some(ProtocolMessage::Unknown));
    }

    #[test]
    fn test_open_with_trailing_bytes_is_unknown() {
        let formatter = BinaryProtocolFormatter::new();
        let mut encoded = formatter.encode_open_connection("r").unwrap();
        encoded.push(0x00);
        assert_eq!(formatter.decode(&encoded), Some(ProtocolMessage::Unknown));
    }

    #[test]
    fn test_oversized_receiver_id_rejected() {
        let formatter = BinaryProtocolFormatter::new();
        let id = "x".repeat(u16::MAX as usize + 1);
        assert!(matches!(
            formatter.encode_open_connection(&id),
            Err(ProtocolError::ReceiverIdTooLong { .. })
        ));
    }
}

// Made with Bob
