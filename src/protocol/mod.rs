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

//! The low-level wire protocol shared by every transport.
//!
//! A duplex connection exchanges exactly three kinds of frames:
//!
//! - **OPEN**: a client announces a new logical connection, carrying the
//!   response receiver id the server will use to address responses.
//! - **CLOSE**: either side announces the orderly end of a logical connection.
//! - **DATA**: an opaque application payload for a logical connection.
//!
//! A [`ProtocolFormatter`] turns these frames into transport payloads and
//! back. Two endpoints must use formatter implementations that agree on the
//! encoding; mixing formatters is a configuration error that the protocol
//! cannot detect.

mod formatter;

pub use formatter::{BinaryProtocolFormatter, ProtocolError, ProtocolFormatter};

/// A decoded wire frame.
///
/// Instances are transient: one is created per inbound frame and handed to
/// the channel layer through the connector's message handler.
///
/// Decoding distinguishes three outcomes:
///
/// - a well-formed frame becomes one of the first three variants,
/// - malformed but non-empty data becomes [`ProtocolMessage::Unknown`],
/// - an empty payload (the peer simply closed the connection) decodes to
///   `None` rather than a `ProtocolMessage` at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// A client requests a new logical connection.
    OpenConnection {
        /// The response receiver id identifying the new logical connection.
        response_receiver_id: String,
    },
    /// Either side ends a logical connection in an orderly fashion.
    CloseConnection {
        /// The response receiver id of the logical connection being closed.
        response_receiver_id: String,
    },
    /// An application message for a logical connection.
    Data {
        /// The response receiver id the payload belongs to.
        response_receiver_id: String,
        /// The opaque application payload.
        payload: Vec<u8>,
    },
    /// Non-empty data that could not be decoded.
    ///
    /// Reported as a variant instead of an error so a decode failure never
    /// propagates across the transport boundary.
    Unknown,
}

impl ProtocolMessage {
    /// Returns the response receiver id carried by this frame, if any.
    pub fn response_receiver_id(&self) -> Option<&str> {
        match self {
            Self::OpenConnection {
                response_receiver_id,
            }
            | Self::CloseConnection {
                response_receiver_id,
            }
            | Self::Data {
                response_receiver_id,
                ..
            } => Some(response_receiver_id),
            Self::Unknown => None,
        }
    }
}

// Made with Bob
