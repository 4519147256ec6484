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

//! Transport-layer error types.
//!
//! Connector errors are the lowest level of the error hierarchy and represent
//! failures in the underlying transport. A connector error on an established
//! connection is additionally interpreted by the channel layer as an implicit
//! disconnect of the affected connection.

use crate::protocol::ProtocolError;
use std::io;
use thiserror::Error;

/// Errors that can occur in the connector layer.
///
/// # Examples
///
/// ```rust
/// use crosswire::connector::ConnectorError;
/// use std::io;
///
/// let error = ConnectorError::ConnectionFailed {
///     address: "127.0.0.1:8080".to_string(),
///     source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
/// };
///
/// if error.is_recoverable() {
///     println!("can retry the connection");
/// }
/// ```
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Failed to establish a connection to the listening endpoint.
    #[error("failed to connect to '{address}': {source}")]
    ConnectionFailed {
        /// The channel address that failed to connect.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An established connection was lost during operation.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Description of why the connection was lost.
        reason: String,
    },

    /// Failed to bind or otherwise start listening at the channel address.
    #[error("failed to listen at '{address}': {source}")]
    ListenFailed {
        /// The channel address that failed to listen.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to send a frame over the transport.
    #[error("send failed: {source}")]
    SendFailed {
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to read a frame from the transport.
    #[error("read failed: {source}")]
    ReadFailed {
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The connector is already connected; a second open must leave the
    /// existing connection undisturbed.
    #[error("connector is already connected")]
    AlreadyConnected,

    /// The connector is already listening.
    #[error("connector is already listening")]
    AlreadyListening,

    /// The connector is not connected.
    #[error("connector is not connected")]
    NotConnected,

    /// No transport handle exists for the addressed client.
    #[error("no connected client with address '{address}'")]
    ClientNotFound {
        /// The client address that could not be resolved.
        address: String,
    },

    /// A frame exceeded the maximum allowed size.
    #[error("frame of {size} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge {
        /// The offending frame size.
        size: usize,
        /// The configured maximum.
        max: usize,
    },

    /// A frame could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ConnectorError {
    /// Returns `true` if this error is potentially recoverable by retrying
    /// or reconnecting.
    ///
    /// Connection establishment failures and lost connections are
    /// recoverable; state misuse and oversized frames are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ConnectorError::ConnectionFailed { .. }
            | ConnectorError::ConnectionLost { .. }
            | ConnectorError::NotConnected => true,

            ConnectorError::SendFailed { source } | ConnectorError::ReadFailed { source } => {
                matches!(
                    source.kind(),
                    io::ErrorKind::Interrupted
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                )
            }

            ConnectorError::ListenFailed { .. }
            | ConnectorError::AlreadyConnected
            | ConnectorError::AlreadyListening
            | ConnectorError::ClientNotFound { .. }
            | ConnectorError::FrameTooLarge { .. }
            | ConnectorError::Protocol(_) => false,
        }
    }

    /// Create a connection lost error for testing.
    #[cfg(test)]
    pub(crate) fn connection_lost(reason: impl Into<String>) -> Self {
        ConnectorError::ConnectionLost {
            reason: reason.into(),
        }
    }
}


// Made with Bob
