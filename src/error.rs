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

//! Channel-layer error type.
//!
//! The framework distinguishes two error layers. Transport failures surface
//! as [`ConnectorError`](crate::connector::ConnectorError); everything a
//! channel user can observe is wrapped in [`ChannelError`], with connector
//! errors nested as a source. State misuse (opening an open channel, sending
//! on a closed one) and configuration mistakes get their own variants so
//! callers can match on them directly.

use crate::connector::ConnectorError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by duplex channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel id is empty or otherwise unusable as an address.
    #[error("channel id must be a non-empty address")]
    InvalidChannelId,

    /// The output channel is already connected.
    #[error("channel '{channel_id}' is already connected")]
    AlreadyConnected {
        /// Address of the channel.
        channel_id: String,
    },

    /// The output channel is not connected.
    #[error("channel '{channel_id}' is not connected")]
    NotConnected {
        /// Address of the channel.
        channel_id: String,
    },

    /// The input channel is already listening.
    #[error("channel '{channel_id}' is already listening")]
    AlreadyListening {
        /// Address of the channel.
        channel_id: String,
    },

    /// The input channel is not listening.
    #[error("channel '{channel_id}' is not listening")]
    NotListening {
        /// Address of the channel.
        channel_id: String,
    },

    /// No response receiver with the given id is connected.
    #[error("response receiver '{response_receiver_id}' is not connected")]
    ResponseReceiverNotFound {
        /// The unknown receiver id.
        response_receiver_id: String,
    },

    /// A buffered channel stayed disconnected longer than its offline bound.
    #[error("channel '{channel_id}' exceeded the maximum offline time of {max_offline:?}")]
    OfflineTimeout {
        /// Address of the channel.
        channel_id: String,
        /// The configured bound that was exceeded.
        max_offline: Duration,
    },

    /// An output channel is already attached.
    #[error("an output channel is already attached")]
    AlreadyAttached,

    /// No output channel is attached.
    #[error("no output channel is attached")]
    NotAttached,

    /// The underlying transport failed.
    #[error("transport failure")]
    Connector(#[from] ConnectorError),
}

impl ChannelError {
    /// Returns `true` if retrying the operation later may succeed.
    ///
    /// State-misuse and configuration errors are permanent; transport
    /// failures defer to [`ConnectorError::is_recoverable`].
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Connector(e) => e.is_recoverable(),
            Self::NotConnected { .. } | Self::OfflineTimeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_misuse_is_not_recoverable() {
        let error = ChannelError::AlreadyConnected {
            channel_id: "addr-1".to_string(),
        };
        assert!(!error.is_recoverable());
        assert!(!ChannelError::InvalidChannelId.is_recoverable());
    }

    #[test]
    fn test_disconnect_errors_are_recoverable() {
        let error = ChannelError::NotConnected {
            channel_id: "addr-1".to_string(),
        };
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_connector_errors_keep_their_recoverability() {
        let recoverable = ChannelError::from(ConnectorError::connection_lost("reset by peer"));
        assert!(recoverable.is_recoverable());

        let permanent = ChannelError::from(ConnectorError::AlreadyListening);
        assert!(!permanent.is_recoverable());
    }

    #[test]
    fn test_display_names_the_channel() {
        let error = ChannelError::NotListening {
            channel_id: "tcp://127.0.0.1:9000".to_string(),
        };
        assert!(error.to_string().contains("tcp://127.0.0.1:9000"));
    }
}

// Made with Bob
