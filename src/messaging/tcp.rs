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

//! TCP messaging factory.

use crate::channel::{
    DuplexInputChannel, DuplexOutputChannel, SharedInputChannel, SharedOutputChannel,
};
use crate::connector::tcp::{TcpInputConnector, TcpOutputConnector};
use crate::error::ChannelError;
use crate::messaging::MessagingSystem;
use crate::protocol::{BinaryProtocolFormatter, ProtocolFormatter};
use std::sync::Arc;

/// Creates channels communicating over TCP.
///
/// Channel ids are socket addresses, optionally prefixed with `tcp://`:
/// `"127.0.0.1:8090"` or `"tcp://192.168.1.10:8090"`.
pub struct TcpMessagingSystem {
    formatter: Arc<dyn ProtocolFormatter>,
}

impl TcpMessagingSystem {
    /// Creates a factory using the binary wire format.
    #[must_use]
    pub fn new() -> Self {
        Self::with_formatter(Arc::new(BinaryProtocolFormatter::new()))
    }

    /// Creates a factory using a custom wire format.
    ///
    /// Both ends of a channel must use the same format.
    #[must_use]
    pub fn with_formatter(formatter: Arc<dyn ProtocolFormatter>) -> Self {
        Self { formatter }
    }
}

impl Default for TcpMessagingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagingSystem for TcpMessagingSystem {
    fn create_duplex_output_channel_with_receiver(
        &self,
        channel_id: &str,
        response_receiver_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError> {
        let connector = Arc::new(TcpOutputConnector::new(
            channel_id,
            response_receiver_id,
            Arc::clone(&self.formatter),
        ));
        Ok(Arc::new(DuplexOutputChannel::new(
            channel_id,
            response_receiver_id,
            connector,
        )?))
    }

    fn create_duplex_input_channel(
        &self,
        channel_id: &str,
    ) -> Result<SharedInputChannel, ChannelError> {
        let connector = Arc::new(TcpInputConnector::new(
            channel_id,
            Arc::clone(&self.formatter),
        ));
        Ok(Arc::new(DuplexInputChannel::new(channel_id, connector)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ids_keep_their_scheme_prefix() {
        let messaging = TcpMessagingSystem::new();
        let output = messaging
            .create_duplex_output_channel("tcp://127.0.0.1:18091")
            .unwrap();
        assert_eq!(output.channel_id(), "tcp://127.0.0.1:18091");
    }

    #[test]
    fn test_empty_channel_id_is_rejected() {
        let messaging = TcpMessagingSystem::new();
        assert!(matches!(
            messaging.create_duplex_input_channel(""),
            Err(ChannelError::InvalidChannelId)
        ));
    }
}

// Made with Bob
