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

//! In-process messaging factory.

use crate::channel::{
    DuplexInputChannel, DuplexOutputChannel, SharedInputChannel, SharedOutputChannel,
};
use crate::connector::memory::{MemoryInputConnector, MemoryOutputConnector};
use crate::error::ChannelError;
use crate::messaging::MessagingSystem;
use crate::protocol::{BinaryProtocolFormatter, ProtocolFormatter};
use std::sync::Arc;

/// Creates channels communicating through a process-wide registry,
/// without any network I/O.
///
/// Channel ids are plain strings scoped to the process; two memory
/// messaging systems in the same process share the address space.
///
/// # Examples
///
/// ```
/// use crosswire::messaging::{MemoryMessagingSystem, MessagingSystem};
///
/// let messaging = MemoryMessagingSystem::new();
/// let output = messaging.create_duplex_output_channel("service-a").unwrap();
/// assert_eq!(output.channel_id(), "service-a");
/// ```
pub struct MemoryMessagingSystem {
    formatter: Arc<dyn ProtocolFormatter>,
}

impl MemoryMessagingSystem {
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

impl Default for MemoryMessagingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagingSystem for MemoryMessagingSystem {
    fn create_duplex_output_channel_with_receiver(
        &self,
        channel_id: &str,
        response_receiver_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError> {
        let connector = Arc::new(MemoryOutputConnector::new(
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
        let connector = Arc::new(MemoryInputConnector::new(
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
    fn test_generated_receiver_ids_differ_per_channel() {
        let messaging = MemoryMessagingSystem::new();
        let a = messaging.create_duplex_output_channel("factory-ids").unwrap();
        let b = messaging.create_duplex_output_channel("factory-ids").unwrap();
        assert_ne!(a.response_receiver_id(), b.response_receiver_id());
    }

    #[test]
    fn test_explicit_receiver_id_is_kept() {
        let messaging = MemoryMessagingSystem::new();
        let channel = messaging
            .create_duplex_output_channel_with_receiver("factory-explicit", "client-7")
            .unwrap();
        assert_eq!(channel.response_receiver_id(), "client-7");
    }

    #[test]
    fn test_empty_channel_id_is_rejected() {
        let messaging = MemoryMessagingSystem::new();
        assert!(matches!(
            messaging.create_duplex_output_channel(""),
            Err(ChannelError::InvalidChannelId)
        ));
        assert!(matches!(
            messaging.create_duplex_input_channel(""),
            Err(ChannelError::InvalidChannelId)
        ));
    }
}

// Made with Bob
