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

//! Channel factories.
//!
//! A [`MessagingSystem`] creates output and input channels bound to one
//! transport. Application code depends only on this trait, so swapping the
//! transport, or wrapping it in a composite factory such as
//! [`MonitoredMessagingSystem`](crate::composite::MonitoredMessagingSystem),
//! changes a single constructor call.

mod memory;
mod tcp;

pub use self::memory::MemoryMessagingSystem;
pub use self::tcp::TcpMessagingSystem;

use crate::channel::{
    generate_response_receiver_id, SharedInputChannel, SharedOutputChannel,
};
use crate::error::ChannelError;

/// Factory for duplex channels over one transport.
pub trait MessagingSystem: Send + Sync {
    /// Creates an output channel connecting to `channel_id` with a freshly
    /// generated response receiver id.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannelId`] when `channel_id` is empty.
    fn create_duplex_output_channel(
        &self,
        channel_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError> {
        self.create_duplex_output_channel_with_receiver(
            channel_id,
            &generate_response_receiver_id(channel_id),
        )
    }

    /// Creates an output channel with an explicit response receiver id.
    ///
    /// The id must be unique among all clients of the input channel;
    /// a duplicate gets disconnected as a protocol violation.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannelId`] when `channel_id` is empty.
    fn create_duplex_output_channel_with_receiver(
        &self,
        channel_id: &str,
        response_receiver_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError>;

    /// Creates an input channel listening on `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannelId`] when `channel_id` is empty.
    fn create_duplex_input_channel(
        &self,
        channel_id: &str,
    ) -> Result<SharedInputChannel, ChannelError>;
}

// Made with Bob
