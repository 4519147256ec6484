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

//! Channel decorators.
//!
//! Each composite wraps an inner channel satisfying the same trait and adds
//! one concern: [`monitoring`] probes connection liveness, [`buffered`]
//! rides out disconnects by queueing, [`reliable`] tracks per-message
//! delivery. Because every decorator is again an
//! [`OutputChannel`](crate::channel::OutputChannel) /
//! [`InputChannel`](crate::channel::InputChannel), they stack in any order;
//! the recommended stack is Reliable → Buffered → Monitored → transport,
//! so acknowledgements survive the transient disconnects the inner layers
//! absorb.

pub mod buffered;
pub mod monitoring;
pub mod reliable;

pub use self::buffered::{
    BufferedInputChannel, BufferedMessagingSystem, BufferedOutputChannel,
    DEFAULT_MAX_OFFLINE_TIME, DEFAULT_RETRY_INTERVAL,
};
pub use self::monitoring::{
    MonitoredInputChannel, MonitoredMessagingSystem, MonitoredOutputChannel,
    DEFAULT_PING_FREQUENCY, DEFAULT_PING_RESPONSE_TIMEOUT,
};
pub use self::reliable::{
    DeliveryEvent, MessageId, ReliableInputChannel, ReliableMessagingSystem,
    ReliableOutputChannel, DEFAULT_ACKNOWLEDGE_TIMEOUT,
};

use crate::channel::{SharedInputChannel, SharedOutputChannel};
use crate::error::ChannelError;
use crate::messaging::MessagingSystem;
use std::sync::Arc;
use std::time::Duration;

/// Factory assembling the buffered-over-monitored stack in one step.
///
/// Channels created here behave like `Buffered(Monitored(transport))`:
/// liveness probing detects a dead connection quickly, and the buffering
/// layer above it queues sends and reconnects until the offline window
/// lapses.
pub struct BufferedMonitoredMessagingSystem {
    stack: BufferedMessagingSystem,
}

impl BufferedMonitoredMessagingSystem {
    /// Wraps `inner` with the default timing of both layers.
    #[must_use]
    pub fn new(inner: Arc<dyn MessagingSystem>) -> Self {
        Self::with_timing(
            inner,
            DEFAULT_MAX_OFFLINE_TIME,
            DEFAULT_PING_FREQUENCY,
            DEFAULT_PING_RESPONSE_TIMEOUT,
        )
    }

    /// Wraps `inner` with explicit timing for both layers.
    #[must_use]
    pub fn with_timing(
        inner: Arc<dyn MessagingSystem>,
        max_offline_time: Duration,
        ping_frequency: Duration,
        ping_response_timeout: Duration,
    ) -> Self {
        let monitored = Arc::new(MonitoredMessagingSystem::with_timing(
            inner,
            ping_frequency,
            ping_response_timeout,
        ));
        Self {
            stack: BufferedMessagingSystem::with_timing(
                monitored,
                max_offline_time,
                DEFAULT_RETRY_INTERVAL,
            ),
        }
    }
}

impl MessagingSystem for BufferedMonitoredMessagingSystem {
    fn create_duplex_output_channel_with_receiver(
        &self,
        channel_id: &str,
        response_receiver_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError> {
        self.stack
            .create_duplex_output_channel_with_receiver(channel_id, response_receiver_id)
    }

    fn create_duplex_input_channel(
        &self,
        channel_id: &str,
    ) -> Result<SharedInputChannel, ChannelError> {
        self.stack.create_duplex_input_channel(channel_id)
    }
}

// Made with Bob
