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

//! Per-message delivery acknowledgement.
//!
//! Every payload sent through a reliable channel is wrapped in an envelope
//! carrying a fresh [`MessageId`]. The receiving side acknowledges each
//! envelope automatically; the sender resolves every id to exactly one
//! [`DeliveryEvent`]: `Delivered` when the acknowledgement arrives,
//! `NotDelivered` when it stays out longer than the acknowledge timeout.
//! The channel never resends on its own; whether to retry an
//! unacknowledged message is the caller's decision.

use crate::channel::{
    EventSource, InputChannel, InputChannelEvent, OutputChannel, OutputChannelEvent,
    SharedInputChannel, SharedOutputChannel,
};
use crate::error::ChannelError;
use crate::messaging::MessagingSystem;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

/// Default bound on how long the sender waits for an acknowledgement.
pub const DEFAULT_ACKNOWLEDGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Identifies one tracked message across both endpoints.
pub type MessageId = Uuid;

/// Delivery resolution for a tracked message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// The peer acknowledged the message.
    Delivered(MessageId),
    /// No acknowledgement arrived within the acknowledge timeout.
    NotDelivered(MessageId),
}

const TAG_DATA: u8 = 0x00;
const TAG_ACK: u8 = 0x01;
const ENVELOPE_HEADER: usize = 1 + 16;

fn envelope(tag: u8, message_id: &MessageId, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(ENVELOPE_HEADER + payload.len());
    data.push(tag);
    data.extend_from_slice(message_id.as_bytes());
    data.extend_from_slice(payload);
    data
}

fn open_envelope(data: &[u8]) -> Option<(u8, MessageId, &[u8])> {
    if data.len() < ENVELOPE_HEADER {
        return None;
    }
    let message_id = Uuid::from_slice(&data[1..ENVELOPE_HEADER]).ok()?;
    Some((data[0], message_id, &data[ENVELOPE_HEADER..]))
}

type PendingTable = Arc<parking_lot::Mutex<HashMap<MessageId, Instant>>>;

fn spawn_sweep(
    pending: PendingTable,
    delivery: Arc<EventSource<DeliveryEvent>>,
    acknowledge_timeout: Duration,
) -> JoinHandle<()> {
    let interval = (acknowledge_timeout / 4).max(Duration::from_millis(10));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let expired: Vec<MessageId> = pending
                .lock()
                .iter()
                .filter(|(_, sent)| sent.elapsed() > acknowledge_timeout)
                .map(|(id, _)| *id)
                .collect();
            for id in expired {
                if pending.lock().remove(&id).is_some() {
                    delivery.raise(DeliveryEvent::NotDelivered(id));
                }
            }
        }
    })
}

/// Output channel decorator tracking delivery of every sent message.
pub struct ReliableOutputChannel {
    inner: SharedOutputChannel,
    acknowledge_timeout: Duration,
    events: Arc<EventSource<OutputChannelEvent>>,
    delivery: Arc<EventSource<DeliveryEvent>>,
    pending: PendingTable,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ReliableOutputChannel {
    /// Wraps `inner` with the given acknowledge timeout.
    #[must_use]
    pub fn new(inner: SharedOutputChannel, acknowledge_timeout: Duration) -> Self {
        Self {
            inner,
            acknowledge_timeout,
            events: Arc::new(EventSource::new()),
            delivery: Arc::new(EventSource::new()),
            pending: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber for delivery resolutions.
    #[must_use]
    pub fn subscribe_delivery(&self) -> mpsc::UnboundedReceiver<DeliveryEvent> {
        self.delivery.subscribe()
    }

    /// Sends a payload and returns the id its [`DeliveryEvent`] will carry.
    ///
    /// The id is recorded before transmission, so an acknowledgement can
    /// never race past its own bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] when the channel is closed;
    /// a failed send removes the tracking entry and propagates the error
    /// without raising any delivery event.
    pub async fn send_tracked(&self, payload: &[u8]) -> Result<MessageId, ChannelError> {
        let message_id = Uuid::new_v4();
        self.pending.lock().insert(message_id, Instant::now());
        if let Err(e) = self
            .inner
            .send_message(&envelope(TAG_DATA, &message_id, payload))
            .await
        {
            self.pending.lock().remove(&message_id);
            return Err(e);
        }
        Ok(message_id)
    }
}

#[async_trait]
impl OutputChannel for ReliableOutputChannel {
    fn channel_id(&self) -> &str {
        self.inner.channel_id()
    }

    fn response_receiver_id(&self) -> &str {
        self.inner.response_receiver_id()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<OutputChannelEvent> {
        self.events.subscribe()
    }

    async fn open_connection(&self) -> Result<(), ChannelError> {
        let mut tasks = self.tasks.lock().await;
        if self.inner.is_connected() {
            return Err(ChannelError::AlreadyConnected {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        for stale in tasks.drain(..) {
            stale.abort();
        }

        let mut inner_events = self.inner.subscribe();
        self.inner.open_connection().await?;

        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        let delivery = Arc::clone(&self.delivery);
        let pending = Arc::clone(&self.pending);
        let channel_id = self.inner.channel_id().to_string();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = inner_events.recv().await {
                match event {
                    OutputChannelEvent::ResponseMessageReceived(data) => {
                        match open_envelope(&data) {
                            Some((TAG_ACK, id, _)) => {
                                if pending.lock().remove(&id).is_some() {
                                    delivery.raise(DeliveryEvent::Delivered(id));
                                }
                            }
                            Some((TAG_DATA, id, body)) => {
                                // Acknowledge before the application sees it.
                                let _ =
                                    inner.send_message(&envelope(TAG_ACK, &id, &[])).await;
                                events.raise(OutputChannelEvent::ResponseMessageReceived(
                                    body.to_vec(),
                                ));
                            }
                            _ => warn!(
                                channel_id = %channel_id,
                                "discarding response without a valid envelope"
                            ),
                        }
                    }
                    other => events.raise(other),
                }
            }
        }));

        tasks.push(spawn_sweep(
            Arc::clone(&self.pending),
            Arc::clone(&self.delivery),
            self.acknowledge_timeout,
        ));
        Ok(())
    }

    async fn close_connection(&self) {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        // Locally closing abandons outstanding acknowledgements silently.
        self.pending.lock().clear();
        self.inner.close_connection().await;
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn send_message(&self, payload: &[u8]) -> Result<(), ChannelError> {
        self.send_tracked(payload).await.map(|_| ())
    }
}

/// Input channel decorator tracking delivery of every sent response.
pub struct ReliableInputChannel {
    inner: SharedInputChannel,
    acknowledge_timeout: Duration,
    events: Arc<EventSource<InputChannelEvent>>,
    delivery: Arc<EventSource<DeliveryEvent>>,
    pending: PendingTable,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ReliableInputChannel {
    /// Wraps `inner` with the given acknowledge timeout.
    #[must_use]
    pub fn new(inner: SharedInputChannel, acknowledge_timeout: Duration) -> Self {
        Self {
            inner,
            acknowledge_timeout,
            events: Arc::new(EventSource::new()),
            delivery: Arc::new(EventSource::new()),
            pending: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber for delivery resolutions of sent responses.
    #[must_use]
    pub fn subscribe_delivery(&self) -> mpsc::UnboundedReceiver<DeliveryEvent> {
        self.delivery.subscribe()
    }

    /// Sends a response and returns the id its [`DeliveryEvent`] will carry.
    ///
    /// # Errors
    ///
    /// Same contract as [`InputChannel::send_response_message`]; a failed
    /// send removes the tracking entry and raises no delivery event.
    pub async fn send_tracked(
        &self,
        response_receiver_id: &str,
        payload: &[u8],
    ) -> Result<MessageId, ChannelError> {
        let message_id = Uuid::new_v4();
        self.pending.lock().insert(message_id, Instant::now());
        if let Err(e) = self
            .inner
            .send_response_message(
                response_receiver_id,
                &envelope(TAG_DATA, &message_id, payload),
            )
            .await
        {
            self.pending.lock().remove(&message_id);
            return Err(e);
        }
        Ok(message_id)
    }
}

#[async_trait]
impl InputChannel for ReliableInputChannel {
    fn channel_id(&self) -> &str {
        self.inner.channel_id()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<InputChannelEvent> {
        self.events.subscribe()
    }

    async fn start_listening(&self) -> Result<(), ChannelError> {
        let mut tasks = self.tasks.lock().await;
        if self.inner.is_listening() {
            return Err(ChannelError::AlreadyListening {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        for stale in tasks.drain(..) {
            stale.abort();
        }

        let mut inner_events = self.inner.subscribe();
        self.inner.start_listening().await?;

        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        let delivery = Arc::clone(&self.delivery);
        let pending = Arc::clone(&self.pending);
        let channel_id = self.inner.channel_id().to_string();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = inner_events.recv().await {
                match event {
                    InputChannelEvent::MessageReceived {
                        response_receiver_id,
                        payload,
                    } => match open_envelope(&payload) {
                        Some((TAG_ACK, id, _)) => {
                            if pending.lock().remove(&id).is_some() {
                                delivery.raise(DeliveryEvent::Delivered(id));
                            }
                        }
                        Some((TAG_DATA, id, body)) => {
                            let _ = inner
                                .send_response_message(
                                    &response_receiver_id,
                                    &envelope(TAG_ACK, &id, &[]),
                                )
                                .await;
                            events.raise(InputChannelEvent::MessageReceived {
                                response_receiver_id,
                                payload: body.to_vec(),
                            });
                        }
                        _ => warn!(
                            channel_id = %channel_id,
                            response_receiver_id = %response_receiver_id,
                            "discarding message without a valid envelope"
                        ),
                    },
                    other => events.raise(other),
                }
            }
        }));

        tasks.push(spawn_sweep(
            Arc::clone(&self.pending),
            Arc::clone(&self.delivery),
            self.acknowledge_timeout,
        ));
        Ok(())
    }

    async fn stop_listening(&self) {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        self.pending.lock().clear();
        self.inner.stop_listening().await;
    }

    fn is_listening(&self) -> bool {
        self.inner.is_listening()
    }

    async fn send_response_message(
        &self,
        response_receiver_id: &str,
        payload: &[u8],
    ) -> Result<(), ChannelError> {
        self.send_tracked(response_receiver_id, payload)
            .await
            .map(|_| ())
    }

    async fn disconnect_response_receiver(
        &self,
        response_receiver_id: &str,
    ) -> Result<(), ChannelError> {
        self.inner
            .disconnect_response_receiver(response_receiver_id)
            .await
    }
}

/// Factory wrapping every created channel in its reliable decorator.
pub struct ReliableMessagingSystem {
    inner: Arc<dyn MessagingSystem>,
    acknowledge_timeout: Duration,
}

impl ReliableMessagingSystem {
    /// Wraps `inner` with the default acknowledge timeout
    /// ([`DEFAULT_ACKNOWLEDGE_TIMEOUT`]).
    #[must_use]
    pub fn new(inner: Arc<dyn MessagingSystem>) -> Self {
        Self::with_timeout(inner, DEFAULT_ACKNOWLEDGE_TIMEOUT)
    }

    /// Wraps `inner` with an explicit acknowledge timeout.
    #[must_use]
    pub fn with_timeout(inner: Arc<dyn MessagingSystem>, acknowledge_timeout: Duration) -> Self {
        Self {
            inner,
            acknowledge_timeout,
        }
    }

    /// Creates a reliable output channel as its concrete type, keeping
    /// [`ReliableOutputChannel::send_tracked`] and the delivery stream
    /// accessible.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannelId`] when `channel_id` is empty.
    pub fn create_reliable_duplex_output_channel(
        &self,
        channel_id: &str,
    ) -> Result<Arc<ReliableOutputChannel>, ChannelError> {
        let inner = self.inner.create_duplex_output_channel(channel_id)?;
        Ok(Arc::new(ReliableOutputChannel::new(
            inner,
            self.acknowledge_timeout,
        )))
    }

    /// Creates a reliable input channel as its concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannelId`] when `channel_id` is empty.
    pub fn create_reliable_duplex_input_channel(
        &self,
        channel_id: &str,
    ) -> Result<Arc<ReliableInputChannel>, ChannelError> {
        let inner = self.inner.create_duplex_input_channel(channel_id)?;
        Ok(Arc::new(ReliableInputChannel::new(
            inner,
            self.acknowledge_timeout,
        )))
    }
}

impl MessagingSystem for ReliableMessagingSystem {
    fn create_duplex_output_channel_with_receiver(
        &self,
        channel_id: &str,
        response_receiver_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError> {
        let inner = self
            .inner
            .create_duplex_output_channel_with_receiver(channel_id, response_receiver_id)?;
        Ok(Arc::new(ReliableOutputChannel::new(
            inner,
            self.acknowledge_timeout,
        )))
    }

    fn create_duplex_input_channel(
        &self,
        channel_id: &str,
    ) -> Result<SharedInputChannel, ChannelError> {
        let inner = self.inner.create_duplex_input_channel(channel_id)?;
        Ok(Arc::new(ReliableInputChannel::new(
            inner,
            self.acknowledge_timeout,
        )))
    }
}


// Made with Bob
