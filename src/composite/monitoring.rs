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

//! Ping/pong connection monitoring.
//!
//! The monitored channels wrap an inner channel pair and exchange liveness
//! probes inside the regular data stream: every payload gets a one-byte
//! sub-frame tag, so probes are invisible to the application. The output
//! side pings at `ping_frequency` and declares the connection broken when no
//! pong arrives within `ping_response_timeout` of the expected schedule; the
//! input side disconnects any receiver that stays silent longer than the
//! configured receive timeout.

use crate::channel::{
    EventSource, InputChannel, InputChannelEvent, OutputChannel, OutputChannelEvent,
    SharedInputChannel, SharedOutputChannel,
};
use crate::error::ChannelError;
use crate::messaging::MessagingSystem;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Default interval between pings.
pub const DEFAULT_PING_FREQUENCY: Duration = Duration::from_millis(1000);

/// Default extra time granted for the pong after each ping.
pub const DEFAULT_PING_RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

const TAG_MESSAGE: u8 = 0x00;
const TAG_PING: u8 = 0x01;
const TAG_PONG: u8 = 0x02;

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(tag);
    data.extend_from_slice(payload);
    data
}

fn split_frame(data: &[u8]) -> Option<(u8, &[u8])> {
    data.split_first().map(|(tag, body)| (*tag, body))
}

/// Output channel decorator that probes the connection with pings.
///
/// The connection is declared broken, closing the inner channel and raising
/// [`OutputChannelEvent::ConnectionClosed`], when a ping cannot be sent or
/// the pong stays out longer than `ping_frequency + ping_response_timeout`.
pub struct MonitoredOutputChannel {
    inner: SharedOutputChannel,
    ping_frequency: Duration,
    ping_response_timeout: Duration,
    events: Arc<EventSource<OutputChannelEvent>>,
    connected: Arc<AtomicBool>,
    last_pong: Arc<parking_lot::Mutex<Instant>>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl MonitoredOutputChannel {
    /// Wraps `inner` with the given probe timing.
    #[must_use]
    pub fn new(
        inner: SharedOutputChannel,
        ping_frequency: Duration,
        ping_response_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            ping_frequency,
            ping_response_timeout,
            events: Arc::new(EventSource::new()),
            connected: Arc::new(AtomicBool::new(false)),
            last_pong: Arc::new(parking_lot::Mutex::new(Instant::now())),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OutputChannel for MonitoredOutputChannel {
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
        if self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::AlreadyConnected {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        for stale in tasks.drain(..) {
            stale.abort();
        }

        // Subscribe before opening so no inner event can slip past.
        let mut inner_events = self.inner.subscribe();
        self.inner.open_connection().await?;
        *self.last_pong.lock() = Instant::now();
        self.connected.store(true, Ordering::SeqCst);

        let events = Arc::clone(&self.events);
        let connected = Arc::clone(&self.connected);
        let last_pong = Arc::clone(&self.last_pong);
        let channel_id = self.inner.channel_id().to_string();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = inner_events.recv().await {
                match event {
                    // The monitored channel raises its own open event.
                    OutputChannelEvent::ConnectionOpened => {}
                    OutputChannelEvent::ConnectionClosed => {
                        if connected.swap(false, Ordering::SeqCst) {
                            events.raise(OutputChannelEvent::ConnectionClosed);
                        }
                        return;
                    }
                    OutputChannelEvent::ResponseMessageReceived(data) => {
                        match split_frame(&data) {
                            Some((TAG_PONG, _)) => *last_pong.lock() = Instant::now(),
                            Some((TAG_MESSAGE, body)) => events.raise(
                                OutputChannelEvent::ResponseMessageReceived(body.to_vec()),
                            ),
                            _ => warn!(
                                channel_id = %channel_id,
                                "discarding response with unknown sub-frame tag"
                            ),
                        }
                    }
                }
            }
        }));

        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        let connected = Arc::clone(&self.connected);
        let last_pong = Arc::clone(&self.last_pong);
        let ping_frequency = self.ping_frequency;
        let pong_deadline = self.ping_frequency + self.ping_response_timeout;
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(ping_frequency).await;
                if !connected.load(Ordering::SeqCst) {
                    return;
                }
                let ping_failed = inner.send_message(&frame(TAG_PING, &[])).await.is_err();
                let pong_overdue = last_pong.lock().elapsed() > pong_deadline;
                if ping_failed || pong_overdue {
                    if connected.swap(false, Ordering::SeqCst) {
                        inner.close_connection().await;
                        events.raise(OutputChannelEvent::ConnectionClosed);
                    }
                    return;
                }
            }
        }));

        self.events.raise(OutputChannelEvent::ConnectionOpened);
        Ok(())
    }

    async fn close_connection(&self) {
        let mut tasks = self.tasks.lock().await;
        self.connected.store(false, Ordering::SeqCst);
        for task in tasks.drain(..) {
            task.abort();
        }
        self.inner.close_connection().await;
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, payload: &[u8]) -> Result<(), ChannelError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::NotConnected {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        self.inner.send_message(&frame(TAG_MESSAGE, payload)).await
    }
}

/// Input channel decorator that answers pings and evicts silent receivers.
pub struct MonitoredInputChannel {
    inner: SharedInputChannel,
    receive_timeout: Duration,
    events: Arc<EventSource<InputChannelEvent>>,
    listening: Arc<AtomicBool>,
    activity: Arc<parking_lot::Mutex<HashMap<String, Instant>>>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl MonitoredInputChannel {
    /// Wraps `inner`, disconnecting receivers silent for `receive_timeout`.
    #[must_use]
    pub fn new(inner: SharedInputChannel, receive_timeout: Duration) -> Self {
        Self {
            inner,
            receive_timeout,
            events: Arc::new(EventSource::new()),
            listening: Arc::new(AtomicBool::new(false)),
            activity: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl InputChannel for MonitoredInputChannel {
    fn channel_id(&self) -> &str {
        self.inner.channel_id()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<InputChannelEvent> {
        self.events.subscribe()
    }

    async fn start_listening(&self) -> Result<(), ChannelError> {
        let mut tasks = self.tasks.lock().await;
        if self.listening.load(Ordering::SeqCst) {
            return Err(ChannelError::AlreadyListening {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        for stale in tasks.drain(..) {
            stale.abort();
        }

        let mut inner_events = self.inner.subscribe();
        self.inner.start_listening().await?;
        self.listening.store(true, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        let activity = Arc::clone(&self.activity);
        let channel_id = self.inner.channel_id().to_string();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = inner_events.recv().await {
                match event {
                    InputChannelEvent::ResponseReceiverConnected(id) => {
                        activity.lock().insert(id.clone(), Instant::now());
                        events.raise(InputChannelEvent::ResponseReceiverConnected(id));
                    }
                    InputChannelEvent::ResponseReceiverDisconnected(id) => {
                        activity.lock().remove(&id);
                        events.raise(InputChannelEvent::ResponseReceiverDisconnected(id));
                    }
                    InputChannelEvent::MessageReceived {
                        response_receiver_id,
                        payload,
                    } => {
                        activity
                            .lock()
                            .insert(response_receiver_id.clone(), Instant::now());
                        match split_frame(&payload) {
                            Some((TAG_PING, _)) => {
                                // A failed pong surfaces as a disconnect of
                                // that receiver on the inner channel.
                                let _ = inner
                                    .send_response_message(
                                        &response_receiver_id,
                                        &frame(TAG_PONG, &[]),
                                    )
                                    .await;
                            }
                            Some((TAG_MESSAGE, body)) => {
                                events.raise(InputChannelEvent::MessageReceived {
                                    response_receiver_id,
                                    payload: body.to_vec(),
                                });
                            }
                            _ => warn!(
                                channel_id = %channel_id,
                                response_receiver_id = %response_receiver_id,
                                "discarding message with unknown sub-frame tag"
                            ),
                        }
                    }
                }
            }
        }));

        let inner = Arc::clone(&self.inner);
        let listening = Arc::clone(&self.listening);
        let activity = Arc::clone(&self.activity);
        let receive_timeout = self.receive_timeout;
        let sweep_interval = (receive_timeout / 2).max(Duration::from_millis(10));
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_interval).await;
                if !listening.load(Ordering::SeqCst) {
                    return;
                }
                let silent: Vec<String> = activity
                    .lock()
                    .iter()
                    .filter(|(_, last)| last.elapsed() > receive_timeout)
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in silent {
                    activity.lock().remove(&id);
                    // Raises the disconnect event through the pump.
                    let _ = inner.disconnect_response_receiver(&id).await;
                }
            }
        }));
        Ok(())
    }

    async fn stop_listening(&self) {
        let mut tasks = self.tasks.lock().await;
        self.listening.store(false, Ordering::SeqCst);
        for task in tasks.drain(..) {
            task.abort();
        }
        self.activity.lock().clear();
        self.inner.stop_listening().await;
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    async fn send_response_message(
        &self,
        response_receiver_id: &str,
        payload: &[u8],
    ) -> Result<(), ChannelError> {
        self.inner
            .send_response_message(response_receiver_id, &frame(TAG_MESSAGE, payload))
            .await
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

/// Factory wrapping every created channel in its monitored decorator.
pub struct MonitoredMessagingSystem {
    inner: Arc<dyn MessagingSystem>,
    ping_frequency: Duration,
    ping_response_timeout: Duration,
}

impl MonitoredMessagingSystem {
    /// Wraps `inner` with the default probe timing
    /// ([`DEFAULT_PING_FREQUENCY`] / [`DEFAULT_PING_RESPONSE_TIMEOUT`]).
    #[must_use]
    pub fn new(inner: Arc<dyn MessagingSystem>) -> Self {
        Self::with_timing(inner, DEFAULT_PING_FREQUENCY, DEFAULT_PING_RESPONSE_TIMEOUT)
    }

    /// Wraps `inner` with explicit probe timing.
    ///
    /// Input channels disconnect receivers that stay silent longer than
    /// `ping_frequency + ping_response_timeout`.
    #[must_use]
    pub fn with_timing(
        inner: Arc<dyn MessagingSystem>,
        ping_frequency: Duration,
        ping_response_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            ping_frequency,
            ping_response_timeout,
        }
    }

    fn receive_timeout(&self) -> Duration {
        self.ping_frequency + self.ping_response_timeout
    }
}

impl MessagingSystem for MonitoredMessagingSystem {
    fn create_duplex_output_channel_with_receiver(
        &self,
        channel_id: &str,
        response_receiver_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError> {
        let inner = self
            .inner
            .create_duplex_output_channel_with_receiver(channel_id, response_receiver_id)?;
        Ok(Arc::new(MonitoredOutputChannel::new(
            inner,
            self.ping_frequency,
            self.ping_response_timeout,
        )))
    }

    fn create_duplex_input_channel(
        &self,
        channel_id: &str,
    ) -> Result<SharedInputChannel, ChannelError> {
        let inner = self.inner.create_duplex_input_channel(channel_id)?;
        Ok(Arc::new(MonitoredInputChannel::new(
            inner,
            self.receive_timeout(),
        )))
    }
}


// Made with Bob
