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

//! Send buffering with automatic reconnection.
//!
//! The buffered output channel never fails a send because the connection
//! happens to be down: payloads are queued in arrival order and a background
//! loop keeps retrying the inner connection at a fixed cadence. Once the
//! connection is back the queue drains FIFO. Staying offline longer than
//! `max_offline_time` gives up: the queue is dropped wholesale and the
//! channel reports the connection as closed.
//!
//! The input side buffers response messages addressed to receivers that are
//! currently not connected and flushes them when the receiver reconnects
//! within the same window.

use crate::channel::{
    EventSource, InputChannel, InputChannelEvent, OutputChannel, OutputChannelEvent,
    SharedInputChannel, SharedOutputChannel,
};
use crate::error::ChannelError;
use crate::messaging::MessagingSystem;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default bound on how long a channel may stay offline while buffering.
pub const DEFAULT_MAX_OFFLINE_TIME: Duration = Duration::from_secs(10);

/// Default cadence of reconnection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(300);

/// Output channel decorator that buffers sends across disconnects.
pub struct BufferedOutputChannel {
    inner: SharedOutputChannel,
    max_offline_time: Duration,
    retry_interval: Duration,
    events: Arc<EventSource<OutputChannelEvent>>,
    /// Opened locally and neither closed nor given up.
    active: Arc<AtomicBool>,
    /// The inner connection is currently up.
    online: Arc<AtomicBool>,
    /// The offline window lapsed; distinguishes giving up from a local close.
    expired: Arc<AtomicBool>,
    offline_since: Arc<parking_lot::Mutex<Option<Instant>>>,
    queue: Arc<parking_lot::Mutex<VecDeque<Vec<u8>>>>,
    flush: Arc<Notify>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl BufferedOutputChannel {
    /// Wraps `inner` with the given offline bound and retry cadence.
    #[must_use]
    pub fn new(
        inner: SharedOutputChannel,
        max_offline_time: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            inner,
            max_offline_time,
            retry_interval,
            events: Arc::new(EventSource::new()),
            active: Arc::new(AtomicBool::new(false)),
            online: Arc::new(AtomicBool::new(false)),
            expired: Arc::new(AtomicBool::new(false)),
            offline_since: Arc::new(parking_lot::Mutex::new(None)),
            queue: Arc::new(parking_lot::Mutex::new(VecDeque::new())),
            flush: Arc::new(Notify::new()),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of payloads currently waiting for the connection.
    #[must_use]
    pub fn queued_message_count(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl OutputChannel for BufferedOutputChannel {
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
        if self.active.load(Ordering::SeqCst) {
            return Err(ChannelError::AlreadyConnected {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        for stale in tasks.drain(..) {
            stale.abort();
        }

        let mut inner_events = self.inner.subscribe();
        // A failed first connect is not an error here; the reconnect loop
        // keeps trying within the offline window.
        match self.inner.open_connection().await {
            Ok(()) => {
                self.online.store(true, Ordering::SeqCst);
                *self.offline_since.lock() = None;
            }
            Err(e) => {
                debug!(
                    channel_id = %self.inner.channel_id(),
                    error = %e,
                    "initial connect failed, buffering"
                );
                self.online.store(false, Ordering::SeqCst);
                *self.offline_since.lock() = Some(Instant::now());
            }
        }
        self.active.store(true, Ordering::SeqCst);
        self.expired.store(false, Ordering::SeqCst);

        let events = Arc::clone(&self.events);
        let online = Arc::clone(&self.online);
        let offline_since = Arc::clone(&self.offline_since);
        let flush = Arc::clone(&self.flush);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = inner_events.recv().await {
                match event {
                    // Transient inner transitions stay invisible outside.
                    OutputChannelEvent::ConnectionOpened => {
                        *offline_since.lock() = None;
                        online.store(true, Ordering::SeqCst);
                        flush.notify_one();
                    }
                    OutputChannelEvent::ConnectionClosed => {
                        online.store(false, Ordering::SeqCst);
                        offline_since.lock().get_or_insert_with(Instant::now);
                    }
                    OutputChannelEvent::ResponseMessageReceived(payload) => {
                        events.raise(OutputChannelEvent::ResponseMessageReceived(payload));
                    }
                }
            }
        }));

        let inner = Arc::clone(&self.inner);
        let active = Arc::clone(&self.active);
        let online = Arc::clone(&self.online);
        let queue = Arc::clone(&self.queue);
        let flush = Arc::clone(&self.flush);
        tasks.push(tokio::spawn(async move {
            loop {
                flush.notified().await;
                if !active.load(Ordering::SeqCst) {
                    return;
                }
                // Drain strictly front-first so a reconnect cannot reorder.
                while online.load(Ordering::SeqCst) {
                    let front = queue.lock().front().cloned();
                    let Some(payload) = front else { break };
                    if inner.send_message(&payload).await.is_ok() {
                        queue.lock().pop_front();
                    } else {
                        break;
                    }
                }
            }
        }));

        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        let active = Arc::clone(&self.active);
        let online = Arc::clone(&self.online);
        let expired = Arc::clone(&self.expired);
        let offline_since = Arc::clone(&self.offline_since);
        let queue = Arc::clone(&self.queue);
        let max_offline_time = self.max_offline_time;
        let retry_interval = self.retry_interval;
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(retry_interval).await;
                if !active.load(Ordering::SeqCst) {
                    return;
                }
                if online.load(Ordering::SeqCst) {
                    continue;
                }
                let lapsed = offline_since
                    .lock()
                    .is_some_and(|since| since.elapsed() > max_offline_time);
                if lapsed {
                    if active.swap(false, Ordering::SeqCst) {
                        expired.store(true, Ordering::SeqCst);
                        queue.lock().clear();
                        inner.close_connection().await;
                        events.raise(OutputChannelEvent::ConnectionClosed);
                    }
                    return;
                }
                // Success is observed through the inner open event.
                let _ = inner.open_connection().await;
            }
        }));

        self.events.raise(OutputChannelEvent::ConnectionOpened);
        Ok(())
    }

    async fn close_connection(&self) {
        let mut tasks = self.tasks.lock().await;
        self.active.store(false, Ordering::SeqCst);
        self.online.store(false, Ordering::SeqCst);
        self.expired.store(false, Ordering::SeqCst);
        for task in tasks.drain(..) {
            task.abort();
        }
        self.queue.lock().clear();
        *self.offline_since.lock() = None;
        self.inner.close_connection().await;
    }

    fn is_connected(&self) -> bool {
        // Buffering counts as connected: sends are accepted while offline.
        self.active.load(Ordering::SeqCst)
    }

    async fn send_message(&self, payload: &[u8]) -> Result<(), ChannelError> {
        if !self.active.load(Ordering::SeqCst) {
            if self.expired.load(Ordering::SeqCst) {
                return Err(ChannelError::OfflineTimeout {
                    channel_id: self.inner.channel_id().to_string(),
                    max_offline: self.max_offline_time,
                });
            }
            return Err(ChannelError::NotConnected {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        self.queue.lock().push_back(payload.to_vec());
        self.flush.notify_one();
        Ok(())
    }
}

struct OfflineBuffer {
    since: Instant,
    payloads: VecDeque<Vec<u8>>,
}

/// Input channel decorator that buffers responses for absent receivers.
pub struct BufferedInputChannel {
    inner: SharedInputChannel,
    max_offline_time: Duration,
    events: Arc<EventSource<InputChannelEvent>>,
    listening: Arc<AtomicBool>,
    receivers: Arc<parking_lot::Mutex<HashSet<String>>>,
    buffers: Arc<parking_lot::Mutex<HashMap<String, OfflineBuffer>>>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl BufferedInputChannel {
    /// Wraps `inner` with the given offline window for response buffers.
    #[must_use]
    pub fn new(inner: SharedInputChannel, max_offline_time: Duration) -> Self {
        Self {
            inner,
            max_offline_time,
            events: Arc::new(EventSource::new()),
            listening: Arc::new(AtomicBool::new(false)),
            receivers: Arc::new(parking_lot::Mutex::new(HashSet::new())),
            buffers: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    fn buffer_response(&self, response_receiver_id: &str, payload: &[u8]) {
        let mut buffers = self.buffers.lock();
        let buffer = buffers
            .entry(response_receiver_id.to_string())
            .or_insert_with(|| OfflineBuffer {
                since: Instant::now(),
                payloads: VecDeque::new(),
            });
        buffer.payloads.push_back(payload.to_vec());
    }
}

#[async_trait]
impl InputChannel for BufferedInputChannel {
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
        let receivers = Arc::clone(&self.receivers);
        let buffers = Arc::clone(&self.buffers);
        let max_offline_time = self.max_offline_time;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = inner_events.recv().await {
                match event {
                    InputChannelEvent::ResponseReceiverConnected(id) => {
                        receivers.lock().insert(id.clone());
                        // Flush what accumulated while the receiver was away.
                        let pending = buffers.lock().remove(&id);
                        if let Some(buffer) = pending {
                            if buffer.since.elapsed() <= max_offline_time {
                                for payload in buffer.payloads {
                                    let _ = inner.send_response_message(&id, &payload).await;
                                }
                            }
                        }
                        events.raise(InputChannelEvent::ResponseReceiverConnected(id));
                    }
                    InputChannelEvent::ResponseReceiverDisconnected(id) => {
                        receivers.lock().remove(&id);
                        events.raise(InputChannelEvent::ResponseReceiverDisconnected(id));
                    }
                    other => events.raise(other),
                }
            }
        }));

        let listening = Arc::clone(&self.listening);
        let buffers = Arc::clone(&self.buffers);
        let max_offline_time = self.max_offline_time;
        let sweep_interval = (max_offline_time / 2).max(Duration::from_millis(10));
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_interval).await;
                if !listening.load(Ordering::SeqCst) {
                    return;
                }
                buffers
                    .lock()
                    .retain(|_, buffer| buffer.since.elapsed() <= max_offline_time);
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
        self.receivers.lock().clear();
        self.buffers.lock().clear();
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
        if !self.listening.load(Ordering::SeqCst) {
            return Err(ChannelError::NotListening {
                channel_id: self.inner.channel_id().to_string(),
            });
        }
        if self.receivers.lock().contains(response_receiver_id) {
            match self
                .inner
                .send_response_message(response_receiver_id, payload)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(
                        response_receiver_id = %response_receiver_id,
                        error = %e,
                        "response send failed, buffering for reconnect"
                    );
                }
            }
        }
        self.buffer_response(response_receiver_id, payload);
        Ok(())
    }

    async fn disconnect_response_receiver(
        &self,
        response_receiver_id: &str,
    ) -> Result<(), ChannelError> {
        self.buffers.lock().remove(response_receiver_id);
        self.inner
            .disconnect_response_receiver(response_receiver_id)
            .await
    }
}

/// Factory wrapping every created channel in its buffered decorator.
pub struct BufferedMessagingSystem {
    inner: Arc<dyn MessagingSystem>,
    max_offline_time: Duration,
    retry_interval: Duration,
}

impl BufferedMessagingSystem {
    /// Wraps `inner` with the default offline bound and retry cadence
    /// ([`DEFAULT_MAX_OFFLINE_TIME`] / [`DEFAULT_RETRY_INTERVAL`]).
    #[must_use]
    pub fn new(inner: Arc<dyn MessagingSystem>) -> Self {
        Self::with_timing(inner, DEFAULT_MAX_OFFLINE_TIME, DEFAULT_RETRY_INTERVAL)
    }

    /// Wraps `inner` with an explicit offline bound and retry cadence.
    #[must_use]
    pub fn with_timing(
        inner: Arc<dyn MessagingSystem>,
        max_offline_time: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            inner,
            max_offline_time,
            retry_interval,
        }
    }
}

impl MessagingSystem for BufferedMessagingSystem {
    fn create_duplex_output_channel_with_receiver(
        &self,
        channel_id: &str,
        response_receiver_id: &str,
    ) -> Result<SharedOutputChannel, ChannelError> {
        let inner = self
            .inner
            .create_duplex_output_channel_with_receiver(channel_id, response_receiver_id)?;
        Ok(Arc::new(BufferedOutputChannel::new(
            inner,
            self.max_offline_time,
            self.retry_interval,
        )))
    }

    fn create_duplex_input_channel(
        &self,
        channel_id: &str,
    ) -> Result<SharedInputChannel, ChannelError> {
        let inner = self.inner.create_duplex_input_channel(channel_id)?;
        Ok(Arc::new(BufferedInputChannel::new(
            inner,
            self.max_offline_time,
        )))
    }
}


// Made with Bob
