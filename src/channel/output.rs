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

//! Client-side duplex channel.

use crate::channel::{
    validate_channel_id, EventSource, OutputChannel, OutputChannelEvent,
};
use crate::connector::{MessageContext, MessageHandler, OutputConnector};
use crate::error::ChannelError;
use crate::protocol::ProtocolMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Client side of a duplex connection, driving one
/// [`OutputConnector`].
///
/// The channel owns the connection lifecycle: it opens the connector,
/// dispatches incoming response messages as
/// [`OutputChannelEvent::ResponseMessageReceived`], and tears the connection
/// down when the remote side closes it or the transport fails. A locally
/// requested close is silent; every other way the connection ends raises
/// [`OutputChannelEvent::ConnectionClosed`] exactly once.
pub struct DuplexOutputChannel {
    channel_id: String,
    response_receiver_id: String,
    connector: Arc<dyn OutputConnector>,
    events: Arc<EventSource<OutputChannelEvent>>,
    connected: Arc<AtomicBool>,
    dispatcher: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DuplexOutputChannel {
    /// Creates a closed output channel over `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannelId`] when `channel_id` is empty.
    pub fn new(
        channel_id: impl Into<String>,
        response_receiver_id: impl Into<String>,
        connector: Arc<dyn OutputConnector>,
    ) -> Result<Self, ChannelError> {
        let channel_id = channel_id.into();
        validate_channel_id(&channel_id)?;
        Ok(Self {
            channel_id,
            response_receiver_id: response_receiver_id.into(),
            connector,
            events: Arc::new(EventSource::new()),
            connected: Arc::new(AtomicBool::new(false)),
            dispatcher: tokio::sync::Mutex::new(None),
        })
    }

    async fn tear_down(&self) {
        let mut dispatcher = self.dispatcher.lock().await;
        if let Some(task) = dispatcher.take() {
            task.abort();
        }
        self.connector.close_connection().await;
    }
}

#[async_trait]
impl OutputChannel for DuplexOutputChannel {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn response_receiver_id(&self) -> &str {
        &self.response_receiver_id
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<OutputChannelEvent> {
        self.events.subscribe()
    }

    async fn open_connection(&self) -> Result<(), ChannelError> {
        let mut dispatcher = self.dispatcher.lock().await;
        if self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::AlreadyConnected {
                channel_id: self.channel_id.clone(),
            });
        }
        // A previous connection may have ended remotely; its dispatcher has
        // already finished, so the slot can be reused.
        if let Some(stale) = dispatcher.take() {
            stale.abort();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |ctx| tx.send(ctx).is_ok());
        if let Err(e) = self.connector.open_connection(handler).await {
            self.connector.close_connection().await;
            return Err(e.into());
        }

        self.connected.store(true, Ordering::SeqCst);
        *dispatcher = Some(tokio::spawn(dispatch(
            rx,
            Arc::clone(&self.connector),
            Arc::clone(&self.events),
            Arc::clone(&self.connected),
            self.channel_id.clone(),
        )));
        self.events.raise(OutputChannelEvent::ConnectionOpened);
        debug!(channel_id = %self.channel_id, "output channel opened");
        Ok(())
    }

    async fn close_connection(&self) {
        // Local close is silent: take connected first so the dispatcher
        // cannot turn the connector shutdown into a ConnectionClosed event.
        self.connected.store(false, Ordering::SeqCst);
        self.tear_down().await;
        debug!(channel_id = %self.channel_id, "output channel closed");
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, payload: &[u8]) -> Result<(), ChannelError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::NotConnected {
                channel_id: self.channel_id.clone(),
            });
        }
        match self.connector.send_request_message(payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // The connection is unusable once a send fails.
                if self.connected.swap(false, Ordering::SeqCst) {
                    self.tear_down().await;
                    self.events.raise(OutputChannelEvent::ConnectionClosed);
                }
                Err(e.into())
            }
        }
    }
}

/// Consumes connector callbacks and turns them into channel events.
async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<MessageContext>,
    connector: Arc<dyn OutputConnector>,
    events: Arc<EventSource<OutputChannelEvent>>,
    connected: Arc<AtomicBool>,
    channel_id: String,
) {
    while let Some(ctx) = rx.recv().await {
        match ctx.message {
            Some(ProtocolMessage::Data { payload, .. }) => {
                events.raise(OutputChannelEvent::ResponseMessageReceived(payload));
            }
            Some(ProtocolMessage::CloseConnection { .. }) | None => {
                // Remote close or transport loss. A concurrent local close
                // wins the swap and keeps the teardown silent.
                if connected.swap(false, Ordering::SeqCst) {
                    connector.close_connection().await;
                    events.raise(OutputChannelEvent::ConnectionClosed);
                }
                return;
            }
            Some(other) => {
                warn!(
                    channel_id = %channel_id,
                    message = ?other,
                    "discarding unexpected frame on output channel"
                );
            }
        }
    }
}


// Made with Bob
