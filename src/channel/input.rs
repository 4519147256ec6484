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

//! Service-side duplex channel.

use crate::channel::{validate_channel_id, EventSource, InputChannel, InputChannelEvent};
use crate::connector::{InputConnector, MessageContext, MessageHandler};
use crate::error::ChannelError;
use crate::protocol::ProtocolMessage;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Service side of a duplex connection, driving one
/// [`InputConnector`].
///
/// The channel keeps a registry of connected response receivers. Each
/// receiver id connects at most once per lifetime of its connection: a
/// duplicate open is a protocol violation and disconnects the offender.
/// Every registered receiver produces exactly one
/// [`InputChannelEvent::ResponseReceiverDisconnected`] when it goes away,
/// no matter whether it closed in an orderly fashion, lost its transport, or
/// was disconnected by the service.
pub struct DuplexInputChannel {
    channel_id: String,
    connector: Arc<dyn InputConnector>,
    events: Arc<EventSource<InputChannelEvent>>,
    listening: Arc<AtomicBool>,
    receivers: Arc<parking_lot::Mutex<HashSet<String>>>,
    dispatcher: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DuplexInputChannel {
    /// Creates a stopped input channel over `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannelId`] when `channel_id` is empty.
    pub fn new(
        channel_id: impl Into<String>,
        connector: Arc<dyn InputConnector>,
    ) -> Result<Self, ChannelError> {
        let channel_id = channel_id.into();
        validate_channel_id(&channel_id)?;
        Ok(Self {
            channel_id,
            connector,
            events: Arc::new(EventSource::new()),
            listening: Arc::new(AtomicBool::new(false)),
            receivers: Arc::new(parking_lot::Mutex::new(HashSet::new())),
            dispatcher: tokio::sync::Mutex::new(None),
        })
    }
}

#[async_trait]
impl InputChannel for DuplexInputChannel {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<InputChannelEvent> {
        self.events.subscribe()
    }

    async fn start_listening(&self) -> Result<(), ChannelError> {
        let mut dispatcher = self.dispatcher.lock().await;
        if self.listening.load(Ordering::SeqCst) {
            return Err(ChannelError::AlreadyListening {
                channel_id: self.channel_id.clone(),
            });
        }
        if let Some(stale) = dispatcher.take() {
            stale.abort();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |ctx| tx.send(ctx).is_ok());
        if let Err(e) = self.connector.start_listening(handler).await {
            self.connector.stop_listening().await;
            return Err(e.into());
        }

        self.listening.store(true, Ordering::SeqCst);
        *dispatcher = Some(tokio::spawn(dispatch(
            rx,
            Arc::clone(&self.connector),
            Arc::clone(&self.events),
            Arc::clone(&self.receivers),
            self.channel_id.clone(),
        )));
        debug!(channel_id = %self.channel_id, "input channel listening");
        Ok(())
    }

    async fn stop_listening(&self) {
        let mut dispatcher = self.dispatcher.lock().await;
        self.listening.store(false, Ordering::SeqCst);
        if let Some(task) = dispatcher.take() {
            task.abort();
        }
        // Connected clients get a close notification from the connector;
        // the local stop itself raises no events.
        self.receivers.lock().clear();
        self.connector.stop_listening().await;
        debug!(channel_id = %self.channel_id, "input channel stopped");
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
                channel_id: self.channel_id.clone(),
            });
        }
        if !self.receivers.lock().contains(response_receiver_id) {
            return Err(ChannelError::ResponseReceiverNotFound {
                response_receiver_id: response_receiver_id.to_string(),
            });
        }
        match self
            .connector
            .send_response_message(response_receiver_id, payload)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                // Same consequence as a transport disconnect.
                if self.receivers.lock().remove(response_receiver_id) {
                    self.connector.close_client(response_receiver_id).await;
                    self.events.raise(InputChannelEvent::ResponseReceiverDisconnected(
                        response_receiver_id.to_string(),
                    ));
                }
                Err(e.into())
            }
        }
    }

    async fn disconnect_response_receiver(
        &self,
        response_receiver_id: &str,
    ) -> Result<(), ChannelError> {
        if !self.receivers.lock().remove(response_receiver_id) {
            return Err(ChannelError::ResponseReceiverNotFound {
                response_receiver_id: response_receiver_id.to_string(),
            });
        }
        self.connector.close_client(response_receiver_id).await;
        self.events.raise(InputChannelEvent::ResponseReceiverDisconnected(
            response_receiver_id.to_string(),
        ));
        Ok(())
    }
}

/// Consumes connector callbacks and maintains the receiver registry.
async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<MessageContext>,
    connector: Arc<dyn InputConnector>,
    events: Arc<EventSource<InputChannelEvent>>,
    receivers: Arc<parking_lot::Mutex<HashSet<String>>>,
    channel_id: String,
) {
    while let Some(ctx) = rx.recv().await {
        match ctx.message {
            Some(ProtocolMessage::OpenConnection {
                response_receiver_id,
            }) => {
                let duplicate = !receivers.lock().insert(response_receiver_id.clone());
                if duplicate {
                    // Protocol violation; the id cannot be trusted anymore.
                    warn!(
                        channel_id = %channel_id,
                        response_receiver_id = %response_receiver_id,
                        "duplicate open connection"
                    );
                    connector.close_client(&response_receiver_id).await;
                    receivers.lock().remove(&response_receiver_id);
                    events.raise(InputChannelEvent::ResponseReceiverDisconnected(
                        response_receiver_id,
                    ));
                } else {
                    events.raise(InputChannelEvent::ResponseReceiverConnected(
                        response_receiver_id,
                    ));
                }
            }
            Some(ProtocolMessage::CloseConnection {
                response_receiver_id,
            }) => {
                if receivers.lock().remove(&response_receiver_id) {
                    events.raise(InputChannelEvent::ResponseReceiverDisconnected(
                        response_receiver_id,
                    ));
                }
            }
            Some(ProtocolMessage::Data {
                response_receiver_id,
                payload,
            }) => {
                if receivers.lock().contains(&response_receiver_id) {
                    events.raise(InputChannelEvent::MessageReceived {
                        response_receiver_id,
                        payload,
                    });
                } else {
                    warn!(
                        channel_id = %channel_id,
                        response_receiver_id = %response_receiver_id,
                        "message from an unconnected response receiver"
                    );
                    connector.close_client(&response_receiver_id).await;
                }
            }
            Some(ProtocolMessage::Unknown) => {
                warn!(
                    channel_id = %channel_id,
                    sender = %ctx.sender_address,
                    "malformed frame, disconnecting sender"
                );
                connector.close_client(&ctx.sender_address).await;
            }
            None => {
                // Transport-level disconnect without an orderly CLOSE frame.
                if receivers.lock().remove(&ctx.sender_address) {
                    events.raise(InputChannelEvent::ResponseReceiverDisconnected(
                        ctx.sender_address,
                    ));
                }
            }
        }
    }
}


// Made with Bob
