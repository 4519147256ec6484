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

//! In-process reference transport.
//!
//! The memory transport connects output and input connectors inside one
//! process through unbounded channels and a process-wide registry of
//! listening endpoints keyed by channel id. It has no network overhead and
//! deterministic delivery, which makes it the transport of choice for tests
//! and for in-process messaging between components.

use crate::connector::{
    ConnectorError, InputConnector, MessageContext, MessageHandler, OutputConnector,
};
use crate::protocol::{ProtocolFormatter, ProtocolMessage};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// One transport-level record travelling from a client to a listener.
struct MemoryPacket {
    /// Transport identity of the sending client.
    sender_address: String,
    /// The encoded frame.
    data: Vec<u8>,
    /// Pipe the listener can use to send frames back to this client.
    reply: mpsc::UnboundedSender<Vec<u8>>,
}

/// Process-wide registry of listening memory endpoints.
static LISTENERS: Lazy<Mutex<HashMap<String, mpsc::UnboundedSender<MemoryPacket>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct OutputState {
    to_listener: mpsc::UnboundedSender<MemoryPacket>,
    reply: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
}

/// Client-side connector of the in-process transport.
pub struct MemoryOutputConnector {
    channel_id: String,
    response_receiver_id: String,
    formatter: Arc<dyn ProtocolFormatter>,
    state: Mutex<Option<OutputState>>,
}

impl MemoryOutputConnector {
    /// Creates a connector addressing the listener registered under
    /// `channel_id`, identifying itself as `response_receiver_id`.
    pub fn new(
        channel_id: impl Into<String>,
        response_receiver_id: impl Into<String>,
        formatter: Arc<dyn ProtocolFormatter>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            response_receiver_id: response_receiver_id.into(),
            formatter,
            state: Mutex::new(None),
        }
    }
}

#[async_trait]
impl OutputConnector for MemoryOutputConnector {
    async fn open_connection(&self, handler: MessageHandler) -> Result<(), ConnectorError> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(ConnectorError::AlreadyConnected);
        }

        let to_listener = LISTENERS
            .lock()
            .get(&self.channel_id)
            .cloned()
            .ok_or_else(|| ConnectorError::ConnectionFailed {
                address: self.channel_id.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "no listening endpoint"),
            })?;

        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let open_frame = self
            .formatter
            .encode_open_connection(&self.response_receiver_id)?;
        to_listener
            .send(MemoryPacket {
                sender_address: self.response_receiver_id.clone(),
                data: open_frame,
                reply: reply_tx.clone(),
            })
            .map_err(|_| ConnectorError::ConnectionFailed {
                address: self.channel_id.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionReset, "listener stopped"),
            })?;

        let formatter = Arc::clone(&self.formatter);
        let sender_address = self.channel_id.clone();
        let reader = tokio::spawn(async move {
            while let Some(data) = reply_rx.recv().await {
                let message = formatter.decode(&data);
                let carry_on = handler(MessageContext {
                    message,
                    sender_address: sender_address.clone(),
                });
                if !carry_on {
                    return;
                }
            }
            // Listener dropped its reply handle: transport-level close.
            handler(MessageContext {
                message: None,
                sender_address,
            });
        });

        *state = Some(OutputState {
            to_listener,
            reply: reply_tx,
            reader,
        });
        Ok(())
    }

    async fn close_connection(&self) {
        let state = self.state.lock().take();
        if let Some(state) = state {
            match self
                .formatter
                .encode_close_connection(&self.response_receiver_id)
            {
                Ok(frame) => {
                    let _ = state.to_listener.send(MemoryPacket {
                        sender_address: self.response_receiver_id.clone(),
                        data: frame,
                        reply: state.reply.clone(),
                    });
                }
                Err(e) => warn!(channel_id = %self.channel_id, error = %e, "failed to encode close frame"),
            }
            state.reader.abort();
        }
    }

    fn is_connected(&self) -> bool {
        self.state.lock().is_some()
    }

    async fn send_request_message(&self, payload: &[u8]) -> Result<(), ConnectorError> {
        let frame = self
            .formatter
            .encode_message(&self.response_receiver_id, payload)?;
        let state = self.state.lock();
        let state = state.as_ref().ok_or(ConnectorError::NotConnected)?;
        state
            .to_listener
            .send(MemoryPacket {
                sender_address: self.response_receiver_id.clone(),
                data: frame,
                reply: state.reply.clone(),
            })
            .map_err(|_| ConnectorError::ConnectionLost {
                reason: "listener stopped".to_string(),
            })
    }
}

struct InputState {
    dispatcher: JoinHandle<()>,
}

/// Server-side connector of the in-process transport.
pub struct MemoryInputConnector {
    channel_id: String,
    formatter: Arc<dyn ProtocolFormatter>,
    state: Mutex<Option<InputState>>,
    clients: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl MemoryInputConnector {
    /// Creates a connector that will listen under `channel_id`.
    pub fn new(channel_id: impl Into<String>, formatter: Arc<dyn ProtocolFormatter>) -> Self {
        Self {
            channel_id: channel_id.into(),
            formatter,
            state: Mutex::new(None),
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn notify_close(
        formatter: &Arc<dyn ProtocolFormatter>,
        client_address: &str,
        reply: &mpsc::UnboundedSender<Vec<u8>>,
    ) {
        match formatter.encode_close_connection(client_address) {
            Ok(frame) => {
                let _ = reply.send(frame);
            }
            Err(e) => warn!(client = client_address, error = %e, "failed to encode close frame"),
        }
    }
}

#[async_trait]
impl InputConnector for MemoryInputConnector {
    async fn start_listening(&self, handler: MessageHandler) -> Result<(), ConnectorError> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(ConnectorError::AlreadyListening);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<MemoryPacket>();
        {
            let mut listeners = LISTENERS.lock();
            if listeners.contains_key(&self.channel_id) {
                return Err(ConnectorError::ListenFailed {
                    address: self.channel_id.clone(),
                    source: io::Error::new(io::ErrorKind::AddrInUse, "channel id already in use"),
                });
            }
            listeners.insert(self.channel_id.clone(), tx);
        }

        let formatter = Arc::clone(&self.formatter);
        let clients = Arc::clone(&self.clients);
        let channel_id = self.channel_id.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(packet) = rx.recv().await {
                let message = formatter.decode(&packet.data);
                match &message {
                    Some(ProtocolMessage::OpenConnection {
                        response_receiver_id,
                    }) => {
                        clients
                            .lock()
                            .insert(response_receiver_id.clone(), packet.reply.clone());
                    }
                    Some(ProtocolMessage::CloseConnection {
                        response_receiver_id,
                    }) => {
                        clients.lock().remove(response_receiver_id);
                    }
                    _ => {}
                }
                let carry_on = handler(MessageContext {
                    message,
                    sender_address: packet.sender_address,
                });
                if !carry_on {
                    LISTENERS.lock().remove(&channel_id);
                    return;
                }
            }
        });

        *state = Some(InputState { dispatcher });
        Ok(())
    }

    async fn stop_listening(&self) {
        let state = self.state.lock().take();
        if let Some(state) = state {
            LISTENERS.lock().remove(&self.channel_id);
            state.dispatcher.abort();
            let disconnected: Vec<_> = self.clients.lock().drain().collect();
            for (address, reply) in disconnected {
                Self::notify_close(&self.formatter, &address, &reply);
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.state.lock().is_some()
    }

    async fn send_response_message(
        &self,
        client_address: &str,
        payload: &[u8],
    ) -> Result<(), ConnectorError> {
        let reply = self.clients.lock().get(client_address).cloned().ok_or(
            ConnectorError::ClientNotFound {
                address: client_address.to_string(),
            },
        )?;
        let frame = self.formatter.encode_message(client_address, payload)?;
        reply.send(frame).map_err(|_| {
            self.clients.lock().remove(client_address);
            ConnectorError::ConnectionLost {
                reason: format!("client '{client_address}' pipe closed"),
            }
        })
    }

    async fn close_client(&self, client_address: &str) {
        let reply = self.clients.lock().remove(client_address);
        if let Some(reply) = reply {
            Self::notify_close(&self.formatter, client_address, &reply);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::BinaryProtocolFormatter;
    use std::time::Duration;
    use tokio::time::timeout;

    fn formatter() -> Arc<dyn ProtocolFormatter> {
        Arc::new(BinaryProtocolFormatter::new())
    }

    fn collecting_handler() -> (MessageHandler, mpsc::UnboundedReceiver<MessageContext>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |ctx| tx.send(ctx).is_ok());
        (handler, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<MessageContext>) -> MessageContext {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("dispatch ended")
    }

    #[tokio::test]
    async fn test_connect_without_listener_fails() {
        let output = MemoryOutputConnector::new("mem-no-listener", "client-1", formatter());
        let (handler, _rx) = collecting_handler();
        assert!(matches!(
            output.open_connection(handler).await,
            Err(ConnectorError::ConnectionFailed { .. })
        ));
        assert!(!output.is_connected());
    }

    #[tokio::test]
    async fn test_open_data_close_sequence() {
        let input = MemoryInputConnector::new("mem-sequence", formatter());
        let (srv_handler, mut srv_rx) = collecting_handler();
        input.start_listening(srv_handler).await.unwrap();

        let output = MemoryOutputConnector::new("mem-sequence", "client-1", formatter());
        let (cli_handler, _cli_rx) = collecting_handler();
        output.open_connection(cli_handler).await.unwrap();
        assert!(output.is_connected());

        let ctx = next(&mut srv_rx).await;
        assert_eq!(
            ctx.message,
            Some(ProtocolMessage::OpenConnection {
                response_receiver_id: "client-1".to_string(),
            })
        );

        output.send_request_message(b"ping").await.unwrap();
        let ctx = next(&mut srv_rx).await;
        assert_eq!(
            ctx.message,
            Some(ProtocolMessage::Data {
                response_receiver_id: "client-1".to_string(),
                payload: b"ping".to_vec(),
            })
        );

        output.close_connection().await;
        assert!(!output.is_connected());
        let ctx = next(&mut srv_rx).await;
        assert_eq!(
            ctx.message,
            Some(ProtocolMessage::CloseConnection {
                response_receiver_id: "client-1".to_string(),
            })
        );

        input.stop_listening().await;
    }

    #[tokio::test]
    async fn test_response_path() {
        let input = MemoryInputConnector::new("mem-response", formatter());
        let (srv_handler, mut srv_rx) = collecting_handler();
        input.start_listening(srv_handler).await.unwrap();

        let output = MemoryOutputConnector::new("mem-response", "client-1", formatter());
        let (cli_handler, mut cli_rx) = collecting_handler();
        output.open_connection(cli_handler).await.unwrap();
        next(&mut srv_rx).await; // open frame

        input
            .send_response_message("client-1", b"pong")
            .await
            .unwrap();
        let ctx = next(&mut cli_rx).await;
        assert_eq!(
            ctx.message,
            Some(ProtocolMessage::Data {
                response_receiver_id: "client-1".to_string(),
                payload: b"pong".to_vec(),
            })
        );

        input.stop_listening().await;
        output.close_connection().await;
    }

    #[tokio::test]
    async fn test_response_to_unknown_client_fails() {
        let input = MemoryInputConnector::new("mem-unknown-client", formatter());
        let (srv_handler, _srv_rx) = collecting_handler();
        input.start_listening(srv_handler).await.unwrap();

        assert!(matches!(
            input.send_response_message("ghost", b"data").await,
            Err(ConnectorError::ClientNotFound { .. })
        ));
        input.stop_listening().await;
    }

    #[tokio::test]
    async fn test_close_client_notifies_client() {
        let input = MemoryInputConnector::new("mem-close-client", formatter());
        let (srv_handler, mut srv_rx) = collecting_handler();
        input.start_listening(srv_handler).await.unwrap();

        let output = MemoryOutputConnector::new("mem-close-client", "client-1", formatter());
        let (cli_handler, mut cli_rx) = collecting_handler();
        output.open_connection(cli_handler).await.unwrap();
        next(&mut srv_rx).await; // open frame

        input.close_client("client-1").await;
        let ctx = next(&mut cli_rx).await;
        assert_eq!(
            ctx.message,
            Some(ProtocolMessage::CloseConnection {
                response_receiver_id: "client-1".to_string(),
            })
        );

        input.stop_listening().await;
        output.close_connection().await;
    }

    #[tokio::test]
    async fn test_second_listener_on_same_channel_rejected() {
        let first = MemoryInputConnector::new("mem-duplicate-listener", formatter());
        let (handler, _rx) = collecting_handler();
        first.start_listening(handler).await.unwrap();

        let second = MemoryInputConnector::new("mem-duplicate-listener", formatter());
        let (handler, _rx) = collecting_handler();
        assert!(matches!(
            second.start_listening(handler).await,
            Err(ConnectorError::ListenFailed { .. })
        ));

        first.stop_listening().await;
    }

    #[tokio::test]
    async fn test_double_open_rejected() {
        let input = MemoryInputConnector::new("mem-double-open", formatter());
        let (srv_handler, _srv_rx) = collecting_handler();
        input.start_listening(srv_handler).await.unwrap();

        let output = MemoryOutputConnector::new("mem-double-open", "client-1", formatter());
        let (cli_handler, _cli_rx) = collecting_handler();
        output.open_connection(cli_handler).await.unwrap();

        let (cli_handler, _cli_rx) = collecting_handler();
        assert!(matches!(
            output.open_connection(cli_handler).await,
            Err(ConnectorError::AlreadyConnected)
        ));

        output.close_connection().await;
        input.stop_listening().await;
    }
}

// Made with Bob
