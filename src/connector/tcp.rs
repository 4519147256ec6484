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

//! TCP transport connectors.
//!
//! The channel id doubles as the socket address, e.g. `"127.0.0.1:8080"` or
//! `"tcp://127.0.0.1:8080"`. Frames travel as length-prefixed records (see
//! [`framing`](crate::connector::framing)).

use crate::connector::framing::{read_frame, write_frame};
use crate::connector::{
    ConnectorError, InputConnector, MessageContext, MessageHandler, OutputConnector,
};
use crate::protocol::{ProtocolFormatter, ProtocolMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Strips the optional `tcp://` scheme from a channel id.
fn socket_address(channel_id: &str) -> &str {
    channel_id.strip_prefix("tcp://").unwrap_or(channel_id)
}

type SharedWriter = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

struct TcpOutputState {
    writer: SharedWriter,
    reader: JoinHandle<()>,
}

/// Client-side connector of the TCP transport.
pub struct TcpOutputConnector {
    channel_id: String,
    response_receiver_id: String,
    formatter: Arc<dyn ProtocolFormatter>,
    state: tokio::sync::Mutex<Option<TcpOutputState>>,
    connected: AtomicBool,
}

impl TcpOutputConnector {
    /// Creates a connector addressing the TCP endpoint in `channel_id`,
    /// identifying itself as `response_receiver_id`.
    pub fn new(
        channel_id: impl Into<String>,
        response_receiver_id: impl Into<String>,
        formatter: Arc<dyn ProtocolFormatter>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            response_receiver_id: response_receiver_id.into(),
            formatter,
            state: tokio::sync::Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl OutputConnector for TcpOutputConnector {
    async fn open_connection(&self, handler: MessageHandler) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(ConnectorError::AlreadyConnected);
        }

        let address = socket_address(&self.channel_id);
        let stream =
            TcpStream::connect(address)
                .await
                .map_err(|source| ConnectorError::ConnectionFailed {
                    address: self.channel_id.clone(),
                    source,
                })?;
        let (mut read_half, mut write_half) = stream.into_split();

        let open_frame = self
            .formatter
            .encode_open_connection(&self.response_receiver_id)?;
        write_frame(&mut write_half, &open_frame).await?;

        let formatter = Arc::clone(&self.formatter);
        let sender_address = self.channel_id.clone();
        let reader = tokio::spawn(async move {
            read_loop(&mut read_half, formatter, &sender_address, handler).await;
        });

        *state = Some(TcpOutputState {
            writer: Arc::new(tokio::sync::Mutex::new(write_half)),
            reader,
        });
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close_connection(&self) {
        let mut state = self.state.lock().await;
        if let Some(state) = state.take() {
            self.connected.store(false, Ordering::SeqCst);
            if let Ok(frame) = self
                .formatter
                .encode_close_connection(&self.response_receiver_id)
            {
                let mut writer = state.writer.lock().await;
                let _ = write_frame(&mut *writer, &frame).await;
                let _ = writer.shutdown().await;
            }
            state.reader.abort();
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_request_message(&self, payload: &[u8]) -> Result<(), ConnectorError> {
        let writer = {
            let state = self.state.lock().await;
            state
                .as_ref()
                .ok_or(ConnectorError::NotConnected)?
                .writer
                .clone()
        };
        let frame = self
            .formatter
            .encode_message(&self.response_receiver_id, payload)?;
        let mut writer = writer.lock().await;
        write_frame(&mut *writer, &frame).await
    }
}

/// Reads response frames until the stream ends, handing each decode result
/// to the channel layer.
async fn read_loop(
    read_half: &mut OwnedReadHalf,
    formatter: Arc<dyn ProtocolFormatter>,
    sender_address: &str,
    handler: MessageHandler,
) {
    loop {
        match read_frame(read_half).await {
            Ok(Some(data)) => {
                let message = formatter.decode(&data);
                let carry_on = handler(MessageContext {
                    message,
                    sender_address: sender_address.to_string(),
                });
                if !carry_on {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(address = sender_address, error = %e, "tcp read ended");
                break;
            }
        }
    }
    handler(MessageContext {
        message: None,
        sender_address: sender_address.to_string(),
    });
}

struct TcpInputState {
    acceptor: JoinHandle<()>,
    connections: Arc<parking_lot::Mutex<Vec<JoinHandle<()>>>>,
}

/// Server-side connector of the TCP transport.
pub struct TcpInputConnector {
    channel_id: String,
    formatter: Arc<dyn ProtocolFormatter>,
    state: tokio::sync::Mutex<Option<TcpInputState>>,
    listening: AtomicBool,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
    clients: Arc<tokio::sync::Mutex<HashMap<String, SharedWriter>>>,
}

impl TcpInputConnector {
    /// Creates a connector that will bind the TCP address in `channel_id`.
    pub fn new(channel_id: impl Into<String>, formatter: Arc<dyn ProtocolFormatter>) -> Self {
        Self {
            channel_id: channel_id.into(),
            formatter,
            state: tokio::sync::Mutex::new(None),
            listening: AtomicBool::new(false),
            local_addr: parking_lot::Mutex::new(None),
            clients: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Returns the bound socket address while listening.
    ///
    /// Useful when listening on an ephemeral port (`"127.0.0.1:0"`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    #[cfg(test)]
    pub(crate) async fn connection_task_count(&self) -> usize {
        match self.state.lock().await.as_ref() {
            Some(state) => state.connections.lock().len(),
            None => 0,
        }
    }

    async fn notify_close(
        formatter: &Arc<dyn ProtocolFormatter>,
        client_address: &str,
        writer: &SharedWriter,
    ) {
        if let Ok(frame) = formatter.encode_close_connection(client_address) {
            let mut writer = writer.lock().await;
            let _ = write_frame(&mut *writer, &frame).await;
            let _ = writer.shutdown().await;
        }
    }
}

#[async_trait]
impl InputConnector for TcpInputConnector {
    async fn start_listening(&self, handler: MessageHandler) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(ConnectorError::AlreadyListening);
        }

        let address = socket_address(&self.channel_id);
        let listener =
            TcpListener::bind(address)
                .await
                .map_err(|source| ConnectorError::ListenFailed {
                    address: self.channel_id.clone(),
                    source,
                })?;
        *self.local_addr.lock() = listener.local_addr().ok();

        let connections = Arc::new(parking_lot::Mutex::new(Vec::<JoinHandle<()>>::new()));
        let formatter = Arc::clone(&self.formatter);
        let clients = Arc::clone(&self.clients);
        let tasks = Arc::clone(&connections);
        let acceptor = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let formatter = Arc::clone(&formatter);
                        let clients = Arc::clone(&clients);
                        let handler = Arc::clone(&handler);
                        let task = tokio::spawn(async move {
                            serve_connection(stream, peer, formatter, clients, handler).await;
                        });
                        // Drop handles of connections that already finished
                        // so the list tracks live connections only.
                        let mut tasks = tasks.lock();
                        tasks.retain(|t| !t.is_finished());
                        tasks.push(task);
                    }
                    Err(e) => {
                        warn!(error = %e, "tcp accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        *state = Some(TcpInputState {
            acceptor,
            connections,
        });
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_listening(&self) {
        let mut state = self.state.lock().await;
        if let Some(state) = state.take() {
            self.listening.store(false, Ordering::SeqCst);
            *self.local_addr.lock() = None;
            state.acceptor.abort();

            let disconnected: Vec<_> = self.clients.lock().await.drain().collect();
            for (address, writer) in disconnected {
                Self::notify_close(&self.formatter, &address, &writer).await;
            }

            let tasks: Vec<_> = state.connections.lock().drain(..).collect();
            for task in tasks {
                task.abort();
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    async fn send_response_message(
        &self,
        client_address: &str,
        payload: &[u8],
    ) -> Result<(), ConnectorError> {
        let writer = self.clients.lock().await.get(client_address).cloned().ok_or(
            ConnectorError::ClientNotFound {
                address: client_address.to_string(),
            },
        )?;
        let frame = self.formatter.encode_message(client_address, payload)?;
        let result = {
            let mut writer = writer.lock().await;
            write_frame(&mut *writer, &frame).await
        };
        if result.is_err() {
            self.clients.lock().await.remove(client_address);
        }
        result
    }

    async fn close_client(&self, client_address: &str) {
        let writer = self.clients.lock().await.remove(client_address);
        if let Some(writer) = writer {
            Self::notify_close(&self.formatter, client_address, &writer).await;
        }
    }
}

/// Serves one accepted TCP connection until it ends.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    formatter: Arc<dyn ProtocolFormatter>,
    clients: Arc<tokio::sync::Mutex<HashMap<String, SharedWriter>>>,
    handler: MessageHandler,
) {
    let (mut read_half, write_half) = stream.into_split();
    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(write_half));
    let mut client_address: Option<String> = None;

    loop {
        match read_frame(&mut read_half).await {
            Ok(Some(data)) => {
                let message = formatter.decode(&data);
                match &message {
                    Some(ProtocolMessage::OpenConnection {
                        response_receiver_id,
                    }) => {
                        clients
                            .lock()
                            .await
                            .insert(response_receiver_id.clone(), Arc::clone(&writer));
                        client_address = Some(response_receiver_id.clone());
                    }
                    Some(ProtocolMessage::CloseConnection {
                        response_receiver_id,
                    }) => {
                        clients.lock().await.remove(response_receiver_id);
                    }
                    _ => {}
                }

                let orderly_close = matches!(message, Some(ProtocolMessage::CloseConnection { .. }));
                let sender_address = message
                    .as_ref()
                    .and_then(|m| m.response_receiver_id())
                    .map(str::to_string)
                    .or_else(|| client_address.clone())
                    .unwrap_or_else(|| peer.to_string());
                let carry_on = handler(MessageContext {
                    message,
                    sender_address,
                });
                if !carry_on || orderly_close {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(peer = %peer, error = %e, "tcp connection ended");
                break;
            }
        }
    }

    // Stream ended without an orderly CLOSE frame.
    if let Some(address) = client_address {
        clients.lock().await.remove(&address);
        handler(MessageContext {
            message: None,
            sender_address: address,
        });
    }
}


// Made with Bob
