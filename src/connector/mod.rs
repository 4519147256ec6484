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

//! The transport seam: connectors bind protocol framing to one concrete
//! transport.
//!
//! Each transport supplies one pair of implementations:
//!
//! - an [`OutputConnector`] opens, sends over, and closes one logical
//!   connection on the client side,
//! - an [`InputConnector`] listens, dispatches inbound frames keyed by the
//!   sender's identity, and sends responses on the server side.
//!
//! This is the only place transport-specific code is allowed to leak into
//! the core. Connectors own a [`ProtocolFormatter`](crate::protocol::ProtocolFormatter)
//! and hand decoded [`ProtocolMessage`]s to the channel layer through a
//! [`MessageHandler`] callback. Inbound dispatch runs on tasks owned by the
//! connector; a failing handler is logged and never crashes the listening
//! loop.

mod error;
pub mod framing;
pub mod memory;
pub mod tcp;

pub use error::ConnectorError;

use crate::protocol::ProtocolMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Context delivered with every inbound frame.
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// The decoded frame, or `None` when the transport-level connection of
    /// `sender_address` ended without a CLOSE frame (abrupt disconnect or
    /// clean stream end).
    pub message: Option<ProtocolMessage>,
    /// Transport identity of the sender. For frames carrying a response
    /// receiver id the two coincide; before an OPEN frame is seen this is a
    /// transport-specific address.
    pub sender_address: String,
}

/// Callback invoked for every inbound frame.
///
/// Returns `true` to keep receiving; returning `false` tells the transport
/// the receiver is gone and the dispatch loop may stop.
pub type MessageHandler = Arc<dyn Fn(MessageContext) -> bool + Send + Sync>;

/// Client-side binding of one logical connection to a transport.
///
/// Opening sends the encoded open-connection frame over the transport and
/// registers a listener for response frames. A failed open leaves no partial
/// registration behind.
#[async_trait]
pub trait OutputConnector: Send + Sync {
    /// Opens the connection and registers `handler` for inbound frames.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::AlreadyConnected`] if a connection is open,
    /// or [`ConnectorError::ConnectionFailed`] if the transport cannot reach
    /// the listening endpoint. On error no partial state remains.
    async fn open_connection(&self, handler: MessageHandler) -> Result<(), ConnectorError>;

    /// Closes the connection, best-effort sending a CLOSE frame first.
    ///
    /// Idempotent: closing a closed connector is a no-op.
    async fn close_connection(&self);

    /// Returns `true` while the connection is open.
    fn is_connected(&self) -> bool;

    /// Encodes `payload` as a DATA frame and sends it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::NotConnected`] if no connection is open, or
    /// a transport error if the send fails.
    async fn send_request_message(&self, payload: &[u8]) -> Result<(), ConnectorError>;
}

/// Server-side binding of a listening endpoint to a transport.
///
/// Tracks one transport handle per connected client, keyed by the response
/// receiver id announced in the client's OPEN frame.
#[async_trait]
pub trait InputConnector: Send + Sync {
    /// Starts listening and registers `handler` for inbound frames.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::AlreadyListening`] if already listening, or
    /// [`ConnectorError::ListenFailed`] if the address cannot be bound.
    async fn start_listening(&self, handler: MessageHandler) -> Result<(), ConnectorError>;

    /// Stops listening and drops all client handles, best-effort notifying
    /// each client with a CLOSE frame.
    async fn stop_listening(&self);

    /// Returns `true` while listening.
    fn is_listening(&self) -> bool;

    /// Encodes `payload` as a DATA frame and sends it to one client.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ClientNotFound`] if no transport handle
    /// exists for `client_address`, or a transport error if the send fails
    /// (in which case the handle is dropped).
    async fn send_response_message(
        &self,
        client_address: &str,
        payload: &[u8],
    ) -> Result<(), ConnectorError>;

    /// Closes one client's transport handle, best-effort sending a CLOSE
    /// frame first. The local handle is always removed, even if the
    /// notification fails. Unknown addresses are a no-op.
    async fn close_client(&self, client_address: &str);
}

// Made with Bob
