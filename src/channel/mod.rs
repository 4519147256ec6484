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

//! Duplex channel abstractions.
//!
//! A [`DuplexOutputChannel`] opens a connection to exactly one
//! [`DuplexInputChannel`] and exchanges raw payloads with it in both
//! directions. The input side serves many output channels concurrently and
//! addresses each one by its response receiver id.
//!
//! Channels are transport-agnostic: they drive an
//! [`OutputConnector`](crate::connector::OutputConnector) or
//! [`InputConnector`](crate::connector::InputConnector) and surface what
//! happens on the wire as events on an [`EventSource`].

mod attachment;
mod event;
mod input;
mod output;

pub use self::attachment::ChannelAttachment;
pub use self::event::EventSource;
pub use self::input::DuplexInputChannel;
pub use self::output::DuplexOutputChannel;

use crate::error::ChannelError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events observed on the client side of a duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChannelEvent {
    /// The connection to the input channel was opened.
    ConnectionOpened,
    /// The connection ended for a reason other than a local
    /// [`close_connection`](OutputChannel::close_connection) call: the
    /// service closed it, the transport failed, or a composite declared
    /// it broken.
    ConnectionClosed,
    /// A response payload arrived from the input channel.
    ResponseMessageReceived(Vec<u8>),
}

/// Events observed on the service side of a duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputChannelEvent {
    /// An output channel connected; carries its response receiver id.
    ResponseReceiverConnected(String),
    /// A connected output channel went away, orderly or not.
    ResponseReceiverDisconnected(String),
    /// A request payload arrived from a connected output channel.
    MessageReceived {
        /// Id of the output channel that sent the payload.
        response_receiver_id: String,
        /// The raw payload.
        payload: Vec<u8>,
    },
}

/// The client side of a duplex connection.
#[async_trait]
pub trait OutputChannel: Send + Sync {
    /// Address of the input channel this output channel connects to.
    fn channel_id(&self) -> &str;

    /// Unique id under which the input channel addresses this client.
    fn response_receiver_id(&self) -> &str;

    /// Registers an event subscriber.
    ///
    /// Subscribe before [`open_connection`](OutputChannel::open_connection)
    /// to observe the `ConnectionOpened` event.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<OutputChannelEvent>;

    /// Opens the connection to the input channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyConnected`] when the channel is open,
    /// or a connector error when the transport cannot reach the endpoint.
    async fn open_connection(&self) -> Result<(), ChannelError>;

    /// Closes the connection. Idempotent, raises no event.
    async fn close_connection(&self);

    /// Returns `true` while the connection is open.
    fn is_connected(&self) -> bool;

    /// Sends a request payload to the input channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] when the channel is closed.
    /// A transport failure tears the connection down, raises
    /// `ConnectionClosed` and propagates the error.
    async fn send_message(&self, payload: &[u8]) -> Result<(), ChannelError>;
}

/// The service side of a duplex connection.
#[async_trait]
pub trait InputChannel: Send + Sync {
    /// Address this input channel listens on.
    fn channel_id(&self) -> &str;

    /// Registers an event subscriber.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<InputChannelEvent>;

    /// Starts accepting connections from output channels.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyListening`] when already started, or a
    /// connector error when the transport cannot bind the address.
    async fn start_listening(&self) -> Result<(), ChannelError>;

    /// Stops listening and disconnects every connected response receiver.
    /// Idempotent.
    async fn stop_listening(&self);

    /// Returns `true` while listening.
    fn is_listening(&self) -> bool;

    /// Sends a response payload to the given connected output channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotListening`] when the channel is stopped and
    /// [`ChannelError::ResponseReceiverNotFound`] when no such receiver is
    /// connected. A transport failure disconnects the receiver, raises
    /// `ResponseReceiverDisconnected` and propagates the error.
    async fn send_response_message(
        &self,
        response_receiver_id: &str,
        payload: &[u8],
    ) -> Result<(), ChannelError>;

    /// Forcibly disconnects a connected output channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ResponseReceiverNotFound`] when no such
    /// receiver is connected.
    async fn disconnect_response_receiver(
        &self,
        response_receiver_id: &str,
    ) -> Result<(), ChannelError>;
}

/// Shared handle to an output channel.
pub type SharedOutputChannel = Arc<dyn OutputChannel>;

/// Shared handle to an input channel.
pub type SharedInputChannel = Arc<dyn InputChannel>;

/// Derives a globally unique response receiver id for `channel_id`.
#[must_use]
pub fn generate_response_receiver_id(channel_id: &str) -> String {
    format!("{channel_id}_{}", Uuid::new_v4())
}

/// Rejects empty channel ids.
pub(crate) fn validate_channel_id(channel_id: &str) -> Result<(), ChannelError> {
    if channel_id.is_empty() {
        return Err(ChannelError::InvalidChannelId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_receiver_ids_are_unique() {
        let a = generate_response_receiver_id("addr-1");
        let b = generate_response_receiver_id("addr-1");
        assert!(a.starts_with("addr-1_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_channel_id_is_invalid() {
        assert!(matches!(
            validate_channel_id(""),
            Err(ChannelError::InvalidChannelId)
        ));
        assert!(validate_channel_id("addr-1").is_ok());
    }
}

// Made with Bob
