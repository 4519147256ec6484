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

//! Integration tests for the duplex channel lifecycle over the built-in
//! transports: connect, exchange request/response payloads, and observe
//! the connection events on both sides.

use crosswire::channel::{InputChannel, InputChannelEvent, OutputChannel, OutputChannelEvent};
use crosswire::error::ChannelError;
use crosswire::messaging::{MemoryMessagingSystem, MessagingSystem, TcpMessagingSystem};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

async fn next_output(rx: &mut UnboundedReceiver<OutputChannelEvent>) -> OutputChannelEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an output channel event")
        .expect("output event stream ended")
}

async fn next_input(rx: &mut UnboundedReceiver<InputChannelEvent>) -> InputChannelEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an input channel event")
        .expect("input event stream ended")
}

/// Binds an ephemeral port and frees it again, yielding an address a test
/// can listen on without colliding with other tests.
fn free_tcp_address() -> String {
    let socket = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let address = socket.local_addr().expect("local address").to_string();
    drop(socket);
    address
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_request_response_round_trip_in_memory() {
    init_tracing();
    let messaging = MemoryMessagingSystem::new();

    let input = messaging.create_duplex_input_channel("hello-world").unwrap();
    let mut server_events = input.subscribe();
    input.start_listening().await.unwrap();

    let output = messaging.create_duplex_output_channel("hello-world").unwrap();
    let mut client_events = output.subscribe();
    output.open_connection().await.unwrap();

    assert_eq!(
        next_output(&mut client_events).await,
        OutputChannelEvent::ConnectionOpened
    );
    let receiver = match next_input(&mut server_events).await {
        InputChannelEvent::ResponseReceiverConnected(id) => id,
        other => panic!("expected a connect event, got {other:?}"),
    };
    assert_eq!(receiver, output.response_receiver_id());

    output.send_message(b"hello").await.unwrap();
    match next_input(&mut server_events).await {
        InputChannelEvent::MessageReceived {
            response_receiver_id,
            payload,
        } => {
            assert_eq!(response_receiver_id, receiver);
            assert_eq!(payload, b"hello");
        }
        other => panic!("expected the request, got {other:?}"),
    }

    input.send_response_message(&receiver, b"world").await.unwrap();
    assert_eq!(
        next_output(&mut client_events).await,
        OutputChannelEvent::ResponseMessageReceived(b"world".to_vec())
    );
}

#[tokio::test]
async fn test_two_clients_are_tracked_independently() {
    init_tracing();
    let messaging = MemoryMessagingSystem::new();

    let input = messaging.create_duplex_input_channel("two-clients").unwrap();
    let mut server_events = input.subscribe();
    input.start_listening().await.unwrap();

    let first = messaging.create_duplex_output_channel("two-clients").unwrap();
    let second = messaging.create_duplex_output_channel("two-clients").unwrap();
    assert_ne!(first.response_receiver_id(), second.response_receiver_id());

    let mut first_events = first.subscribe();
    let mut second_events = second.subscribe();
    first.open_connection().await.unwrap();
    second.open_connection().await.unwrap();

    for _ in 0..2 {
        match next_input(&mut server_events).await {
            InputChannelEvent::ResponseReceiverConnected(_) => {}
            other => panic!("expected connect events, got {other:?}"),
        }
    }

    // Each response goes to exactly the addressed client.
    input
        .send_response_message(first.response_receiver_id(), b"for the first")
        .await
        .unwrap();
    input
        .send_response_message(second.response_receiver_id(), b"for the second")
        .await
        .unwrap();

    loop {
        match next_output(&mut first_events).await {
            OutputChannelEvent::ResponseMessageReceived(payload) => {
                assert_eq!(payload, b"for the first");
                break;
            }
            OutputChannelEvent::ConnectionOpened => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    loop {
        match next_output(&mut second_events).await {
            OutputChannelEvent::ResponseMessageReceived(payload) => {
                assert_eq!(payload, b"for the second");
                break;
            }
            OutputChannelEvent::ConnectionOpened => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_open_while_open_fails_without_disturbing_state() {
    init_tracing();
    let messaging = MemoryMessagingSystem::new();
    let input = messaging.create_duplex_input_channel("reopen-guard").unwrap();
    input.start_listening().await.unwrap();

    let output = messaging.create_duplex_output_channel("reopen-guard").unwrap();
    output.open_connection().await.unwrap();

    assert!(matches!(
        output.open_connection().await,
        Err(ChannelError::AlreadyConnected { .. })
    ));
    assert!(output.is_connected());
    output.send_message(b"still works").await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent_and_send_after_close_fails() {
    init_tracing();
    let messaging = MemoryMessagingSystem::new();
    let input = messaging.create_duplex_input_channel("close-twice").unwrap();
    input.start_listening().await.unwrap();

    let output = messaging.create_duplex_output_channel("close-twice").unwrap();
    output.open_connection().await.unwrap();

    output.close_connection().await;
    output.close_connection().await;
    assert!(!output.is_connected());

    assert!(matches!(
        output.send_message(b"too late").await,
        Err(ChannelError::NotConnected { .. })
    ));
}

#[tokio::test]
async fn test_disconnecting_a_receiver_closes_the_client() {
    init_tracing();
    let messaging = MemoryMessagingSystem::new();
    let input = messaging.create_duplex_input_channel("kick-client").unwrap();
    let mut server_events = input.subscribe();
    input.start_listening().await.unwrap();

    let output = messaging.create_duplex_output_channel("kick-client").unwrap();
    let mut client_events = output.subscribe();
    output.open_connection().await.unwrap();

    let receiver = match next_input(&mut server_events).await {
        InputChannelEvent::ResponseReceiverConnected(id) => id,
        other => panic!("expected a connect event, got {other:?}"),
    };

    input.disconnect_response_receiver(&receiver).await.unwrap();
    assert_eq!(
        next_input(&mut server_events).await,
        InputChannelEvent::ResponseReceiverDisconnected(receiver.clone())
    );

    loop {
        match next_output(&mut client_events).await {
            OutputChannelEvent::ConnectionClosed => break,
            OutputChannelEvent::ConnectionOpened => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(!output.is_connected());

    // Sending to the kicked receiver now fails.
    assert!(matches!(
        input.send_response_message(&receiver, b"gone").await,
        Err(ChannelError::ResponseReceiverNotFound { .. })
    ));
}

#[tokio::test]
async fn test_stopping_the_listener_closes_connected_clients() {
    init_tracing();
    let messaging = MemoryMessagingSystem::new();
    let input = messaging.create_duplex_input_channel("stop-all").unwrap();
    input.start_listening().await.unwrap();

    let output = messaging.create_duplex_output_channel("stop-all").unwrap();
    let mut client_events = output.subscribe();
    output.open_connection().await.unwrap();
    assert_eq!(
        next_output(&mut client_events).await,
        OutputChannelEvent::ConnectionOpened
    );

    input.stop_listening().await;
    assert!(!input.is_listening());
    assert_eq!(
        next_output(&mut client_events).await,
        OutputChannelEvent::ConnectionClosed
    );
}

#[tokio::test]
async fn test_empty_channel_id_is_a_configuration_error() {
    init_tracing();
    let messaging = MemoryMessagingSystem::new();
    assert!(matches!(
        messaging.create_duplex_output_channel(""),
        Err(ChannelError::InvalidChannelId)
    ));
    assert!(matches!(
        messaging.create_duplex_input_channel(""),
        Err(ChannelError::InvalidChannelId)
    ));
}

#[tokio::test]
async fn test_request_response_round_trip_over_tcp() {
    init_tracing();
    let address = free_tcp_address();
    let messaging = TcpMessagingSystem::new();

    let input = messaging.create_duplex_input_channel(&address).unwrap();
    let mut server_events = input.subscribe();
    input.start_listening().await.unwrap();

    let output = messaging.create_duplex_output_channel(&address).unwrap();
    let mut client_events = output.subscribe();
    output.open_connection().await.unwrap();

    let receiver = match next_input(&mut server_events).await {
        InputChannelEvent::ResponseReceiverConnected(id) => id,
        other => panic!("expected a connect event, got {other:?}"),
    };

    output.send_message(b"over the wire").await.unwrap();
    match next_input(&mut server_events).await {
        InputChannelEvent::MessageReceived { payload, .. } => {
            assert_eq!(payload, b"over the wire");
        }
        other => panic!("expected the request, got {other:?}"),
    }

    input.send_response_message(&receiver, b"and back").await.unwrap();
    loop {
        match next_output(&mut client_events).await {
            OutputChannelEvent::ResponseMessageReceived(payload) => {
                assert_eq!(payload, b"and back");
                break;
            }
            OutputChannelEvent::ConnectionOpened => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // Orderly shutdown: the server sees the client leave.
    output.close_connection().await;
    assert_eq!(
        next_input(&mut server_events).await,
        InputChannelEvent::ResponseReceiverDisconnected(receiver)
    );
    input.stop_listening().await;
}

#[tokio::test]
async fn test_tcp_connect_without_listener_fails_cleanly() {
    init_tracing();
    let address = free_tcp_address();
    let messaging = TcpMessagingSystem::new();

    let output = messaging.create_duplex_output_channel(&address).unwrap();
    let mut events = output.subscribe();

    assert!(output.open_connection().await.is_err());
    assert!(!output.is_connected());
    assert!(events.try_recv().is_err());
}

// Made with Bob
