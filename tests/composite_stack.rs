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

//! Integration tests for the channel decorators, individually and stacked
//! in the recommended Reliable → Buffered → Monitored order.

use crosswire::channel::{InputChannel, InputChannelEvent, OutputChannel, OutputChannelEvent};
use crosswire::composite::{
    BufferedMessagingSystem, DeliveryEvent, MonitoredMessagingSystem, ReliableMessagingSystem,
};
use crosswire::messaging::{MemoryMessagingSystem, MessagingSystem};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

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

async fn next_delivery(rx: &mut UnboundedReceiver<DeliveryEvent>) -> DeliveryEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a delivery event")
        .expect("delivery stream ended")
}

#[tokio::test]
async fn test_monitoring_disconnects_exactly_the_silent_receiver() {
    init_tracing();
    let monitored = MonitoredMessagingSystem::with_timing(
        Arc::new(MemoryMessagingSystem::new()),
        Duration::from_millis(40),
        Duration::from_millis(80),
    );
    let input = monitored.create_duplex_input_channel("stack-silent").unwrap();
    let mut server_events = input.subscribe();
    input.start_listening().await.unwrap();

    // A lively, monitored client and a mute, unmonitored one.
    let alive = monitored
        .create_duplex_output_channel_with_receiver("stack-silent", "alive-client")
        .unwrap();
    alive.open_connection().await.unwrap();

    let plain = MemoryMessagingSystem::new();
    let mute = plain
        .create_duplex_output_channel_with_receiver("stack-silent", "mute-client")
        .unwrap();
    mute.open_connection().await.unwrap();

    let mut connected = 0;
    while connected < 2 {
        if let InputChannelEvent::ResponseReceiverConnected(_) =
            next_input(&mut server_events).await
        {
            connected += 1;
        }
    }

    assert_eq!(
        next_input(&mut server_events).await,
        InputChannelEvent::ResponseReceiverDisconnected("mute-client".to_string())
    );

    // The pinging client survives well past the receive timeout.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(alive.is_connected());
    assert!(server_events.try_recv().is_err());
}

#[tokio::test]
async fn test_buffered_fifo_order_survives_a_listener_restart() {
    init_tracing();
    let buffered = BufferedMessagingSystem::with_timing(
        Arc::new(MemoryMessagingSystem::new()),
        Duration::from_secs(5),
        Duration::from_millis(20),
    );
    let plain = MemoryMessagingSystem::new();

    let input = plain.create_duplex_input_channel("stack-fifo").unwrap();
    let mut server_events = input.subscribe();
    input.start_listening().await.unwrap();

    let output = buffered.create_duplex_output_channel("stack-fifo").unwrap();
    output.open_connection().await.unwrap();

    output.send_message(&[0]).await.unwrap();
    output.send_message(&[1]).await.unwrap();

    let mut received = Vec::new();
    while received.len() < 2 {
        if let InputChannelEvent::MessageReceived { payload, .. } =
            next_input(&mut server_events).await
        {
            received.push(payload[0]);
        }
    }

    // Take the listener down; the client keeps sending into its buffer.
    input.stop_listening().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    for i in 2..5u8 {
        output.send_message(&[i]).await.unwrap();
    }

    input.start_listening().await.unwrap();
    while received.len() < 5 {
        if let InputChannelEvent::MessageReceived { payload, .. } =
            next_input(&mut server_events).await
        {
            received.push(payload[0]);
        }
    }
    assert_eq!(received, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_reliable_over_buffered_delivers_across_a_disconnect() {
    init_tracing();
    // Sender stack: Reliable(Buffered(Memory)).
    let buffered = Arc::new(BufferedMessagingSystem::with_timing(
        Arc::new(MemoryMessagingSystem::new()),
        Duration::from_secs(5),
        Duration::from_millis(20),
    ));
    let reliable_out = ReliableMessagingSystem::with_timeout(buffered, Duration::from_secs(5));

    // Receiver stack: Reliable(Memory).
    let reliable_in = ReliableMessagingSystem::with_timeout(
        Arc::new(MemoryMessagingSystem::new()),
        Duration::from_secs(5),
    );

    let input = reliable_in
        .create_reliable_duplex_input_channel("stack-reliable-buffered")
        .unwrap();
    let mut server_events = input.subscribe();
    input.start_listening().await.unwrap();

    let output = reliable_out
        .create_reliable_duplex_output_channel("stack-reliable-buffered")
        .unwrap();
    let mut deliveries = output.subscribe_delivery();
    output.open_connection().await.unwrap();

    // Wait until the connection is actually up, then break it.
    loop {
        if let InputChannelEvent::ResponseReceiverConnected(_) =
            next_input(&mut server_events).await
        {
            break;
        }
    }
    input.stop_listening().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Send while disconnected: the id comes back immediately, the payload
    // waits in the offline buffer.
    let id = output.send_tracked(b"survives the gap").await.unwrap();

    input.start_listening().await.unwrap();

    loop {
        match next_input(&mut server_events).await {
            InputChannelEvent::MessageReceived { payload, .. } => {
                assert_eq!(payload, b"survives the gap");
                break;
            }
            InputChannelEvent::ResponseReceiverConnected(_) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(next_delivery(&mut deliveries).await, DeliveryEvent::Delivered(id));
}

#[tokio::test]
async fn test_full_stack_round_trip_with_tracked_responses() {
    init_tracing();
    // Reliable(Buffered(Monitored(Memory))) against Reliable(Monitored(Memory)).
    let transport = Arc::new(MemoryMessagingSystem::new());
    let monitored = Arc::new(MonitoredMessagingSystem::with_timing(
        transport,
        Duration::from_millis(40),
        Duration::from_millis(80),
    ));
    let buffered = Arc::new(BufferedMessagingSystem::with_timing(
        monitored,
        Duration::from_secs(5),
        Duration::from_millis(20),
    ));
    let client_stack = ReliableMessagingSystem::with_timeout(buffered, Duration::from_secs(5));

    let server_monitored = Arc::new(MonitoredMessagingSystem::with_timing(
        Arc::new(MemoryMessagingSystem::new()),
        Duration::from_millis(40),
        Duration::from_millis(80),
    ));
    let server_stack =
        ReliableMessagingSystem::with_timeout(server_monitored, Duration::from_secs(5));

    let input = server_stack
        .create_reliable_duplex_input_channel("stack-full")
        .unwrap();
    let mut server_events = input.subscribe();
    let mut server_deliveries = input.subscribe_delivery();
    input.start_listening().await.unwrap();

    let output = client_stack
        .create_reliable_duplex_output_channel("stack-full")
        .unwrap();
    let mut client_events = output.subscribe();
    let mut client_deliveries = output.subscribe_delivery();
    output.open_connection().await.unwrap();

    let request_id = output.send_tracked(b"request").await.unwrap();

    let receiver = loop {
        match next_input(&mut server_events).await {
            InputChannelEvent::ResponseReceiverConnected(id) => break id,
            other => panic!("unexpected event: {other:?}"),
        }
    };
    loop {
        match next_input(&mut server_events).await {
            InputChannelEvent::MessageReceived { payload, .. } => {
                assert_eq!(payload, b"request");
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(
        next_delivery(&mut client_deliveries).await,
        DeliveryEvent::Delivered(request_id)
    );

    let response_id = input.send_tracked(&receiver, b"response").await.unwrap();
    loop {
        match next_output(&mut client_events).await {
            OutputChannelEvent::ResponseMessageReceived(payload) => {
                assert_eq!(payload, b"response");
                break;
            }
            OutputChannelEvent::ConnectionOpened => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(
        next_delivery(&mut server_deliveries).await,
        DeliveryEvent::Delivered(response_id)
    );

    // The stack stays healthy across several ping periods.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(output.is_connected());
}

// Made with Bob
