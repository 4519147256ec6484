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

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod channel;
pub mod composite;
pub mod connector;
pub mod error;
pub mod messaging;
pub mod protocol;
pub mod serialization;

pub use channel::{
    ChannelAttachment, DuplexInputChannel, DuplexOutputChannel, EventSource, InputChannel,
    InputChannelEvent, OutputChannel, OutputChannelEvent, SharedInputChannel,
    SharedOutputChannel,
};
pub use composite::{
    BufferedMessagingSystem, BufferedMonitoredMessagingSystem, DeliveryEvent, MessageId,
    MonitoredMessagingSystem, ReliableMessagingSystem,
};
pub use connector::ConnectorError;
pub use error::ChannelError;
pub use messaging::{MemoryMessagingSystem, MessagingSystem, TcpMessagingSystem};
pub use protocol::{BinaryProtocolFormatter, ProtocolFormatter, ProtocolMessage};
pub use serialization::{JsonSerializer, Serializer, SerializerError};

// Made with Bob
