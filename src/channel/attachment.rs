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

//! Output channel attachment for protocol consumers.

use crate::channel::SharedOutputChannel;
use crate::error::ChannelError;
use parking_lot::Mutex;

/// Holds at most one attached output channel on behalf of a higher-level
/// component such as a typed message sender.
///
/// Attaching opens the channel's connection; detaching closes it. The
/// attachment guards against double-attach mistakes so a component cannot
/// silently swap its channel while connected.
#[derive(Default)]
pub struct ChannelAttachment {
    channel: Mutex<Option<SharedOutputChannel>>,
}

impl ChannelAttachment {
    /// Creates an empty attachment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `channel` and opens its connection.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyAttached`] when a channel is attached,
    /// or the open error; a failed open leaves the attachment empty.
    pub async fn attach(&self, channel: SharedOutputChannel) -> Result<(), ChannelError> {
        {
            let mut slot = self.channel.lock();
            if slot.is_some() {
                return Err(ChannelError::AlreadyAttached);
            }
            *slot = Some(channel.clone());
        }
        if let Err(e) = channel.open_connection().await {
            *self.channel.lock() = None;
            return Err(e);
        }
        Ok(())
    }

    /// Detaches the current channel and closes its connection.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotAttached`] when nothing is attached.
    pub async fn detach(&self) -> Result<(), ChannelError> {
        let channel = self
            .channel
            .lock()
            .take()
            .ok_or(ChannelError::NotAttached)?;
        channel.close_connection().await;
        Ok(())
    }

    /// Returns `true` while a channel is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.channel.lock().is_some()
    }

    /// Returns the attached channel, if any.
    #[must_use]
    pub fn attached(&self) -> Option<SharedOutputChannel> {
        self.channel.lock().clone()
    }
}


// Made with Bob
