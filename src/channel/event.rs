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

//! Multi-subscriber event notification.

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Fan-out event source with any number of subscribers.
///
/// Every subscriber gets its own unbounded queue, so a slow consumer never
/// blocks the raiser or the other subscribers. Subscribers that dropped
/// their receiver are pruned on the next [`raise`](EventSource::raise).
///
/// # Examples
///
/// ```
/// use crosswire::channel::EventSource;
///
/// # tokio_test::block_on(async {
/// let source = EventSource::new();
/// let mut events = source.subscribe();
/// source.raise(42);
/// assert_eq!(events.recv().await, Some(42));
/// # });
/// ```
pub struct EventSource<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> EventSource<T> {
    /// Creates an event source with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber and returns its event stream.
    ///
    /// Events raised before this call are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber.
    pub fn raise(&self, event: T) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers at the last prune.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<T: Clone> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}


// Made with Bob
