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

//! Serialization trait definition.

use crate::serialization::SerializerError;

/// Pluggable conversion between typed values and channel payloads.
///
/// Channels move raw `Vec<u8>` payloads; a serializer is the collaborator
/// that application code uses to turn its typed messages into payloads and
/// back. Implementations must be thread-safe.
///
/// # Examples
///
/// ```rust
/// use crosswire::serialization::{JsonSerializer, Serializer};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct Greeting {
///     text: String,
/// }
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let serializer = JsonSerializer::new();
/// let greeting = Greeting { text: "hello".to_string() };
///
/// let payload = serializer.serialize(&greeting)?;
/// let decoded: Greeting = serializer.deserialize(&payload)?;
/// assert_eq!(greeting, decoded);
/// # Ok(())
/// # }
/// ```
pub trait Serializer: Send + Sync + 'static {
    /// Serializes a value to a payload.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::SerializeFailed`] when the value cannot be
    /// represented in the serializer's format.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializerError>
    where
        T: serde::Serialize + ?Sized;

    /// Deserializes a payload into a value.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::DeserializeFailed`] when the payload is
    /// not a valid encoding of `T`.
    fn deserialize<T>(&self, payload: &[u8]) -> Result<T, SerializerError>
    where
        T: serde::de::DeserializeOwned;

    /// Short format name for diagnostics.
    fn name(&self) -> &'static str;
}

// Made with Bob
