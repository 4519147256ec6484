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

//! JSON serializer.

use crate::serialization::{Serializer, SerializerError};

/// Serializer producing human-readable JSON payloads.
///
/// The reference serializer of the framework: interoperable, debuggable on
/// the wire, and sufficient for moderate message rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Creates a JSON serializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializerError>
    where
        T: serde::Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(|e| SerializerError::SerializeFailed {
            type_name: std::any::type_name::<T>(),
            reason: e.to_string(),
        })
    }

    fn deserialize<T>(&self, payload: &[u8]) -> Result<T, SerializerError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(payload).map_err(|e| SerializerError::DeserializeFailed {
            type_name: std::any::type_name::<T>(),
            reason: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Order {
        id: u64,
        items: Vec<String>,
    }

    #[test]
    fn test_round_trip() {
        let serializer = JsonSerializer::new();
        let order = Order {
            id: 7,
            items: vec!["coffee".to_string(), "beans".to_string()],
        };

        let payload = serializer.serialize(&order).unwrap();
        let decoded: Order = serializer.deserialize(&payload).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn test_malformed_payload_is_a_typed_error() {
        let serializer = JsonSerializer::new();
        let result: Result<Order, _> = serializer.deserialize(b"{not json");
        assert!(matches!(
            result,
            Err(SerializerError::DeserializeFailed { .. })
        ));
    }

    #[test]
    fn test_unsized_values_serialize() {
        let serializer = JsonSerializer::new();
        let payload = serializer.serialize("plain str").unwrap();
        assert_eq!(payload, br#""plain str""#);
    }
}

// Made with Bob
