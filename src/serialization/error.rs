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

//! Serialization error type.

use thiserror::Error;

/// Errors raised by a [`Serializer`](crate::serialization::Serializer).
///
/// Both directions carry the name of the Rust type involved so a failure in
/// a deep call chain still names what could not be converted.
#[derive(Debug, Error)]
pub enum SerializerError {
    /// A value could not be serialized to bytes.
    #[error("failed to serialize {type_name}: {reason}")]
    SerializeFailed {
        /// Rust type of the value.
        type_name: &'static str,
        /// Description from the underlying format.
        reason: String,
    },

    /// Bytes could not be deserialized into the requested type.
    #[error("failed to deserialize {type_name}: {reason}")]
    DeserializeFailed {
        /// Rust type requested.
        type_name: &'static str,
        /// Description from the underlying format.
        reason: String,
    },
}


// Made with Bob
