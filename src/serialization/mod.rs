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

//! Typed payload serialization.
//!
//! Channels carry opaque `Vec<u8>` payloads; the [`Serializer`] trait is the
//! seam where application code plugs in a format for its typed messages.
//! [`JsonSerializer`] is the built-in reference implementation. Serialization
//! failures are typed [`SerializerError`]s, never panics, so a bad message
//! cannot take down a listening loop.

mod error;
mod json;
mod traits;

pub use self::error::SerializerError;
pub use self::json::JsonSerializer;
pub use self::traits::Serializer;

// Made with Bob
