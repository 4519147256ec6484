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

//! Length-prefixed framing for stream transports.
//!
//! Stream transports such as TCP carry protocol frames as length-prefixed
//! records: a 4-byte big-endian length followed by the frame bytes.
//!
//! ```text
//! +------------------+-------------------+
//! | Length (4 bytes) | Frame (N bytes)   |
//! +------------------+-------------------+
//! ```

use crate::connector::ConnectorError;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (16 MB).
///
/// Limits the size of a single record so a corrupt or hostile length prefix
/// cannot trigger an unbounded allocation.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Writes one length-prefixed frame to an async writer.
///
/// # Errors
///
/// Returns [`ConnectorError::FrameTooLarge`] if the frame exceeds
/// [`MAX_FRAME_SIZE`], or [`ConnectorError::SendFailed`] if writing fails.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), ConnectorError>
where
    W: AsyncWrite + Unpin,
{
    if frame.len() > MAX_FRAME_SIZE as usize {
        return Err(ConnectorError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE as usize,
        });
    }

    let len = (frame.len() as u32).to_be_bytes();
    writer
        .write_all(&len)
        .await
        .map_err(|source| ConnectorError::SendFailed { source })?;
    writer
        .write_all(frame)
        .await
        .map_err(|source| ConnectorError::SendFailed { source })?;
    writer
        .flush()
        .await
        .map_err(|source| ConnectorError::SendFailed { source })?;
    Ok(())
}

/// Reads one length-prefixed frame from an async reader.
///
/// Returns `Ok(None)` when the stream ends cleanly at a frame boundary,
/// distinguishing an orderly peer close from a truncated frame.
///
/// # Errors
///
/// Returns [`ConnectorError::FrameTooLarge`] if the length prefix exceeds
/// [`MAX_FRAME_SIZE`], or [`ConnectorError::ReadFailed`] if the stream ends
/// mid-frame or reading fails.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ConnectorError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(source) => return Err(ConnectorError::ReadFailed { source }),
    }

    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_SIZE {
        return Err(ConnectorError::FrameTooLarge {
            size: len as usize,
            max: MAX_FRAME_SIZE as usize,
        });
    }

    let mut frame = vec![0u8; len as usize];
    reader
        .read_exact(&mut frame)
        .await
        .map_err(|source| ConnectorError::ReadFailed { source })?;
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"hello").await.unwrap();

        assert_eq!(&buffer[0..4], &5u32.to_be_bytes());

        let mut reader = &buffer[..];
        let frame = read_frame(&mut reader).await.unwrap();
        assert_eq!(frame, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_empty_frame_round_trip() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &[]).await.unwrap();

        let mut reader = &buffer[..];
        let frame = read_frame(&mut reader).await.unwrap();
        assert_eq!(frame, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let mut reader: &[u8] = &[];
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_error() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&10u32.to_be_bytes());
        buffer.extend_from_slice(b"short");

        let mut reader = &buffer[..];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(ConnectorError::ReadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(MAX_FRAME_SIZE + 1).to_be_bytes());

        let mut reader = &buffer[..];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(ConnectorError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_write() {
        let mut buffer = Vec::new();
        let frame = vec![0u8; MAX_FRAME_SIZE as usize + 1];
        assert!(matches!(
            write_frame(&mut buffer, &frame).await,
            Err(ConnectorError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_multiple_frames_in_sequence() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"first").await.unwrap();
        write_frame(&mut buffer, b"second").await.unwrap();

        let mut reader = &buffer[..];
        assert_eq!(
            read_frame(&mut reader).await.unwrap(),
            Some(b"first".to_vec())
        );
        assert_eq!(
            read_frame(&mut reader).await.unwrap(),
            Some(b"second".to_vec())
        );
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }
}

// Made with Bob
