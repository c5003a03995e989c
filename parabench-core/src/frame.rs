//! Length-Prefixed Sample Frames
//!
//! Forked workers hand their result back to the scheduling process over a
//! pipe. Frames give the byte stream reliable message boundaries: a 4-byte
//! little-endian length prefix followed by a JSON payload.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use thiserror::Error;

/// Maximum frame size (1 MB). A sample frame is a few hundred bytes, so
/// anything larger indicates a corrupted stream.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be serialized
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Payload could not be deserialized
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// Declared length exceeds the frame size limit
    #[error("frame too large: {size} bytes (max {max} bytes)")]
    TooLarge {
        /// Declared payload size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Malformed frame header
    #[error("invalid frame: {0}")]
    Invalid(String),

    /// The stream ended on a frame boundary
    #[error("end of stream")]
    EndOfStream,
}

/// Write one length-prefixed frame.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), FrameError> {
    let bytes = serde_json::to_vec(message).map_err(FrameError::Encode)?;
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            size: bytes.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed frame.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len == 0 {
        return Err(FrameError::Invalid("zero-length frame".to_string()));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    serde_json::from_slice(&buf).map_err(FrameError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct TestMessage {
        value: u64,
        text: String,
    }

    #[test]
    fn test_roundtrip() {
        let original = TestMessage {
            value: 42,
            text: "hello world".to_string(),
        };

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &original).unwrap();

        let mut reader = Cursor::new(buffer);
        let decoded: TestMessage = read_frame(&mut reader).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_multiple_messages() {
        let messages = vec![
            TestMessage {
                value: 1,
                text: "first".to_string(),
            },
            TestMessage {
                value: 2,
                text: "second".to_string(),
            },
        ];

        let mut buffer = Vec::new();
        for msg in &messages {
            write_frame(&mut buffer, msg).unwrap();
        }

        let mut reader = Cursor::new(buffer);
        for expected in &messages {
            let decoded: TestMessage = read_frame(&mut reader).unwrap();
            assert_eq!(expected, &decoded);
        }
    }

    #[test]
    fn test_end_of_stream() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        let result: Result<TestMessage, _> = read_frame(&mut reader);
        assert!(matches!(result, Err(FrameError::EndOfStream)));
    }

    #[test]
    fn test_zero_length_frame() {
        let mut reader = Cursor::new(vec![0u8; 4]);
        let result: Result<TestMessage, _> = read_frame(&mut reader);
        assert!(matches!(result, Err(FrameError::Invalid(_))));
    }
}
