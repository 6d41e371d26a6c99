//! Frame header encoding/decoding
//!
//! The frame format uses an 8-byte header:
//! - stream_type: 1 byte (0 stdin, 1 stdout, 2 stderr, 3 system error)
//! - reserved: 3 bytes (always zero)
//! - payload_length: 4 bytes (u32, big-endian)

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 8;

/// Largest payload a single frame may carry (16MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Logical stream a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamType {
    /// Echoed input
    Stdin = 0,
    /// Standard output
    Stdout = 1,
    /// Standard error
    Stderr = 2,
    /// Error raised by the remote side itself, not by the process
    SystemErr = 3,
}

impl StreamType {
    /// Convert from the wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            3 => Some(Self::SystemErr),
            _ => None,
        }
    }

    /// Wire byte for this stream
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Frame header carrying the stream tag and payload length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Stream the payload belongs to
    pub stream: StreamType,
    /// Length of the payload in bytes
    pub payload_length: u32,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(stream: StreamType, payload_length: u32) -> Self {
        Self {
            stream,
            payload_length,
        }
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u8(self.stream.as_u8());
        dst.put_bytes(0, 3);
        dst.put_u32(self.payload_length);
    }

    /// Decode a header from a byte buffer
    ///
    /// Returns None if there aren't enough bytes in the buffer.
    /// Returns Err if the stream byte is unknown.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Validate before consuming anything
        let stream_byte = src[0];
        let stream =
            StreamType::from_u8(stream_byte).ok_or(ProtocolError::UnknownStream(stream_byte))?;

        src.advance(4);
        let payload_length = src.get_u32();

        Ok(Some(Self {
            stream,
            payload_length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = FrameHeader::new(StreamType::Stderr, 0x0102_0304);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);

        assert_eq!(&buf[..], &[2, 0, 0, 0, 1, 2, 3, 4]);

        let decoded = FrameHeader::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, header);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_insufficient_bytes() {
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0][..]);
        let result = FrameHeader::decode(&mut buf).unwrap();
        assert!(result.is_none());
        // Nothing consumed
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_unknown_stream_type() {
        let mut buf = BytesMut::from(&[7, 0, 0, 0, 0, 0, 0, 10][..]);
        let result = FrameHeader::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnknownStream(7))));
    }
}
