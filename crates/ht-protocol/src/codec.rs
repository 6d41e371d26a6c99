//! Tokio codec for stream frames

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, StreamType, MAX_PAYLOAD_SIZE};

/// A decoded frame: which stream, and the bytes written to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Stream the payload belongs to
    pub stream: StreamType,
    /// Raw payload bytes
    pub payload: Bytes,
}

impl StreamFrame {
    /// Create a new frame
    pub fn new(stream: StreamType, payload: impl Into<Bytes>) -> Self {
        Self {
            stream,
            payload: payload.into(),
        }
    }
}

/// Codec for encoding/decoding stream frames
#[derive(Debug, Default)]
pub struct StreamFrameCodec {
    /// Header already consumed while waiting for its payload
    pending_header: Option<FrameHeader>,
}

impl StreamFrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for StreamFrameCodec {
    type Item = StreamFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            self.pending_header = Some(header);
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();

        Ok(Some(StreamFrame {
            stream: header.stream,
            payload,
        }))
    }
}

impl Encoder<StreamFrame> for StreamFrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: StreamFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_len = frame.payload.len();
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        FrameHeader::new(frame.stream, payload_len as u32).encode(dst);
        dst.extend_from_slice(&frame.payload);

        Ok(())
    }
}
