//! Tokio codec splitting a byte stream into login frames.
//!
//! ```text
//! [Size(2, LE)] [Body(Size)]
//! ```
//!
//! The size counts everything after itself. A declared size above
//! [`MAX_FRAME_SIZE`] is rejected before any body bytes are buffered.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};

/// Largest body a client may declare
pub const MAX_FRAME_SIZE: usize = 1024;

/// Bytes in the size prefix
pub const SIZE_PREFIX_LEN: usize = 2;

/// Yields one frame body per complete frame; writes finished output frames verbatim.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < SIZE_PREFIX_LEN {
            return Ok(None);
        }

        let size = usize::from(u16::from_le_bytes([src[0], src[1]]));
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge(size));
        }

        if src.len() < SIZE_PREFIX_LEN + size {
            src.reserve(SIZE_PREFIX_LEN + size - src.len());
            return Ok(None);
        }

        src.advance(SIZE_PREFIX_LEN);
        Ok(Some(src.split_to(size).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
