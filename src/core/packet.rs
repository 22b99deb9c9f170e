//! Bounds-checked packet reader and header-prepending packet writer.
//!
//! [`InputPacket`] is a cursor over one received frame. Every read checks the
//! remaining length first and fails with [`ProtocolError::PacketOverflow`].
//!
//! [`OutputPacket`] writes the payload into a fixed buffer after a reserved
//! header region. Fields that depend on the finished payload (inner length,
//! checksum, size) are prepended into that region right-to-left, which is why
//! finalization must run in the order encrypt, checksum, size.

use bytes::Bytes;

use crate::crypto::{adler32, RsaDecryptor, XteaKey, RSA_BLOCK_SIZE};
use crate::error::{ProtocolError, Result};

/// Capacity of an output buffer, header region included
pub const OUTPUT_CAPACITY: usize = 8192;

/// Bytes reserved in front of the payload for prepended fields
pub const OUTPUT_HEADER_RESERVE: usize = 10;

/// Filler used to pad an encrypted payload to whole XTEA blocks
pub const XTEA_PADDING_BYTE: u8 = 0x33;

/// Read cursor over a received frame
#[derive(Debug, Clone)]
pub struct InputPacket {
    buf: Bytes,
    pos: usize,
}

impl InputPacket {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes not yet read
    pub fn rest(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn check(&self, width: usize) -> Result<()> {
        if width > self.remaining() {
            return Err(ProtocolError::PacketOverflow {
                needed: width,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn peek_array<const N: usize>(&self) -> Result<[u8; N]> {
        self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        Ok(out)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        Ok(self.peek_array::<1>()?[0])
    }

    pub fn peek_u16(&self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.peek_array()?))
    }

    pub fn peek_u32(&self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.peek_array()?))
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        let value = self.peek_u8()?;
        self.pos += 1;
        Ok(value)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        let value = self.peek_u16()?;
        self.pos += 2;
        Ok(value)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let value = self.peek_u32()?;
        self.pos += 4;
        Ok(value)
    }

    /// Next `len` bytes, sharing the frame's storage
    pub fn get_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.check(len)?;
        let bytes = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.check(len)?;
        self.pos += len;
        Ok(())
    }

    /// Length-prefixed string (u16 length, then bytes); invalid UTF-8 is replaced.
    pub fn get_string(&mut self) -> Result<String> {
        let len = usize::from(self.get_u16()?);
        let bytes = self.get_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// True when the next four bytes are the Adler-32 of everything after them.
    pub fn starts_with_checksum(&self) -> bool {
        match self.peek_u32() {
            Ok(declared) => declared == adler32(&self.rest()[4..]),
            Err(_) => false,
        }
    }

    /// Consume the next 128 bytes and return a cursor over their RSA plaintext.
    pub fn rsa_decrypt(&mut self, key: &RsaDecryptor) -> Result<InputPacket> {
        let block = self.get_bytes(RSA_BLOCK_SIZE)?;
        let plain = key.decrypt(&block)?;
        Ok(InputPacket::new(Bytes::from(plain)))
    }
}

/// Fixed-capacity reply builder
#[derive(Debug, Clone)]
pub struct OutputPacket {
    buf: Box<[u8]>,
    header: usize,
    pos: usize,
}

impl Default for OutputPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputPacket {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; OUTPUT_CAPACITY].into_boxed_slice(),
            header: OUTPUT_HEADER_RESERVE,
            pos: OUTPUT_HEADER_RESERVE,
        }
    }

    /// Everything written so far, prepended fields included
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.header..self.pos]
    }

    pub fn len(&self) -> usize {
        self.pos - self.header
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the finished frame
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    fn reserve(&self, width: usize) -> Result<()> {
        let available = self.buf.len() - self.pos;
        if width > available {
            return Err(ProtocolError::OutputOverflow {
                needed: width,
                available,
            });
        }
        Ok(())
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn add_u8(&mut self, value: u8) -> Result<()> {
        self.add_bytes(&[value])
    }

    pub fn add_u16(&mut self, value: u16) -> Result<()> {
        self.add_bytes(&value.to_le_bytes())
    }

    pub fn add_u32(&mut self, value: u32) -> Result<()> {
        self.add_bytes(&value.to_le_bytes())
    }

    /// Length-prefixed string; longer than `u16::MAX` bytes does not fit a frame anyway.
    pub fn add_string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| ProtocolError::OutputOverflow {
            needed: value.len(),
            available: usize::from(u16::MAX),
        })?;
        self.reserve(2 + value.len())?;
        self.add_u16(len)?;
        self.add_bytes(value.as_bytes())
    }

    fn prepend(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.header {
            return Err(ProtocolError::OutputOverflow {
                needed: bytes.len(),
                available: self.header,
            });
        }
        self.header -= bytes.len();
        self.buf[self.header..self.header + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn len_u16(&self) -> u16 {
        // pos and header never exceed OUTPUT_CAPACITY
        u16::try_from(self.len()).unwrap_or(u16::MAX)
    }

    /// Prepend the inner payload length, pad to whole blocks with 0x33 and encrypt.
    ///
    /// Must run before any other header field is added.
    pub fn xtea_encrypt(&mut self, key: &XteaKey) -> Result<()> {
        if self.header != OUTPUT_HEADER_RESERVE {
            return Err(ProtocolError::HeaderAlreadyWritten);
        }

        let inner = self.len_u16();
        self.prepend(&inner.to_le_bytes())?;

        let padding = (8 - self.len() % 8) % 8;
        for _ in 0..padding {
            self.add_u8(XTEA_PADDING_BYTE)?;
        }

        key.encrypt(&mut self.buf[self.header..self.pos]);
        Ok(())
    }

    /// Prepend the Adler-32 of everything written so far.
    pub fn add_checksum(&mut self) -> Result<()> {
        let checksum = adler32(self.as_bytes());
        self.prepend(&checksum.to_le_bytes())
    }

    /// Prepend the frame size; always the last step.
    pub fn add_size(&mut self) -> Result<()> {
        let size = self.len_u16();
        self.prepend(&size.to_le_bytes())
    }

    /// Apply the finalization steps in their fixed order and return the frame.
    pub fn finish(mut self, key: Option<&XteaKey>, with_checksum: bool) -> Result<Bytes> {
        if let Some(key) = key {
            self.xtea_encrypt(key)?;
        }
        if with_checksum {
            self.add_checksum()?;
        }
        self.add_size()?;
        Ok(self.to_bytes())
    }
}
