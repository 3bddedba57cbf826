//! L2CAP-style signaling frames and their wire codec.
//!
//! Wire format: `[Len(u16 LE) | CID(u16 LE) | payload[Len]]`. No magic, no
//! checksum, no version. Opcode and semantic checks live in `core-session`.

use bytes::{BufMut, Bytes, BytesMut};

pub const HEADER_LEN: usize = 4;
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("length field {declared} does not match payload of {actual} bytes")]
    InvalidLength { declared: usize, actual: usize },
    #[error("frame too short for header: {0} bytes")]
    TooShort(usize),
    #[error("declared length {declared} exceeds {available} remaining payload bytes")]
    TruncatedPayload { declared: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Declared payload length. Equal to `payload.len()` for any frame that
    /// came off the wire.
    pub length: u16,
    pub cid: u16,
    /// First byte is the opcode.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame whose declared length matches its payload.
    pub fn new(cid: u16, payload: Vec<u8>) -> Result<Frame, Error> {
        let length = u16::try_from(payload.len()).map_err(|_| Error::InvalidLength {
            declared: payload.len(),
            actual: payload.len(),
        })?;
        Ok(Frame { length, cid, payload })
    }

    /// Build a frame with an arbitrary declared length. `encode` rejects it
    /// unless `length == payload.len()`.
    pub fn with_declared_length(length: u16, cid: u16, payload: Vec<u8>) -> Frame {
        Frame { length, cid, payload }
    }

    pub fn opcode(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Encode as `[Len | CID | payload]`.
    pub fn encode(&self) -> Result<Bytes, Error> {
        let actual = self.payload.len();
        if actual > MAX_PAYLOAD || self.length as usize != actual {
            return Err(Error::InvalidLength { declared: self.length as usize, actual });
        }
        let mut b = BytesMut::with_capacity(HEADER_LEN + actual);
        b.put_u16_le(self.length);
        b.put_u16_le(self.cid);
        b.extend_from_slice(&self.payload);
        Ok(b.freeze())
    }

    /// Decode a single frame from the front of `src`. Bytes past the declared
    /// payload are ignored.
    pub fn decode(mut src: &[u8]) -> Result<Frame, Error> {
        if src.len() < HEADER_LEN {
            return Err(Error::TooShort(src.len()));
        }
        let length = get_u16_le(&mut src)?;
        let cid = get_u16_le(&mut src)?;
        let declared = length as usize;
        if src.len() < declared {
            return Err(Error::TruncatedPayload { declared, available: src.len() });
        }
        Ok(Frame { length, cid, payload: src[..declared].to_vec() })
    }
}

/// Free-function form of [`Frame::encode`].
pub fn encode(frame: &Frame) -> Result<Bytes, Error> {
    frame.encode()
}

/// Free-function form of [`Frame::decode`].
pub fn decode(src: &[u8]) -> Result<Frame, Error> {
    Frame::decode(src)
}

fn get_u16_le(src: &mut &[u8]) -> Result<u16, Error> {
    if src.len() < 2 {
        return Err(Error::TooShort(src.len()));
    }
    let v = u16::from_le_bytes([src[0], src[1]]);
    *src = &src[2..];
    Ok(v)
}
