//! Packet framing and payload decoding.

use std::error::Error as StdError;
use std::fmt;

use super::MAX_PAYLOAD_LEN;

/// Errors raised while decoding server packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload ended before a field was complete.
    UnexpectedEof,
    /// A message exceeds the configured maximum size.
    PacketTooLarge { length: usize, max: usize },
    /// A packet arrived out of sequence.
    OutOfOrder { expected: u8, got: u8 },
    /// A field holds a value this client cannot interpret.
    InvalidField(&'static str),
    /// The server sent a message that does not fit the conversation.
    Unexpected(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnexpectedEof => write!(f, "unexpected end of packet"),
            ProtocolError::PacketTooLarge { length, max } => {
                write!(f, "packet too large: {} > {}", length, max)
            }
            ProtocolError::OutOfOrder { expected, got } => {
                write!(f, "packets out of order: expected {}, got {}", expected, got)
            }
            ProtocolError::InvalidField(msg) => write!(f, "invalid field: {}", msg),
            ProtocolError::Unexpected(msg) => write!(f, "unexpected packet: {}", msg),
        }
    }
}

impl StdError for ProtocolError {}

impl From<ProtocolError> for galendary_core::Error {
    fn from(err: ProtocolError) -> Self {
        galendary_core::Error::Protocol(err.to_string())
    }
}

/// Reassembles logical messages from the byte stream.
///
/// Bytes are fed in as they arrive; [`PacketFramer::next_message`] yields a
/// message once every packet making it up is buffered.
#[derive(Debug, Clone)]
pub struct PacketFramer {
    buf: Vec<u8>,
    max_message_size: usize,
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketFramer {
    /// Create a framer with a 64MB message limit.
    pub fn new() -> Self {
        Self::with_max_size(64 * 1024 * 1024)
    }

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_message_size,
        }
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop anything buffered, e.g. after the stream broke.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Take the next complete message as `(sequence id of its last packet,
    /// payload)`, or `None` if more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<(u8, Vec<u8>)>, ProtocolError> {
        // Walk headers first so nothing is consumed until the whole message is in.
        let mut offset = 0;
        let mut total = 0;
        let mut last_seq;
        loop {
            let Some(header) = self.buf.get(offset..offset + 4) else {
                return Ok(None);
            };
            let len = usize::from(header[0])
                | usize::from(header[1]) << 8
                | usize::from(header[2]) << 16;
            last_seq = header[3];
            total += len;
            if total > self.max_message_size {
                return Err(ProtocolError::PacketTooLarge {
                    length: total,
                    max: self.max_message_size,
                });
            }
            if self.buf.len() < offset + 4 + len {
                return Ok(None);
            }
            offset += 4 + len;
            if len < MAX_PAYLOAD_LEN {
                break;
            }
        }

        let mut payload = Vec::with_capacity(total);
        let mut pos = 0;
        while pos < offset {
            let len = usize::from(self.buf[pos])
                | usize::from(self.buf[pos + 1]) << 8
                | usize::from(self.buf[pos + 2]) << 16;
            payload.extend_from_slice(&self.buf[pos + 4..pos + 4 + len]);
            pos += 4 + len;
        }
        self.buf.drain(..offset);
        Ok(Some((last_seq, payload)))
    }
}

/// Cursor over a single message payload.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let b = self.peek_u8().ok_or(ProtocolError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ProtocolError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u24_le(&mut self) -> Result<u32, ProtocolError> {
        let b = self.read_bytes(3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ProtocolError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, ProtocolError> {
        let b = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(n).ok_or(ProtocolError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(ProtocolError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ProtocolError> {
        self.read_bytes(n).map(|_| ())
    }

    /// Everything left in the payload.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// A NUL-terminated string. A missing terminator takes the rest.
    pub fn read_null_str(&mut self) -> Result<&'a [u8], ProtocolError> {
        let rest = &self.data[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(idx) => {
                self.pos += idx + 1;
                Ok(&rest[..idx])
            }
            None => Ok(self.read_rest()),
        }
    }

    /// A length-encoded integer. `None` is the `0xFB` NULL marker used in rows.
    pub fn read_lenenc_int(&mut self) -> Result<Option<u64>, ProtocolError> {
        match self.read_u8()? {
            n @ 0x00..=0xfa => Ok(Some(u64::from(n))),
            0xfb => Ok(None),
            0xfc => self.read_u16_le().map(|n| Some(u64::from(n))),
            0xfd => self.read_u24_le().map(|n| Some(u64::from(n))),
            0xfe => self.read_u64_le().map(Some),
            0xff => Err(ProtocolError::InvalidField("length-encoded integer prefix 0xff")),
        }
    }

    /// A length-encoded integer that must not be NULL.
    pub fn read_lenenc_u64(&mut self) -> Result<u64, ProtocolError> {
        self.read_lenenc_int()?
            .ok_or(ProtocolError::InvalidField("unexpected NULL length"))
    }

    /// Length-encoded bytes; `None` for the NULL marker.
    pub fn read_lenenc_bytes(&mut self) -> Result<Option<&'a [u8]>, ProtocolError> {
        match self.read_lenenc_int()? {
            None => Ok(None),
            Some(len) => {
                let len = usize::try_from(len)
                    .map_err(|_| ProtocolError::InvalidField("length does not fit in memory"))?;
                self.read_bytes(len).map(Some)
            }
        }
    }

    /// A length-encoded string that must not be NULL, decoded lossily.
    pub fn read_lenenc_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self
            .read_lenenc_bytes()?
            .ok_or(ProtocolError::InvalidField("unexpected NULL string"))?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(seq: u8, payload: &[u8]) -> Vec<u8> {
        let len = payload.len();
        let mut out = vec![len as u8, (len >> 8) as u8, (len >> 16) as u8, seq];
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_framer_waits_for_full_packet() {
        let mut framer = PacketFramer::new();
        let bytes = packet(1, b"\x00\x01\x00\x02\x00\x00\x00");
        framer.feed(&bytes[..5]);
        assert_eq!(framer.next_message().unwrap(), None);
        framer.feed(&bytes[5..]);
        let (seq, payload) = framer.next_message().unwrap().unwrap();
        assert_eq!(seq, 1);
        assert_eq!(payload, b"\x00\x01\x00\x02\x00\x00\x00");
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_framer_splits_back_to_back_packets() {
        let mut framer = PacketFramer::new();
        let mut bytes = packet(1, b"one");
        bytes.extend(packet(2, b"two"));
        framer.feed(&bytes);
        assert_eq!(framer.next_message().unwrap(), Some((1, b"one".to_vec())));
        assert_eq!(framer.next_message().unwrap(), Some((2, b"two".to_vec())));
        assert_eq!(framer.next_message().unwrap(), None);
    }

    #[test]
    fn test_framer_joins_continuation_packets() {
        let mut framer = PacketFramer::new();
        let big = vec![7u8; MAX_PAYLOAD_LEN];
        let mut bytes = packet(0, &big);
        bytes.extend(packet(1, b"tail"));
        framer.feed(&bytes);
        let (seq, payload) = framer.next_message().unwrap().unwrap();
        assert_eq!(seq, 1);
        assert_eq!(payload.len(), MAX_PAYLOAD_LEN + 4);
        assert_eq!(&payload[MAX_PAYLOAD_LEN..], b"tail");
    }

    #[test]
    fn test_framer_rejects_oversized_message() {
        let mut framer = PacketFramer::with_max_size(4);
        framer.feed(&packet(0, b"too long"));
        assert!(matches!(
            framer.next_message(),
            Err(ProtocolError::PacketTooLarge { .. })
        ));
    }

    #[test]
    fn test_lenenc_integers() {
        let data = [
            0xfa, 0xfb, 0xfc, 0x34, 0x12, 0xfd, 0x01, 0x02, 0x03, 0xfe, 1, 0, 0, 0, 0, 0, 0, 0,
        ];
        let mut r = PacketReader::new(&data);
        assert_eq!(r.read_lenenc_int().unwrap(), Some(0xfa));
        assert_eq!(r.read_lenenc_int().unwrap(), None);
        assert_eq!(r.read_lenenc_int().unwrap(), Some(0x1234));
        assert_eq!(r.read_lenenc_int().unwrap(), Some(0x03_0201));
        assert_eq!(r.read_lenenc_int().unwrap(), Some(1));
        assert!(r.is_empty());
    }

    #[test]
    fn test_strings() {
        let data = b"8.0.36\0\x05hello";
        let mut r = PacketReader::new(data);
        assert_eq!(r.read_null_str().unwrap(), b"8.0.36");
        assert_eq!(r.read_lenenc_string().unwrap(), "hello");
        assert_eq!(r.read_u8(), Err(ProtocolError::UnexpectedEof));
    }
}
