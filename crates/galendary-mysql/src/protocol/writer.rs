//! Payload encoding and packet construction.

use super::MAX_PAYLOAD_LEN;

/// Builds one message payload and wraps it in packets.
#[derive(Debug, Clone, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16_le(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes followed by a NUL terminator.
    pub fn write_null_str(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.buf.push(0);
    }

    pub fn write_lenenc_int(&mut self, v: u64) {
        match v {
            0..=0xfa => self.buf.push(v as u8),
            0xfb..=0xffff => {
                self.buf.push(0xfc);
                self.buf.extend_from_slice(&(v as u16).to_le_bytes());
            }
            0x1_0000..=0xff_ffff => {
                self.buf.push(0xfd);
                self.buf.extend_from_slice(&(v as u32).to_le_bytes()[..3]);
            }
            _ => {
                self.buf.push(0xfe);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    pub fn write_lenenc_bytes(&mut self, data: &[u8]) {
        self.write_lenenc_int(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    /// The raw payload.
    pub fn payload(&self) -> &[u8] {
        &self.buf
    }

    /// Frame the payload into packets starting at `sequence_id`.
    ///
    /// Payloads of `0xFF_FFFF` bytes or more are split, and a payload that is an
    /// exact multiple of the limit gets an empty trailing packet.
    pub fn build_packet(&self, sequence_id: u8) -> Vec<u8> {
        frame(&self.buf, sequence_id).0
    }
}

/// Frame `payload` into packets, returning the bytes and the sequence id the
/// next packet should use.
pub fn frame(payload: &[u8], sequence_id: u8) -> (Vec<u8>, u8) {
    let mut out = Vec::with_capacity(payload.len() + 4);
    let mut seq = sequence_id;
    let mut chunks = payload.chunks(MAX_PAYLOAD_LEN);
    loop {
        let chunk = chunks.next().unwrap_or(&[]);
        let len = chunk.len();
        out.extend_from_slice(&[len as u8, (len >> 8) as u8, (len >> 16) as u8, seq]);
        out.extend_from_slice(chunk);
        seq = seq.wrapping_add(1);
        if len < MAX_PAYLOAD_LEN {
            break;
        }
    }
    (out, seq)
}
