//! Field-level payload codec.
//!
//! - [`PacketReader`] pulls typed fields out of a request (or frame) payload.
//! - [`ResponsePacket`] builds an outbound frame field by field.
//!
//! Field encodings: `u8`, `u32`, `s32`, `u64`, `s64` big-endian; strings are
//! UTF-8 followed by a single NUL byte. Invalid UTF-8 from a client is
//! decoded lossily rather than rejected.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::binary_codec::{self, ProtocolError};
use crate::wire_types::{Channel, OsdType, ReturnCode, ScannerType, StatusType, StreamType};

/// Cursor over a payload.
#[derive(Debug, Clone)]
pub struct PacketReader {
    buf: Bytes,
}

impl PacketReader {
    pub fn new(buf: Bytes) -> Self {
        PacketReader { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.buf.has_remaining()
    }

    pub fn extract_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn extract_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.extract_u8()? != 0)
    }

    pub fn extract_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn extract_s32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn extract_u64(&mut self) -> Result<u64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    pub fn extract_s64(&mut self) -> Result<i64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn extract_string(&mut self) -> Result<String, ProtocolError> {
        let nul = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::InvalidString)?;
        let raw = self.buf.split_to(nul);
        self.buf.advance(1);
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Take `len` raw bytes.
    pub fn extract_bytes(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    fn ensure(&self, len: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < len {
            return Err(ProtocolError::Truncated);
        }
        Ok(())
    }
}

/// Outbound frame under construction.
#[derive(Debug, Clone)]
pub struct ResponsePacket {
    channel: Channel,
    id: u32,
    body: BytesMut,
}

impl ResponsePacket {
    /// Reply to request `request_id`; the payload starts with `code`.
    pub fn response(request_id: u32, code: ReturnCode) -> Self {
        let mut packet = Self::on_channel(Channel::RequestResponse, request_id);
        packet.add_u32(code as u32);
        packet
    }

    pub fn status(kind: StatusType) -> Self {
        Self::on_channel(Channel::Status, kind as u32)
    }

    pub fn scan(kind: ScannerType) -> Self {
        Self::on_channel(Channel::Scan, kind as u32)
    }

    pub fn stream(kind: StreamType) -> Self {
        Self::on_channel(Channel::Stream, kind as u32)
    }

    pub fn osd(kind: OsdType) -> Self {
        Self::on_channel(Channel::Osd, kind as u32)
    }

    fn on_channel(channel: Channel, id: u32) -> Self {
        ResponsePacket {
            channel,
            id,
            body: BytesMut::with_capacity(64),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Request id for responses, packet type for the async channels.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    pub fn add_u8(&mut self, v: u8) -> &mut Self {
        self.body.put_u8(v);
        self
    }

    pub fn add_bool(&mut self, v: bool) -> &mut Self {
        self.add_u8(u8::from(v))
    }

    pub fn add_u32(&mut self, v: u32) -> &mut Self {
        self.body.put_u32(v);
        self
    }

    pub fn add_s32(&mut self, v: i32) -> &mut Self {
        self.body.put_i32(v);
        self
    }

    pub fn add_u64(&mut self, v: u64) -> &mut Self {
        self.body.put_u64(v);
        self
    }

    pub fn add_s64(&mut self, v: i64) -> &mut Self {
        self.body.put_i64(v);
        self
    }

    /// Append a NUL-terminated string. Interior NULs are dropped.
    pub fn add_string(&mut self, v: &str) -> &mut Self {
        self.body.extend(v.bytes().filter(|&b| b != 0));
        self.body.put_u8(0);
        self
    }

    pub fn add_bytes(&mut self, v: &[u8]) -> &mut Self {
        self.body.extend_from_slice(v);
        self
    }

    /// Serialize header + payload.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut out = Vec::with_capacity(crate::wire_types::FRAME_HEADER_LEN + self.body.len());
        binary_codec::encode_frame(self.channel, self.id, &self.body, &mut out)?;
        Ok(Bytes::from(out))
    }
}
