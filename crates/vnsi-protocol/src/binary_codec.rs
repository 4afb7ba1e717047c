//! Frame-level binary encoding/decoding.
//!
//! Framing model (all integers big-endian):
//!
//! ```text
//! Request (client → server)
//! -------------------------
//! [0..4)   channel        (always Channel::RequestResponse)
//! [4..8)   request id     (echoed in the response)
//! [8..12)  opcode         (Opcode as u32)
//! [12..16) payload length
//! [16..)   payload        (fields, see `packet`)
//!
//! Server frame (server → client)
//! ------------------------------
//! [0..4)   channel        (Channel as u32)
//! [4..8)   id             (request id on RequestResponse, packet type otherwise)
//! [8..12)  payload length
//! [12..)   payload        (responses start with a ReturnCode u32)
//! ```
//!
//! NOTE: the header decoders only look at the fixed-size header. A stream
//! reader is expected to read the header, then `payload_len` more bytes.

use bytes::{BufMut, Bytes};
use thiserror::Error;

use crate::wire_types::{validate_payload_len, Channel, FRAME_HEADER_LEN, REQUEST_HEADER_LEN};

/// Errors that can arise when encoding/decoding a frame or its fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer too short for the expected fields.
    #[error("buffer truncated")]
    Truncated,

    /// Payload length above `MAX_PAYLOAD_LEN`.
    #[error("payload of {0} bytes exceeds the size limit")]
    PayloadTooLarge(usize),

    /// Unknown or unexpected frame channel.
    #[error("invalid frame channel: {0}")]
    InvalidChannel(u32),

    /// String field without a terminating NUL.
    #[error("unterminated string field")]
    InvalidString,
}

/// Fixed request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub request_id: u32,
    pub opcode: u32,
    pub payload_len: usize,
}

/// Fixed server frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub channel: Channel,
    pub id: u32,
    pub payload_len: usize,
}

/// A complete server frame, as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: Channel,
    pub id: u32,
    pub payload: Bytes,
}

// ============================================================================
// REQUESTS: client → server
// ============================================================================

/// Decode the 16-byte request header.
pub fn decode_request_header(buf: &[u8]) -> Result<RequestHeader, ProtocolError> {
    if buf.len() < REQUEST_HEADER_LEN {
        return Err(ProtocolError::Truncated);
    }

    let channel = read_u32_be(buf, 0)?;
    if channel != Channel::RequestResponse as u32 {
        return Err(ProtocolError::InvalidChannel(channel));
    }

    let request_id = read_u32_be(buf, 4)?;
    let opcode = read_u32_be(buf, 8)?;
    let payload_len = read_u32_be(buf, 12)? as usize;

    if !validate_payload_len(payload_len) {
        return Err(ProtocolError::PayloadTooLarge(payload_len));
    }

    Ok(RequestHeader {
        request_id,
        opcode,
        payload_len,
    })
}

/// Encode a full request frame (header + payload), appended to `out`.
pub fn encode_request(
    request_id: u32,
    opcode: u32,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    let len = checked_len(payload.len())?;

    out.reserve(REQUEST_HEADER_LEN + payload.len());
    out.put_u32(Channel::RequestResponse as u32);
    out.put_u32(request_id);
    out.put_u32(opcode);
    out.put_u32(len);
    out.extend_from_slice(payload);

    Ok(())
}

// ============================================================================
// FRAMES: server → client
// ============================================================================

/// Encode a full server frame (header + payload), appended to `out`.
pub fn encode_frame(
    channel: Channel,
    id: u32,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    let len = checked_len(payload.len())?;

    out.reserve(FRAME_HEADER_LEN + payload.len());
    out.put_u32(channel as u32);
    out.put_u32(id);
    out.put_u32(len);
    out.extend_from_slice(payload);

    Ok(())
}

/// Decode the 12-byte server frame header.
pub fn decode_frame_header(buf: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Err(ProtocolError::Truncated);
    }

    let raw_channel = read_u32_be(buf, 0)?;
    let channel = Channel::from_u32(raw_channel).ok_or(ProtocolError::InvalidChannel(raw_channel))?;
    let id = read_u32_be(buf, 4)?;
    let payload_len = read_u32_be(buf, 8)? as usize;

    if !validate_payload_len(payload_len) {
        return Err(ProtocolError::PayloadTooLarge(payload_len));
    }

    Ok(FrameHeader {
        channel,
        id,
        payload_len,
    })
}

/// Decode one complete server frame from the start of `buf`.
///
/// Returns the frame and the number of bytes consumed.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    let header = decode_frame_header(buf)?;
    let end = FRAME_HEADER_LEN + header.payload_len;
    let payload = buf
        .get(FRAME_HEADER_LEN..end)
        .ok_or(ProtocolError::Truncated)?;

    Ok((
        Frame {
            channel: header.channel,
            id: header.id,
            payload: Bytes::copy_from_slice(payload),
        },
        end,
    ))
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn read_u32_be(buf: &[u8], at: usize) -> Result<u32, ProtocolError> {
    let arr: [u8; 4] = buf
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::Truncated)?;
    Ok(u32::from_be_bytes(arr))
}

fn checked_len(len: usize) -> Result<u32, ProtocolError> {
    if !validate_payload_len(len) {
        return Err(ProtocolError::PayloadTooLarge(len));
    }
    u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire_types::Opcode;

    #[test]
    fn request_header_carries_id_and_opcode() {
        let mut buf = Vec::new();
        encode_request(42, Opcode::Ping as u32, &[1, 2, 3], &mut buf).unwrap();

        let header = decode_request_header(&buf).unwrap();
        assert_eq!(header.request_id, 42);
        assert_eq!(header.opcode, Opcode::Ping as u32);
        assert_eq!(header.payload_len, 3);
        assert_eq!(&buf[REQUEST_HEADER_LEN..], &[1, 2, 3]);
    }

    #[test]
    fn request_on_wrong_channel_is_rejected() {
        let mut buf = Vec::new();
        encode_frame(Channel::Status, 1, &[], &mut buf).unwrap();
        buf.extend_from_slice(&[0, 0, 0, 0]);

        assert_eq!(
            decode_request_header(&buf),
            Err(ProtocolError::InvalidChannel(Channel::Status as u32))
        );
    }

    #[test]
    fn oversized_payload_length_is_rejected() {
        let mut buf = Vec::new();
        buf.put_u32(Channel::RequestResponse as u32);
        buf.put_u32(1);
        buf.put_u32(Opcode::Login as u32);
        buf.put_u32(u32::MAX);

        assert!(matches!(
            decode_request_header(&buf),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn frame_decode_reports_consumed_length() {
        let mut buf = Vec::new();
        encode_frame(Channel::Scan, 6, &[9, 9], &mut buf).unwrap();
        encode_frame(Channel::Status, 1, &[], &mut buf).unwrap();

        let (first, used) = decode_frame(&buf).unwrap();
        assert_eq!(first.channel, Channel::Scan);
        assert_eq!(first.id, 6);
        assert_eq!(&first.payload[..], &[9, 9]);

        let (second, _) = decode_frame(&buf[used..]).unwrap();
        assert_eq!(second.channel, Channel::Status);
        assert!(second.payload.is_empty());
    }

    #[test]
    fn truncated_frame_body_is_an_error() {
        let mut buf = Vec::new();
        encode_frame(Channel::Stream, 4, &[1, 2, 3, 4], &mut buf).unwrap();
        buf.truncate(buf.len() - 1);

        assert_eq!(decode_frame(&buf), Err(ProtocolError::Truncated));
    }
}
