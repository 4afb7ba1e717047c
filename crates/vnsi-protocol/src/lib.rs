//! vnsi-protocol
//!
//! Wire-level encoding/decoding for the VNSI server.
//!
//! This crate is responsible for turning frames into bytes and back again.
//! It knows nothing about channels, timers or sessions; the engine in
//! `vnsi-core` gives the fields their meaning.
//!
//! - [`wire_types`]   : versions, channels, opcodes, return codes
//! - [`binary_codec`] : frame headers (request and server frames)
//! - [`packet`]       : typed payload fields

pub mod wire_types;
pub mod binary_codec;
pub mod packet;

pub use binary_codec::{
    ProtocolError,
    Frame,
    FrameHeader,
    RequestHeader,
    decode_frame,
    decode_frame_header,
    decode_request_header,
    encode_frame,
    encode_request,
};
pub use packet::{PacketReader, ResponsePacket};
pub use wire_types::{Channel, Opcode, ReturnCode, ScannerType, StatusType, StreamType, OsdType};
