//! Shared identifiers and channel aliases.
//!
//! This module defines:
//! - `ClientId`: a lightweight handle for connected clients
//! - id aliases for backend objects
//! - the outbound channel from an engine to its connection writer

use tokio::sync::mpsc;
use vnsi_protocol::ResponsePacket;

/// Identifier for a connected client.
///
/// This is intentionally opaque; we just guarantee uniqueness
/// over the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// Backend channel id, stable across channel list reloads.
pub type ChannelUid = u32;

pub type RecordingId = u32;

pub type TimerId = u32;

/// Outbound frames from an engine (or a stream/osd session) to the
/// connection writer.
pub type OutboundTx = mpsc::UnboundedSender<ResponsePacket>;
pub type OutboundRx = mpsc::UnboundedReceiver<ResponsePacket>;

/// Create a fresh outbound channel.
pub fn outbound_channel() -> (OutboundTx, OutboundRx) {
    mpsc::unbounded_channel()
}
