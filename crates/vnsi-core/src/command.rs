//! Units of work processed by a connection's dispatch loop.
//!
//! Client requests and backend notifications share one type so that they
//! are handled in a single total order.

use bytes::Bytes;

use crate::epg::EpgNotice;
use crate::recording::RecordingNotice;
use crate::scan::ScanUpdate;
use crate::types::ChannelUid;

/// One decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Raw opcode; unknown values are answered with NotSupported.
    pub opcode: u32,
    /// Correlation id echoed in the response.
    pub request_id: u32,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    IncomingRequest(Request),
    /// The transport failed; the connection must close.
    TransportError(String),
    RecordingChanged(RecordingNotice),
    OsdMessage(String),
    /// Data of one channel changed.
    ChannelChanged(ChannelUid),
    ChannelListChanged,
    RecordingListChanged,
    TimerOrSignalChanged,
    EpgChanged(EpgNotice),
    Scan(ScanUpdate),
    /// Queue sentinel pushed by `CommandQueue::close`.
    Shutdown,
}

impl Command {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::IncomingRequest(_) => "request",
            Command::TransportError(_) => "transport_error",
            Command::RecordingChanged(_) => "recording_changed",
            Command::OsdMessage(_) => "osd_message",
            Command::ChannelChanged(_) => "channel_changed",
            Command::ChannelListChanged => "channel_list_changed",
            Command::RecordingListChanged => "recording_list_changed",
            Command::TimerOrSignalChanged => "timer_or_signal_changed",
            Command::EpgChanged(_) => "epg_changed",
            Command::Scan(_) => "scan",
            Command::Shutdown => "shutdown",
        }
    }
}
