//! Backend collaborator interfaces.
//!
//! The engine never owns backend data. Everything it serves comes from the
//! traits below, bundled into a cloneable [`Backend`]. The server binary
//! and the tests plug in [`memory::MemoryBackend`].
//!
//! Calls are synchronous and expected to be short; handlers run them on the
//! dispatch task.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::channel::Channel;
use crate::epg::EpgEvent;
use crate::error::BackendError;
use crate::recording::{DiskSpace, EdlMark, IFrame, Recording};
use crate::scan::{ScanListEntry, ScanObserver, ScanParams};
use crate::timer::{Timer, TimerType};
use crate::types::{ChannelUid, OutboundTx, RecordingId, TimerId};

pub trait ChannelSource: Send + Sync {
    /// Current channel list in list order.
    fn channels(&self) -> Vec<Channel>;

    fn channel(&self, uid: ChannelUid) -> Option<Channel> {
        self.channels().into_iter().find(|c| c.uid == uid)
    }
}

#[derive(Debug, Clone)]
pub struct LiveRequest {
    pub channel: Channel,
    pub priority: i32,
    pub timeshift: bool,
    /// How long to wait for a free device.
    pub timeout: Duration,
}

pub trait Devices: Send + Sync {
    /// Tune a device and start streaming `request.channel` into `sink`.
    fn open_live(
        &self,
        request: LiveRequest,
        sink: OutboundTx,
    ) -> Result<Box<dyn LiveStream>, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub channel_uid: ChannelUid,
    pub timeshift: bool,
    /// Timeshift buffer bounds, unix time in milliseconds.
    pub buffer_start: i64,
    pub buffer_end: i64,
}

/// Outcome of telling a live stream that its channel data changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tuning {
    Keep,
    Invalidated,
}

/// A running live stream. Dropping it must release the device.
pub trait LiveStream: Send {
    fn timeshift_active(&self) -> bool;

    /// Jump inside the timeshift buffer. Returns the new stream serial.
    fn seek(&mut self, time_ms: i64) -> Result<u32, BackendError>;

    fn status(&self) -> StreamStatus;

    /// Emit a signal-info packet on the stream channel.
    fn request_signal_info(&mut self);

    /// `channel` is the new channel data, `None` if it was deleted.
    fn retune(&mut self, channel: Option<&Channel>) -> Tuning;

    fn stop(&mut self);
}

pub trait RecordingStore: Send + Sync {
    fn disk_space(&self) -> Result<DiskSpace, BackendError>;

    fn recordings(&self) -> Vec<Recording>;

    fn recording(&self, id: RecordingId) -> Option<Recording> {
        self.recordings().into_iter().find(|r| r.id == id)
    }

    /// Whether a timer is still writing this recording.
    fn is_recording(&self, id: RecordingId) -> bool;

    fn rename(&self, id: RecordingId, name: &str) -> Result<(), BackendError>;

    fn move_to(&self, id: RecordingId, folder: &str) -> Result<(), BackendError>;

    /// Move a recording into the deleted set.
    fn delete(&self, id: RecordingId) -> Result<(), BackendError>;

    fn edl(&self, id: RecordingId) -> Result<Vec<EdlMark>, BackendError>;

    fn deleted(&self) -> Vec<Recording>;

    /// Move a deleted recording back, metadata unchanged.
    fn undelete(&self, id: RecordingId) -> Result<(), BackendError>;

    /// Remove one deleted recording for good.
    fn purge(&self, id: RecordingId) -> Result<(), BackendError>;

    /// Returns the number of purged recordings.
    fn purge_all(&self) -> Result<usize, BackendError>;

    fn open_player(&self, id: RecordingId) -> Result<Box<dyn RecordingPlayer>, BackendError>;
}

/// Random access reader over one recording. Dropping it closes the file.
pub trait RecordingPlayer: Send {
    fn length_bytes(&self) -> u64;

    fn length_frames(&self) -> u32;

    /// Transport stream (as opposed to PES) recording.
    fn is_ts(&self) -> bool;

    /// Up to `amount` bytes starting at `position`.
    fn read_block(&mut self, position: u64, amount: u32) -> Result<Bytes, BackendError>;

    fn position_from_frame(&self, frame: u32) -> u64;

    fn frame_from_position(&self, position: u64) -> u32;

    /// Nearest independent frame at or after (`forward`) / before `frame`.
    fn iframe(&self, frame: u32, forward: bool) -> Option<IFrame>;

    fn close(&mut self);
}

pub trait TimerStore: Send + Sync {
    fn timers(&self) -> Vec<Timer>;

    fn timer(&self, id: TimerId) -> Option<Timer> {
        self.timers().into_iter().find(|t| t.id == id)
    }

    /// Store a new timer. Returns its id.
    fn add(&self, timer: Timer) -> Result<TimerId, BackendError>;

    /// Replace the timer with `timer.id`.
    fn update(&self, timer: Timer) -> Result<(), BackendError>;

    fn delete(&self, id: TimerId) -> Result<(), BackendError>;

    fn types(&self) -> Vec<TimerType>;
}

pub trait EpgSource: Send + Sync {
    /// Events of `uid` overlapping `[start, start + duration)`; a zero
    /// duration means open ended. `None` for an unknown channel.
    fn events(&self, uid: ChannelUid, start: u32, duration: u32) -> Option<Vec<EpgEvent>>;
}

pub trait Scanner: Send + Sync {
    /// Bitmask of `SCAN_TYPE_*`.
    fn supported_types(&self) -> u32;

    fn countries(&self) -> Vec<ScanListEntry>;

    fn satellites(&self) -> Vec<ScanListEntry>;

    /// Start scanning; progress is reported through `observer`.
    fn start(&self, params: ScanParams, observer: ScanObserver) -> Result<(), BackendError>;

    fn stop(&self);
}

pub trait OsdProvider: Send + Sync {
    /// Attach an OSD session that paints into `sink`.
    fn open(&self, sink: OutboundTx) -> Result<Box<dyn OsdSession>, BackendError>;
}

pub trait OsdSession: Send {
    fn hit_key(&mut self, key: u32);

    fn close(&mut self);
}

/// Everything an engine needs from the backend.
#[derive(Clone)]
pub struct Backend {
    pub channels: Arc<dyn ChannelSource>,
    pub devices: Arc<dyn Devices>,
    pub recordings: Arc<dyn RecordingStore>,
    pub timers: Arc<dyn TimerStore>,
    pub epg: Arc<dyn EpgSource>,
    /// `None` when no scanner plugin is available.
    pub scanner: Option<Arc<dyn Scanner>>,
    pub osd: Option<Arc<dyn OsdProvider>>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("scanner", &self.scanner.is_some())
            .field("osd", &self.osd.is_some())
            .finish_non_exhaustive()
    }
}
