//! Channel scan relay.
//!
//! A scanner runs on its own thread and reports progress through a
//! [`ScanObserver`]. The observer never touches the connection directly:
//! each callback becomes a `Command::Scan` on the connection's queue and is
//! forwarded to the client from the dispatch loop.
//!
//! Every scan started on a connection gets a fresh generation number. Events
//! carrying any other generation than the active one are dropped, so a late
//! `Finished` from a stopped scan cannot end its successor.

use crate::command::Command;
use crate::queue::CommandQueue;

/// Supported-source bits reported by SCAN_SUPPORTED_TYPES.
pub const SCAN_TYPE_DVB_T: u32 = 1;
pub const SCAN_TYPE_DVB_C: u32 = 2;
pub const SCAN_TYPE_DVB_S: u32 = 4;
pub const SCAN_TYPE_ANALOG: u32 = 8;
pub const SCAN_TYPE_ATSC: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    pub source_type: u32,
    pub tv: bool,
    pub radio: bool,
    pub fta: bool,
    pub scrambled: bool,
    pub hd: bool,
    pub country: u32,
    pub dvbc_inversion: u32,
    pub dvbc_symbolrate: u32,
    pub dvbc_qam: u32,
    pub satellite: u32,
    pub atsc_type: u32,
}

/// Country or satellite offered by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanListEntry {
    pub index: u32,
    pub short_name: String,
    pub long_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Percentage(u32),
    SignalStrength { strength: u32, locked: bool },
    DeviceInfo(String),
    Transponder(String),
    NewChannel {
        name: String,
        radio: bool,
        encrypted: bool,
        hd: bool,
    },
    Finished,
    Status(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanUpdate {
    pub generation: u64,
    pub event: ScanEvent,
}

/// Handed to the scanner; marshals callbacks onto the connection queue.
#[derive(Debug, Clone)]
pub struct ScanObserver {
    queue: CommandQueue,
    generation: u64,
}

impl ScanObserver {
    pub(crate) fn new(queue: CommandQueue, generation: u64) -> Self {
        ScanObserver { queue, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn percentage(&self, percent: u32) {
        self.emit(ScanEvent::Percentage(percent));
    }

    pub fn signal_strength(&self, strength: u32, locked: bool) {
        self.emit(ScanEvent::SignalStrength { strength, locked });
    }

    pub fn device_info(&self, info: &str) {
        self.emit(ScanEvent::DeviceInfo(info.to_string()));
    }

    pub fn transponder(&self, info: &str) {
        self.emit(ScanEvent::Transponder(info.to_string()));
    }

    pub fn new_channel(&self, name: &str, radio: bool, encrypted: bool, hd: bool) {
        self.emit(ScanEvent::NewChannel {
            name: name.to_string(),
            radio,
            encrypted,
            hd,
        });
    }

    pub fn finished(&self) {
        self.emit(ScanEvent::Finished);
    }

    pub fn status(&self, status: u32) {
        self.emit(ScanEvent::Status(status));
    }

    fn emit(&self, event: ScanEvent) {
        self.queue.enqueue(Command::Scan(ScanUpdate {
            generation: self.generation,
            event,
        }));
    }
}

/// Per-connection scan state.
#[derive(Debug, Default)]
pub struct ScanRelay {
    active: Option<u64>,
    next_generation: u64,
}

impl ScanRelay {
    pub fn new() -> Self {
        ScanRelay::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Reserve the next generation without activating it.
    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    pub fn activate(&mut self, generation: u64) {
        self.active = Some(generation);
    }

    /// Whether `update` belongs to the running scan.
    pub fn accepts(&self, update: &ScanUpdate) -> bool {
        self.active == Some(update.generation)
    }

    /// Returns `true` if a scan was active.
    pub fn deactivate(&mut self) -> bool {
        self.active.take().is_some()
    }
}
