//! Recording models.

use crate::types::RecordingId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub id: RecordingId,
    /// Unix time.
    pub start: i64,
    /// Seconds.
    pub duration: u32,
    pub priority: i32,
    pub lifetime: i32,
    pub channel_name: String,
    pub title: String,
    pub short_text: String,
    pub description: String,
    /// Folder path relative to the recordings root, `/` separated.
    pub directory: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub is_new: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total_mb: u32,
    pub free_mb: u32,
}

impl DiskSpace {
    pub fn percent_used(&self) -> u32 {
        if self.total_mb == 0 {
            return 0;
        }
        let used = u64::from(self.total_mb.saturating_sub(self.free_mb));
        (used * 100 / u64::from(self.total_mb)) as u32
    }
}

/// One cut mark of a recording's edit decision list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdlMark {
    /// Milliseconds from the start of the recording.
    pub start_ms: i64,
    pub end_ms: i64,
    pub kind: i32,
}

/// Independent frame located by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IFrame {
    pub position: u64,
    pub frame: u32,
    pub length: u32,
}

/// A recording was started or stopped on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingNotice {
    pub device: u32,
    pub name: String,
    pub file_name: String,
    pub on: bool,
}
