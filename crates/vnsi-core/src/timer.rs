//! Timer models.

use crate::types::{ChannelUid, TimerId};

pub const TIMER_FLAG_ACTIVE: u32 = 1;
pub const TIMER_FLAG_INSTANT: u32 = 2;
pub const TIMER_FLAG_VPS: u32 = 4;
pub const TIMER_FLAG_RECORDING: u32 = 8;

/// Kind of timer as reported by TIMER_GETTYPES.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerType {
    Manual = 1,
    Repeating = 2,
    EpgSearch = 3,
}

impl TimerType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(TimerType::Manual),
            2 => Some(TimerType::Repeating),
            3 => Some(TimerType::EpgSearch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    /// Assigned by the store on add; ignored in add requests.
    pub id: TimerId,
    pub kind: TimerType,
    pub flags: u32,
    pub priority: i32,
    pub lifetime: i32,
    pub channel_uid: ChannelUid,
    /// Unix time.
    pub start: u32,
    pub stop: u32,
    /// Bit 0 = Monday.
    pub weekdays: u32,
    pub title: String,
    pub epg_search: String,
}

impl Timer {
    pub fn is_recording(&self) -> bool {
        self.flags & TIMER_FLAG_RECORDING != 0
    }
}
