//! EPG events and the per-connection update throttle.
//!
//! The backend reports EPG changes far more often than a client wants to
//! refetch. [`EpgThrottle`] decides, per channel, whether a change notice
//! is forwarded:
//! - notices about events the client already fetched are ignored
//! - notices inside the minimum interval are counted, not forwarded
//! - everything else is forwarded and restarts the interval

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::ChannelUid;

pub const DEFAULT_EPG_MIN_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpgEvent {
    pub id: u32,
    /// Unix time.
    pub start: u32,
    pub duration: u32,
    pub genre: u32,
    pub parental_rating: u32,
    pub title: String,
    pub short_text: String,
    pub description: String,
}

/// EPG data of a channel changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpgNotice {
    pub channel_uid: ChannelUid,
    /// Start time of the newest event in the changed schedule.
    pub last_event_start: u32,
}

#[derive(Debug, Clone, Default)]
struct ChannelUpdate {
    attempts: u32,
    last_event: u32,
    /// Newest start the client fetched through EPG_GETFORCHANNEL.
    delivered: Option<u32>,
    last_trigger: Option<Instant>,
}

#[derive(Debug)]
pub struct EpgThrottle {
    min_interval: Duration,
    updates: HashMap<ChannelUid, ChannelUpdate>,
}

impl EpgThrottle {
    pub fn new(min_interval: Duration) -> Self {
        EpgThrottle {
            min_interval,
            updates: HashMap::new(),
        }
    }

    /// Returns `true` when `notice` should be forwarded to the client.
    pub fn on_change(&mut self, notice: &EpgNotice, now: Instant) -> bool {
        let entry = self.updates.entry(notice.channel_uid).or_default();

        if let Some(delivered) = entry.delivered {
            if notice.last_event_start <= delivered {
                return false;
            }
        }

        if let Some(last) = entry.last_trigger {
            if now.saturating_duration_since(last) < self.min_interval {
                entry.attempts += 1;
                entry.last_event = notice.last_event_start;
                return false;
            }
        }

        entry.last_trigger = Some(now);
        entry.last_event = notice.last_event_start;
        entry.attempts = 0;
        true
    }

    /// The client fetched events up to `newest_start`.
    pub fn on_fetch(&mut self, channel_uid: ChannelUid, newest_start: u32) {
        let entry = self.updates.entry(channel_uid).or_default();
        entry.delivered = Some(entry.delivered.map_or(newest_start, |d| d.max(newest_start)));
        entry.attempts = 0;
    }

    /// Suppressed notices since the last forwarded one.
    pub fn attempts(&self, channel_uid: ChannelUid) -> u32 {
        self.updates.get(&channel_uid).map_or(0, |e| e.attempts)
    }

    /// Newest event start seen in a notice for this channel.
    pub fn last_event(&self, channel_uid: ChannelUid) -> Option<u32> {
        self.updates.get(&channel_uid).map(|e| e.last_event)
    }
}

impl Default for EpgThrottle {
    fn default() -> Self {
        EpgThrottle::new(DEFAULT_EPG_MIN_INTERVAL)
    }
}
