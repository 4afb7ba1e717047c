//! Backend notification entry points.
//!
//! The backend calls these from its own threads. Implementations must only
//! build a command and enqueue it; they never block and never touch
//! connection state.

use crate::epg::EpgNotice;
use crate::recording::RecordingNotice;
use crate::types::ChannelUid;

pub trait StatusObserver: Send + Sync {
    /// The channel list was reloaded or edited.
    fn channels_change(&self);

    /// The recordings list changed.
    fn recordings_change(&self);

    /// Timers changed or a device's signal state changed.
    fn signal_timer_change(&self);

    fn epg_change(&self, notice: EpgNotice);

    /// A recording started or stopped.
    fn recording(&self, notice: RecordingNotice);

    fn osd_status_message(&self, text: &str);

    /// Data of a single channel changed.
    fn channel_change(&self, uid: ChannelUid);
}
