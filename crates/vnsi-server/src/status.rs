//! Fan-out of backend notifications to every connected client.
//!
//! The backend knows a single `StatusObserver`; the hub forwards each
//! callback to the queue of every registered connection. Each engine then
//! decides on its own whether the client gets a status packet.

use vnsi_core::{ChannelUid, ConnectionHandle, EpgNotice, RecordingNotice, StatusObserver};

use crate::types::{read_registry, ClientRegistry};

#[derive(Debug, Clone)]
pub struct StatusHub {
    clients: ClientRegistry,
}

impl StatusHub {
    pub fn new(clients: ClientRegistry) -> Self {
        StatusHub { clients }
    }

    fn broadcast(&self, f: impl Fn(&ConnectionHandle)) {
        let guard = read_registry(&self.clients);
        for handle in guard.values() {
            f(handle);
        }
    }
}

impl StatusObserver for StatusHub {
    fn channels_change(&self) {
        self.broadcast(|h| h.channels_change());
    }

    fn recordings_change(&self) {
        self.broadcast(|h| h.recordings_change());
    }

    fn signal_timer_change(&self) {
        self.broadcast(|h| h.signal_timer_change());
    }

    fn epg_change(&self, notice: EpgNotice) {
        self.broadcast(|h| h.epg_change(notice));
    }

    fn recording(&self, notice: RecordingNotice) {
        self.broadcast(|h| h.recording(notice.clone()));
    }

    fn osd_status_message(&self, text: &str) {
        self.broadcast(|h| h.osd_status_message(text));
    }

    fn channel_change(&self, uid: ChannelUid) {
        self.broadcast(|h| h.channel_change(uid));
    }
}
