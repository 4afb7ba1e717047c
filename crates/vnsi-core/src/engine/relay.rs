//! Backend notifications turned into status and scan packets.
//!
//! Status packets only go out once the client enabled the status
//! interface. Notices about data that changes wholesale during a channel
//! scan (timers, channel list, recordings list, EPG) are suppressed while
//! data updates are inhibited.

use std::time::Instant;

use tracing::{debug, info};
use vnsi_protocol::wire_types::CHANNEL_CHANGE_MIN_VERSION;
use vnsi_protocol::{ResponsePacket, ScannerType, StatusType};

use crate::backend::Tuning;
use crate::engine::Engine;
use crate::epg::EpgNotice;
use crate::recording::RecordingNotice;
use crate::scan::{ScanEvent, ScanUpdate};
use crate::session::Session;
use crate::types::ChannelUid;

impl Engine {
    pub(crate) fn relay_timer_change(&mut self) {
        if self.data_notices_enabled() {
            self.send(ResponsePacket::status(StatusType::TimerChange));
        }
    }

    pub(crate) fn relay_recording(&mut self, notice: RecordingNotice) {
        if !self.state.status_interface {
            return;
        }
        let mut packet = ResponsePacket::status(StatusType::Recording);
        packet
            .add_u32(notice.device)
            .add_u32(u32::from(notice.on))
            .add_string(&notice.name)
            .add_string(&notice.file_name);
        self.send(packet);
    }

    pub(crate) fn relay_osd_message(&mut self, text: &str) {
        if !self.state.status_interface || text.is_empty() {
            return;
        }
        let mut packet = ResponsePacket::status(StatusType::Message);
        packet.add_u32(0).add_string(text);
        self.send(packet);
    }

    pub(crate) fn relay_channel_list_changed(&mut self) {
        if self.data_notices_enabled() {
            self.send(ResponsePacket::status(StatusType::ChannelChange));
        }
    }

    pub(crate) fn relay_recording_list_changed(&mut self) {
        if self.data_notices_enabled() {
            self.send(ResponsePacket::status(StatusType::RecordingsChange));
        }
    }

    pub(crate) fn relay_epg_change(&mut self, notice: EpgNotice) {
        if !self.data_notices_enabled() {
            return;
        }
        if !self.epg.on_change(&notice, Instant::now()) {
            debug!(
                channel = notice.channel_uid,
                attempts = self.epg.attempts(notice.channel_uid),
                "epg change throttled"
            );
            return;
        }
        let mut packet = ResponsePacket::status(StatusType::EpgChange);
        packet.add_u32(notice.channel_uid);
        self.send(packet);
    }

    /// Data of `uid` changed; drop the live stream if it can no longer
    /// follow the channel.
    pub(crate) fn relay_channel_changed(&mut self, uid: ChannelUid) {
        let Session::Live(live) = &mut self.session else {
            return;
        };
        if live.channel_uid != uid {
            return;
        }

        let channel = self.backend.channels.channel(uid);
        if live.stream.retune(channel.as_ref()) == Tuning::Keep {
            return;
        }

        self.session.end();
        info!(channel = uid, "live stream invalidated by channel change");

        if self.state.status_interface
            && self.state.protocol_version >= CHANNEL_CHANGE_MIN_VERSION
        {
            let mut packet = ResponsePacket::status(StatusType::ChannelChange);
            packet.add_u32(uid);
            self.send(packet);
        }
    }

    pub(crate) fn relay_scan(&mut self, update: ScanUpdate) {
        if !self.scan.accepts(&update) {
            debug!(generation = update.generation, "stale scan event dropped");
            return;
        }

        let packet = match update.event {
            ScanEvent::Percentage(percent) => {
                let mut p = ResponsePacket::scan(ScannerType::Percentage);
                p.add_u32(percent);
                p
            }
            ScanEvent::SignalStrength { strength, locked } => {
                let mut p = ResponsePacket::scan(ScannerType::Signal);
                p.add_u32(strength).add_u32(u32::from(locked));
                p
            }
            ScanEvent::DeviceInfo(info) => {
                let mut p = ResponsePacket::scan(ScannerType::Device);
                p.add_string(&info);
                p
            }
            ScanEvent::Transponder(info) => {
                let mut p = ResponsePacket::scan(ScannerType::Transponder);
                p.add_string(&info);
                p
            }
            ScanEvent::NewChannel {
                name,
                radio,
                encrypted,
                hd,
            } => {
                let mut p = ResponsePacket::scan(ScannerType::NewChannel);
                p.add_u32(u32::from(radio))
                    .add_u32(u32::from(encrypted))
                    .add_u32(u32::from(hd))
                    .add_string(&name);
                p
            }
            ScanEvent::Finished => {
                self.scan.deactivate();
                self.ctx.set_inhibit_data_updates(false);
                info!(generation = update.generation, "scan finished");
                ResponsePacket::scan(ScannerType::Finished)
            }
            ScanEvent::Status(status) => {
                let mut p = ResponsePacket::scan(ScannerType::Status);
                p.add_u32(status);
                p
            }
        };
        self.send(packet);
    }

    fn data_notices_enabled(&self) -> bool {
        self.state.status_interface && !self.ctx.data_updates_inhibited()
    }
}
