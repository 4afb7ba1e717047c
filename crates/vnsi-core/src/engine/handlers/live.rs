//! Live channel streaming.

use std::time::Duration;

use tracing::info;
use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::backend::LiveRequest;
use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};
use crate::session::LiveSession;

const MAX_PRIORITY: i32 = 99;
const MAX_TIMEOUT_SECS: u32 = 3600;

impl Engine {
    pub(crate) fn live_open(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let uid = args.extract_u32()?;
        let priority = args.extract_s32()?;
        let timeshift = args.extract_bool()?;
        let timeout = args.extract_u32()?;

        self.session.ensure_idle()?;

        if !(-MAX_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(HandlerError::validation(format!("priority {priority}")));
        }
        if timeout > MAX_TIMEOUT_SECS {
            return Err(HandlerError::validation(format!("timeout {timeout}s")));
        }

        let channel = self
            .backend
            .channels
            .channel(uid)
            .ok_or_else(|| HandlerError::not_found(format!("channel {uid}")))?;
        let name = channel.name.clone();

        let stream = self.backend.devices.open_live(
            LiveRequest {
                channel,
                priority,
                timeshift,
                timeout: Duration::from_secs(u64::from(timeout)),
            },
            self.out.clone(),
        )?;
        let timeshift_active = stream.timeshift_active();

        self.session.begin_live(LiveSession {
            channel_uid: uid,
            stream,
        })?;
        info!(channel = uid, %name, priority, timeshift_active, "live stream opened");

        resp.add_u32(uid).add_bool(timeshift_active).add_string(&name);
        Ok(())
    }

    pub(crate) fn live_close(&mut self) -> HandlerResult<()> {
        if let Some(uid) = self.session.live_channel() {
            self.session.end();
            info!(channel = uid, "live stream closed");
        }
        Ok(())
    }

    pub(crate) fn live_seek(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let time_ms = args.extract_s64()?;
        let live = self.session.live_mut()?;
        let serial = live.stream.seek(time_ms)?;
        resp.add_u32(serial);
        Ok(())
    }

    pub(crate) fn live_status_socket(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let status = self.session.live_mut()?.stream.status();
        resp.add_u32(status.channel_uid)
            .add_bool(status.timeshift)
            .add_s64(status.buffer_start)
            .add_s64(status.buffer_end);
        Ok(())
    }

    pub(crate) fn live_status_request(&mut self) -> HandlerResult<()> {
        self.session.live_mut()?.stream.request_signal_info();
        Ok(())
    }
}
