//! Recording playback.

use tracing::info;
use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};
use crate::session::RecordingSession;

impl Engine {
    pub(crate) fn recording_open(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let id = args.extract_u32()?;

        self.session.ensure_idle()?;
        let player = self.backend.recordings.open_player(id)?;

        resp.add_u32(player.length_frames())
            .add_u64(player.length_bytes())
            .add_bool(player.is_ts());

        self.session.begin_recording(RecordingSession {
            recording_id: id,
            player,
        })?;
        info!(recording = id, "recording opened");
        Ok(())
    }

    pub(crate) fn recording_close(&mut self) -> HandlerResult<()> {
        if let Some(id) = self.session.playing_recording() {
            self.session.end();
            info!(recording = id, "recording closed");
        }
        Ok(())
    }

    pub(crate) fn recording_get_block(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let position = args.extract_u64()?;
        let amount = args.extract_u32()?;
        let max = self.config.max_block_size;

        let rec = self.session.recording_mut()?;
        if amount == 0 || amount > max {
            return Err(HandlerError::validation(format!(
                "block of {amount} bytes (limit {max})"
            )));
        }
        if position >= rec.player.length_bytes() {
            return Err(HandlerError::not_found(format!("position {position}")));
        }

        let block = rec.player.read_block(position, amount)?;
        resp.add_bytes(&block);
        Ok(())
    }

    pub(crate) fn recording_position_from_frame(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let frame = args.extract_u32()?;
        let rec = self.session.recording_mut()?;
        resp.add_u64(rec.player.position_from_frame(frame));
        Ok(())
    }

    pub(crate) fn recording_frame_from_position(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let position = args.extract_u64()?;
        let rec = self.session.recording_mut()?;
        resp.add_u32(rec.player.frame_from_position(position));
        Ok(())
    }

    pub(crate) fn recording_get_iframe(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let frame = args.extract_u32()?;
        let forward = args.extract_u32()? != 0;

        let rec = self.session.recording_mut()?;
        let iframe = rec
            .player
            .iframe(frame, forward)
            .ok_or_else(|| HandlerError::not_found(format!("iframe near {frame}")))?;

        resp.add_u64(iframe.position)
            .add_u32(iframe.frame)
            .add_u32(iframe.length);
        Ok(())
    }

    pub(crate) fn recording_get_length(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let rec = self.session.recording_mut()?;
        resp.add_u64(rec.player.length_bytes())
            .add_u32(rec.player.length_frames());
        Ok(())
    }
}
