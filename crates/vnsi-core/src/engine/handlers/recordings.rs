//! Recordings and the deleted-recordings set.

use tracing::info;
use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};
use crate::recording::Recording;

impl Engine {
    pub(crate) fn disk_size(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let disk = self.backend.recordings.disk_space()?;
        resp.add_u32(disk.total_mb)
            .add_u32(disk.free_mb)
            .add_u32(disk.percent_used());
        Ok(())
    }

    pub(crate) fn recordings_count(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        resp.add_u32(self.backend.recordings.recordings().len() as u32);
        Ok(())
    }

    pub(crate) fn recordings_list(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        for rec in &self.backend.recordings.recordings() {
            write_recording(resp, rec);
        }
        Ok(())
    }

    pub(crate) fn recording_info(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let id = args.extract_u32()?;
        let rec = self
            .backend
            .recordings
            .recording(id)
            .ok_or_else(|| HandlerError::not_found(format!("recording {id}")))?;
        write_recording(resp, &rec);
        Ok(())
    }

    pub(crate) fn recording_rename(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let id = args.extract_u32()?;
        let name = args.extract_string()?;
        self.backend.recordings.rename(id, &name)?;
        info!(recording = id, %name, "recording renamed");
        Ok(())
    }

    pub(crate) fn recording_move(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let id = args.extract_u32()?;
        let folder = args.extract_string()?;
        self.backend.recordings.move_to(id, &folder)?;
        info!(recording = id, %folder, "recording moved");
        Ok(())
    }

    pub(crate) fn recording_delete(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let id = args.extract_u32()?;

        if self.backend.recordings.recording(id).is_none() {
            return Err(HandlerError::not_found(format!("recording {id}")));
        }
        if self.backend.recordings.is_recording(id) {
            return Err(HandlerError::Busy(format!("recording {id} is running")));
        }
        if self.session.playing_recording() == Some(id) {
            return Err(HandlerError::Policy(format!("recording {id} is being played")));
        }

        self.backend.recordings.delete(id)?;
        info!(recording = id, "recording deleted");
        Ok(())
    }

    pub(crate) fn recording_edl(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let id = args.extract_u32()?;
        for mark in self.backend.recordings.edl(id)? {
            resp.add_s64(mark.start_ms)
                .add_s64(mark.end_ms)
                .add_s32(mark.kind);
        }
        Ok(())
    }

    pub(crate) fn deleted_count(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        resp.add_u32(self.backend.recordings.deleted().len() as u32);
        Ok(())
    }

    pub(crate) fn deleted_list(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        for rec in &self.backend.recordings.deleted() {
            write_recording(resp, rec);
        }
        Ok(())
    }

    pub(crate) fn deleted_purge(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let id = args.extract_u32()?;
        self.backend.recordings.purge(id)?;
        info!(recording = id, "deleted recording purged");
        Ok(())
    }

    pub(crate) fn deleted_undelete(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let id = args.extract_u32()?;

        if !self.backend.recordings.deleted().iter().any(|r| r.id == id) {
            return Err(HandlerError::not_found(format!("deleted recording {id}")));
        }

        self.backend.recordings.undelete(id)?;
        info!(recording = id, "recording restored");
        Ok(())
    }

    pub(crate) fn deleted_purge_all(&mut self) -> HandlerResult<()> {
        let purged = self.backend.recordings.purge_all()?;
        info!(purged, "deleted recordings purged");
        Ok(())
    }
}

fn write_recording(resp: &mut ResponsePacket, rec: &Recording) {
    resp.add_u32(rec.id)
        .add_u32(rec.start as u32)
        .add_u32(rec.duration)
        .add_s32(rec.priority)
        .add_s32(rec.lifetime)
        .add_string(&rec.channel_name)
        .add_string(&rec.title)
        .add_string(&rec.short_text)
        .add_string(&rec.description)
        .add_string(&rec.directory)
        .add_u64(rec.size_bytes)
        .add_bool(rec.is_new);
}
