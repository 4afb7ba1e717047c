use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};

impl Engine {
    /// Events of one channel in a time window. Marks the newest start as
    /// delivered so older change notices stop reaching this client.
    pub(crate) fn epg_for_channel(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let uid = args.extract_u32()?;
        let start = args.extract_u32()?;
        let duration = args.extract_u32()?;

        let events = self
            .backend
            .epg
            .events(uid, start, duration)
            .ok_or_else(|| HandlerError::not_found(format!("channel {uid}")))?;

        for event in &events {
            resp.add_u32(event.id)
                .add_u32(event.start)
                .add_u32(event.duration)
                .add_u32(event.genre)
                .add_u32(event.parental_rating)
                .add_string(&event.title)
                .add_string(&event.short_text)
                .add_string(&event.description);
        }

        if let Some(newest) = events.iter().map(|e| e.start).max() {
            self.epg.on_fetch(uid, newest);
        }
        Ok(())
    }
}
