//! Channel list, channel groups and the provider filter.

use tracing::info;
use vnsi_protocol::wire_types::PICON_MIN_VERSION;
use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};
use crate::filter::ProviderEntry;

impl Engine {
    pub(crate) fn channels_count(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let channels = self.backend.channels.channels();
        let filter = self.ctx.channel_filter();
        let count = channels.iter().filter(|c| filter.passes(c)).count();
        resp.add_u32(count as u32);
        Ok(())
    }

    pub(crate) fn channels_list(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let radio = args.extract_u32()? != 0;
        let apply_filter = args.extract_bool()?;
        let with_picon = self.state.protocol_version >= PICON_MIN_VERSION;

        let channels = self.backend.channels.channels();
        let filter = self.ctx.channel_filter();

        for channel in channels
            .iter()
            .filter(|c| c.is_radio() == radio)
            .filter(|c| !apply_filter || filter.passes(c))
        {
            resp.add_u32(channel.number)
                .add_string(&channel.name)
                .add_string(&channel.provider)
                .add_u32(channel.uid)
                .add_u32(channel.first_caid())
                .add_bool(channel.is_encrypted())
                .add_string(&channel.caids_csv());
            if with_picon {
                resp.add_string(&channel.picon_ref());
            }
        }
        Ok(())
    }

    pub(crate) fn group_count(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let automatic = args.extract_u32()? != 0;
        let channels = self.backend.channels.channels();
        self.groups.rebuild(&channels, automatic);
        resp.add_u32(self.groups.count() as u32);
        Ok(())
    }

    pub(crate) fn group_list(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let radio = args.extract_bool()?;
        for group in self.groups.list(radio) {
            resp.add_string(&group.name).add_bool(group.radio);
        }
        Ok(())
    }

    pub(crate) fn group_members(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let name = args.extract_string()?;
        let radio = args.extract_bool()?;
        let apply_filter = args.extract_bool()?;

        let channels = self.backend.channels.channels();
        let members = self
            .groups
            .members(&name, radio, &channels)
            .ok_or_else(|| HandlerError::not_found(format!("channel group {name}")))?;

        let filter = self.ctx.channel_filter();
        for channel in members
            .into_iter()
            .filter(|c| !apply_filter || filter.passes(c))
        {
            resp.add_u32(channel.uid).add_u32(channel.number);
        }
        Ok(())
    }

    pub(crate) fn channel_caids(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let uid = args.extract_u32()?;
        let channel = self
            .backend
            .channels
            .channel(uid)
            .ok_or_else(|| HandlerError::not_found(format!("channel {uid}")))?;
        for caid in &channel.caids {
            resp.add_u32(*caid);
        }
        Ok(())
    }

    pub(crate) fn get_whitelist(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let radio = args.extract_bool()?;
        let filter = self.ctx.channel_filter();
        for entry in filter.whitelist(radio) {
            resp.add_string(&entry.name).add_u32(entry.caid);
        }
        Ok(())
    }

    pub(crate) fn get_blacklist(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let radio = args.extract_bool()?;
        let filter = self.ctx.channel_filter();
        for uid in filter.blacklist(radio) {
            resp.add_u32(uid);
        }
        Ok(())
    }

    pub(crate) fn set_whitelist(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let radio = args.extract_bool()?;
        let mut entries = Vec::new();
        while !args.is_exhausted() {
            let name = args.extract_string()?;
            let caid = args.extract_u32()?;
            entries.push(ProviderEntry { name, caid });
        }

        info!(radio, entries = entries.len(), "provider whitelist replaced");
        self.ctx.channel_filter_mut().set_whitelist(radio, entries);
        Ok(())
    }

    pub(crate) fn set_blacklist(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let radio = args.extract_bool()?;
        let mut uids = Vec::new();
        while !args.is_exhausted() {
            uids.push(args.extract_u32()?);
        }

        info!(radio, entries = uids.len(), "channel blacklist replaced");
        self.ctx.channel_filter_mut().set_blacklist(radio, uids);
        Ok(())
    }
}
