use tracing::info;
use vnsi_protocol::PacketReader;

use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};

impl Engine {
    /// Open an OSD session, replacing any existing one.
    pub(crate) fn osd_connect(&mut self) -> HandlerResult<()> {
        let provider = self
            .backend
            .osd
            .clone()
            .ok_or(HandlerError::NotSupported)?;

        if let Some(mut old) = self.osd.take() {
            old.close();
        }
        self.osd = Some(provider.open(self.out.clone())?);
        info!("osd connected");
        Ok(())
    }

    pub(crate) fn osd_disconnect(&mut self) -> HandlerResult<()> {
        if let Some(mut osd) = self.osd.take() {
            osd.close();
            info!("osd disconnected");
        }
        Ok(())
    }

    pub(crate) fn osd_hit_key(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let key = args.extract_u32()?;
        let osd = self
            .osd
            .as_mut()
            .ok_or_else(|| HandlerError::precondition("no osd session"))?;
        osd.hit_key(key);
        Ok(())
    }
}
