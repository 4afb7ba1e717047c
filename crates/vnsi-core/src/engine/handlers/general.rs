//! Login, time, setup values and auxiliary sockets.

use chrono::{Local, Offset};
use tracing::info;
use vnsi_protocol::wire_types::{MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};

impl Engine {
    pub(crate) fn login(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let version = args.extract_u32()?;
        let netlog = args.extract_bool()?;
        let client_name = args.extract_string()?;

        if !(MIN_PROTOCOL_VERSION..=PROTOCOL_VERSION).contains(&version) {
            return Err(HandlerError::validation(format!(
                "protocol version {version} not supported"
            )));
        }

        self.state.logged_in = true;
        self.state.protocol_version = version;
        self.state.netlog = netlog;
        self.state.client_name = client_name;

        info!(
            client = %self.state.client_name,
            version,
            "client logged in"
        );

        let (now, gmt_offset) = local_time();
        resp.add_u32(version)
            .add_u32(now)
            .add_s32(gmt_offset)
            .add_string(&self.config.server_name)
            .add_string(&self.config.server_version);
        Ok(())
    }

    pub(crate) fn get_time(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let (now, gmt_offset) = local_time();
        resp.add_u32(now).add_s32(gmt_offset);
        Ok(())
    }

    pub(crate) fn enable_status_interface(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let on = args.extract_bool()?;
        self.state.status_interface = on;
        info!(on, "status interface");
        Ok(())
    }

    pub(crate) fn get_setup(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let name = args.extract_string()?;
        let value = self
            .ctx
            .setup()
            .get(&name)
            .ok_or_else(|| HandlerError::not_found(format!("setup value {name}")))?;
        resp.add_u32(value);
        Ok(())
    }

    pub(crate) fn store_setup(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let name = args.extract_string()?;
        let value = args.extract_u32()?;
        if !self.ctx.setup_mut().store(&name, value) {
            return Err(HandlerError::not_found(format!("setup value {name}")));
        }
        info!(%name, value, "setup value stored");
        Ok(())
    }

    pub(crate) fn get_socket(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let handle = self.ctx.allocate_socket_handle();
        self.state.socket_handle = Some(handle);
        resp.add_u32(handle);
        Ok(())
    }

    pub(crate) fn invalidate_socket(&mut self) -> HandlerResult<()> {
        self.state
            .socket_handle
            .take()
            .map(|_| ())
            .ok_or_else(|| HandlerError::precondition("no auxiliary socket"))
    }
}

/// Unix time and the local offset from UTC in seconds.
fn local_time() -> (u32, i32) {
    let now = Local::now();
    (now.timestamp() as u32, now.offset().fix().local_minus_utc())
}
