//! Per-connection engine.
//!
//! One `Engine` serves one client connection:
//! - answers client requests (see [`handlers`])
//! - relays backend notifications as status packets (see [`relay`])
//! - owns the connection's stream session, scan relay and OSD session
//!
//! The engine is driven one command at a time through [`Engine::handle`],
//! either by the dispatch task in [`crate::connection`] or directly by
//! tests. It never blocks; everything it produces goes to the outbound
//! channel.

mod handlers;
mod relay;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use vnsi_protocol::{Opcode, PacketReader, ResponsePacket, ReturnCode};

use crate::backend::{Backend, OsdSession};
use crate::command::{Command, Request};
use crate::epg::{EpgThrottle, DEFAULT_EPG_MIN_INTERVAL};
use crate::error::HandlerResult;
use crate::groups::ChannelGroups;
use crate::queue::CommandQueue;
use crate::scan::ScanRelay;
use crate::context::SharedContext;
use crate::session::Session;
use crate::types::{ClientId, OutboundTx};

/// Largest block a client may request from a recording.
pub const DEFAULT_MAX_BLOCK_SIZE: u32 = 512 * 1024;

/// Per-connection knobs, set by the server configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server_name: String,
    pub server_version: String,
    pub epg_min_interval: Duration,
    pub max_block_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            server_name: "VDR-Network-Streaming-Interface (VNSI) Server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            epg_min_interval: DEFAULT_EPG_MIN_INTERVAL,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

/// What the dispatch loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Default)]
pub struct ConnectionState {
    pub logged_in: bool,
    pub protocol_version: u32,
    pub status_interface: bool,
    pub client_addr: String,
    pub client_name: String,
    pub netlog: bool,
    /// Auxiliary socket handle handed out by GETSOCKET.
    pub socket_handle: Option<u32>,
}

pub struct Engine {
    id: ClientId,
    config: EngineConfig,
    ctx: Arc<SharedContext>,
    backend: Backend,
    /// Own queue, for scan observers and close on teardown.
    queue: CommandQueue,
    out: OutboundTx,
    state: ConnectionState,
    session: Session,
    scan: ScanRelay,
    osd: Option<Box<dyn OsdSession>>,
    groups: ChannelGroups,
    epg: EpgThrottle,
    torn_down: bool,
}

impl Engine {
    pub fn new(
        id: ClientId,
        config: EngineConfig,
        ctx: Arc<SharedContext>,
        backend: Backend,
        queue: CommandQueue,
        out: OutboundTx,
    ) -> Self {
        let epg = EpgThrottle::new(config.epg_min_interval);
        Engine {
            id,
            config,
            ctx,
            backend,
            queue,
            out,
            state: ConnectionState::default(),
            session: Session::Idle,
            scan: ScanRelay::new(),
            osd: None,
            groups: ChannelGroups::new(),
            epg,
            torn_down: false,
        }
    }

    pub fn with_client_addr(mut self, addr: impl Into<String>) -> Self {
        self.state.client_addr = addr.into();
        self
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn scan_active(&self) -> bool {
        self.scan.is_active()
    }

    pub fn osd_open(&self) -> bool {
        self.osd.is_some()
    }

    /// Process one command. A panic while handling it is logged and the
    /// connection keeps running.
    pub fn handle(&mut self, cmd: Command) -> Flow {
        let kind = cmd.kind();
        match panic::catch_unwind(AssertUnwindSafe(|| self.route(cmd))) {
            Ok(flow) => flow,
            Err(_) => {
                error!(command = kind, "command handling panicked");
                Flow::Continue
            }
        }
    }

    fn route(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::IncomingRequest(req) => {
                self.process_request(req);
                Flow::Continue
            }
            Command::TransportError(reason) => {
                error!(%reason, "transport error, closing connection");
                Flow::Stop
            }
            Command::Shutdown => Flow::Stop,
            Command::RecordingChanged(notice) => {
                self.relay_recording(notice);
                Flow::Continue
            }
            Command::OsdMessage(text) => {
                self.relay_osd_message(&text);
                Flow::Continue
            }
            Command::ChannelChanged(uid) => {
                self.relay_channel_changed(uid);
                Flow::Continue
            }
            Command::ChannelListChanged => {
                self.relay_channel_list_changed();
                Flow::Continue
            }
            Command::RecordingListChanged => {
                self.relay_recording_list_changed();
                Flow::Continue
            }
            Command::TimerOrSignalChanged => {
                self.relay_timer_change();
                Flow::Continue
            }
            Command::EpgChanged(notice) => {
                self.relay_epg_change(notice);
                Flow::Continue
            }
            Command::Scan(update) => {
                self.relay_scan(update);
                Flow::Continue
            }
        }
    }

    /// Release everything this connection holds. Safe to call twice.
    ///
    /// Order: scan, stream session, OSD, queue.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if self.scan.deactivate() {
            if let Some(scanner) = &self.backend.scanner {
                scanner.stop();
            }
            self.ctx.set_inhibit_data_updates(false);
            info!("scan stopped on teardown");
        }

        if self.session.end() {
            info!("stream session closed on teardown");
        }

        if let Some(mut osd) = self.osd.take() {
            osd.close();
        }

        self.queue.close();
    }

    // -------------------------------------------------------------------------
    // Request processing
    // -------------------------------------------------------------------------

    fn process_request(&mut self, req: Request) {
        let Request {
            opcode,
            request_id,
            payload,
        } = req;

        let Some(op) = Opcode::from_u32(opcode) else {
            warn!(opcode, request_id, "unknown opcode");
            self.send(ResponsePacket::response(request_id, ReturnCode::NotSupported));
            return;
        };

        if !self.state.logged_in && !op.allowed_before_login() {
            warn!(?op, request_id, "request before login");
            self.send(ResponsePacket::response(
                request_id,
                ReturnCode::PreconditionFailed,
            ));
            return;
        }

        debug!(?op, request_id, len = payload.len(), "request");

        let mut args = PacketReader::new(payload);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch(op, request_id, &mut args)
        }));

        match outcome {
            Ok(Ok(Some(resp))) => self.send(resp),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => {
                warn!(?op, request_id, error = %err, "request failed");
                self.send(ResponsePacket::response(request_id, err.return_code()));
            }
            Err(_) => {
                error!(?op, request_id, "handler panicked");
                self.send(ResponsePacket::response(request_id, ReturnCode::Error));
            }
        }
    }

    /// Route `op` to its handler. `Ok(None)` means no direct response.
    fn dispatch(
        &mut self,
        op: Opcode,
        request_id: u32,
        args: &mut PacketReader,
    ) -> HandlerResult<Option<ResponsePacket>> {
        let mut resp = ResponsePacket::response(request_id, ReturnCode::Ok);
        let r = &mut resp;

        match op {
            Opcode::Login => self.login(args, r)?,
            Opcode::GetTime => self.get_time(r)?,
            Opcode::EnableStatusInterface => {
                self.enable_status_interface(args)?;
                return Ok(None);
            }
            Opcode::Ping => {}
            Opcode::GetSetup => self.get_setup(args, r)?,
            Opcode::StoreSetup => self.store_setup(args)?,
            Opcode::GetSocket => self.get_socket(r)?,
            Opcode::InvalidateSocket => self.invalidate_socket()?,

            Opcode::ChannelStreamOpen => self.live_open(args, r)?,
            Opcode::ChannelStreamClose => self.live_close()?,
            Opcode::ChannelStreamSeek => self.live_seek(args, r)?,
            Opcode::ChannelStreamStatusSocket => self.live_status_socket(r)?,
            Opcode::ChannelStreamStatusRequest => self.live_status_request()?,

            Opcode::RecStreamOpen => self.recording_open(args, r)?,
            Opcode::RecStreamClose => self.recording_close()?,
            Opcode::RecStreamGetBlock => self.recording_get_block(args, r)?,
            Opcode::RecStreamPositionFromFrame => self.recording_position_from_frame(args, r)?,
            Opcode::RecStreamFrameFromPosition => self.recording_frame_from_position(args, r)?,
            Opcode::RecStreamGetIFrame => self.recording_get_iframe(args, r)?,
            Opcode::RecStreamGetLength => self.recording_get_length(r)?,

            Opcode::ChannelsGetCount => self.channels_count(r)?,
            Opcode::ChannelsGetChannels => self.channels_list(args, r)?,
            Opcode::ChannelGroupGetCount => self.group_count(args, r)?,
            Opcode::ChannelGroupList => self.group_list(args, r)?,
            Opcode::ChannelGroupMembers => self.group_members(args, r)?,
            Opcode::ChannelsGetCaids => self.channel_caids(args, r)?,
            Opcode::ChannelsGetWhitelist => self.get_whitelist(args, r)?,
            Opcode::ChannelsGetBlacklist => self.get_blacklist(args, r)?,
            Opcode::ChannelsSetWhitelist => self.set_whitelist(args)?,
            Opcode::ChannelsSetBlacklist => self.set_blacklist(args)?,

            Opcode::TimerGetCount => self.timer_count(r)?,
            Opcode::TimerGet => self.timer_get(args, r)?,
            Opcode::TimerGetList => self.timer_list(r)?,
            Opcode::TimerAdd => self.timer_add(args)?,
            Opcode::TimerDelete => self.timer_delete(args)?,
            Opcode::TimerUpdate => self.timer_update(args)?,
            Opcode::TimerGetTypes => self.timer_types(r)?,

            Opcode::RecordingsDiskSize => self.disk_size(r)?,
            Opcode::RecordingsGetCount => self.recordings_count(r)?,
            Opcode::RecordingsGetList => self.recordings_list(r)?,
            Opcode::RecordingsRename => self.recording_rename(args)?,
            Opcode::RecordingsDelete => self.recording_delete(args)?,
            Opcode::RecordingsMove => self.recording_move(args)?,
            Opcode::RecordingsGetEdl => self.recording_edl(args, r)?,
            Opcode::RecordingsGetInfo => self.recording_info(args, r)?,

            Opcode::EpgGetForChannel => self.epg_for_channel(args, r)?,

            Opcode::ScanSupported => self.scan_supported()?,
            Opcode::ScanGetCountries => self.scan_countries(r)?,
            Opcode::ScanGetSatellites => self.scan_satellites(r)?,
            Opcode::ScanStart => self.scan_start(args)?,
            Opcode::ScanStop => self.scan_stop()?,
            Opcode::ScanSupportedTypes => self.scan_supported_types(r)?,

            Opcode::OsdConnect => self.osd_connect()?,
            Opcode::OsdDisconnect => self.osd_disconnect()?,
            Opcode::OsdHitKey => self.osd_hit_key(args)?,

            Opcode::DeletedSupported => {}
            Opcode::DeletedGetCount => self.deleted_count(r)?,
            Opcode::DeletedGetList => self.deleted_list(r)?,
            Opcode::DeletedDelete => self.deleted_purge(args)?,
            Opcode::DeletedUndelete => self.deleted_undelete(args)?,
            Opcode::DeletedDeleteAll => self.deleted_purge_all()?,
        }

        Ok(Some(resp))
    }

    fn send(&self, packet: ResponsePacket) {
        if self.out.send(packet).is_err() {
            debug!("outbound channel closed, dropping packet");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests;
