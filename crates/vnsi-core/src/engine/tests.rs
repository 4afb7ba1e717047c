use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use vnsi_protocol::{Channel as WireChannel, Opcode, PacketReader, ResponsePacket, ReturnCode};

use super::*;
use crate::backend::memory::{MemoryBackend, FRAME_BYTES};
use crate::backend::{ChannelSource, EpgSource};
use crate::channel::Channel;
use crate::epg::{EpgEvent, EpgNotice};
use crate::queue::{command_queue, CommandReceiver};
use crate::recording::{EdlMark, RecordingNotice};
use crate::timer::TIMER_FLAG_RECORDING;
use crate::types::{outbound_channel, ChannelUid, OutboundRx};

#[derive(Default)]
struct Args(BytesMut);

impl Args {
    fn u8(mut self, v: u8) -> Self {
        self.0.put_u8(v);
        self
    }

    fn u32(mut self, v: u32) -> Self {
        self.0.put_u32(v);
        self
    }

    fn s32(mut self, v: i32) -> Self {
        self.0.put_i32(v);
        self
    }

    fn u64(mut self, v: u64) -> Self {
        self.0.put_u64(v);
        self
    }

    fn str(mut self, v: &str) -> Self {
        self.0.put_slice(v.as_bytes());
        self.0.put_u8(0);
        self
    }

    fn bytes(mut self, v: Bytes) -> Self {
        self.0.put_slice(&v);
        self
    }

    fn done(self) -> Bytes {
        self.0.freeze()
    }
}

fn none() -> Bytes {
    Bytes::new()
}

struct Harness {
    engine: Engine,
    out: OutboundRx,
    rx: CommandReceiver,
    backend: Arc<MemoryBackend>,
    ctx: Arc<SharedContext>,
    /// Non-response packets seen while waiting for responses.
    other: Vec<ResponsePacket>,
    next_request_id: u32,
}

fn harness() -> Harness {
    harness_with(MemoryBackend::with_demo_data(), Arc::new(SharedContext::new()))
}

fn harness_with(backend: Arc<MemoryBackend>, ctx: Arc<SharedContext>) -> Harness {
    harness_from(backend.backend(), backend, ctx)
}

fn harness_from(parts: Backend, backend: Arc<MemoryBackend>, ctx: Arc<SharedContext>) -> Harness {
    let (queue, rx) = command_queue();
    let (tx, out) = outbound_channel();
    let engine = Engine::new(
        ClientId(1),
        EngineConfig::default(),
        Arc::clone(&ctx),
        parts,
        queue,
        tx,
    );
    Harness {
        engine,
        out,
        rx,
        backend,
        ctx,
        other: Vec::new(),
        next_request_id: 0,
    }
}

impl Harness {
    /// Send a request and return its response status and fields.
    fn call(&mut self, op: Opcode, payload: Bytes) -> (ReturnCode, PacketReader) {
        let id = self.send(op as u32, payload);
        self.response_for(id)
            .unwrap_or_else(|| panic!("no response to {op:?}"))
    }

    fn code(&mut self, op: Opcode, payload: Bytes) -> ReturnCode {
        self.call(op, payload).0
    }

    fn send(&mut self, opcode: u32, payload: Bytes) -> u32 {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let flow = self.engine.handle(Command::IncomingRequest(Request {
            opcode,
            request_id,
            payload,
        }));
        assert_eq!(flow, Flow::Continue);
        request_id
    }

    fn response_for(&mut self, request_id: u32) -> Option<(ReturnCode, PacketReader)> {
        while let Ok(packet) = self.out.try_recv() {
            if packet.channel() == WireChannel::RequestResponse && packet.id() == request_id {
                let mut reader = PacketReader::new(Bytes::copy_from_slice(packet.payload()));
                let code = ReturnCode::from_u32(reader.extract_u32().unwrap()).unwrap();
                return Some((code, reader));
            }
            self.other.push(packet);
        }
        None
    }

    /// Packets on `channel` produced so far, oldest first.
    fn take_packets(&mut self, channel: WireChannel) -> Vec<ResponsePacket> {
        while let Ok(packet) = self.out.try_recv() {
            self.other.push(packet);
        }
        let (matching, rest) = std::mem::take(&mut self.other)
            .into_iter()
            .partition(|p| p.channel() == channel);
        self.other = rest;
        matching
    }

    fn login(&mut self, version: u32) {
        let args = Args::default().u32(version).u8(0).str("test-client").done();
        assert_eq!(self.code(Opcode::Login, args), ReturnCode::Ok);
    }

    fn enable_status(&mut self) {
        let id = self.send(
            Opcode::EnableStatusInterface as u32,
            Args::default().u8(1).done(),
        );
        assert!(self.response_for(id).is_none());
    }

    /// Run every command the backend queued for this connection.
    fn pump(&mut self) {
        while let Some(cmd) = self.rx.try_dequeue() {
            self.engine.handle(cmd);
        }
    }
}

fn live_args(uid: ChannelUid, priority: i32) -> Bytes {
    Args::default().u32(uid).s32(priority).u8(0).u32(10).done()
}

fn scan_args() -> Bytes {
    let mut args = Args::default().u32(4);
    for _ in 0..5 {
        args = args.u8(1);
    }
    for _ in 0..6 {
        args = args.u32(0);
    }
    args.done()
}

fn timer_args(channel: ChannelUid, start: u32, stop: u32, flags: u32) -> Args {
    Args::default()
        .u32(1)
        .u32(flags)
        .s32(50)
        .s32(99)
        .u32(channel)
        .u32(start)
        .u32(stop)
        .u32(0)
        .str("Match")
        .str("")
}

// -----------------------------------------------------------------------------
// Session and login
// -----------------------------------------------------------------------------

#[test]
fn domain_requests_need_login() {
    let mut h = harness();

    assert_eq!(
        h.code(Opcode::ChannelsGetCount, none()),
        ReturnCode::PreconditionFailed
    );
    assert_eq!(h.code(Opcode::Ping, none()), ReturnCode::Ok);

    let args = Args::default().u32(2).u8(0).str("kodi").done();
    let (code, mut fields) = h.call(Opcode::Login, args);
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 2);
    fields.extract_u32().unwrap();
    fields.extract_s32().unwrap();
    assert_eq!(
        fields.extract_string().unwrap(),
        EngineConfig::default().server_name
    );
    fields.extract_string().unwrap();
    assert!(fields.is_exhausted());

    assert!(h.engine.state().logged_in);
    assert_eq!(h.engine.state().client_name, "kodi");

    let (code, mut fields) = h.call(Opcode::ChannelsGetCount, none());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 4);
}

#[test]
fn unsupported_protocol_version_stays_logged_out() {
    let mut h = harness();
    let args = Args::default().u32(13).u8(0).str("future").done();
    assert_eq!(h.code(Opcode::Login, args), ReturnCode::DataInvalid);
    assert!(!h.engine.state().logged_in);
}

#[test]
fn truncated_arguments_are_invalid() {
    let mut h = harness();
    let args = Args::default().u32(5).done();
    assert_eq!(h.code(Opcode::Login, args), ReturnCode::DataInvalid);
}

#[test]
fn unknown_opcode_is_answered() {
    let mut h = harness();
    h.login(12);
    let id = h.send(4242, none());
    let (code, _) = h.response_for(id).unwrap();
    assert_eq!(code, ReturnCode::NotSupported);
}

#[test]
fn correlation_ids_are_echoed_in_order() {
    let mut h = harness();
    h.login(12);

    let ids: Vec<u32> = (0..5).map(|_| h.send(Opcode::Ping as u32, none())).collect();
    let seen: Vec<u32> = std::iter::from_fn(|| h.out.try_recv().ok())
        .map(|p| p.id())
        .collect();
    assert_eq!(seen, ids);
}

#[test]
fn setup_values_are_shared() {
    let mut h = harness();
    h.login(12);

    let store = Args::default().str("Timeshift").u32(1).done();
    assert_eq!(h.code(Opcode::StoreSetup, store), ReturnCode::Ok);
    assert_eq!(h.ctx.setup().get("Timeshift"), Some(1));

    let (code, mut fields) = h.call(Opcode::GetSetup, Args::default().str("Timeshift").done());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 1);

    let bogus = Args::default().str("Bogus").done();
    assert_eq!(h.code(Opcode::GetSetup, bogus), ReturnCode::DataUnknown);
}

#[test]
fn auxiliary_socket_handles() {
    let mut h = harness();
    h.login(12);

    assert_eq!(
        h.code(Opcode::InvalidateSocket, none()),
        ReturnCode::PreconditionFailed
    );
    let (code, mut fields) = h.call(Opcode::GetSocket, none());
    assert_eq!(code, ReturnCode::Ok);
    assert_ne!(fields.extract_u32().unwrap(), 0);
    assert_eq!(h.code(Opcode::InvalidateSocket, none()), ReturnCode::Ok);
}

// -----------------------------------------------------------------------------
// Streams
// -----------------------------------------------------------------------------

#[test]
fn live_open_reports_channel() {
    let mut h = harness();
    h.login(12);

    let (code, mut fields) = h.call(Opcode::ChannelStreamOpen, live_args(1, 0));
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 1);
    assert!(!fields.extract_bool().unwrap());
    assert_eq!(fields.extract_string().unwrap(), "Das Erste HD");

    assert_eq!(h.engine.session().live_channel(), Some(1));
    assert_eq!(h.backend.live_streams(), 1);

    assert_eq!(
        h.code(Opcode::ChannelStreamStatusRequest, none()),
        ReturnCode::Ok
    );
    assert_eq!(h.take_packets(WireChannel::Stream).len(), 2);

    assert_eq!(h.code(Opcode::ChannelStreamClose, none()), ReturnCode::Ok);
    assert!(h.engine.session().is_idle());
    assert_eq!(h.backend.live_streams(), 0);
}

#[test]
fn live_open_validates_before_tuning() {
    let mut h = harness();
    h.login(12);

    assert_eq!(
        h.code(Opcode::ChannelStreamOpen, live_args(1, 100)),
        ReturnCode::DataInvalid
    );
    assert_eq!(
        h.code(Opcode::ChannelStreamOpen, live_args(77, 0)),
        ReturnCode::DataUnknown
    );

    h.backend.set_devices_busy(true);
    assert_eq!(
        h.code(Opcode::ChannelStreamOpen, live_args(1, 0)),
        ReturnCode::RecRunning
    );
    h.backend.set_devices_busy(false);
    h.backend.set_device_failure(true);
    assert_eq!(
        h.code(Opcode::ChannelStreamOpen, live_args(1, 0)),
        ReturnCode::Error
    );

    assert!(h.engine.session().is_idle());
    assert_eq!(h.backend.live_streams(), 0);
}

#[test]
fn live_open_while_playing_recording_is_rejected() {
    let mut h = harness();
    h.login(12);

    let (code, mut fields) = h.call(Opcode::RecStreamOpen, Args::default().u32(1).done());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 5000);
    assert_eq!(fields.extract_u64().unwrap(), FRAME_BYTES * 5000);
    assert!(fields.extract_bool().unwrap());

    assert_eq!(
        h.code(Opcode::ChannelStreamOpen, live_args(1, 0)),
        ReturnCode::PreconditionFailed
    );
    assert_eq!(h.engine.session().playing_recording(), Some(1));
    assert_eq!(h.backend.open_players(), 1);
    assert_eq!(h.backend.live_streams(), 0);
}

#[test]
fn second_live_open_is_rejected() {
    let mut h = harness();
    h.login(12);

    assert_eq!(h.code(Opcode::ChannelStreamOpen, live_args(1, 0)), ReturnCode::Ok);
    assert_eq!(
        h.code(Opcode::ChannelStreamOpen, live_args(2, 0)),
        ReturnCode::PreconditionFailed
    );
    assert_eq!(h.engine.session().live_channel(), Some(1));
}

#[test]
fn stream_ops_need_a_stream() {
    let mut h = harness();
    h.login(12);

    assert_eq!(
        h.code(Opcode::ChannelStreamStatusSocket, none()),
        ReturnCode::PreconditionFailed
    );
    assert_eq!(
        h.code(Opcode::RecStreamGetLength, none()),
        ReturnCode::PreconditionFailed
    );
    assert_eq!(h.code(Opcode::ChannelStreamClose, none()), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::RecStreamClose, none()), ReturnCode::Ok);
}

#[test]
fn recording_blocks_are_bounded() {
    let mut h = harness();
    h.login(12);
    assert_eq!(
        h.code(Opcode::RecStreamOpen, Args::default().u32(1).done()),
        ReturnCode::Ok
    );

    let block = |pos: u64, amount: u32| Args::default().u64(pos).u32(amount).done();

    assert_eq!(h.code(Opcode::RecStreamGetBlock, block(0, 0)), ReturnCode::DataInvalid);
    assert_eq!(
        h.code(Opcode::RecStreamGetBlock, block(0, 512 * 1024 + 1)),
        ReturnCode::DataInvalid
    );
    assert_eq!(
        h.code(Opcode::RecStreamGetBlock, block(FRAME_BYTES * 5000, 10)),
        ReturnCode::DataUnknown
    );

    let (code, fields) = h.call(Opcode::RecStreamGetBlock, block(0, 1000));
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.remaining(), 1000);

    let (code, mut fields) = h.call(
        Opcode::RecStreamGetIFrame,
        Args::default().u32(13).u32(1).done(),
    );
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u64().unwrap(), 24 * FRAME_BYTES);
    assert_eq!(fields.extract_u32().unwrap(), 24);
}

// -----------------------------------------------------------------------------
// Channels
// -----------------------------------------------------------------------------

fn skip_channel_entry(fields: &mut PacketReader, with_picon: bool) -> u32 {
    fields.extract_u32().unwrap();
    fields.extract_string().unwrap();
    fields.extract_string().unwrap();
    let uid = fields.extract_u32().unwrap();
    fields.extract_u32().unwrap();
    fields.extract_bool().unwrap();
    fields.extract_string().unwrap();
    if with_picon {
        assert!(fields.extract_string().unwrap().starts_with("1_0_"));
    }
    uid
}

#[test]
fn picon_refs_depend_on_protocol_version() {
    for (version, with_picon) in [(8, false), (9, true)] {
        let mut h = harness();
        h.login(version);

        let args = Args::default().u32(0).u8(0).done();
        let (code, mut fields) = h.call(Opcode::ChannelsGetChannels, args);
        assert_eq!(code, ReturnCode::Ok);

        let uids: Vec<u32> = (0..3)
            .map(|_| skip_channel_entry(&mut fields, with_picon))
            .collect();
        assert_eq!(uids, vec![1, 2, 4]);
        assert!(fields.is_exhausted());
    }
}

#[test]
fn whitelist_restricts_filtered_lists() {
    let mut h = harness();
    h.login(12);

    let whitelist = Args::default().u8(0).str("ARD").u32(0).done();
    assert_eq!(h.code(Opcode::ChannelsSetWhitelist, whitelist), ReturnCode::Ok);

    let (_, mut fields) = h.call(Opcode::ChannelsGetWhitelist, Args::default().u8(0).done());
    assert_eq!(fields.extract_string().unwrap(), "ARD");
    assert_eq!(fields.extract_u32().unwrap(), 0);
    assert!(fields.is_exhausted());

    let (_, mut fields) = h.call(
        Opcode::ChannelsGetChannels,
        Args::default().u32(0).u8(1).done(),
    );
    assert_eq!(skip_channel_entry(&mut fields, true), 1);
    assert!(fields.is_exhausted());

    // radio list is unaffected
    let (_, mut fields) = h.call(Opcode::ChannelsGetCount, none());
    assert_eq!(fields.extract_u32().unwrap(), 2);
}

#[test]
fn channel_groups() {
    let mut h = harness();
    h.login(12);

    let (code, mut fields) = h.call(Opcode::ChannelGroupGetCount, Args::default().u32(0).done());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 3);

    let (_, mut fields) = h.call(Opcode::ChannelGroupList, Args::default().u8(0).done());
    assert_eq!(fields.extract_string().unwrap(), "Pay TV");
    assert!(!fields.extract_bool().unwrap());
    assert_eq!(fields.extract_string().unwrap(), "Public");

    let members = Args::default().str("Public").u8(0).u8(0).done();
    let (_, mut fields) = h.call(Opcode::ChannelGroupMembers, members);
    assert_eq!(fields.extract_u32().unwrap(), 1);
    assert_eq!(fields.extract_u32().unwrap(), 1);
    assert_eq!(fields.extract_u32().unwrap(), 2);

    let unknown = Args::default().str("Nope").u8(0).u8(0).done();
    assert_eq!(h.code(Opcode::ChannelGroupMembers, unknown), ReturnCode::DataUnknown);

    let (_, mut fields) = h.call(Opcode::ChannelsGetCaids, Args::default().u32(4).done());
    assert_eq!(fields.extract_u32().unwrap(), 0x1702);
    assert_eq!(fields.extract_u32().unwrap(), 0x098C);
}

// -----------------------------------------------------------------------------
// Timers and recordings
// -----------------------------------------------------------------------------

#[test]
fn timer_add_validates() {
    let mut h = harness();
    h.login(12);

    let bad_channel = timer_args(99, 100, 200, 1).done();
    assert_eq!(h.code(Opcode::TimerAdd, bad_channel), ReturnCode::DataInvalid);
    let backwards = timer_args(1, 200, 100, 1).done();
    assert_eq!(h.code(Opcode::TimerAdd, backwards), ReturnCode::DataInvalid);

    assert_eq!(
        h.code(Opcode::TimerAdd, timer_args(2, 100, 200, 1).done()),
        ReturnCode::Ok
    );
    let (_, mut fields) = h.call(Opcode::TimerGetCount, none());
    assert_eq!(fields.extract_u32().unwrap(), 2);

    let (code, mut fields) = h.call(Opcode::TimerGet, Args::default().u32(2).done());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 2);
    assert_eq!(fields.extract_u32().unwrap(), 1);
}

#[test]
fn recording_timers_need_force_to_delete() {
    let mut h = harness();
    h.login(12);

    let update = Args::default()
        .u32(1)
        .bytes(timer_args(1, 100, 200, TIMER_FLAG_RECORDING).done())
        .done();
    assert_eq!(h.code(Opcode::TimerUpdate, update), ReturnCode::Ok);

    let delete = |force: u32| Args::default().u32(1).u32(force).done();
    assert_eq!(h.code(Opcode::TimerDelete, delete(0)), ReturnCode::RecRunning);
    assert_eq!(h.code(Opcode::TimerDelete, delete(1)), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::TimerDelete, delete(1)), ReturnCode::DataUnknown);
}

#[test]
fn delete_then_undelete_restores_metadata() {
    let mut h = harness();
    h.login(12);

    let id = || Args::default().u32(1).done();
    let (_, before) = h.call(Opcode::RecordingsGetInfo, id());

    assert_eq!(h.code(Opcode::RecordingsDelete, id()), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::RecordingsGetInfo, id()), ReturnCode::DataUnknown);
    let (_, mut fields) = h.call(Opcode::DeletedGetCount, none());
    assert_eq!(fields.extract_u32().unwrap(), 1);

    assert_eq!(h.code(Opcode::DeletedUndelete, id()), ReturnCode::Ok);
    let (_, after) = h.call(Opcode::RecordingsGetInfo, id());
    assert_eq!(before.remaining(), after.remaining());

    let mut before = before;
    let mut after = after;
    let len = before.remaining();
    assert_eq!(
        before.extract_bytes(len).unwrap(),
        after.extract_bytes(len).unwrap()
    );

    assert_eq!(h.code(Opcode::DeletedUndelete, id()), ReturnCode::DataUnknown);
}

#[test]
fn busy_recordings_are_not_deleted() {
    let mut h = harness();
    h.login(12);

    h.backend.set_recording_in_progress(2, true);
    assert_eq!(
        h.code(Opcode::RecordingsDelete, Args::default().u32(2).done()),
        ReturnCode::RecRunning
    );

    assert_eq!(
        h.code(Opcode::RecStreamOpen, Args::default().u32(1).done()),
        ReturnCode::Ok
    );
    assert_eq!(
        h.code(Opcode::RecordingsDelete, Args::default().u32(1).done()),
        ReturnCode::DataLocked
    );
    assert_eq!(
        h.code(Opcode::RecordingsDelete, Args::default().u32(9).done()),
        ReturnCode::DataUnknown
    );
}

/// Title and directory of a `RecordingsGetInfo` response.
fn title_and_directory(fields: &mut PacketReader) -> (String, String) {
    for _ in 0..5 {
        fields.extract_u32().unwrap();
    }
    fields.extract_string().unwrap();
    let title = fields.extract_string().unwrap();
    fields.extract_string().unwrap();
    fields.extract_string().unwrap();
    let directory = fields.extract_string().unwrap();
    (title, directory)
}

#[test]
fn rename_and_move_show_up_in_recording_info() {
    let mut h = harness();
    h.login(12);

    let rename = Args::default().u32(1).str("Director's Cut").done();
    assert_eq!(h.code(Opcode::RecordingsRename, rename), ReturnCode::Ok);
    let moved = Args::default().u32(1).str("/Archive/2024/").done();
    assert_eq!(h.code(Opcode::RecordingsMove, moved), ReturnCode::Ok);

    let (code, mut fields) = h.call(Opcode::RecordingsGetInfo, Args::default().u32(1).done());
    assert_eq!(code, ReturnCode::Ok);
    let (title, directory) = title_and_directory(&mut fields);
    assert_eq!(title, "Director's Cut");
    assert_eq!(directory, "Archive/2024");

    let (_, mut other) = h.call(Opcode::RecordingsGetInfo, Args::default().u32(2).done());
    assert_eq!(title_and_directory(&mut other).1, "Movies");
}

#[test]
fn edl_marks_are_listed_in_order() {
    let mut h = harness();
    h.login(12);

    h.backend.set_edl(
        1,
        vec![
            EdlMark { start_ms: 0, end_ms: 90_000, kind: 0 },
            EdlMark { start_ms: 1_800_000, end_ms: 2_100_000, kind: 3 },
        ],
    );

    let (code, mut fields) = h.call(Opcode::RecordingsGetEdl, Args::default().u32(1).done());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_s64().unwrap(), 0);
    assert_eq!(fields.extract_s64().unwrap(), 90_000);
    assert_eq!(fields.extract_s32().unwrap(), 0);
    assert_eq!(fields.extract_s64().unwrap(), 1_800_000);
    assert_eq!(fields.extract_s64().unwrap(), 2_100_000);
    assert_eq!(fields.extract_s32().unwrap(), 3);
    assert!(fields.is_exhausted());

    let (code, fields) = h.call(Opcode::RecordingsGetEdl, Args::default().u32(2).done());
    assert_eq!(code, ReturnCode::Ok);
    assert!(fields.is_exhausted());
}

#[test]
fn missing_recordings_are_unknown() {
    let mut h = harness();
    h.login(12);

    let rename = Args::default().u32(9).str("Nothing").done();
    assert_eq!(h.code(Opcode::RecordingsRename, rename), ReturnCode::DataUnknown);
    let moved = Args::default().u32(9).str("Archive").done();
    assert_eq!(h.code(Opcode::RecordingsMove, moved), ReturnCode::DataUnknown);
    assert_eq!(
        h.code(Opcode::RecordingsGetEdl, Args::default().u32(9).done()),
        ReturnCode::DataUnknown
    );
}

#[test]
fn failed_timer_add_releases_the_timer_lock() {
    let backend = MemoryBackend::with_demo_data();
    let ctx = Arc::new(SharedContext::new());
    let mut first = harness_with(Arc::clone(&backend), Arc::clone(&ctx));
    let mut second = harness_with(backend, ctx);
    first.login(12);
    second.login(12);

    let bad_channel = timer_args(99, 100, 200, 1).done();
    assert_eq!(first.code(Opcode::TimerAdd, bad_channel), ReturnCode::DataInvalid);
    let truncated = Args::default().u32(1).done();
    assert_eq!(first.code(Opcode::TimerAdd, truncated), ReturnCode::DataInvalid);

    let (code, mut fields) = second.call(Opcode::TimerGetCount, none());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 1);
}

#[test]
fn disk_size_reports_percentage() {
    let mut h = harness();
    h.login(12);

    let (code, mut fields) = h.call(Opcode::RecordingsDiskSize, none());
    assert_eq!(code, ReturnCode::Ok);
    assert_eq!(fields.extract_u32().unwrap(), 500_000);
    assert_eq!(fields.extract_u32().unwrap(), 320_000);
    assert_eq!(fields.extract_u32().unwrap(), 36);
}

// -----------------------------------------------------------------------------
// Event relay
// -----------------------------------------------------------------------------

#[test]
fn status_packets_need_the_status_interface() {
    let mut h = harness();
    h.login(12);

    h.engine.handle(Command::TimerOrSignalChanged);
    assert!(h.take_packets(WireChannel::Status).is_empty());

    h.enable_status();
    h.engine.handle(Command::TimerOrSignalChanged);
    h.engine.handle(Command::OsdMessage(String::new()));
    h.engine.handle(Command::OsdMessage("Recording started".into()));

    let ids: Vec<u32> = h
        .take_packets(WireChannel::Status)
        .iter()
        .map(|p| p.id())
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn inhibited_updates_suppress_data_notices() {
    let mut h = harness();
    h.login(12);
    h.enable_status();
    h.ctx.set_inhibit_data_updates(true);

    h.engine.handle(Command::TimerOrSignalChanged);
    h.engine.handle(Command::ChannelListChanged);
    h.engine.handle(Command::RecordingListChanged);
    h.engine.handle(Command::EpgChanged(EpgNotice {
        channel_uid: 1,
        last_event_start: 10,
    }));
    h.engine.handle(Command::RecordingChanged(RecordingNotice {
        device: 0,
        name: "Film".into(),
        file_name: "/video/film.rec".into(),
        on: true,
    }));

    let packets = h.take_packets(WireChannel::Status);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].id(), 2);
}

#[test]
fn epg_changes_are_throttled() {
    let mut h = harness();
    h.login(12);
    h.enable_status();

    let notice = |start| {
        Command::EpgChanged(EpgNotice {
            channel_uid: 1,
            last_event_start: start,
        })
    };
    h.engine.handle(notice(100));
    h.engine.handle(notice(200));

    assert_eq!(h.take_packets(WireChannel::Status).len(), 1);
}

#[test]
fn fetched_epg_suppresses_older_notices() {
    let backend = MemoryBackend::with_demo_data();
    let ctx = Arc::new(SharedContext::new());
    let (queue, rx) = command_queue();
    let (tx, out) = outbound_channel();
    let config = EngineConfig {
        epg_min_interval: std::time::Duration::ZERO,
        ..EngineConfig::default()
    };
    let engine = Engine::new(ClientId(1), config, Arc::clone(&ctx), backend.backend(), queue, tx);
    let mut h = Harness {
        engine,
        out,
        rx,
        backend,
        ctx,
        other: Vec::new(),
        next_request_id: 0,
    };
    h.login(12);
    h.enable_status();

    let args = Args::default().u32(1).u32(0).u32(0).done();
    let (code, fields) = h.call(Opcode::EpgGetForChannel, args);
    assert_eq!(code, ReturnCode::Ok);
    assert!(fields.remaining() > 0);

    let newest = h
        .backend
        .events(1, 0, 0)
        .unwrap()
        .iter()
        .map(|e| e.start)
        .max()
        .unwrap();

    h.engine.handle(Command::EpgChanged(EpgNotice {
        channel_uid: 1,
        last_event_start: newest,
    }));
    assert!(h.take_packets(WireChannel::Status).is_empty());

    h.engine.handle(Command::EpgChanged(EpgNotice {
        channel_uid: 1,
        last_event_start: newest + 3600,
    }));
    assert_eq!(h.take_packets(WireChannel::Status).len(), 1);

    let unknown = Args::default().u32(77).u32(0).u32(0).done();
    assert_eq!(h.code(Opcode::EpgGetForChannel, unknown), ReturnCode::DataUnknown);
}

#[test]
fn channel_change_invalidating_live_stream_goes_idle() {
    let mut h = harness();
    h.login(12);
    h.enable_status();
    assert_eq!(h.code(Opcode::ChannelStreamOpen, live_args(1, 0)), ReturnCode::Ok);

    let mut moved = h.backend.channels().into_iter().next().unwrap();
    moved.tid += 1;
    h.backend.update_channel(1, Some(moved));
    h.engine.handle(Command::ChannelChanged(1));

    assert!(h.engine.session().is_idle());
    assert_eq!(h.backend.live_streams(), 0);

    let packets = h.take_packets(WireChannel::Status);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].id(), 4);
    assert_eq!(packets[0].payload(), &1u32.to_be_bytes());
}

#[test]
fn channel_change_keeping_tuning_leaves_stream() {
    let mut h = harness();
    h.login(12);
    h.enable_status();
    assert_eq!(h.code(Opcode::ChannelStreamOpen, live_args(1, 0)), ReturnCode::Ok);

    let mut renamed = h.backend.channels().into_iter().next().unwrap();
    renamed.name = "Das Erste".into();
    h.backend.update_channel(1, Some(renamed));
    h.engine.handle(Command::ChannelChanged(1));
    h.engine.handle(Command::ChannelChanged(2));

    assert_eq!(h.engine.session().live_channel(), Some(1));
    assert!(h.take_packets(WireChannel::Status).is_empty());
}

#[test]
fn old_clients_get_no_channel_change_notice() {
    let mut h = harness();
    h.login(6);
    h.enable_status();
    assert_eq!(h.code(Opcode::ChannelStreamOpen, live_args(1, 0)), ReturnCode::Ok);

    h.backend.update_channel(1, None);
    h.engine.handle(Command::ChannelChanged(1));

    assert!(h.engine.session().is_idle());
    assert!(h.take_packets(WireChannel::Status).is_empty());
}

// -----------------------------------------------------------------------------
// Scanning and OSD
// -----------------------------------------------------------------------------

#[test]
fn scan_is_exclusive_until_finished() {
    let mut h = harness();
    h.login(12);

    assert_eq!(h.code(Opcode::ScanStart, scan_args()), ReturnCode::Ok);
    assert!(h.ctx.data_updates_inhibited());
    assert_eq!(
        h.code(Opcode::ScanStart, scan_args()),
        ReturnCode::PreconditionFailed
    );

    let observer = h.backend.scan_observer().unwrap();
    observer.percentage(50);
    observer.new_channel("Found TV", false, false, true);
    observer.finished();
    h.pump();

    let ids: Vec<u32> = h
        .take_packets(WireChannel::Scan)
        .iter()
        .map(|p| p.id())
        .collect();
    assert_eq!(ids, vec![1, 1, 5, 6]);
    assert!(!h.engine.scan_active());
    assert!(!h.ctx.data_updates_inhibited());

    assert_eq!(h.code(Opcode::ScanStart, scan_args()), ReturnCode::Ok);
}

#[test]
fn scan_start_is_refused_while_inhibited() {
    let mut h = harness();
    h.login(12);
    h.ctx.set_inhibit_data_updates(true);

    assert_eq!(h.code(Opcode::ScanStart, scan_args()), ReturnCode::DataLocked);
    assert!(!h.engine.scan_active());
}

#[test]
fn refused_scan_releases_inhibit() {
    let mut h = harness();
    h.login(12);
    h.backend.set_scan_refused(true);

    assert_eq!(h.code(Opcode::ScanStart, scan_args()), ReturnCode::Error);
    assert!(!h.ctx.data_updates_inhibited());
}

#[test]
fn stale_scan_events_are_dropped() {
    let mut h = harness();
    h.login(12);

    assert_eq!(h.code(Opcode::ScanStart, scan_args()), ReturnCode::Ok);
    let first = h.backend.scan_observer().unwrap();
    assert_eq!(h.code(Opcode::ScanStop, none()), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::ScanStop, none()), ReturnCode::PreconditionFailed);
    assert_eq!(h.code(Opcode::ScanStart, scan_args()), ReturnCode::Ok);

    first.finished();
    h.pump();

    assert!(h.engine.scan_active());
    assert!(h.ctx.data_updates_inhibited());
}

#[test]
fn osd_sessions() {
    let mut h = harness();
    h.login(12);

    assert_eq!(
        h.code(Opcode::OsdHitKey, Args::default().u32(7).done()),
        ReturnCode::PreconditionFailed
    );
    assert_eq!(h.code(Opcode::OsdConnect, none()), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::OsdConnect, none()), ReturnCode::Ok);
    assert_eq!(h.backend.osd_sessions(), 1);

    assert_eq!(
        h.code(Opcode::OsdHitKey, Args::default().u32(7).done()),
        ReturnCode::Ok
    );
    assert_eq!(h.backend.osd_keys(), vec![7]);

    assert_eq!(h.code(Opcode::OsdDisconnect, none()), ReturnCode::Ok);
    assert_eq!(h.backend.osd_sessions(), 0);
    assert!(!h.engine.osd_open());
}

// -----------------------------------------------------------------------------
// Failure handling and teardown
// -----------------------------------------------------------------------------

struct PanickingEpg;

impl EpgSource for PanickingEpg {
    fn events(&self, _uid: ChannelUid, _start: u32, _duration: u32) -> Option<Vec<EpgEvent>> {
        panic!("epg database corrupted");
    }
}

#[test]
fn handler_panic_becomes_error_response() {
    let backend = MemoryBackend::with_demo_data();
    let mut parts = backend.backend();
    parts.epg = Arc::new(PanickingEpg);
    let mut h = harness_from(parts, backend, Arc::new(SharedContext::new()));
    h.login(12);

    let args = Args::default().u32(1).u32(0).u32(0).done();
    assert_eq!(h.code(Opcode::EpgGetForChannel, args), ReturnCode::Error);
    assert_eq!(h.code(Opcode::Ping, none()), ReturnCode::Ok);
}

/// Serves the first channel lookup, then fails hard.
struct FlakyChannels {
    inner: Arc<MemoryBackend>,
    lookups: AtomicUsize,
}

impl ChannelSource for FlakyChannels {
    fn channels(&self) -> Vec<Channel> {
        self.inner.channels()
    }

    fn channel(&self, uid: ChannelUid) -> Option<Channel> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) > 0 {
            panic!("channel database corrupted");
        }
        ChannelSource::channel(&*self.inner, uid)
    }
}

#[test]
fn notification_panic_keeps_the_engine_running() {
    let backend = MemoryBackend::with_demo_data();
    let mut parts = backend.backend();
    parts.channels = Arc::new(FlakyChannels {
        inner: Arc::clone(&backend),
        lookups: AtomicUsize::new(0),
    });
    let mut h = harness_from(parts, backend, Arc::new(SharedContext::new()));
    h.login(12);
    assert_eq!(h.code(Opcode::ChannelStreamOpen, live_args(1, 0)), ReturnCode::Ok);

    assert_eq!(h.engine.handle(Command::ChannelChanged(1)), Flow::Continue);

    assert_eq!(h.code(Opcode::Ping, none()), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::ChannelStreamClose, none()), ReturnCode::Ok);
}

#[test]
fn transport_error_stops_the_engine() {
    let mut h = harness();
    assert_eq!(
        h.engine.handle(Command::TransportError("reset".into())),
        Flow::Stop
    );
    assert_eq!(h.engine.handle(Command::Shutdown), Flow::Stop);
}

#[test]
fn teardown_releases_everything_once() {
    let mut h = harness();
    h.login(12);
    assert_eq!(h.code(Opcode::ChannelStreamOpen, live_args(1, 0)), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::ScanStart, scan_args()), ReturnCode::Ok);
    assert_eq!(h.code(Opcode::OsdConnect, none()), ReturnCode::Ok);

    h.engine.teardown();
    h.engine.teardown();

    assert!(h.engine.session().is_idle());
    assert!(!h.engine.scan_active());
    assert!(!h.ctx.data_updates_inhibited());
    assert_eq!(h.backend.live_streams(), 0);
    assert_eq!(h.backend.osd_sessions(), 0);
    assert!(h.backend.scan_observer().is_none());
    assert!(h.rx.is_closed());
}
