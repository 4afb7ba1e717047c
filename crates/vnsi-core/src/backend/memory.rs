//! In-memory backend.
//!
//! Backs the stand-alone server binary and the tests. All state lives
//! behind one mutex; status observers are notified after the lock is
//! released.
//!
//! Test hooks:
//! - `set_devices_busy` / `set_device_failure` make live opens fail
//! - `set_recording_in_progress` marks a recording as still being written
//! - `scan_observer` hands out the observer of the running scan so tests
//!   can drive scanner callbacks
//! - `osd_keys` returns the keys sent to OSD sessions

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use vnsi_protocol::{OsdType, ResponsePacket, StreamType};

use super::{
    Backend,
    ChannelSource,
    Devices,
    EpgSource,
    LiveRequest,
    LiveStream,
    OsdProvider,
    OsdSession,
    RecordingPlayer,
    RecordingStore,
    Scanner,
    StreamStatus,
    TimerStore,
    Tuning,
};
use crate::channel::{Channel, Source};
use crate::epg::{EpgEvent, EpgNotice};
use crate::error::BackendError;
use crate::observer::StatusObserver;
use crate::recording::{DiskSpace, EdlMark, IFrame, Recording, RecordingNotice};
use crate::scan::{
    ScanListEntry,
    ScanObserver,
    ScanParams,
    SCAN_TYPE_DVB_C,
    SCAN_TYPE_DVB_S,
    SCAN_TYPE_DVB_T,
};
use crate::timer::{Timer, TimerType, TIMER_FLAG_ACTIVE};
use crate::types::{ChannelUid, OutboundTx, RecordingId, TimerId};

/// Bytes per frame of the synthetic recordings.
pub const FRAME_BYTES: u64 = 188 * 100;

/// Every n-th frame of a synthetic recording is an I-frame.
pub const IFRAME_INTERVAL: u32 = 12;

#[derive(Default)]
struct State {
    channels: Vec<Channel>,
    recordings: BTreeMap<RecordingId, Recording>,
    deleted: BTreeMap<RecordingId, Recording>,
    in_progress: BTreeSet<RecordingId>,
    edl: HashMap<RecordingId, Vec<EdlMark>>,
    next_recording_id: RecordingId,
    timers: BTreeMap<TimerId, Timer>,
    next_timer_id: TimerId,
    epg: HashMap<ChannelUid, Vec<EpgEvent>>,
    disk: Option<DiskSpace>,
    devices_busy: bool,
    device_failure: bool,
    scan_refused: bool,
    scan: Option<ScanObserver>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    observer: Mutex<Option<Arc<dyn StatusObserver>>>,
    live_streams: Arc<AtomicUsize>,
    players: Arc<AtomicUsize>,
    osd_sessions: Arc<AtomicUsize>,
    osd_keys: Arc<Mutex<Vec<u32>>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryBackend::default())
    }

    /// A small channel list with recordings, a timer and EPG data.
    pub fn with_demo_data() -> Arc<Self> {
        let backend = MemoryBackend::new();
        {
            let mut state = backend.lock();
            state.channels = demo_channels();
            state.disk = Some(DiskSpace {
                total_mb: 500_000,
                free_mb: 320_000,
            });

            let now = chrono::Utc::now().timestamp();
            for (idx, channel) in state.channels.clone().iter().enumerate() {
                let base = (now - now % 3600) as u32;
                let events = (0..4)
                    .map(|slot| EpgEvent {
                        id: channel.uid * 100 + slot,
                        start: base + slot * 3600,
                        duration: 3600,
                        genre: 0x10,
                        parental_rating: 0,
                        title: format!("{} show {}", channel.name, slot + 1),
                        short_text: String::new(),
                        description: format!("Programme slot {} on {}", slot + 1, channel.name),
                    })
                    .collect();
                state.epg.insert(channel.uid, events);

                if idx < 2 {
                    let id = next_recording_id(&mut state);
                    state.recordings.insert(
                        id,
                        Recording {
                            id,
                            start: now - 86_400 * (idx as i64 + 1),
                            duration: 5400,
                            priority: 50,
                            lifetime: 99,
                            channel_name: channel.name.clone(),
                            title: format!("Film on {}", channel.name),
                            short_text: String::new(),
                            description: String::new(),
                            directory: "Movies".to_string(),
                            file_name: format!("/video/Movies/{id:05}.rec"),
                            size_bytes: FRAME_BYTES * 5000,
                            is_new: idx == 0,
                        },
                    );
                }
            }

            let id = next_timer_id(&mut state);
            let start = (now + 7200) as u32;
            state.timers.insert(
                id,
                Timer {
                    id,
                    kind: TimerType::Manual,
                    flags: TIMER_FLAG_ACTIVE,
                    priority: 50,
                    lifetime: 99,
                    channel_uid: 1,
                    start,
                    stop: start + 3600,
                    weekdays: 0,
                    title: "Evening news".to_string(),
                    epg_search: String::new(),
                },
            );
        }
        backend
    }

    /// Bundle this backend into engine collaborators.
    pub fn backend(self: &Arc<Self>) -> Backend {
        Backend {
            channels: self.clone(),
            devices: self.clone(),
            recordings: self.clone(),
            timers: self.clone(),
            epg: self.clone(),
            scanner: Some(self.clone()),
            osd: Some(self.clone()),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn StatusObserver>) {
        *self
            .observer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(observer);
    }

    // -------------------------------------------------------------------------
    // Mutators that emit notifications
    // -------------------------------------------------------------------------

    /// Replace the channel list.
    pub fn set_channels(&self, channels: Vec<Channel>) {
        self.lock().channels = channels;
        self.notify(|o| o.channels_change());
    }

    /// Replace (or remove, with `None`) one channel's data.
    pub fn update_channel(&self, uid: ChannelUid, channel: Option<Channel>) {
        {
            let mut state = self.lock();
            match channel {
                Some(channel) => {
                    if let Some(slot) = state.channels.iter_mut().find(|c| c.uid == uid) {
                        *slot = channel;
                    } else {
                        state.channels.push(channel);
                    }
                }
                None => state.channels.retain(|c| c.uid != uid),
            }
        }
        self.notify(|o| o.channel_change(uid));
    }

    pub fn add_recording(&self, mut recording: Recording) -> RecordingId {
        let id = {
            let mut state = self.lock();
            let id = next_recording_id(&mut state);
            recording.id = id;
            state.recordings.insert(id, recording);
            id
        };
        self.notify(|o| o.recordings_change());
        id
    }

    /// Replace the EPG of `uid` and report the change.
    pub fn set_epg(&self, uid: ChannelUid, events: Vec<EpgEvent>) {
        let last_event_start = events.iter().map(|e| e.start).max().unwrap_or(0);
        self.lock().epg.insert(uid, events);
        self.notify(|o| {
            o.epg_change(EpgNotice {
                channel_uid: uid,
                last_event_start,
            })
        });
    }

    /// Report a recording starting (`on`) or stopping on device 0.
    pub fn announce_recording(&self, id: RecordingId, on: bool) {
        let notice = {
            let mut state = self.lock();
            let Some(rec) = state.recordings.get(&id).cloned() else {
                return;
            };
            if on {
                state.in_progress.insert(id);
            } else {
                state.in_progress.remove(&id);
            }
            RecordingNotice {
                device: 0,
                name: rec.title,
                file_name: rec.file_name,
                on,
            }
        };
        self.notify(|o| o.recording(notice));
    }

    pub fn post_message(&self, text: &str) {
        self.notify(|o| o.osd_status_message(text));
    }

    // -------------------------------------------------------------------------
    // Test hooks
    // -------------------------------------------------------------------------

    pub fn set_devices_busy(&self, busy: bool) {
        self.lock().devices_busy = busy;
    }

    pub fn set_device_failure(&self, failure: bool) {
        self.lock().device_failure = failure;
    }

    pub fn set_recording_in_progress(&self, id: RecordingId, on: bool) {
        let mut state = self.lock();
        if on {
            state.in_progress.insert(id);
        } else {
            state.in_progress.remove(&id);
        }
    }

    pub fn set_edl(&self, id: RecordingId, marks: Vec<EdlMark>) {
        self.lock().edl.insert(id, marks);
    }

    pub fn set_scan_refused(&self, refused: bool) {
        self.lock().scan_refused = refused;
    }

    /// Observer of the running scan, if any.
    pub fn scan_observer(&self) -> Option<ScanObserver> {
        self.lock().scan.clone()
    }

    pub fn osd_keys(&self) -> Vec<u32> {
        self.osd_keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    pub fn open_players(&self) -> usize {
        self.players.load(Ordering::SeqCst)
    }

    pub fn osd_sessions(&self) -> usize {
        self.osd_sessions.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, f: impl FnOnce(&dyn StatusObserver)) {
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(observer) = observer {
            f(observer.as_ref());
        }
    }
}

fn next_recording_id(state: &mut State) -> RecordingId {
    state.next_recording_id += 1;
    state.next_recording_id
}

fn next_timer_id(state: &mut State) -> TimerId {
    state.next_timer_id += 1;
    state.next_timer_id
}

fn demo_channels() -> Vec<Channel> {
    let astra = Source::Satellite {
        position: 192,
        east: true,
    };
    let channel = |uid: u32, name: &str, provider: &str, group: &str, video_type: u32| Channel {
        uid,
        number: uid,
        name: name.to_string(),
        provider: provider.to_string(),
        group: Some(group.to_string()),
        caids: Vec::new(),
        video_type,
        source: astra,
        sid: 28_000 + uid,
        tid: 1_000 + uid,
        nid: 1,
    };

    let mut encrypted = channel(4, "Sky Cinema", "Sky", "Pay TV", 0x1B);
    encrypted.caids = vec![0x1702, 0x098C];

    vec![
        channel(1, "Das Erste HD", "ARD", "Public", 0x1B),
        channel(2, "ZDF HD", "ZDFvision", "Public", 0x1B),
        channel(3, "Bayern 3", "ARD", "Radio", 0),
        encrypted,
    ]
}

impl ChannelSource for MemoryBackend {
    fn channels(&self) -> Vec<Channel> {
        self.lock().channels.clone()
    }

    fn channel(&self, uid: ChannelUid) -> Option<Channel> {
        self.lock().channels.iter().find(|c| c.uid == uid).cloned()
    }
}

impl Devices for MemoryBackend {
    fn open_live(
        &self,
        request: LiveRequest,
        sink: OutboundTx,
    ) -> Result<Box<dyn LiveStream>, BackendError> {
        {
            let state = self.lock();
            if state.devices_busy {
                return Err(BackendError::Busy("all devices are recording".into()));
            }
            if state.device_failure {
                return Err(BackendError::Unavailable("no device for channel".into()));
            }
        }

        self.live_streams.fetch_add(1, Ordering::SeqCst);

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut change = ResponsePacket::stream(StreamType::Change);
        change.add_u32(request.channel.uid);
        let _ = sink.send(change);

        Ok(Box::new(MemoryLiveStream {
            channel: request.channel,
            timeshift: request.timeshift,
            serial: 0,
            buffer_start: now_ms,
            sink,
            open: Arc::clone(&self.live_streams),
            stopped: false,
        }))
    }
}

struct MemoryLiveStream {
    channel: Channel,
    timeshift: bool,
    serial: u32,
    buffer_start: i64,
    sink: OutboundTx,
    open: Arc<AtomicUsize>,
    stopped: bool,
}

impl LiveStream for MemoryLiveStream {
    fn timeshift_active(&self) -> bool {
        self.timeshift
    }

    fn seek(&mut self, time_ms: i64) -> Result<u32, BackendError> {
        if !self.timeshift {
            return Err(BackendError::Invalid("timeshift is off".into()));
        }
        let end = chrono::Utc::now().timestamp_millis();
        if time_ms < self.buffer_start || time_ms > end {
            return Err(BackendError::Invalid("outside timeshift buffer".into()));
        }
        self.serial += 1;
        Ok(self.serial)
    }

    fn status(&self) -> StreamStatus {
        StreamStatus {
            channel_uid: self.channel.uid,
            timeshift: self.timeshift,
            buffer_start: self.buffer_start,
            buffer_end: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn request_signal_info(&mut self) {
        let mut packet = ResponsePacket::stream(StreamType::SignalInfo);
        packet
            .add_string("memory")
            .add_string("LOCKED")
            .add_u32(0xC000)
            .add_u32(0xE000)
            .add_u32(0)
            .add_u32(0);
        let _ = self.sink.send(packet);
    }

    fn retune(&mut self, channel: Option<&Channel>) -> Tuning {
        match channel {
            Some(c)
                if c.source == self.channel.source
                    && c.sid == self.channel.sid
                    && c.tid == self.channel.tid
                    && c.nid == self.channel.nid =>
            {
                self.channel = c.clone();
                Tuning::Keep
            }
            _ => Tuning::Invalidated,
        }
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryLiveStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl RecordingStore for MemoryBackend {
    fn disk_space(&self) -> Result<DiskSpace, BackendError> {
        self.lock()
            .disk
            .ok_or_else(|| BackendError::Unavailable("video directory not mounted".into()))
    }

    fn recordings(&self) -> Vec<Recording> {
        self.lock().recordings.values().cloned().collect()
    }

    fn recording(&self, id: RecordingId) -> Option<Recording> {
        self.lock().recordings.get(&id).cloned()
    }

    fn is_recording(&self, id: RecordingId) -> bool {
        self.lock().in_progress.contains(&id)
    }

    fn rename(&self, id: RecordingId, name: &str) -> Result<(), BackendError> {
        if name.trim().is_empty() {
            return Err(BackendError::Invalid("empty recording name".into()));
        }
        {
            let mut state = self.lock();
            let rec = state
                .recordings
                .get_mut(&id)
                .ok_or_else(|| BackendError::NotFound(format!("recording {id}")))?;
            rec.title = name.to_string();
        }
        self.notify(|o| o.recordings_change());
        Ok(())
    }

    fn move_to(&self, id: RecordingId, folder: &str) -> Result<(), BackendError> {
        {
            let mut state = self.lock();
            if state.in_progress.contains(&id) {
                return Err(BackendError::Busy(format!("recording {id}")));
            }
            let rec = state
                .recordings
                .get_mut(&id)
                .ok_or_else(|| BackendError::NotFound(format!("recording {id}")))?;
            rec.directory = folder.trim_matches('/').to_string();
        }
        self.notify(|o| o.recordings_change());
        Ok(())
    }

    fn delete(&self, id: RecordingId) -> Result<(), BackendError> {
        {
            let mut state = self.lock();
            if state.in_progress.contains(&id) {
                return Err(BackendError::Busy(format!("recording {id}")));
            }
            let rec = state
                .recordings
                .remove(&id)
                .ok_or_else(|| BackendError::NotFound(format!("recording {id}")))?;
            state.deleted.insert(id, rec);
        }
        self.notify(|o| o.recordings_change());
        Ok(())
    }

    fn edl(&self, id: RecordingId) -> Result<Vec<EdlMark>, BackendError> {
        let state = self.lock();
        if !state.recordings.contains_key(&id) {
            return Err(BackendError::NotFound(format!("recording {id}")));
        }
        Ok(state.edl.get(&id).cloned().unwrap_or_default())
    }

    fn deleted(&self) -> Vec<Recording> {
        self.lock().deleted.values().cloned().collect()
    }

    fn undelete(&self, id: RecordingId) -> Result<(), BackendError> {
        {
            let mut state = self.lock();
            let rec = state
                .deleted
                .remove(&id)
                .ok_or_else(|| BackendError::NotFound(format!("deleted recording {id}")))?;
            state.recordings.insert(id, rec);
        }
        self.notify(|o| o.recordings_change());
        Ok(())
    }

    fn purge(&self, id: RecordingId) -> Result<(), BackendError> {
        let mut state = self.lock();
        state
            .deleted
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("deleted recording {id}")))
    }

    fn purge_all(&self) -> Result<usize, BackendError> {
        let mut state = self.lock();
        let count = state.deleted.len();
        state.deleted.clear();
        Ok(count)
    }

    fn open_player(&self, id: RecordingId) -> Result<Box<dyn RecordingPlayer>, BackendError> {
        let rec = self
            .recording(id)
            .ok_or_else(|| BackendError::NotFound(format!("recording {id}")))?;

        self.players.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryPlayer {
            length: rec.size_bytes,
            open: Arc::clone(&self.players),
            closed: false,
        }))
    }
}

/// Synthetic recording: byte `n` is `n % 251`.
struct MemoryPlayer {
    length: u64,
    open: Arc<AtomicUsize>,
    closed: bool,
}

impl MemoryPlayer {
    fn frames(&self) -> u32 {
        (self.length / FRAME_BYTES) as u32
    }
}

impl RecordingPlayer for MemoryPlayer {
    fn length_bytes(&self) -> u64 {
        self.length
    }

    fn length_frames(&self) -> u32 {
        self.frames()
    }

    fn is_ts(&self) -> bool {
        true
    }

    fn read_block(&mut self, position: u64, amount: u32) -> Result<Bytes, BackendError> {
        if position >= self.length {
            return Err(BackendError::NotFound(format!("position {position}")));
        }
        let end = self.length.min(position + u64::from(amount));
        Ok((position..end).map(|n| (n % 251) as u8).collect())
    }

    fn position_from_frame(&self, frame: u32) -> u64 {
        (u64::from(frame) * FRAME_BYTES).min(self.length)
    }

    fn frame_from_position(&self, position: u64) -> u32 {
        (position.min(self.length) / FRAME_BYTES) as u32
    }

    fn iframe(&self, frame: u32, forward: bool) -> Option<IFrame> {
        let below = frame - frame % IFRAME_INTERVAL;
        let target = if forward && below != frame {
            below.checked_add(IFRAME_INTERVAL)?
        } else {
            below
        };
        if target >= self.frames() {
            return None;
        }
        Some(IFrame {
            position: u64::from(target) * FRAME_BYTES,
            frame: target,
            length: FRAME_BYTES as u32,
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryPlayer {
    fn drop(&mut self) {
        self.close();
    }
}

impl TimerStore for MemoryBackend {
    fn timers(&self) -> Vec<Timer> {
        self.lock().timers.values().cloned().collect()
    }

    fn timer(&self, id: TimerId) -> Option<Timer> {
        self.lock().timers.get(&id).cloned()
    }

    fn add(&self, mut timer: Timer) -> Result<TimerId, BackendError> {
        let id = {
            let mut state = self.lock();
            let id = next_timer_id(&mut state);
            timer.id = id;
            state.timers.insert(id, timer);
            id
        };
        self.notify(|o| o.signal_timer_change());
        Ok(id)
    }

    fn update(&self, timer: Timer) -> Result<(), BackendError> {
        {
            let mut state = self.lock();
            let slot = state
                .timers
                .get_mut(&timer.id)
                .ok_or_else(|| BackendError::NotFound(format!("timer {}", timer.id)))?;
            *slot = timer;
        }
        self.notify(|o| o.signal_timer_change());
        Ok(())
    }

    fn delete(&self, id: TimerId) -> Result<(), BackendError> {
        self.lock()
            .timers
            .remove(&id)
            .ok_or_else(|| BackendError::NotFound(format!("timer {id}")))?;
        self.notify(|o| o.signal_timer_change());
        Ok(())
    }

    fn types(&self) -> Vec<TimerType> {
        vec![TimerType::Manual, TimerType::Repeating, TimerType::EpgSearch]
    }
}

impl EpgSource for MemoryBackend {
    fn events(&self, uid: ChannelUid, start: u32, duration: u32) -> Option<Vec<EpgEvent>> {
        let state = self.lock();
        if !state.channels.iter().any(|c| c.uid == uid) {
            return None;
        }
        let end = start.saturating_add(duration);
        let events = state
            .epg
            .get(&uid)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.start.saturating_add(e.duration) > start)
                    .filter(|e| duration == 0 || e.start < end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Some(events)
    }
}

impl Scanner for MemoryBackend {
    fn supported_types(&self) -> u32 {
        SCAN_TYPE_DVB_T | SCAN_TYPE_DVB_C | SCAN_TYPE_DVB_S
    }

    fn countries(&self) -> Vec<ScanListEntry> {
        [(0, "AT", "Austria"), (1, "DE", "Germany"), (2, "CH", "Switzerland")]
            .into_iter()
            .map(|(index, short, long)| ScanListEntry {
                index,
                short_name: short.to_string(),
                long_name: long.to_string(),
            })
            .collect()
    }

    fn satellites(&self) -> Vec<ScanListEntry> {
        [(0, "S19E2", "Astra 1KR/1L/1M/2C"), (1, "S13E0", "Hotbird 13B/13C/13E")]
            .into_iter()
            .map(|(index, short, long)| ScanListEntry {
                index,
                short_name: short.to_string(),
                long_name: long.to_string(),
            })
            .collect()
    }

    fn start(&self, _params: ScanParams, observer: ScanObserver) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.scan_refused {
            return Err(BackendError::Unavailable("no device available for scanning".into()));
        }
        observer.percentage(0);
        state.scan = Some(observer);
        Ok(())
    }

    fn stop(&self) {
        self.lock().scan = None;
    }
}

impl OsdProvider for MemoryBackend {
    fn open(&self, sink: OutboundTx) -> Result<Box<dyn OsdSession>, BackendError> {
        self.osd_sessions.fetch_add(1, Ordering::SeqCst);
        let mut packet = ResponsePacket::osd(OsdType::Open);
        packet.add_u32(0);
        let _ = sink.send(packet);
        Ok(Box::new(MemoryOsd {
            keys: Arc::clone(&self.osd_keys),
            sink,
            open: Arc::clone(&self.osd_sessions),
            closed: false,
        }))
    }
}

struct MemoryOsd {
    keys: Arc<Mutex<Vec<u32>>>,
    sink: OutboundTx,
    open: Arc<AtomicUsize>,
    closed: bool,
}

impl OsdSession for MemoryOsd {
    fn hit_key(&mut self, key: u32) {
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(key);
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
            let _ = self.sink.send(ResponsePacket::osd(OsdType::Close));
        }
    }
}

impl Drop for MemoryOsd {
    fn drop(&mut self) {
        self.close();
    }
}
