//! Low-level wire types and constants.
//!
//! This module defines:
//! - Protocol versioning.
//! - Frame channel ids (request/response, stream, status, scan, osd).
//! - Request opcodes and response return codes.
//! - Packet type ids for the asynchronous channels.
//!
//! The actual encode/decode logic lives in `binary_codec` and `packet`.

/// Current (highest) protocol version spoken by the server.
pub const PROTOCOL_VERSION: u32 = 12;

/// Oldest client protocol version still accepted at login.
pub const MIN_PROTOCOL_VERSION: u32 = 1;

/// Clients below this version get no picon reference in channel lists.
pub const PICON_MIN_VERSION: u32 = 9;

/// Clients below this version get no per-channel change notification.
pub const CHANNEL_CHANGE_MIN_VERSION: u32 = 7;

/// Request header: channel, request id, opcode, payload length.
pub const REQUEST_HEADER_LEN: usize = 16;

/// Server frame header: channel, id, payload length.
pub const FRAME_HEADER_LEN: usize = 12;

/// Upper bound for a single payload in either direction.
pub const MAX_PAYLOAD_LEN: usize = 4 * 1024 * 1024;

/// Frame channel (first u32 of every frame).
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Synchronous request/response traffic.
    RequestResponse = 1,

    /// Live or recording stream packets.
    Stream = 2,

    /// Asynchronous status notifications.
    Status = 5,

    /// Channel scan progress.
    Scan = 6,

    /// On-screen display traffic.
    Osd = 7,
}

impl Channel {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Channel::RequestResponse),
            2 => Some(Channel::Stream),
            5 => Some(Channel::Status),
            6 => Some(Channel::Scan),
            7 => Some(Channel::Osd),
            _ => None,
        }
    }
}

/// Request opcodes (client → server).
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    // 1 - 19: general purpose
    Login = 1,
    GetTime = 2,
    EnableStatusInterface = 3,
    Ping = 7,
    GetSetup = 8,
    StoreSetup = 9,
    GetSocket = 10,
    InvalidateSocket = 11,

    // 20 - 39: live streaming
    ChannelStreamOpen = 20,
    ChannelStreamClose = 21,
    ChannelStreamSeek = 22,
    ChannelStreamStatusSocket = 23,
    ChannelStreamStatusRequest = 24,

    // 40 - 59: recording streaming
    RecStreamOpen = 40,
    RecStreamClose = 41,
    RecStreamGetBlock = 42,
    RecStreamPositionFromFrame = 43,
    RecStreamFrameFromPosition = 44,
    RecStreamGetIFrame = 45,
    RecStreamGetLength = 46,

    // 60 - 79: channel access
    ChannelsGetCount = 61,
    ChannelsGetChannels = 63,
    ChannelGroupGetCount = 65,
    ChannelGroupList = 66,
    ChannelGroupMembers = 67,
    ChannelsGetCaids = 68,
    ChannelsGetWhitelist = 69,
    ChannelsGetBlacklist = 70,
    ChannelsSetWhitelist = 71,
    ChannelsSetBlacklist = 72,

    // 80 - 99: timers
    TimerGetCount = 80,
    TimerGet = 81,
    TimerGetList = 82,
    TimerAdd = 83,
    TimerDelete = 84,
    TimerUpdate = 85,
    TimerGetTypes = 86,

    // 100 - 119: recordings
    RecordingsDiskSize = 100,
    RecordingsGetCount = 101,
    RecordingsGetList = 102,
    RecordingsRename = 103,
    RecordingsDelete = 104,
    RecordingsMove = 105,
    RecordingsGetEdl = 106,
    RecordingsGetInfo = 107,

    // 120 - 139: epg
    EpgGetForChannel = 120,

    // 140 - 159: channel scanning
    ScanSupported = 140,
    ScanGetCountries = 141,
    ScanGetSatellites = 142,
    ScanStart = 143,
    ScanStop = 144,
    ScanSupportedTypes = 145,

    // 160 - 179: osd
    OsdConnect = 160,
    OsdDisconnect = 161,
    OsdHitKey = 162,

    // 180 - 199: deleted recordings
    DeletedSupported = 180,
    DeletedGetCount = 181,
    DeletedGetList = 182,
    DeletedDelete = 183,
    DeletedUndelete = 184,
    DeletedDeleteAll = 185,
}

impl Opcode {
    pub fn from_u32(v: u32) -> Option<Self> {
        use Opcode::*;
        let op = match v {
            1 => Login,
            2 => GetTime,
            3 => EnableStatusInterface,
            7 => Ping,
            8 => GetSetup,
            9 => StoreSetup,
            10 => GetSocket,
            11 => InvalidateSocket,
            20 => ChannelStreamOpen,
            21 => ChannelStreamClose,
            22 => ChannelStreamSeek,
            23 => ChannelStreamStatusSocket,
            24 => ChannelStreamStatusRequest,
            40 => RecStreamOpen,
            41 => RecStreamClose,
            42 => RecStreamGetBlock,
            43 => RecStreamPositionFromFrame,
            44 => RecStreamFrameFromPosition,
            45 => RecStreamGetIFrame,
            46 => RecStreamGetLength,
            61 => ChannelsGetCount,
            63 => ChannelsGetChannels,
            65 => ChannelGroupGetCount,
            66 => ChannelGroupList,
            67 => ChannelGroupMembers,
            68 => ChannelsGetCaids,
            69 => ChannelsGetWhitelist,
            70 => ChannelsGetBlacklist,
            71 => ChannelsSetWhitelist,
            72 => ChannelsSetBlacklist,
            80 => TimerGetCount,
            81 => TimerGet,
            82 => TimerGetList,
            83 => TimerAdd,
            84 => TimerDelete,
            85 => TimerUpdate,
            86 => TimerGetTypes,
            100 => RecordingsDiskSize,
            101 => RecordingsGetCount,
            102 => RecordingsGetList,
            103 => RecordingsRename,
            104 => RecordingsDelete,
            105 => RecordingsMove,
            106 => RecordingsGetEdl,
            107 => RecordingsGetInfo,
            120 => EpgGetForChannel,
            140 => ScanSupported,
            141 => ScanGetCountries,
            142 => ScanGetSatellites,
            143 => ScanStart,
            144 => ScanStop,
            145 => ScanSupportedTypes,
            160 => OsdConnect,
            161 => OsdDisconnect,
            162 => OsdHitKey,
            180 => DeletedSupported,
            181 => DeletedGetCount,
            182 => DeletedGetList,
            183 => DeletedDelete,
            184 => DeletedUndelete,
            185 => DeletedDeleteAll,
            _ => return None,
        };
        Some(op)
    }

    /// Opcodes a client may send before a successful login.
    pub fn allowed_before_login(self) -> bool {
        matches!(self, Opcode::Login | Opcode::Ping)
    }
}

/// Return code carried as the first u32 of every response payload.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Ok = 0,

    /// The target is busy recording.
    RecRunning = 1,

    /// Not logged in, or the connection is in the wrong session state.
    PreconditionFailed = 994,

    /// Unknown opcode or feature not available on this server.
    NotSupported = 995,

    /// Referenced object does not exist.
    DataUnknown = 996,

    /// Temporarily refused; the client may retry later.
    DataLocked = 997,

    /// Malformed or out-of-range arguments.
    DataInvalid = 998,

    /// Internal or device failure.
    Error = 999,
}

impl ReturnCode {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(ReturnCode::Ok),
            1 => Some(ReturnCode::RecRunning),
            994 => Some(ReturnCode::PreconditionFailed),
            995 => Some(ReturnCode::NotSupported),
            996 => Some(ReturnCode::DataUnknown),
            997 => Some(ReturnCode::DataLocked),
            998 => Some(ReturnCode::DataInvalid),
            999 => Some(ReturnCode::Error),
            _ => None,
        }
    }
}

/// Packet types on the status channel.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StatusType {
    TimerChange = 1,
    Recording = 2,
    Message = 3,
    ChannelChange = 4,
    RecordingsChange = 5,
    EpgChange = 6,
}

impl StatusType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(StatusType::TimerChange),
            2 => Some(StatusType::Recording),
            3 => Some(StatusType::Message),
            4 => Some(StatusType::ChannelChange),
            5 => Some(StatusType::RecordingsChange),
            6 => Some(StatusType::EpgChange),
            _ => None,
        }
    }
}

/// Packet types on the scan channel.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScannerType {
    Percentage = 1,
    Signal = 2,
    Device = 3,
    Transponder = 4,
    NewChannel = 5,
    Finished = 6,
    Status = 7,
}

impl ScannerType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(ScannerType::Percentage),
            2 => Some(ScannerType::Signal),
            3 => Some(ScannerType::Device),
            4 => Some(ScannerType::Transponder),
            5 => Some(ScannerType::NewChannel),
            6 => Some(ScannerType::Finished),
            7 => Some(ScannerType::Status),
            _ => None,
        }
    }
}

/// Packet types on the stream channel.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StreamType {
    Change = 1,
    Status = 2,
    QueueStatus = 3,
    MuxPacket = 4,
    SignalInfo = 5,
    ContentInfo = 6,
    BufferStats = 7,
    RefTime = 8,
}

/// Packet types on the osd channel.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OsdType {
    Open = 1,
    Close = 2,
    Clear = 3,
    SetPalette = 4,
    SetBlock = 5,
}

/// A tiny helper for validating payload lengths.
pub fn validate_payload_len(len: usize) -> bool {
    len <= MAX_PAYLOAD_LEN
}
