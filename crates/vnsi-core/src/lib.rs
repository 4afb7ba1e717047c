//! vnsi-core
//!
//! Per-connection VNSI engine:
//! - domain models (channels, recordings, timers, EPG, scan events)
//! - backend collaborator traits and an in-memory backend
//! - command queue and dispatch loop
//! - request handlers, session manager, event relay

pub mod types;
pub mod error;
pub mod channel;
pub mod filter;
pub mod groups;
pub mod recording;
pub mod timer;
pub mod epg;
pub mod scan;
pub mod setup;
pub mod context;
pub mod command;
pub mod queue;
pub mod observer;
pub mod backend;
pub mod session;
pub mod engine;
pub mod connection;

pub use types::{ClientId, ChannelUid, OutboundRx, OutboundTx, RecordingId, TimerId, outbound_channel};
pub use error::{BackendError, HandlerError, HandlerResult};

pub use channel::{Channel, Source};
pub use filter::{ChannelFilter, ProviderEntry};
pub use recording::{DiskSpace, EdlMark, Recording, RecordingNotice};
pub use timer::{Timer, TimerType};
pub use epg::{EpgEvent, EpgNotice, EpgThrottle};
pub use scan::{ScanEvent, ScanObserver, ScanParams, ScanUpdate};

pub use context::SharedContext;
pub use command::{Command, Request};
pub use queue::{command_queue, CommandQueue, CommandReceiver};
pub use observer::StatusObserver;
pub use backend::Backend;
pub use session::Session;
pub use engine::{Engine, EngineConfig, Flow};
pub use connection::{Connection, ConnectionHandle};
