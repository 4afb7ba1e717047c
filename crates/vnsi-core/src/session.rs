//! Stream session of one connection.
//!
//! A connection streams at most one thing at a time: a live channel or a
//! recording. `Session` is the only owner of the stream resources, so
//! leaving a state always releases what it held.

use std::fmt;

use crate::backend::{LiveStream, RecordingPlayer};
use crate::error::{HandlerError, HandlerResult};
use crate::types::{ChannelUid, RecordingId};

pub struct LiveSession {
    pub channel_uid: ChannelUid,
    pub stream: Box<dyn LiveStream>,
}

pub struct RecordingSession {
    pub recording_id: RecordingId,
    pub player: Box<dyn RecordingPlayer>,
}

#[derive(Default)]
pub enum Session {
    #[default]
    Idle,
    Live(LiveSession),
    Recording(RecordingSession),
}

impl Session {
    pub fn is_idle(&self) -> bool {
        matches!(self, Session::Idle)
    }

    /// Fails unless idle; the current session is left untouched.
    pub fn ensure_idle(&self) -> HandlerResult<()> {
        match self {
            Session::Idle => Ok(()),
            Session::Live(live) => Err(HandlerError::precondition(format!(
                "live stream on channel {} is open",
                live.channel_uid
            ))),
            Session::Recording(rec) => Err(HandlerError::precondition(format!(
                "recording {} is open",
                rec.recording_id
            ))),
        }
    }

    pub fn begin_live(&mut self, live: LiveSession) -> HandlerResult<()> {
        self.ensure_idle()?;
        *self = Session::Live(live);
        Ok(())
    }

    pub fn begin_recording(&mut self, rec: RecordingSession) -> HandlerResult<()> {
        self.ensure_idle()?;
        *self = Session::Recording(rec);
        Ok(())
    }

    /// Stop whatever runs and return to idle. Returns `true` if something
    /// was stopped.
    pub fn end(&mut self) -> bool {
        match std::mem::take(self) {
            Session::Idle => false,
            Session::Live(mut live) => {
                live.stream.stop();
                true
            }
            Session::Recording(mut rec) => {
                rec.player.close();
                true
            }
        }
    }

    pub fn live_mut(&mut self) -> HandlerResult<&mut LiveSession> {
        match self {
            Session::Live(live) => Ok(live),
            _ => Err(HandlerError::precondition("no live stream open")),
        }
    }

    pub fn recording_mut(&mut self) -> HandlerResult<&mut RecordingSession> {
        match self {
            Session::Recording(rec) => Ok(rec),
            _ => Err(HandlerError::precondition("no recording open")),
        }
    }

    pub fn live_channel(&self) -> Option<ChannelUid> {
        match self {
            Session::Live(live) => Some(live.channel_uid),
            _ => None,
        }
    }

    pub fn playing_recording(&self) -> Option<RecordingId> {
        match self {
            Session::Recording(rec) => Some(rec.recording_id),
            _ => None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Idle => write!(f, "Idle"),
            Session::Live(live) => write!(f, "Live(channel {})", live.channel_uid),
            Session::Recording(rec) => write!(f, "Recording({})", rec.recording_id),
        }
    }
}
