//! Request handlers, one file per opcode group.
//!
//! Every handler decodes its arguments from the request payload, validates
//! them before touching any state and writes its result fields into the
//! response packet, which already carries `ReturnCode::Ok`. A handler that
//! fails leaves no side effects behind; the dispatcher replaces the
//! response with the error's return code.

mod channels;
mod epg;
mod general;
mod live;
mod osd;
mod recordings;
mod recplay;
mod scan;
mod timers;
