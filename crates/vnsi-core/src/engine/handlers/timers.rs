//! Timers. Every handler holds the shared timer lock for its whole body.

use std::sync::Arc;

use tracing::info;
use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};
use crate::timer::{Timer, TimerType};
use crate::types::TimerId;

impl Engine {
    pub(crate) fn timer_count(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _timers = ctx.lock_timers();

        resp.add_u32(self.backend.timers.timers().len() as u32);
        Ok(())
    }

    pub(crate) fn timer_get(
        &mut self,
        args: &mut PacketReader,
        resp: &mut ResponsePacket,
    ) -> HandlerResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _timers = ctx.lock_timers();

        let id = args.extract_u32()?;
        let timer = self
            .backend
            .timers
            .timer(id)
            .ok_or_else(|| HandlerError::not_found(format!("timer {id}")))?;
        write_timer(resp, &timer);
        Ok(())
    }

    pub(crate) fn timer_list(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _timers = ctx.lock_timers();

        let timers = self.backend.timers.timers();
        resp.add_u32(timers.len() as u32);
        for timer in &timers {
            write_timer(resp, timer);
        }
        Ok(())
    }

    pub(crate) fn timer_add(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _timers = ctx.lock_timers();

        let timer = read_timer(args, 0)?;
        self.validate_timer(&timer)?;

        let id = self.backend.timers.add(timer)?;
        info!(timer = id, "timer added");
        Ok(())
    }

    pub(crate) fn timer_delete(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _timers = ctx.lock_timers();

        let id = args.extract_u32()?;
        let force = args.extract_u32()? != 0;

        let timer = self
            .backend
            .timers
            .timer(id)
            .ok_or_else(|| HandlerError::not_found(format!("timer {id}")))?;
        if timer.is_recording() && !force {
            return Err(HandlerError::Busy(format!("timer {id} is recording")));
        }

        self.backend.timers.delete(id)?;
        info!(timer = id, force, "timer deleted");
        Ok(())
    }

    pub(crate) fn timer_update(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _timers = ctx.lock_timers();

        let id = args.extract_u32()?;
        let timer = read_timer(args, id)?;

        if self.backend.timers.timer(id).is_none() {
            return Err(HandlerError::not_found(format!("timer {id}")));
        }
        self.validate_timer(&timer)?;

        self.backend.timers.update(timer)?;
        info!(timer = id, "timer updated");
        Ok(())
    }

    pub(crate) fn timer_types(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _timers = ctx.lock_timers();

        for kind in self.backend.timers.types() {
            resp.add_u32(kind as u32);
        }
        Ok(())
    }

    fn validate_timer(&self, timer: &Timer) -> HandlerResult<()> {
        if self.backend.channels.channel(timer.channel_uid).is_none() {
            return Err(HandlerError::validation(format!(
                "timer channel {} does not exist",
                timer.channel_uid
            )));
        }
        if timer.stop <= timer.start {
            return Err(HandlerError::validation("timer stops before it starts"));
        }
        Ok(())
    }
}

/// Timer fields after the id.
fn read_timer(args: &mut PacketReader, id: TimerId) -> HandlerResult<Timer> {
    let kind = args.extract_u32()?;
    let kind = TimerType::from_u32(kind)
        .ok_or_else(|| HandlerError::validation(format!("timer type {kind}")))?;

    Ok(Timer {
        id,
        kind,
        flags: args.extract_u32()?,
        priority: args.extract_s32()?,
        lifetime: args.extract_s32()?,
        channel_uid: args.extract_u32()?,
        start: args.extract_u32()?,
        stop: args.extract_u32()?,
        weekdays: args.extract_u32()?,
        title: args.extract_string()?,
        epg_search: args.extract_string()?,
    })
}

fn write_timer(resp: &mut ResponsePacket, timer: &Timer) {
    resp.add_u32(timer.id)
        .add_u32(timer.kind as u32)
        .add_u32(timer.flags)
        .add_s32(timer.priority)
        .add_s32(timer.lifetime)
        .add_u32(timer.channel_uid)
        .add_u32(timer.start)
        .add_u32(timer.stop)
        .add_u32(timer.weekdays)
        .add_string(&timer.title)
        .add_string(&timer.epg_search);
}
