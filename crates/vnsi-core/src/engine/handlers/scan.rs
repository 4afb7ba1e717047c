//! Channel scan control.

use std::sync::Arc;

use tracing::{info, warn};
use vnsi_protocol::{PacketReader, ResponsePacket};

use crate::backend::Scanner;
use crate::engine::Engine;
use crate::error::{HandlerError, HandlerResult};
use crate::scan::{ScanListEntry, ScanObserver, ScanParams};

impl Engine {
    pub(crate) fn scan_supported(&mut self) -> HandlerResult<()> {
        self.scanner().map(|_| ())
    }

    pub(crate) fn scan_supported_types(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        resp.add_u32(self.scanner()?.supported_types());
        Ok(())
    }

    pub(crate) fn scan_countries(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        write_entries(resp, &self.scanner()?.countries());
        Ok(())
    }

    pub(crate) fn scan_satellites(&mut self, resp: &mut ResponsePacket) -> HandlerResult<()> {
        write_entries(resp, &self.scanner()?.satellites());
        Ok(())
    }

    pub(crate) fn scan_start(&mut self, args: &mut PacketReader) -> HandlerResult<()> {
        let params = ScanParams {
            source_type: args.extract_u32()?,
            tv: args.extract_bool()?,
            radio: args.extract_bool()?,
            fta: args.extract_bool()?,
            scrambled: args.extract_bool()?,
            hd: args.extract_bool()?,
            country: args.extract_u32()?,
            dvbc_inversion: args.extract_u32()?,
            dvbc_symbolrate: args.extract_u32()?,
            dvbc_qam: args.extract_u32()?,
            satellite: args.extract_u32()?,
            atsc_type: args.extract_u32()?,
        };

        if self.scan.is_active() {
            return Err(HandlerError::precondition("scan already running"));
        }
        let scanner = self.scanner()?;

        if !self.ctx.try_begin_inhibit() {
            return Err(HandlerError::Policy("data updates are inhibited".into()));
        }

        let generation = self.scan.next_generation();
        let observer = ScanObserver::new(self.queue.clone(), generation);
        if let Err(err) = scanner.start(params, observer) {
            self.ctx.set_inhibit_data_updates(false);
            warn!(error = %err, "scanner refused to start");
            return Err(HandlerError::Device(err.to_string()));
        }

        self.scan.activate(generation);
        info!(generation, source = params.source_type, "scan started");
        Ok(())
    }

    pub(crate) fn scan_stop(&mut self) -> HandlerResult<()> {
        if !self.scan.deactivate() {
            return Err(HandlerError::precondition("no scan running"));
        }
        if let Some(scanner) = &self.backend.scanner {
            scanner.stop();
        }
        self.ctx.set_inhibit_data_updates(false);
        info!("scan stopped");
        Ok(())
    }

    fn scanner(&self) -> HandlerResult<Arc<dyn Scanner>> {
        self.backend
            .scanner
            .clone()
            .ok_or(HandlerError::NotSupported)
    }
}

fn write_entries(resp: &mut ResponsePacket, entries: &[ScanListEntry]) {
    for entry in entries {
        resp.add_u32(entry.index)
            .add_string(&entry.short_name)
            .add_string(&entry.long_name);
    }
}
