//! Running engines.
//!
//! [`Connection::spawn`] moves an [`Engine`] onto its own tokio task that
//! drains the command queue until the queue is closed or the engine asks
//! to stop. Everything else talks to the task through a cloneable
//! [`ConnectionHandle`]:
//! - the transport reader delivers decoded requests
//! - the status hub forwards backend notifications (`StatusObserver`)
//! - the server shuts the connection down

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

use crate::backend::Backend;
use crate::command::{Command, Request};
use crate::context::SharedContext;
use crate::engine::{Engine, EngineConfig, Flow};
use crate::epg::EpgNotice;
use crate::observer::StatusObserver;
use crate::queue::{command_queue, CommandQueue, CommandReceiver};
use crate::recording::RecordingNotice;
use crate::types::{ChannelUid, ClientId, OutboundTx};

#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ClientId,
    queue: CommandQueue,
}

impl ConnectionHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Returns `false` once the connection is closing.
    pub fn deliver_request(&self, request: Request) -> bool {
        self.queue.enqueue(Command::IncomingRequest(request))
    }

    pub fn report_transport_error(&self, reason: impl Into<String>) {
        self.queue.enqueue(Command::TransportError(reason.into()));
    }

    /// Ask the dispatch task to stop. Returns `true` for the first call.
    pub fn shutdown(&self) -> bool {
        self.queue.close()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl StatusObserver for ConnectionHandle {
    fn channels_change(&self) {
        self.queue.enqueue(Command::ChannelListChanged);
    }

    fn recordings_change(&self) {
        self.queue.enqueue(Command::RecordingListChanged);
    }

    fn signal_timer_change(&self) {
        self.queue.enqueue(Command::TimerOrSignalChanged);
    }

    fn epg_change(&self, notice: EpgNotice) {
        self.queue.enqueue(Command::EpgChanged(notice));
    }

    fn recording(&self, notice: RecordingNotice) {
        self.queue.enqueue(Command::RecordingChanged(notice));
    }

    fn osd_status_message(&self, text: &str) {
        self.queue.enqueue(Command::OsdMessage(text.to_string()));
    }

    fn channel_change(&self, uid: ChannelUid) {
        self.queue.enqueue(Command::ChannelChanged(uid));
    }
}

pub struct Connection {
    handle: ConnectionHandle,
    task: JoinHandle<()>,
}

impl Connection {
    /// Start the dispatch task for client `id`. Outbound packets go to `out`.
    pub fn spawn(
        id: ClientId,
        addr: impl Into<String>,
        config: EngineConfig,
        ctx: Arc<SharedContext>,
        backend: Backend,
        out: OutboundTx,
    ) -> Connection {
        let addr = addr.into();
        let (queue, rx) = command_queue();
        let engine = Engine::new(id, config, ctx, backend, queue.clone(), out)
            .with_client_addr(addr.clone());

        let span = info_span!("client", id = id.0, addr = %addr);
        let task = tokio::spawn(run_dispatch_loop(engine, rx).instrument(span));

        Connection {
            handle: ConnectionHandle { id, queue },
            task,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Wait for the dispatch task to finish.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            tracing::error!(client = self.handle.id.0, error = %err, "dispatch task failed");
        }
    }

    /// Close the queue and wait for teardown.
    pub async fn shutdown(self) {
        self.handle.shutdown();
        self.join().await;
    }
}

async fn run_dispatch_loop(mut engine: Engine, mut rx: CommandReceiver) {
    info!("connection started");

    while let Some(cmd) = rx.dequeue().await {
        if engine.handle(cmd) == Flow::Stop {
            break;
        }
    }

    engine.teardown();
    let dropped = rx.drain();
    if dropped > 0 {
        debug!(dropped, "discarded queued commands");
    }

    info!("connection closed");
}
