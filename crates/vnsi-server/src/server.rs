//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections, up to `max_clients`.
//! - Assigns each connection a `ClientId`.
//! - Spawns a client task per connection; the client task starts the
//!   connection's dispatch task and pumps bytes in both directions.
//!
//! Backend notifications reach the connections through a [`StatusHub`]
//! over the shared client registry.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use vnsi_core::backend::memory::MemoryBackend;
use vnsi_core::{Backend, ClientId, SharedContext};

use crate::client::{self, ClientContext};
use crate::config::Config;
use crate::error::ServerResult;
use crate::status::StatusHub;
use crate::types::{new_registry, read_registry, ClientRegistry};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_client_id() -> ClientId {
    let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    ClientId(id)
}

/// Number of client tasks alive. A slot is taken on accept, before the
/// client task is spawned, and given back when the task ends.
#[derive(Debug, Clone, Default)]
struct ClientSlots {
    active: Arc<AtomicUsize>,
}

impl ClientSlots {
    fn try_acquire(&self, max: usize) -> Option<ClientSlot> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;
        Some(ClientSlot {
            active: Arc::clone(&self.active),
        })
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

struct ClientSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Run the server on the configured address with the in-memory backend
/// until `shutdown` resolves.
pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, max_clients = config.max_clients, "listening");

    let memory = MemoryBackend::with_demo_data();
    let server = Server::new(config, memory.backend());
    memory.set_observer(Arc::new(server.status_hub()));

    server.serve(listener, shutdown).await
}

/// State shared by every connection of one listener.
pub struct Server {
    config: Config,
    ctx: Arc<SharedContext>,
    backend: Backend,
    clients: ClientRegistry,
    slots: ClientSlots,
}

impl Server {
    pub fn new(config: Config, backend: Backend) -> Self {
        Server {
            config,
            ctx: Arc::new(SharedContext::new()),
            backend,
            clients: new_registry(),
            slots: ClientSlots::default(),
        }
    }

    /// Observer to install on the backend so notifications reach clients.
    pub fn status_hub(&self) -> StatusHub {
        StatusHub::new(self.clients.clone())
    }

    /// Accept connections on `listener` until `shutdown` resolves, then ask
    /// every connected client's engine to close.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => break,
            };

            let Some(slot) = self.slots.try_acquire(self.config.max_clients) else {
                warn!(
                    %peer_addr,
                    max_clients = self.config.max_clients,
                    "rejecting connection: max_clients reached"
                );
                // Dropping the stream closes it.
                continue;
            };

            if let Err(err) = stream.set_nodelay(true) {
                warn!(%peer_addr, error = %err, "cannot disable Nagle");
            }

            let client_id = next_client_id();
            info!(
                client = client_id.0,
                %peer_addr,
                active = self.slots.active(),
                "accepted connection"
            );

            let shared = ClientContext {
                engine: self.config.engine_config(),
                ctx: self.ctx.clone(),
                backend: self.backend.clone(),
                clients: self.clients.clone(),
            };

            tokio::spawn(async move {
                let _slot = slot;
                match client::run_client(client_id, stream, peer_addr, shared).await {
                    Ok(()) => info!(client = client_id.0, "client disconnected"),
                    Err(err) => warn!(client = client_id.0, error = %err, "client error"),
                }
            });
        }

        let handles: Vec<_> = read_registry(&self.clients).values().cloned().collect();
        info!(clients = handles.len(), "shutting down");
        for handle in handles {
            handle.shutdown();
        }
        Ok(())
    }
}
