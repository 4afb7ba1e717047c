//! Shared types for the VNSI TCP server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vnsi_core::{ClientId, ConnectionHandle};

/// Registry of connected clients and the handles that feed their queues.
///
/// A plain `std` lock: backend notifications reach the registry from
/// synchronous observer callbacks, which may run on a runtime thread.
pub type ClientRegistry = Arc<RwLock<HashMap<ClientId, ConnectionHandle>>>;

pub fn new_registry() -> ClientRegistry {
    Arc::new(RwLock::new(HashMap::new()))
}

pub(crate) fn read_registry(
    clients: &ClientRegistry,
) -> RwLockReadGuard<'_, HashMap<ClientId, ConnectionHandle>> {
    clients.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_registry(
    clients: &ClientRegistry,
) -> RwLockWriteGuard<'_, HashMap<ClientId, ConnectionHandle>> {
    clients.write().unwrap_or_else(PoisonError::into_inner)
}
