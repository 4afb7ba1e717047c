//! Process-wide state shared by all connections.
//!
//! One `SharedContext` is created by the server and handed to every engine
//! as an `Arc`. Tests create their own.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::filter::ChannelFilter;
use crate::setup::Setup;

#[derive(Debug, Default)]
pub struct SharedContext {
    /// Set while a channel scan runs anywhere in the process.
    inhibit_data_updates: AtomicBool,
    /// Serializes timer handlers across connections.
    timer_lock: Mutex<()>,
    channel_filter: RwLock<ChannelFilter>,
    setup: RwLock<Setup>,
    next_socket_handle: AtomicU32,
}

impl SharedContext {
    pub fn new() -> Self {
        SharedContext::default()
    }

    pub fn data_updates_inhibited(&self) -> bool {
        self.inhibit_data_updates.load(Ordering::Acquire)
    }

    pub fn set_inhibit_data_updates(&self, on: bool) {
        self.inhibit_data_updates.store(on, Ordering::Release);
    }

    /// Set the flag if it is clear. Returns `false` if it was already set.
    pub fn try_begin_inhibit(&self) -> bool {
        self.inhibit_data_updates
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn lock_timers(&self) -> MutexGuard<'_, ()> {
        self.timer_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn channel_filter(&self) -> RwLockReadGuard<'_, ChannelFilter> {
        self.channel_filter
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn channel_filter_mut(&self) -> RwLockWriteGuard<'_, ChannelFilter> {
        self.channel_filter
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn setup(&self) -> RwLockReadGuard<'_, Setup> {
        self.setup
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn setup_mut(&self) -> RwLockWriteGuard<'_, Setup> {
        self.setup
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fresh auxiliary socket handle, never 0.
    pub fn allocate_socket_handle(&self) -> u32 {
        let bump = |n: u32| n.wrapping_add(1).max(1);
        let prev = self
            .next_socket_handle
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(bump(n)))
            .unwrap_or_else(|n| n);
        bump(prev)
    }
}
