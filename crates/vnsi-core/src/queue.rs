//! Per-connection command queue.
//!
//! Multi-producer, single-consumer FIFO on top of a tokio unbounded
//! channel:
//! - `CommandQueue` (cloneable) is held by the connection handle, status
//!   observers and scan observers.
//! - `CommandReceiver` is owned by the dispatch task.
//!
//! `close()` marks the queue closed and pushes a `Command::Shutdown`
//! sentinel so a parked consumer wakes up. Later enqueues are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::command::Command;

#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<Command>,
    closed: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
    closed: Arc<AtomicBool>,
}

/// Create a connected queue / receiver pair.
pub fn command_queue() -> (CommandQueue, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    (
        CommandQueue {
            tx,
            closed: Arc::clone(&closed),
        },
        CommandReceiver { rx, closed },
    )
}

impl CommandQueue {
    /// Append `cmd`. Returns `false` if the queue is closed.
    pub fn enqueue(&self, cmd: Command) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(cmd).is_ok()
    }

    /// Close the queue. Returns `true` for the call that closed it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Receiver may already be gone; nothing left to wake then.
        let _ = self.tx.send(Command::Shutdown);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl CommandReceiver {
    /// Next command, or `None` once the queue is closed.
    pub async fn dequeue(&mut self) -> Option<Command> {
        if self.is_closed() {
            return None;
        }
        match self.rx.recv().await {
            None | Some(Command::Shutdown) => None,
            Some(cmd) => Some(cmd),
        }
    }

    /// Non-blocking variant of [`dequeue`](Self::dequeue).
    pub fn try_dequeue(&mut self) -> Option<Command> {
        if self.is_closed() {
            return None;
        }
        match self.rx.try_recv() {
            Ok(Command::Shutdown) | Err(_) => None,
            Ok(cmd) => Some(cmd),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Discard everything still queued. Returns the number dropped.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(cmd) = self.rx.try_recv() {
            if cmd != Command::Shutdown {
                dropped += 1;
            }
        }
        dropped
    }
}
