//! Double-buffer swap controller
//!
//! A ring of N >= 2 command queues for one command family. The submitting
//! thread records into `submit_index()`, the render thread pumps
//! `process_index()`. Both advance by one (mod N) on `swap()`, which only
//! happens while the render thread is parked in `Pend`, so the two roles never
//! land on the same queue at the same time.
//!
//! Each queue sits in its own mutex. The protocol keeps every mutex
//! uncontended; a contended lock means two threads touched the same queue and
//! is raised as a fatal assertion rather than waited on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use super::command_queue::CommandQueue;
use crate::{engine_assert, engine_fatal};

pub struct QueueRing {
    family: &'static str,
    queues: Vec<Mutex<CommandQueue>>,
    submit_index: AtomicUsize,
}

impl QueueRing {
    /// Create `count` queues of `capacity` bytes each
    ///
    /// Initial indices are submit = 0, process = 1.
    pub fn new(family: &'static str, count: usize, capacity: usize) -> Self {
        let count = if engine_assert!(
            count >= 2,
            "relay3d::QueueRing",
            "{} family needs at least 2 queues, got {}",
            family,
            count
        ) {
            count
        } else {
            2
        };

        let queues = (0..count)
            .map(|index| Mutex::new(CommandQueue::new(format!("{}[{}]", family, index), capacity)))
            .collect();

        Self {
            family,
            queues,
            submit_index: AtomicUsize::new(0),
        }
    }

    /// Family name ("render" or "object")
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Number of queues in the ring
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queue currently receiving new commands
    pub fn submit_index(&self) -> usize {
        self.submit_index.load(Ordering::Acquire)
    }

    /// Queue the render thread pumps this frame
    pub fn process_index(&self) -> usize {
        (self.submit_index() + 1) % self.queues.len()
    }

    /// Advance both indices by one
    ///
    /// Must only be called while the render thread is not pumping.
    pub fn swap(&self) {
        let next = (self.submit_index() + 1) % self.queues.len();
        self.submit_index.store(next, Ordering::Release);
    }

    /// Record a closure into the submit queue
    pub fn record<F: FnOnce() + Send + 'static>(&self, command: F) -> bool {
        let index = self.submit_index();
        match self.with_queue(index, move |queue| queue.try_record(command)) {
            Some(Ok(())) => true,
            // A rejected command is dropped here, after the queue lock is released
            _ => false,
        }
    }

    /// Pump the process queue; returns the number of executed commands
    pub fn pump_process(&self) -> usize {
        let index = self.process_index();
        self.with_queue(index, |queue| queue.pump()).unwrap_or(0)
    }

    /// Pump a specific queue
    pub fn pump_queue(&self, index: usize) -> usize {
        self.with_queue(index, |queue| queue.pump()).unwrap_or(0)
    }

    /// Commands waiting in each queue, by index
    ///
    /// Observational; a queue that is being pumped at that moment counts as
    /// empty.
    pub fn command_counts(&self) -> Vec<usize> {
        self.queues
            .iter()
            .map(|queue| match queue.try_lock() {
                Ok(queue) => queue.command_count(),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().command_count(),
                Err(TryLockError::WouldBlock) => 0,
            })
            .collect()
    }

    /// Commands waiting across the whole ring
    pub fn pending_commands(&self) -> usize {
        self.command_counts().iter().sum()
    }

    /// Drop every waiting command without executing it
    pub fn clear_all(&self) {
        for index in 0..self.queues.len() {
            self.with_queue(index, |queue| queue.clear());
        }
    }

    /// Run `f` with exclusive access to queue `index`
    ///
    /// Returns `None` if the queue was contended and the fatal handler
    /// returned.
    pub fn with_queue<R>(&self, index: usize, f: impl FnOnce(&mut CommandQueue) -> R) -> Option<R> {
        let mut guard = self.lock(index)?;
        Some(f(&mut guard))
    }

    fn lock(&self, index: usize) -> Option<MutexGuard<'_, CommandQueue>> {
        match self.queues[index].try_lock() {
            Ok(guard) => Some(guard),
            // A command panicked mid-pump; the buffer reset itself on unwind
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                engine_fatal!(
                    "relay3d::QueueRing",
                    "{}[{}] accessed concurrently (submit {}, process {})",
                    self.family,
                    index,
                    self.submit_index(),
                    self.process_index()
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for QueueRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRing")
            .field("family", &self.family)
            .field("len", &self.queues.len())
            .field("submit_index", &self.submit_index())
            .field("process_index", &self.process_index())
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_ring_tests.rs"]
mod tests;
