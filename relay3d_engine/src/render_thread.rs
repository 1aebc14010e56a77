/// Render thread - dedicated worker owning the graphics context
///
/// The submitting thread and the worker coordinate through a four-state
/// handshake guarded by one mutex and one condition variable:
///
/// ```text
///   run()          worker idle      swap_and_start()    worker pumps
/// Dead -> Busy ----------------> Pend ---------------> Ready -> Busy -> Pend ...
///                                                                    stop() -> Dead
/// ```
///
/// Every waiter blocks until the state it waits for is reached or the thread
/// stops being active, so a dead worker never leaves anyone hanging.

use std::any::Any;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::{engine_debug, engine_error, engine_warn};

// ===== STATE =====

/// Handshake state of the render thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderThreadState {
    /// Idle, waiting for the next frame
    Pend,
    /// Running (initializing or pumping)
    Busy,
    /// A frame has been handed over; the worker should start pumping
    Ready,
    /// Not running
    Dead,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    state: RenderThreadState,
    active: bool,
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Token of the `RenderThread` this OS thread works for, 0 if none
    static WORKER_OF: Cell<u64> = const { Cell::new(0) };
}

struct Handshake {
    status: Mutex<Status>,
    changed: Condvar,
}

impl Handshake {
    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut Status)) {
        let mut status = self.lock();
        f(&mut status);
        self.changed.notify_all();
    }
}

/// Marks the worker dead on exit, including exit by panic
struct WorkerExit {
    handshake: Arc<Handshake>,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        if thread::panicking() {
            engine_error!("relay3d::RenderThread", "Render thread panicked; marking it dead");
        }
        self.handshake.update(|status| {
            status.active = false;
            status.state = RenderThreadState::Dead;
        });
    }
}

// ===== RENDER THREAD =====

/// Dedicated worker thread with a Pend/Busy/Ready/Dead handshake
pub struct RenderThread {
    name: String,
    token: u64,
    handshake: Arc<Handshake>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RenderThread {
    /// Create a render thread handle; the worker is not started yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            handshake: Arc::new(Handshake {
                status: Mutex::new(Status {
                    state: RenderThreadState::Dead,
                    active: false,
                }),
                changed: Condvar::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Thread name given to the worker
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mark active, set `Busy` and spawn the worker running `entry`
    ///
    /// The caller must have released the graphics context beforehand so the
    /// worker can acquire it.
    pub fn run<F>(&self, entry: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() {
            return Err(Error::RenderThread(format!("{} is already running", self.name)));
        }

        self.handshake.update(|status| {
            status.active = true;
            status.state = RenderThreadState::Busy;
        });

        let handshake = self.handshake.clone();
        let token = self.token;
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                WORKER_OF.with(|worker| worker.set(token));
                let _exit = WorkerExit { handshake };
                entry();
            });

        match spawned {
            Ok(join) => {
                engine_debug!("relay3d::RenderThread", "Spawned {}", self.name);
                *handle = Some(join);
                Ok(())
            }
            Err(err) => {
                self.handshake.update(|status| {
                    status.active = false;
                    status.state = RenderThreadState::Dead;
                });
                Err(Error::RenderThread(format!("failed to spawn {}: {}", self.name, err)))
            }
        }
    }

    /// Block until `state == target` or the thread is no longer active
    ///
    /// Returns the state observed on wake-up.
    pub fn wait_for_state(&self, target: RenderThreadState) -> RenderThreadState {
        let status = self.handshake.lock();
        let status = self
            .handshake
            .changed
            .wait_while(status, |s| s.state != target && s.active)
            .unwrap_or_else(PoisonError::into_inner);
        status.state
    }

    /// Same as `wait_for_state`, giving up after `timeout`
    ///
    /// Returns `None` on timeout.
    pub fn wait_for_state_timeout(
        &self,
        target: RenderThreadState,
        timeout: Duration,
    ) -> Option<RenderThreadState> {
        let status = self.handshake.lock();
        let (status, result) = self
            .handshake
            .changed
            .wait_timeout_while(status, timeout, |s| s.state != target && s.active)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            None
        } else {
            Some(status.state)
        }
    }

    /// Set the state and wake every waiter
    pub fn set_state(&self, state: RenderThreadState) {
        self.handshake.update(|status| status.state = state);
    }

    /// Current state
    pub fn state(&self) -> RenderThreadState {
        self.handshake.lock().state
    }

    /// Whether the worker is (still) supposed to run
    pub fn is_active(&self) -> bool {
        self.handshake.lock().active
    }

    /// Whether the caller is the worker thread
    ///
    /// Lock-free: reads a thread-local set when the worker starts.
    pub fn is_current_thread(&self) -> bool {
        WORKER_OF.with(|worker| worker.get() == self.token)
    }

    /// Deactivate, set `Dead` and wake everyone, without joining
    ///
    /// The only way for the worker to end its own loop.
    pub fn deactivate(&self) {
        self.handshake.update(|status| {
            status.active = false;
            status.state = RenderThreadState::Dead;
        });
    }

    /// Deactivate, set `Dead`, wake everyone and join the worker
    ///
    /// Idempotent. Returns `Error::RenderThread` if the worker panicked or if
    /// called from the worker itself.
    pub fn stop(&self) -> Result<()> {
        if self.is_current_thread() {
            return Err(Error::RenderThread(format!("{} cannot stop itself", self.name)));
        }

        self.deactivate();

        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            return Ok(());
        };

        match handle.join() {
            Ok(()) => {
                engine_debug!("relay3d::RenderThread", "Joined {}", self.name);
                Ok(())
            }
            Err(payload) => Err(Error::RenderThread(format!(
                "{} panicked: {}",
                self.name,
                panic_message(payload.as_ref())
            ))),
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        let running = self
            .handle
            .get_mut()
            .map(|handle| handle.is_some())
            .unwrap_or(false);
        // Dropped by the worker itself: it is exiting, leave it detached
        if running && !self.is_current_thread() {
            if let Err(err) = self.stop() {
                engine_warn!("relay3d::RenderThread", "Stopping on drop: {}", err);
            }
        }
    }
}

impl std::fmt::Debug for RenderThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = *self.handshake.lock();
        f.debug_struct("RenderThread")
            .field("name", &self.name)
            .field("state", &status.state)
            .field("active", &status.active)
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "render_thread_tests.rs"]
mod tests;
