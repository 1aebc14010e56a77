//! Fixed-capacity byte arena of type-erased commands.
//!
//! Each record is laid out as
//!
//! ```text
//! [CommandHeader { execute, discard, payload_size, payload_offset }][pad][payload]
//! ```
//!
//! and starts on `HEADER_ALIGN`. The payload is the recorded closure, moved
//! bitwise into the arena. `execute` moves it back out and calls it, which
//! also drops it; `discard` drops it in place without calling it.
//!
//! The arena is allocated once (zeroed) and never grows. Running out of
//! space is a fatal assertion: the render-critical path never reallocates.

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::{self, NonNull};

use crate::{engine_assert, engine_fatal};

/// Type-erased command entry point; receives a pointer to the payload
pub type CommandFn = unsafe fn(*mut u8);

/// The pair of entry points recorded with each payload
#[derive(Clone, Copy)]
pub struct Trampolines {
    /// Moves the payload out, invokes it, drops it
    pub execute: CommandFn,
    /// Drops the payload in place without invoking it
    pub discard: CommandFn,
}

impl Trampolines {
    /// Trampolines for a closure of type `F`
    pub fn of<F: FnOnce() + Send + 'static>() -> Self {
        Self {
            execute: execute_trampoline::<F>,
            discard: discard_trampoline::<F>,
        }
    }
}

unsafe fn execute_trampoline<F: FnOnce()>(payload: *mut u8) {
    // SAFETY: `payload` holds an initialized F written by `record`; it is
    // read exactly once, after which the bytes are dead.
    let command = unsafe { ptr::read(payload as *mut F) };
    command();
}

unsafe fn discard_trampoline<F>(payload: *mut u8) {
    // SAFETY: same as above; the value is dropped instead of invoked.
    unsafe { ptr::drop_in_place(payload as *mut F) };
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CommandHeader {
    execute: CommandFn,
    discard: CommandFn,
    payload_size: u32,
    /// Distance from the start of the header to the payload
    payload_offset: u32,
}

impl CommandHeader {
    fn record_size(&self) -> usize {
        align_up(self.payload_offset as usize + self.payload_size as usize, HEADER_ALIGN)
    }
}

const HEADER_ALIGN: usize = mem::align_of::<CommandHeader>();

/// Alignment of the arena itself; payloads may not require more
const BUFFER_ALIGN: usize = 64;

const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Fixed-capacity arena of recorded commands
pub struct CommandBuffer {
    base: NonNull<u8>,
    capacity: usize,
    /// Write cursor; equals the number of used bytes
    cursor: usize,
    count: usize,
    peak_used: usize,
}

// SAFETY: every payload recorded through `record` is `Send` (enforced by
// `Trampolines::of`), and `slot` callers take on the same obligation.
unsafe impl Send for CommandBuffer {}

impl CommandBuffer {
    /// Bytes taken by a record header
    pub const HEADER_SIZE: usize = mem::size_of::<CommandHeader>();

    /// Smallest accepted capacity
    pub const MIN_CAPACITY: usize = 64;

    /// Largest payload alignment a command may require
    pub const MAX_PAYLOAD_ALIGN: usize = BUFFER_ALIGN;

    /// Allocate a zeroed arena of `capacity` bytes
    ///
    /// `capacity` must be a power of two of at least `MIN_CAPACITY`. Anything
    /// else is a fatal assertion; if the fatal handler returns, the capacity
    /// is rounded up to the next valid size.
    pub fn new(capacity: usize) -> Self {
        let valid = capacity.is_power_of_two() && capacity >= Self::MIN_CAPACITY;
        let capacity = if engine_assert!(
            valid,
            "relay3d::CommandBuffer",
            "capacity {} is not a power of two >= {}",
            capacity,
            Self::MIN_CAPACITY
        ) {
            capacity
        } else {
            capacity.max(Self::MIN_CAPACITY).next_power_of_two()
        };

        let layout = Self::layout(capacity);
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let base = match NonNull::new(raw) {
            Some(base) => base,
            None => alloc::handle_alloc_error(layout),
        };

        Self {
            base,
            capacity,
            cursor: 0,
            count: 0,
            peak_used: 0,
        }
    }

    fn layout(capacity: usize) -> Layout {
        match Layout::from_size_align(capacity, BUFFER_ALIGN) {
            Ok(layout) => layout,
            Err(_) => alloc::handle_alloc_error(
                Layout::new::<[u8; BUFFER_ALIGN]>(),
            ),
        }
    }

    /// Total arena size in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes used by recorded commands
    pub fn used_bytes(&self) -> usize {
        self.cursor
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// Highest `used_bytes()` seen since construction
    pub fn peak_used_bytes(&self) -> usize {
        self.peak_used
    }

    /// Number of recorded, not yet executed commands
    pub fn command_count(&self) -> usize {
        self.count
    }

    /// Whether no commands are recorded
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes a payload of `size`/`align` would take if recorded now
    pub fn encoded_size_for(&self, size: usize, align: usize) -> usize {
        let payload_start = align_up(self.cursor + Self::HEADER_SIZE, align.max(1));
        align_up(payload_start + size, HEADER_ALIGN) - self.cursor
    }

    /// Bytes a closure of type `F` would take if recorded now
    pub fn encoded_size<F>(&self) -> usize {
        self.encoded_size_for(mem::size_of::<F>(), mem::align_of::<F>())
    }

    /// Same as `encoded_size`, inferring `F` from a value
    pub fn encoded_size_of_val<F>(&self, _command: &F) -> usize {
        self.encoded_size::<F>()
    }

    /// Reserve a record and return its payload region
    ///
    /// Returns `None` after a fatal assertion (overflow, unsupported
    /// alignment) if the fatal handler returned; nothing is recorded then.
    ///
    /// # Safety
    ///
    /// Before the buffer is next pumped, cleared or dropped, the caller must
    /// write into the returned region an initialized, `Send` value of exactly
    /// `size` bytes and `align` alignment that `trampolines` were built for.
    pub unsafe fn slot(
        &mut self,
        trampolines: Trampolines,
        size: usize,
        align: usize,
    ) -> Option<NonNull<u8>> {
        if !engine_assert!(
            align.is_power_of_two() && align <= Self::MAX_PAYLOAD_ALIGN,
            "relay3d::CommandBuffer",
            "payload alignment {} unsupported (max {})",
            align,
            Self::MAX_PAYLOAD_ALIGN
        ) {
            return None;
        }
        if !engine_assert!(
            size <= u32::MAX as usize,
            "relay3d::CommandBuffer",
            "payload of {} bytes cannot be encoded",
            size
        ) {
            return None;
        }

        let header_start = self.cursor;
        let payload_start = align_up(header_start + Self::HEADER_SIZE, align);
        let record_end = align_up(payload_start + size, HEADER_ALIGN);

        if record_end > self.capacity {
            engine_fatal!(
                "relay3d::CommandBuffer",
                "Command buffer overflow: record of {} bytes with {} of {} bytes free ({} commands queued)",
                record_end - header_start,
                self.remaining(),
                self.capacity,
                self.count
            );
            return None;
        }

        let header = CommandHeader {
            execute: trampolines.execute,
            discard: trampolines.discard,
            payload_size: size as u32,
            payload_offset: (payload_start - header_start) as u32,
        };

        // SAFETY: header_start..record_end lies inside the arena; header_start
        // is HEADER_ALIGN-aligned because every record ends on that alignment
        // and the arena base is BUFFER_ALIGN-aligned.
        let payload = unsafe {
            ptr::write(self.base.as_ptr().add(header_start) as *mut CommandHeader, header);
            NonNull::new_unchecked(self.base.as_ptr().add(payload_start))
        };

        self.cursor = record_end;
        self.count += 1;
        self.peak_used = self.peak_used.max(self.cursor);
        Some(payload)
    }

    /// Record a closure
    ///
    /// Hands the closure back if the record was rejected by a fatal
    /// assertion whose handler returned.
    pub fn try_record<F: FnOnce() + Send + 'static>(&mut self, command: F) -> Result<(), F> {
        // SAFETY: the region returned for F is filled with an F right away.
        let slot = unsafe {
            self.slot(Trampolines::of::<F>(), mem::size_of::<F>(), mem::align_of::<F>())
        };
        match slot {
            Some(payload) => {
                // SAFETY: payload is valid for writes and aligned for F.
                unsafe { ptr::write(payload.as_ptr() as *mut F, command) };
                Ok(())
            }
            None => Err(command),
        }
    }

    /// Record a closure; `false` (closure dropped unexecuted) if rejected
    pub fn record<F: FnOnce() + Send + 'static>(&mut self, command: F) -> bool {
        self.try_record(command).is_ok()
    }

    /// Execute every recorded command in recording order, then reset
    ///
    /// Returns the number of commands executed. Pumping an empty buffer is a
    /// no-op. If a command panics, the commands after it are dropped without
    /// running and the buffer is still reset before the panic propagates.
    pub fn pump(&mut self) -> usize {
        let mut pump = Pump {
            remaining: self.count,
            offset: 0,
            executed: 0,
            buffer: self,
        };

        while pump.remaining > 0 {
            // SAFETY: `offset` always points at the next record header
            // written by `slot`, and `remaining` counts the records after it.
            unsafe {
                let record = pump.buffer.base.as_ptr().add(pump.offset);
                let header = ptr::read(record as *const CommandHeader);
                pump.offset += header.record_size();
                pump.remaining -= 1;
                pump.executed += 1;
                (header.execute)(record.add(header.payload_offset as usize));
            }
        }

        pump.executed
    }

    /// Drop every recorded command without executing it, then reset
    pub fn clear(&mut self) {
        drop(Pump {
            remaining: self.count,
            offset: 0,
            executed: 0,
            buffer: self,
        });
    }
}

/// Walk state of a pump; discards what was not executed and resets on drop
struct Pump<'a> {
    buffer: &'a mut CommandBuffer,
    offset: usize,
    remaining: usize,
    executed: usize,
}

impl Drop for Pump<'_> {
    fn drop(&mut self) {
        while self.remaining > 0 {
            // SAFETY: as in `CommandBuffer::pump`; these records were never
            // moved out.
            unsafe {
                let record = self.buffer.base.as_ptr().add(self.offset);
                let header = ptr::read(record as *const CommandHeader);
                self.offset += header.record_size();
                self.remaining -= 1;
                (header.discard)(record.add(header.payload_offset as usize));
            }
        }
        self.buffer.cursor = 0;
        self.buffer.count = 0;
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: allocated in `new` with the same layout.
        unsafe { alloc::dealloc(self.base.as_ptr(), Self::layout(self.capacity)) };
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("capacity", &self.capacity)
            .field("used_bytes", &self.cursor)
            .field("command_count", &self.count)
            .finish()
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
