//! Command recording and replay
//!
//! Commands are `FnOnce() + Send + 'static` closures serialized into a
//! fixed-size byte arena and replayed, in recording order, on the render
//! thread.

pub mod command_buffer;
pub mod command_queue;
pub mod queue_ring;

pub use command_buffer::{CommandBuffer, CommandFn, Trampolines};
pub use command_queue::CommandQueue;
pub use queue_ring::QueueRing;
