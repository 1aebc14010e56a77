/*!
# relay3d engine

Render command pipeline for a real-time 3D engine.

The submitting ("game") thread records GPU work as closures into
double-buffered command queues; a dedicated render thread, which owns the
graphics context, replays them once per frame.

## Architecture

- **CommandBuffer / CommandQueue**: fixed-capacity byte arena of type-erased
  closures, replayed in FIFO order
- **QueueRing**: N >= 2 queues per command family with rotating
  submit/process roles
- **RenderThread**: worker thread gated by a Pend/Ready/Busy/Dead handshake
- **Renderer**: the public entry point that drives the frame protocol
- **GraphicsDevice**: the backend seam; `MockDevice` records calls for tests
- **Resources**: `Texture`, `Shader`, `VertexBuffer`, `IndexBuffer`,
  `VertexArray`, created and deleted through the object command family
*/

// Internal modules
mod error;
mod engine;
mod fatal;
pub mod log;
pub mod command;
pub mod graphics;
pub mod render_thread;
pub mod renderer;
pub mod resource;
pub mod utils;

// Main relay3d namespace module
pub mod relay3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Diagnostics hub
    pub use crate::engine::Engine;

    // Fatal assertion handling
    pub use crate::fatal::{DefaultFatalHandler, FatalHandler, FatalReport};

    // Renderer facade
    pub use crate::renderer::{Renderer, RendererConfig, RendererStats, VertexCount, WeakRenderer};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Command recording sub-module
    pub mod command {
        pub use crate::command::*;
        pub use crate::render_thread::{RenderThread, RenderThreadState};
    }

    // Device abstraction sub-module
    pub mod graphics {
        pub use crate::graphics::*;
    }

    // Render sub-module
    pub mod render {
        pub use crate::renderer::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }
}

// Re-export math library at crate root
pub use glam;
