/// Renderer module - the façade over the command pipeline

pub mod config;
pub mod renderer;
pub mod stats;

pub use config::RendererConfig;
pub use renderer::{Renderer, VertexCount, WeakRenderer, VIEW_PROJECTION_UNIFORM};
pub use stats::RendererStats;
