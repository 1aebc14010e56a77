//! Error types for the relay3d engine
//!
//! Recoverable failures only: lifecycle operations (init, thread shutdown)
//! and device calls that can fail for environmental reasons. Protocol
//! violations inside the command pipeline are fatal assertions instead
//! (see `fatal.rs`).

use std::fmt;

/// Result type for relay3d engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// relay3d engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (GL driver, context, device)
    BackendError(String),

    /// Invalid resource (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (renderer, render thread, device)
    InitializationFailed(String),

    /// The render thread could not be spawned, or it terminated abnormally
    RenderThread(String),

    /// A configuration value is out of range
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::RenderThread(msg) => write!(f, "Render thread error: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error and build an `Error::BackendError` from the same message
///
/// # Example
///
/// ```ignore
/// let err = engine_err!("relay3d::Renderer", "queue {} missing", idx);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::relay3d::Error::BackendError(message)
    }};
}

/// Log an error and return early with `Err(Error::BackendError(..))`
///
/// # Example
///
/// ```ignore
/// if width == 0 {
///     engine_bail!("relay3d::Texture", "zero width texture '{}'", name);
/// }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
