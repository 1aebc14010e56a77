//! Fatal assertions
//!
//! Command buffer overflow, context acquisition failure, shader compile
//! failure and handshake misuse are programming or asset defects, not
//! runtime transients. They are reported through `engine_assert!` /
//! `engine_fatal!`, which log a source-located error and then hand a
//! `FatalReport` to the installed `FatalHandler`.
//!
//! The default handler panics. On the render thread that panic marks the
//! thread dead, which in turn halts the submitting thread at its next
//! handshake. Tests install a handler that records reports instead; call
//! sites must then leave their data structures untouched when the handler
//! returns.

/// A fatal assertion, as handed to the `FatalHandler`
#[derive(Debug, Clone)]
pub struct FatalReport {
    /// Source component (e.g., "relay3d::CommandBuffer")
    pub source: String,

    /// Assertion message
    pub message: String,

    /// Source file of the assertion
    pub file: &'static str,

    /// Source line of the assertion
    pub line: u32,
}

/// Reaction to a fatal assertion
///
/// # Example
///
/// ```no_run
/// use relay3d_engine::relay3d::{Engine, FatalHandler, FatalReport};
///
/// struct AbortHandler;
///
/// impl FatalHandler for AbortHandler {
///     fn on_fatal(&self, _report: &FatalReport) {
///         std::process::abort();
///     }
/// }
///
/// Engine::set_fatal_handler(AbortHandler);
/// ```
pub trait FatalHandler: Send + Sync {
    /// Handle a fatal assertion
    ///
    /// Returning normally is allowed; the caller then skips the operation
    /// that triggered the assertion.
    fn on_fatal(&self, report: &FatalReport);
}

/// Default fatal handler: panics with the report message
pub struct DefaultFatalHandler;

impl FatalHandler for DefaultFatalHandler {
    fn on_fatal(&self, report: &FatalReport) {
        panic!(
            "[{}] fatal: {} ({}:{})",
            report.source, report.message, report.file, report.line
        );
    }
}

// ===== FATAL MACROS =====

/// Raise a fatal assertion unconditionally
///
/// # Example
///
/// ```ignore
/// engine_fatal!("relay3d::RenderThread", "failed to acquire context: {}", err);
/// ```
#[macro_export]
macro_rules! engine_fatal {
    ($source:expr, $($arg:tt)*) => {
        $crate::relay3d::Engine::fatal(
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Raise a fatal assertion when `cond` does not hold
///
/// Evaluates to `true` when the condition held, so call sites can skip
/// their work if a non-panicking handler returned.
///
/// # Example
///
/// ```ignore
/// if !engine_assert!(used + size <= capacity, "relay3d::CommandBuffer", "overflow") {
///     return None;
/// }
/// ```
#[macro_export]
macro_rules! engine_assert {
    ($cond:expr, $source:expr, $($arg:tt)*) => {{
        let ok: bool = $cond;
        if !ok {
            $crate::engine_fatal!($source, $($arg)*);
        }
        ok
    }};
}
