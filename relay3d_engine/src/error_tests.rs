//! Unit tests for error.rs
//!
//! Tests all Error variants and the engine_err!/engine_bail! macros.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("context lost".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("context lost"));
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("Texture not found".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("Texture not found"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no device".to_string());
    assert_eq!(format!("{}", err), "Initialization failed: no device");
}

#[test]
fn test_render_thread_display() {
    let err = Error::RenderThread("worker panicked".to_string());
    assert_eq!(format!("{}", err), "Render thread error: worker panicked");
}

#[test]
fn test_invalid_config_display() {
    let err = Error::InvalidConfig("render_queue_count must be >= 2".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Invalid configuration"));
    assert!(display.contains(">= 2"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::RenderThread("x".to_string());
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug_and_clone() {
    let err = Error::InvalidConfig("bad".to_string());
    let copy = err.clone();
    assert_eq!(format!("{}", err), format!("{}", copy));
    assert!(format!("{:?}", copy).contains("InvalidConfig"));
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
fn test_engine_err_builds_backend_error() {
    let err = crate::engine_err!("relay3d::test", "queue {} missing", 3);
    match err {
        Error::BackendError(msg) => assert_eq!(msg, "queue 3 missing"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_engine_bail_returns_early() {
    fn checked(value: u32) -> Result<u32> {
        if value == 0 {
            crate::engine_bail!("relay3d::test", "value must be non-zero");
        }
        Ok(value * 2)
    }

    assert_eq!(checked(4).unwrap(), 8);
    assert!(matches!(checked(0), Err(Error::BackendError(_))));
}

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<i32> {
        Err(Error::InitializationFailed("inner".to_string()))
    }

    fn outer() -> Result<i32> {
        inner()?;
        Ok(42)
    }

    assert!(outer().is_err());
}
