use super::*;

#[test]
fn test_new_handle_is_invalid() {
    let handle = GpuHandle::new();
    assert_eq!(handle.get(), 0);
    assert!(!handle.is_valid());
    assert!(!handle.is_released());
}

#[test]
fn test_clones_share_the_name() {
    let handle = GpuHandle::new();
    let pending = handle.clone();

    pending.set(7);

    assert_eq!(handle.get(), 7);
    assert!(handle.is_valid());
}

#[test]
fn test_take_leaves_zero() {
    let handle = GpuHandle::new();
    handle.set(3);

    assert_eq!(handle.take(), 3);
    assert_eq!(handle.take(), 0);
    assert!(!handle.is_valid());
}

#[test]
fn test_mark_released_is_shared() {
    let handle = GpuHandle::new();
    let pending = handle.clone();

    handle.mark_released();

    assert!(pending.is_released());
}

#[test]
fn test_submit_mode_default_is_deferred() {
    assert_eq!(SubmitMode::default(), SubmitMode::Deferred);
}
