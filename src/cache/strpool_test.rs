use super::strpool::*;

#[test]
fn test_intern_shares_and_counts() {
    let mut pool = StringPool::new();

    let a = pool.intern("system.cpu.load");
    let b = pool.intern("system.cpu.load");

    assert_eq!(pool.len(), 1);
    assert_eq!(pool.refcount("system.cpu.load"), 2);
    assert_eq!(a, b);

    pool.release(a);
    assert_eq!(pool.refcount("system.cpu.load"), 1);
    pool.release(b);
    assert_eq!(pool.refcount("system.cpu.load"), 0);
    assert!(pool.is_empty());
}

/// # Case 1: replace on a new record always fills the slot
/// # Case 2: replace with identical text is a no-op
/// # Case 3: replace with different text swaps references
#[test]
fn test_replace() {
    let mut pool = StringPool::new();
    let mut slot = PooledStr::default();

    // Case 1
    assert!(pool.replace(false, &mut slot, "alpha"));
    assert_eq!(&*slot, "alpha");
    assert_eq!(pool.refcount("alpha"), 1);

    // Case 2
    assert!(!pool.replace(true, &mut slot, "alpha"));
    assert_eq!(pool.refcount("alpha"), 1);

    // Case 3
    assert!(pool.replace(true, &mut slot, "beta"));
    assert_eq!(pool.refcount("alpha"), 0);
    assert_eq!(pool.refcount("beta"), 1);

    pool.clear(&mut slot);
    assert!(pool.is_empty());
    assert_eq!(&*slot, "");
}

#[test]
fn test_empty_string_is_pooled_once_filled() {
    let mut pool = StringPool::new();
    let mut slot = PooledStr::default();

    // a default handle compares equal to "" but is not yet tracked
    assert!(pool.replace(true, &mut slot, ""));
    assert_eq!(pool.refcount(""), 1);
    assert!(!pool.replace(true, &mut slot, ""));
    assert_eq!(pool.refcount(""), 1);
}

#[test]
fn test_release_of_default_handle_is_noop() {
    let mut pool = StringPool::new();
    let _kept = pool.intern("");

    pool.release(PooledStr::default());

    assert_eq!(pool.refcount(""), 1);
}
