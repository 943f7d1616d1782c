//! Integration tests for origin context and file output

use std::sync::{Arc, Barrier};
use std::thread;

use canteen_logging::{OriginContextGuard, OriginRole};

/// Guards on different threads never see each other's origin
#[test]
fn test_concurrent_origin_contexts() {
    const NUM_THREADS: usize = 16;
    const ITERATIONS: usize = 200;

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS {
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let origin = format!("coord-{}", thread_id);
            barrier.wait();

            for _ in 0..ITERATIONS {
                let _guard = OriginContextGuard::coordinator(origin.clone());
                assert_eq!(OriginContextGuard::current_origin_id(), Some(origin.clone()));
            }

            assert!(OriginContextGuard::current().is_none());
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_context_visible_in_current_thread_runtime() {
    let _guard = OriginContextGuard::new("admin-7", OriginRole::Admin);

    let seen = tokio_test::block_on(async { OriginContextGuard::current() });
    let ctx = seen.unwrap();
    assert_eq!(ctx.origin_id, "admin-7");
    assert_eq!(ctx.role, OriginRole::Admin);
}

#[test]
fn test_session_ids_differ_per_guard() {
    let first = {
        let _guard = OriginContextGuard::coordinator("coord-1");
        OriginContextGuard::current().unwrap().session_id
    };
    let second = {
        let _guard = OriginContextGuard::coordinator("coord-1");
        OriginContextGuard::current().unwrap().session_id
    };
    assert_ne!(first, second);
}
