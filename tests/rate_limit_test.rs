//! Rate limiting tests
//!
//! Run with: cargo test --test rate_limit_test

use outpost::ratelimit::RateLimit;
use std::thread::sleep;
use std::time::Duration;

// =============================================================================
// WINDOW BEHAVIOUR
// =============================================================================

#[test]
fn quota_denies_within_a_window() {
    let limit = RateLimit::new(1, 3);
    let mut admitted = 0;
    let mut denied = 0;
    for _ in 0..10 {
        if limit.add("client", true) {
            admitted += 1;
        } else {
            denied += 1;
        }
    }
    assert_eq!(admitted, 3);
    assert_eq!(denied, 7);
}

#[test]
fn window_reset_restores_the_full_quota() {
    let limit = RateLimit::new(1, 3);
    for _ in 0..3 {
        assert!(limit.add("client", true));
    }
    assert!(!limit.add("client", true));

    sleep(Duration::from_millis(1100));
    for _ in 0..3 {
        assert!(limit.add("client", true));
    }
    assert!(!limit.add("client", true));
}

#[test]
fn distinct_keys_have_distinct_windows() {
    let limit = RateLimit::new(10, 2);
    assert!(limit.add("1.2.3.4", true));
    assert!(limit.add("1.2.3.4", true));
    assert!(!limit.add("1.2.3.4", true));
    assert!(limit.add("5.6.7.8", true));
    assert!(limit.add("", true));
}

#[test]
fn zero_parameters_are_clamped_to_one() {
    let limit = RateLimit::new(0, 0);
    assert!(limit.add("k", true));
    assert!(!limit.add("k", true));
}

// =============================================================================
// TABLE GROWTH
// =============================================================================

#[test]
fn many_distinct_keys_do_not_break_admission() {
    let limit = RateLimit::new(1, 2);
    for i in 0..3000 {
        assert!(limit.add(&format!("10.0.{}.{}", i / 256, i % 256), true));
    }
    // A key admitted before pruning kicked in is still accounted for.
    assert!(limit.add("10.0.0.0", true));
    assert!(!limit.add("10.0.0.0", true));
}
