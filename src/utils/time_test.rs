use std::thread::sleep;

use super::time::*;

#[test]
fn test_get_duration_since_epoch() {
    let duration = get_duration_since_epoch();
    // Should be a reasonable value (somewhere between 1970 and now)
    assert!(duration.as_secs() > 1609459200); // Greater than 2021-01-01
}

#[test]
fn test_get_now_as_i64() {
    let t1 = get_now_as_i64();
    sleep(std::time::Duration::from_millis(1100));
    let t2 = get_now_as_i64();

    // Ensure time is moving forward
    assert!(t2 > t1);
}

#[test]
fn test_timespec_ordering_uses_nanoseconds() {
    assert!(Timespec::new(10, 1) > Timespec::new(10, 0));
    assert!(Timespec::new(11, 0) > Timespec::new(10, 999_999_999));
}

#[test]
fn test_seconds_since() {
    let earlier = Timespec::new(100, 750_000_000);
    let later = Timespec::new(102, 250_000_000);
    assert_eq!(later.seconds_since(&earlier), 1.5);
}

#[test]
fn test_seconds_of_day() {
    assert_eq!(seconds_of_day(0), 0);
    assert_eq!(seconds_of_day(86_400 + 3_661), 3_661);
    assert_eq!(seconds_of_day(-1), 86_399);
}
