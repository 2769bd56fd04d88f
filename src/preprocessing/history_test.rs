use super::*;
use crate::constants::ValueType;
use crate::utils::time::Timespec;

fn at(
    step: usize,
    value: u64,
    sec: i64,
) -> HistoryValue {
    HistoryValue {
        step,
        value: Variant::Ui64(value),
        ts: Timespec::new(sec, 0),
    }
}

/// # Case 1: results arrive in timestamp order
/// # Case 2: the older result finishes last and must not roll history back
#[test]
fn test_update_keeps_later_timestamp() {
    let mut history = HistoryCache::new();

    // Case 1
    history.update(5, ValueType::Uint64, vec![at(0, 100, 5)]);
    history.update(5, ValueType::Uint64, vec![at(0, 200, 10)]);
    assert_eq!(history.get(5), vec![at(0, 200, 10)]);

    // Case 2
    let mut history = HistoryCache::new();
    history.update(5, ValueType::Uint64, vec![at(0, 200, 10)]);
    history.update(5, ValueType::Uint64, vec![at(0, 100, 5)]);
    assert_eq!(history.get(5), vec![at(0, 200, 10)]);
}

#[test]
fn test_update_merges_steps_independently() {
    let mut history = HistoryCache::new();
    history.update(7, ValueType::Uint64, vec![at(2, 1, 20), at(0, 1, 10)]);
    history.update(7, ValueType::Uint64, vec![at(0, 2, 30)]);

    assert_eq!(history.get(7), vec![at(0, 2, 30), at(2, 1, 20)]);
    assert!(history.get(8).is_empty());
}

#[test]
fn test_value_type_change_resets_history() {
    let mut history = HistoryCache::new();
    history.update(7, ValueType::Uint64, vec![at(0, 1, 10), at(1, 1, 10)]);
    history.update(7, ValueType::Float, vec![at(1, 3, 5)]);

    assert_eq!(history.get(7), vec![at(1, 3, 5)]);
}

#[test]
fn test_retain_prunes_removed_and_retyped_items() {
    let mut history = HistoryCache::new();
    history.update(1, ValueType::Uint64, vec![at(0, 1, 10)]);
    history.update(2, ValueType::Uint64, vec![at(0, 1, 10)]);
    history.update(3, ValueType::Float, vec![at(0, 1, 10)]);
    assert_eq!(history.len(), 3);

    let pruned = history.retain(|itemid| match itemid {
        1 => Some(ValueType::Uint64),
        3 => Some(ValueType::Uint64),
        _ => None,
    });

    assert_eq!(pruned, 2);
    assert_eq!(history.len(), 1);
    assert!(!history.get(1).is_empty());
}

#[test]
fn test_empty_update_is_ignored() {
    let mut history = HistoryCache::new();
    history.update(1, ValueType::Uint64, Vec::new());
    assert!(history.is_empty());
}
