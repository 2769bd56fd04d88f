//! Per-item, per-step history needed by delta steps.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::Variant;
use crate::constants::ValueType;
use crate::utils::time::Timespec;

/// Last value seen by one step of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryValue {
    /// Index of the step in the item's step list
    pub step: usize,
    pub value: Variant,
    pub ts: Timespec,
}

#[derive(Debug)]
struct ItemHistory {
    value_type: ValueType,
    values: Vec<HistoryValue>,
}

/// Manager-side history of every item with delta steps.
#[derive(Debug, Default)]
pub struct HistoryCache {
    items: HashMap<u64, ItemHistory>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        itemid: u64,
    ) -> Vec<HistoryValue> {
        self.items
            .get(&itemid)
            .map(|history| history.values.clone())
            .unwrap_or_default()
    }

    /// Stores history returned by a worker. For each step the value with the later
    /// timestamp is kept, so results finishing out of order never roll history back.
    pub fn update(
        &mut self,
        itemid: u64,
        value_type: ValueType,
        values: Vec<HistoryValue>,
    ) {
        if values.is_empty() {
            return;
        }
        let history = self.items.entry(itemid).or_insert_with(|| ItemHistory {
            value_type,
            values: Vec::new(),
        });
        if history.value_type != value_type {
            history.value_type = value_type;
            history.values.clear();
        }

        for value in values {
            match history.values.iter_mut().find(|old| old.step == value.step) {
                Some(old) if old.ts <= value.ts => *old = value,
                Some(_) => {}
                None => history.values.push(value),
            }
        }
        history.values.sort_by_key(|value| value.step);
    }

    /// Drops history of items that are gone or changed value type. `lookup` returns the
    /// current value type of an item still known to need history.
    pub fn retain<F>(
        &mut self,
        lookup: F,
    ) -> usize
    where
        F: Fn(u64) -> Option<ValueType>,
    {
        let before = self.items.len();
        self.items
            .retain(|itemid, history| lookup(*itemid) == Some(history.value_type));
        before - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
