//! Binary min-heaps with removal and repositioning by key.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::model::QueuePriority;

/// Min-heap of `(id, key)` pairs with an id → position index.
pub struct IndexedHeap<K> {
    elems: Vec<(u64, K)>,
    positions: HashMap<u64, usize>,
    order: fn(&K, &K) -> Ordering,
}

impl<K> IndexedHeap<K> {
    pub fn new(order: fn(&K, &K) -> Ordering) -> Self {
        Self {
            elems: Vec::new(),
            positions: HashMap::new(),
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn contains(
        &self,
        id: u64,
    ) -> bool {
        self.positions.contains_key(&id)
    }

    /// Inserts `id`, or repositions it when already present.
    pub fn insert(
        &mut self,
        id: u64,
        key: K,
    ) {
        match self.positions.get(&id).copied() {
            Some(pos) => {
                self.elems[pos].1 = key;
                self.sift_up(pos);
                let pos = self.positions[&id];
                self.sift_down(pos);
            }
            None => {
                self.elems.push((id, key));
                let pos = self.elems.len() - 1;
                self.positions.insert(id, pos);
                self.sift_up(pos);
            }
        }
    }

    /// Repositions `id` after its key changed. Returns false when `id` is not queued.
    pub fn reposition(
        &mut self,
        id: u64,
        key: K,
    ) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.insert(id, key);
        true
    }

    pub fn remove(
        &mut self,
        id: u64,
    ) -> Option<K> {
        let pos = self.positions.remove(&id)?;
        let last = self.elems.len() - 1;
        if pos != last {
            self.elems.swap(pos, last);
            self.positions.insert(self.elems[pos].0, pos);
        }
        let (_, key) = self.elems.pop()?;
        if pos < self.elems.len() {
            self.sift_up(pos);
            let moved = self.elems[pos].0;
            let pos = self.positions[&moved];
            self.sift_down(pos);
        }
        Some(key)
    }

    pub fn peek_min(&self) -> Option<(u64, &K)> {
        self.elems.first().map(|(id, key)| (*id, key))
    }

    pub fn pop_min(&mut self) -> Option<(u64, K)> {
        let id = self.elems.first()?.0;
        self.remove(id).map(|key| (id, key))
    }

    pub fn get(
        &self,
        id: u64,
    ) -> Option<&K> {
        self.positions.get(&id).map(|pos| &self.elems[*pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &K)> {
        self.elems.iter().map(|(id, key)| (*id, key))
    }

    fn less(
        &self,
        a: usize,
        b: usize,
    ) -> bool {
        (self.order)(&self.elems[a].1, &self.elems[b].1) == Ordering::Less
    }

    fn swap(
        &mut self,
        a: usize,
        b: usize,
    ) {
        self.elems.swap(a, b);
        self.positions.insert(self.elems[a].0, a);
        self.positions.insert(self.elems[b].0, b);
    }

    fn sift_up(
        &mut self,
        mut pos: usize,
    ) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(
        &mut self,
        mut pos: usize,
    ) {
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;
            if left < self.elems.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.elems.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    /// Verifies heap order and the position index.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        if self.positions.len() != self.elems.len() {
            return false;
        }
        for (pos, (id, _)) in self.elems.iter().enumerate() {
            if self.positions.get(id) != Some(&pos) {
                return false;
            }
            if pos > 0 && self.less(pos, (pos - 1) / 2) {
                return false;
            }
        }
        true
    }
}

/// SNMP connection parameters; items with equal values can share one bulk request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnmpConnection {
    pub item_type: u8,
    pub interfaceid: u64,
    pub community: Arc<str>,
    pub securityname: Arc<str>,
    pub securitylevel: u8,
    pub authprotocol: u8,
    pub privprotocol: u8,
    pub authpassphrase: Arc<str>,
    pub privpassphrase: Arc<str>,
    pub contextname: Arc<str>,
}

/// Sort key of an item in a poller queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQueueKey {
    pub nextcheck: i64,
    pub priority: QueuePriority,
    pub interfaceid: u64,
    pub snmp: Option<SnmpConnection>,
    /// JMX username and password
    pub credentials: Option<(Arc<str>, Arc<str>)>,
}

fn schedule_order(
    a: &ItemQueueKey,
    b: &ItemQueueKey,
) -> Ordering {
    a.nextcheck.cmp(&b.nextcheck).then(a.priority.cmp(&b.priority))
}

/// Normal, unreachable and IPMI pollers: non-SNMP items first, SNMP items grouped by connection.
pub fn default_order(
    a: &ItemQueueKey,
    b: &ItemQueueKey,
) -> Ordering {
    schedule_order(a, b).then_with(|| match (&a.snmp, &b.snmp) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(y),
    })
}

/// Pinger: ICMP checks of one interface adjacent.
pub fn pinger_order(
    a: &ItemQueueKey,
    b: &ItemQueueKey,
) -> Ordering {
    schedule_order(a, b).then(a.interfaceid.cmp(&b.interfaceid))
}

/// Java poller: same interface and credentials adjacent.
pub fn java_order(
    a: &ItemQueueKey,
    b: &ItemQueueKey,
) -> Ordering {
    schedule_order(a, b)
        .then(a.interfaceid.cmp(&b.interfaceid))
        .then_with(|| a.credentials.cmp(&b.credentials))
}

/// Proxy queue keyed by `min(config_nextcheck, data_nextcheck)`.
pub fn proxy_order(
    a: &i64,
    b: &i64,
) -> Ordering {
    a.cmp(b)
}
