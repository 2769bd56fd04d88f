//! Singly-linked request queue with stable handles.
//!
//! Nodes live in a map keyed by a monotonically increasing [`RequestId`]; links are ids, so
//! a handle taken at enqueue time stays valid until that request is dequeued. Besides FIFO
//! appends the queue supports insertion at the head and right after a given request.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug)]
struct Node<T> {
    value: T,
    next: Option<RequestId>,
}

#[derive(Debug)]
pub struct RequestQueue<T> {
    nodes: HashMap<RequestId, Node<T>>,
    head: Option<RequestId>,
    tail: Option<RequestId>,
    next_id: u64,
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
            tail: None,
            next_id: 1,
        }
    }

    fn allocate(
        &mut self,
        value: T,
        next: Option<RequestId>,
    ) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node { value, next });
        id
    }

    /// Appends at the tail.
    pub fn enqueue(
        &mut self,
        value: T,
    ) -> RequestId {
        let id = self.allocate(value, None);
        match self.tail.and_then(|tail| self.nodes.get_mut(&tail)) {
            Some(tail) => tail.next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Inserts at the head.
    pub fn enqueue_first(
        &mut self,
        value: T,
    ) -> RequestId {
        let id = self.allocate(value, self.head);
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
        id
    }

    /// Inserts right after `after`, or at the tail when `after` is no longer queued.
    pub fn enqueue_after(
        &mut self,
        after: RequestId,
        value: T,
    ) -> RequestId {
        let Some(next) = self.nodes.get(&after).map(|node| node.next) else {
            return self.enqueue(value);
        };
        let id = self.allocate(value, next);
        if let Some(node) = self.nodes.get_mut(&after) {
            node.next = Some(id);
        }
        if self.tail == Some(after) {
            self.tail = Some(id);
        }
        id
    }

    /// Removes the head.
    pub fn dequeue(&mut self) -> Option<(RequestId, T)> {
        let id = self.head?;
        let node = self.nodes.remove(&id)?;
        self.head = node.next;
        if self.head.is_none() {
            self.tail = None;
        }
        Some((id, node.value))
    }

    pub fn peek(&self) -> Option<(RequestId, &T)> {
        let id = self.head?;
        self.nodes.get(&id).map(|node| (id, &node.value))
    }

    pub fn get(
        &self,
        id: RequestId,
    ) -> Option<&T> {
        self.nodes.get(&id).map(|node| &node.value)
    }

    pub fn get_mut(
        &mut self,
        id: RequestId,
    ) -> Option<&mut T> {
        self.nodes.get_mut(&id).map(|node| &mut node.value)
    }

    /// Walks from head to tail.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            queue: self,
            next: self.head,
        }
    }

    /// Ids from head to tail.
    pub fn ids(&self) -> Vec<RequestId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub struct Iter<'a, T> {
    queue: &'a RequestQueue<T>,
    next: Option<RequestId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (RequestId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.queue.nodes.get(&id)?;
        self.next = node.next;
        Some((id, &node.value))
    }
}
