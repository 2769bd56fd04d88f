//! Reference-counted interned strings.
//!
//! Every text field resident in the cache holds a [`PooledStr`]. Identical text shares one
//! allocation; the pool tracks how many handles were handed out per string and drops the
//! entry when the last one is released.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Handle to a pooled string.
///
/// Not `Clone`: every handle corresponds to exactly one pool reference, obtained through
/// [`StringPool::intern`] and returned through [`StringPool::release`]. The default handle
/// is the empty string and is not tracked by any pool.
#[derive(Default)]
pub struct PooledStr(Option<Arc<str>>);

impl PooledStr {
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    /// Shares the underlying allocation for use as a secondary index key. The returned
    /// `Arc` is not counted by the pool; the index entry must go away with the record.
    pub(crate) fn share(&self) -> Arc<str> {
        match &self.0 {
            Some(s) => s.clone(),
            None => Arc::from(""),
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.0.is_some()
    }
}

impl Deref for PooledStr {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for PooledStr {
    fn eq(
        &self,
        other: &str,
    ) -> bool {
        self.as_str() == other
    }
}

impl PartialEq for PooledStr {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for PooledStr {}

impl fmt::Debug for PooledStr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for PooledStr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct StringPool {
    strings: HashMap<Arc<str>, usize>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(
        &mut self,
        s: &str,
    ) -> PooledStr {
        if let Some((existing, refcount)) = self.strings.get_key_value(s) {
            let handle = existing.clone();
            let refcount = *refcount;
            self.strings.insert(handle.clone(), refcount + 1);
            return PooledStr(Some(handle));
        }

        let handle: Arc<str> = Arc::from(s);
        self.strings.insert(handle.clone(), 1);
        PooledStr(Some(handle))
    }

    pub fn release(
        &mut self,
        handle: PooledStr,
    ) {
        let Some(s) = handle.0 else {
            return;
        };
        match self.strings.get_mut(&*s) {
            Some(refcount) if *refcount > 1 => *refcount -= 1,
            Some(_) => {
                self.strings.remove(&*s);
            }
            None => {
                tracing::warn!("releasing string {:?} unknown to the pool", &*s);
            }
        }
    }

    /// Updates `slot` to `new`, returning whether the value changed.
    ///
    /// When `found` is false the slot belongs to a freshly created record and is simply
    /// filled; otherwise the old value is compared first and only replaced on a change.
    pub fn replace(
        &mut self,
        found: bool,
        slot: &mut PooledStr,
        new: &str,
    ) -> bool {
        if found && slot.as_str() == new && slot.is_pooled() {
            return false;
        }
        let old = std::mem::replace(slot, self.intern(new));
        self.release(old);
        true
    }

    /// Releases the value held in `slot`, leaving the empty handle behind.
    pub fn clear(
        &mut self,
        slot: &mut PooledStr,
    ) {
        let old = std::mem::take(slot);
        self.release(old);
    }

    pub fn refcount(
        &self,
        s: &str,
    ) -> usize {
        self.strings.get(s).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
