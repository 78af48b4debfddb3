// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dedup core: one shard's map plus the shared byte budget.

use super::ShardCounters;
use crate::refs::StringRef;
use crate::store::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a cap check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admit {
    Ok,
    TooLong,
    OverBudget,
}

/// Interner-wide memory budget.
///
/// `max_len` caps a single string, `max_bytes` caps the off-heap total;
/// a negative cap disables that limit. The byte total is maintained with a
/// CAS loop so shards agree on it without sharing a lock.
#[derive(Debug)]
pub(crate) struct ByteBudget {
    max_len: i64,
    max_bytes: i64,
    used: AtomicU64,
}

impl ByteBudget {
    pub(crate) fn new(max_len: i64, max_bytes: i64) -> Self {
        Self {
            max_len,
            max_bytes,
            used: AtomicU64::new(0),
        }
    }

    /// Reserve `len` bytes of budget, or report which cap refused.
    pub(crate) fn admit(&self, len: usize) -> Admit {
        if self.max_len >= 0 && len as u64 > self.max_len as u64 {
            return Admit::TooLong;
        }
        let add = len as u64;
        if self.max_bytes < 0 {
            self.used.fetch_add(add, Ordering::Relaxed);
            return Admit::Ok;
        }
        let limit = self.max_bytes as u64;
        let mut used = self.used.load(Ordering::Relaxed);
        loop {
            let next = used + add;
            if next > limit {
                return Admit::OverBudget;
            }
            match self
                .used
                .compare_exchange_weak(used, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Admit::Ok,
                Err(current) => used = current,
            }
        }
    }

    pub(crate) fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }
}

/// Result of a hash-keyed lookup; the caller already holds the canonical
/// text, so the degraded path carries no payload.
pub(crate) enum Lookup {
    /// The canonical off-heap copy (pre-existing or freshly interned).
    Shared(StringRef),
    /// Not interned; the caller keeps its own copy.
    Owned,
}

/// Result of a value-keyed lookup; the rendering happens inside, so the
/// degraded path hands the rendered string back out.
pub(crate) enum KeyedLookup {
    Shared(StringRef),
    Owned(String),
}

/// One shard: an identity-keyed map of interned strings plus counters.
#[derive(Default)]
pub(crate) struct Shard {
    entries: Mutex<HashMap<u64, StringRef>>,
    pub(crate) counters: ShardCounters,
}

impl Shard {
    /// Look up a hash identity, re-checking content. A present entry whose
    /// bytes differ is a hash collision: the caller's value is handed back
    /// un-interned rather than evicting the incumbent.
    pub(crate) fn get_hashed(
        &self,
        store: &Store,
        budget: &ByteBudget,
        identity: u64,
        canon: &str,
    ) -> Lookup {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&identity) {
            if existing.as_bytes() == canon.as_bytes() {
                self.counters.returned.fetch_add(1, Ordering::Relaxed);
                return Lookup::Shared(*existing);
            }
            self.counters.hash_collision.fetch_add(1, Ordering::Relaxed);
            return Lookup::Owned;
        }
        match self.admit_and_insert(store, budget, identity, canon, &mut entries) {
            Some(r) => Lookup::Shared(r),
            None => Lookup::Owned,
        }
    }

    /// Look up a value identity (the value is its own key, so no content
    /// check); `render` runs only on a miss.
    pub(crate) fn get_keyed(
        &self,
        store: &Store,
        budget: &ByteBudget,
        identity: u64,
        render: impl FnOnce() -> String,
    ) -> KeyedLookup {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&identity) {
            self.counters.returned.fetch_add(1, Ordering::Relaxed);
            return KeyedLookup::Shared(*existing);
        }
        let rendered = render();
        match self.admit_and_insert(store, budget, identity, &rendered, &mut entries) {
            Some(r) => KeyedLookup::Shared(r),
            None => KeyedLookup::Owned(rendered),
        }
    }

    fn admit_and_insert(
        &self,
        store: &Store,
        budget: &ByteBudget,
        identity: u64,
        canon: &str,
        entries: &mut HashMap<u64, StringRef>,
    ) -> Option<StringRef> {
        match budget.admit(canon.len()) {
            Admit::TooLong => {
                self.counters.max_len_exceeded.fetch_add(1, Ordering::Relaxed);
                None
            }
            Admit::OverBudget => {
                self.counters
                    .used_bytes_exceeded
                    .fetch_add(1, Ordering::Relaxed);
                None
            }
            Admit::Ok => {
                let r = store.alloc_string_from_str(canon);
                entries.insert(identity, r);
                self.counters.interned.fetch_add(1, Ordering::Relaxed);
                Some(r)
            }
        }
    }
}
