// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shard fan-out and the public interner types.

use super::convert::{format_float, format_int, format_time, time_identity};
use super::core::{ByteBudget, KeyedLookup, Lookup, Shard};
use super::{hash_bytes, InternStats, InternSummary};
use crate::refs::StringRef;
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::thread;

/// Sharded dedup engine shared by every interner shape.
///
/// Owns the off-heap store the canonical copies live in; dropping the
/// interner drops the store and with it every interned string, so shared
/// views are lifetime-bound to the interner.
struct ShardedIntern {
    shards: Box<[Shard]>,
    mask: u64,
    budget: ByteBudget,
    store: Store,
}

impl ShardedIntern {
    fn new(max_len: i64, max_bytes: i64) -> Self {
        let count = thread::available_parallelism()
            .map_or(1, |n| n.get())
            .next_power_of_two();
        let shards: Box<[Shard]> = (0..count).map(|_| Shard::default()).collect();
        log::debug!("[INTERN] {count} shards, max_len={max_len}, max_bytes={max_bytes}");
        Self {
            shards,
            mask: count as u64 - 1,
            budget: ByteBudget::new(max_len, max_bytes),
            store: Store::new(),
        }
    }

    fn shard(&self, identity: u64) -> &Shard {
        &self.shards[(identity & self.mask) as usize]
    }

    /// Re-borrow an interned string for the interner's lifetime.
    fn shared_view(&self, r: StringRef) -> &str {
        // SAFETY: interned entries are never freed individually; their slots
        // live in self.store until self drops, which the returned borrow
        // cannot outlive.
        unsafe { &*(r.value() as *const str) }
    }

    fn get_bytes(&self, bytes: &[u8]) -> Cow<'_, str> {
        let canon = String::from_utf8_lossy(bytes);
        let identity = hash_bytes(canon.as_bytes());
        match self
            .shard(identity)
            .get_hashed(&self.store, &self.budget, identity, &canon)
        {
            Lookup::Shared(r) => Cow::Borrowed(self.shared_view(r)),
            Lookup::Owned => Cow::Owned(canon.into_owned()),
        }
    }

    fn get_keyed(&self, identity: u64, render: impl FnOnce() -> String) -> Cow<'_, str> {
        match self
            .shard(identity)
            .get_keyed(&self.store, &self.budget, identity, render)
        {
            KeyedLookup::Shared(r) => Cow::Borrowed(self.shared_view(r)),
            KeyedLookup::Owned(s) => Cow::Owned(s),
        }
    }

    fn stats(&self) -> InternSummary {
        let mut total = InternStats::default();
        for shard in self.shards.iter() {
            total.add(&shard.counters.snapshot());
        }
        InternSummary {
            total,
            used_bytes: self.budget.used(),
        }
    }
}

/// Interner for raw byte strings, keyed by a 64-bit content hash.
///
/// Returns `Cow::Borrowed` views of the canonical off-heap copy; over-cap
/// values, and values losing a hash-collision content check, come back as
/// `Cow::Owned` and are not cached. Negative caps disable the respective
/// limit.
pub struct BytesInterner {
    inner: ShardedIntern,
}

impl BytesInterner {
    #[must_use]
    pub fn new(max_len: i64, max_bytes: i64) -> Self {
        Self {
            inner: ShardedIntern::new(max_len, max_bytes),
        }
    }

    /// The canonical string for `bytes` (UTF-8, lossily canonicalized).
    pub fn get(&self, bytes: &[u8]) -> Cow<'_, str> {
        self.inner.get_bytes(bytes)
    }

    #[must_use]
    pub fn stats(&self) -> InternSummary {
        self.inner.stats()
    }
}

/// Interner for `i64` values rendered in a fixed base.
pub struct IntInterner {
    inner: ShardedIntern,
    base: u32,
}

impl IntInterner {
    /// # Panics
    ///
    /// Panics if `base` is outside 2..=36.
    #[must_use]
    pub fn new(max_len: i64, max_bytes: i64, base: u32) -> Self {
        assert!((2..=36).contains(&base), "int base {base} out of range 2..=36");
        Self {
            inner: ShardedIntern::new(max_len, max_bytes),
            base,
        }
    }

    /// The canonical rendering of `value` in this interner's base.
    pub fn get(&self, value: i64) -> Cow<'_, str> {
        let base = self.base;
        self.inner
            .get_keyed(value as u64, move || format_int(value, base))
    }

    #[must_use]
    pub fn stats(&self) -> InternSummary {
        self.inner.stats()
    }
}

/// Interner for `f64` values, keyed by bit pattern.
pub struct FloatInterner {
    inner: ShardedIntern,
}

impl FloatInterner {
    #[must_use]
    pub fn new(max_len: i64, max_bytes: i64) -> Self {
        Self {
            inner: ShardedIntern::new(max_len, max_bytes),
        }
    }

    /// The canonical shortest rendering of `value`. NaN short-circuits to
    /// the literal `"NaN"` without touching the cache (NaN bit patterns are
    /// legion and compare unequal anyway).
    pub fn get(&self, value: f64) -> Cow<'_, str> {
        if value.is_nan() {
            return Cow::Borrowed("NaN");
        }
        self.inner
            .get_keyed(value.to_bits(), move || format_float(value))
    }

    #[must_use]
    pub fn stats(&self) -> InternSummary {
        self.inner.stats()
    }
}

/// Interner for UTC timestamps rendered through a fixed strftime layout,
/// keyed by nanoseconds since the epoch.
pub struct TimeInterner {
    inner: ShardedIntern,
    layout: String,
}

impl TimeInterner {
    #[must_use]
    pub fn new(max_len: i64, max_bytes: i64, layout: &str) -> Self {
        Self {
            inner: ShardedIntern::new(max_len, max_bytes),
            layout: layout.to_string(),
        }
    }

    /// The canonical rendering of `value` in this interner's layout.
    pub fn get(&self, value: DateTime<Utc>) -> Cow<'_, str> {
        self.inner
            .get_keyed(time_identity(value), || format_time(value, &self.layout))
    }

    #[must_use]
    pub fn stats(&self) -> InternSummary {
        self.inner.stats()
    }
}
