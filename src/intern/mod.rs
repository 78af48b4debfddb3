// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sharded string interning over the off-heap store.
//!
//! An interner keeps one canonical off-heap copy per distinct value and
//! hands out shared views of it, so a workload that sees the same strings
//! over and over holds them once instead of once per sighting. The lookup
//! tables live on the ordinary heap; only the character data goes off-heap.
//!
//! Calls fan out over `next_pow2(cpu_count)` shards keyed by the low bits of
//! the value's identity, each shard with its own mutex and map, so
//! interning scales with cores. Two budgets bound memory: a per-string
//! length cap and a global byte cap (CAS-maintained across shards).
//! Exceeding either — or losing a hash-collision content check — is not an
//! error: the caller gets a fresh owned copy and a statistics counter
//! ticks.
//!
//! Four value shapes are supported, each with its own interner type:
//! raw bytes ([`BytesInterner`]), `i64` in a chosen base ([`IntInterner`]),
//! `f64` ([`FloatInterner`]), and UTC timestamps in a chosen layout
//! ([`TimeInterner`]).

mod convert;
mod core;
mod sharded;

pub use sharded::{BytesInterner, FloatInterner, IntInterner, TimeInterner};

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-shard event counters, summed into [`InternSummary`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InternStats {
    /// Lookups served from the cache.
    pub returned: u64,
    /// Values newly copied off-heap.
    pub interned: u64,
    /// Values rejected by the per-string length cap.
    pub max_len_exceeded: u64,
    /// Values rejected by the global byte budget.
    pub used_bytes_exceeded: u64,
    /// Hash-keyed lookups whose stored content did not match.
    pub hash_collision: u64,
}

impl InternStats {
    pub(crate) fn add(&mut self, other: &InternStats) {
        self.returned += other.returned;
        self.interned += other.interned;
        self.max_len_exceeded += other.max_len_exceeded;
        self.used_bytes_exceeded += other.used_bytes_exceeded;
        self.hash_collision += other.hash_collision;
    }
}

/// Whole-interner statistics: shard-wise sums plus the byte budget in use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InternSummary {
    pub total: InternStats,
    /// Off-heap bytes currently held by interned strings.
    pub used_bytes: u64,
}

/// Atomic mirror of [`InternStats`] for one shard.
#[derive(Debug, Default)]
pub(crate) struct ShardCounters {
    pub(crate) returned: AtomicU64,
    pub(crate) interned: AtomicU64,
    pub(crate) max_len_exceeded: AtomicU64,
    pub(crate) used_bytes_exceeded: AtomicU64,
    pub(crate) hash_collision: AtomicU64,
}

impl ShardCounters {
    pub(crate) fn snapshot(&self) -> InternStats {
        InternStats {
            returned: self.returned.load(Ordering::Relaxed),
            interned: self.interned.load(Ordering::Relaxed),
            max_len_exceeded: self.max_len_exceeded.load(Ordering::Relaxed),
            used_bytes_exceeded: self.used_bytes_exceeded.load(Ordering::Relaxed),
            hash_collision: self.hash_collision.load(Ordering::Relaxed),
        }
    }
}

/// FNV-1a, 64-bit. Identity hash for byte interning: stable within a run,
/// no cryptographic ambitions.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_spreads() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"hellp"));
        assert_ne!(hash_bytes(b""), hash_bytes(b"\0"));
    }

    #[test]
    fn test_stats_sum() {
        let mut total = InternStats::default();
        total.add(&InternStats {
            returned: 1,
            interned: 2,
            max_len_exceeded: 3,
            used_bytes_exceeded: 4,
            hash_collision: 5,
        });
        total.add(&InternStats {
            returned: 10,
            ..InternStats::default()
        });
        assert_eq!(total.returned, 11);
        assert_eq!(total.interned, 2);
        assert_eq!(total.hash_collision, 5);
    }
}
