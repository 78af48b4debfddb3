// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-size-class slab allocator.
//!
//! Allocation prefers recycling off the LIFO free list; the fallback is a
//! monotonic bump index that grows the slab list on demand. The free list is
//! serialized by a mutex, the bump path is a single atomic fetch-add, and the
//! slab list sits behind a reader-writer lock so that growth (rare) does not
//! stall slot lookups (common).

use super::slab::Slab;
use super::{AllocConfig, Handle, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Counter snapshot for one size class.
///
/// `raw_allocs` counts bump allocations (fresh slots); `reuses` counts
/// free-list pops; `allocs` counts both.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SlabStats {
    pub allocs: u64,
    pub frees: u64,
    pub reuses: u64,
    pub raw_allocs: u64,
    pub live: u64,
    pub slabs: u64,
}

/// Allocator for a single object size.
pub struct SlabStore {
    config: AllocConfig,

    /// Monotonic count of bump (raw) allocations; never decremented.
    alloc_index: AtomicU64,
    allocs: AtomicU64,
    frees: AtomicU64,
    reuses: AtomicU64,

    /// Root of the LIFO free list; nil when empty.
    root_free: Mutex<Handle>,
    slabs: RwLock<Vec<Slab>>,

    destroyed: AtomicBool,
}

impl SlabStore {
    /// Create an empty store. No memory is mapped until the first `alloc`.
    #[must_use]
    pub fn new(config: AllocConfig) -> Self {
        Self {
            config,
            alloc_index: AtomicU64::new(0),
            allocs: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            root_free: Mutex::new(Handle::NIL),
            slabs: RwLock::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Allocate one slot, recycling off the free list when possible.
    ///
    /// # Panics
    ///
    /// Panics if a new slab is needed and the mapping fails; allocator
    /// failure is a fatal condition, not a recoverable one.
    pub fn alloc(&self) -> Handle {
        {
            let mut root = self.root_free.lock();
            if !root.is_nil() {
                let mut handle = *root;
                *root = handle.alloc_from_free();
                drop(root);
                self.reuses.fetch_add(1, Ordering::Relaxed);
                self.allocs.fetch_add(1, Ordering::Relaxed);
                return handle;
            }
        }

        let index = self.alloc_index.fetch_add(1, Ordering::Relaxed);
        let slab_idx = (index / self.config.objects_per_slab) as usize;
        let offset = (index % self.config.objects_per_slab) as usize;

        let (data, meta) = self.slot_addrs(slab_idx, offset);
        self.allocs.fetch_add(1, Ordering::Relaxed);
        Handle::new(data, meta)
    }

    /// Fetch slot addresses, growing the slab list when `slab_idx` is past
    /// the mapped end.
    fn slot_addrs(&self, slab_idx: usize, offset: usize) -> (*mut u8, *mut super::SlotMeta) {
        loop {
            {
                let slabs = self.slabs.read();
                if let Some(slab) = slabs.get(slab_idx) {
                    return slab.slot(offset);
                }
            }

            let mut slabs = self.slabs.write();
            // Another thread may have grown the list while we waited.
            while slabs.len() <= slab_idx {
                match Slab::map(&self.config) {
                    Ok(slab) => slabs.push(slab),
                    Err(e) => panic!("slab growth failed: {e}"),
                }
            }
        }
    }

    /// Return a slot to the free list.
    ///
    /// # Panics
    ///
    /// Panics on double free or a stale-generation handle (the handle's own
    /// checks propagate).
    pub fn free(&self, handle: Handle) {
        let mut root = self.root_free.lock();
        handle.free(*root);
        *root = handle;
        drop(root);
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    /// Counter snapshot. Individual counters are read relaxed; a snapshot
    /// taken while other threads allocate is eventually consistent.
    #[must_use]
    pub fn stats(&self) -> SlabStats {
        let allocs = self.allocs.load(Ordering::Relaxed);
        let frees = self.frees.load(Ordering::Relaxed);
        let reuses = self.reuses.load(Ordering::Relaxed);
        SlabStats {
            allocs,
            frees,
            reuses,
            raw_allocs: allocs - reuses,
            live: allocs - frees,
            slabs: self.slabs.read().len() as u64,
        }
    }

    /// The slab geometry this store allocates with.
    #[inline]
    #[must_use]
    pub fn alloc_config(&self) -> AllocConfig {
        self.config
    }

    /// Unmap every slab. Idempotent; every outstanding handle into this
    /// store is invalid afterwards.
    ///
    /// # Errors
    ///
    /// The first failed unmap stops further work and surfaces.
    pub fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut slabs = self.slabs.write();
        for slab in slabs.iter() {
            slab.unmap()?;
        }
        slabs.clear();
        *self.root_free.lock() = Handle::NIL;
        Ok(())
    }
}

impl Drop for SlabStore {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::warn!("[STORE] destroy on drop failed: {e}");
        }
    }
}
