// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Size-class dispatch over a bank of [`SlabStore`]s.
//!
//! Class `i` serves requests in `(2^(i-1), 2^i]` bytes, with class 0 also
//! covering size 0. The bank is built eagerly but maps nothing: slabs appear
//! lazily the first time a class allocates.

use super::{AllocConfig, Handle, Result, SlabStats, SlabStore};

/// Highest supported size class: the pointer budget (56 bits) minus the
/// generation tag byte and headroom for slab growth.
pub const MAX_SIZE_CLASS: usize = usize::BITS as usize - 17;

/// Default object-byte budget per slab (8 KiB).
pub const DEFAULT_SLAB_BYTES: u64 = 1 << 13;

/// Size class serving a request of `size` bytes.
///
/// Sizes 0 and 1 land in class 0; otherwise the class is the bit length of
/// `size - 1`, so each class covers one power-of-two interval.
#[inline]
#[must_use]
pub fn size_class(size: u64) -> usize {
    if size <= 1 {
        0
    } else {
        (u64::BITS - (size - 1).leading_zeros()) as usize
    }
}

/// Off-heap allocator covering every size class up to [`MAX_SIZE_CLASS`].
pub struct Store {
    classes: Vec<SlabStore>,
}

impl Store {
    /// Store with the default slab byte budget.
    #[must_use]
    pub fn new() -> Self {
        Self::sized(DEFAULT_SLAB_BYTES)
    }

    /// Store whose slabs target `slab_bytes` of object memory each. Classes
    /// whose object size exceeds the budget degenerate to one object per
    /// slab.
    #[must_use]
    pub fn sized(slab_bytes: u64) -> Self {
        let classes = (0..=MAX_SIZE_CLASS)
            .map(|class| SlabStore::new(AllocConfig::new(1u64 << class, slab_bytes)))
            .collect();
        Self { classes }
    }

    /// Allocate a slot large enough for `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics when `size` exceeds the largest size class.
    pub fn alloc(&self, size: u64) -> Handle {
        self.class_for(size).alloc()
    }

    /// Free a slot that was allocated with this `size`.
    ///
    /// The size routes back to the owning class, so it must be the value
    /// passed to `alloc` (any value in the same class works).
    ///
    /// # Panics
    ///
    /// Panics on double free or a stale-generation handle.
    pub fn free(&self, size: u64, handle: Handle) {
        self.class_for(size).free(handle);
    }

    fn class_for(&self, size: u64) -> &SlabStore {
        let class = size_class(size);
        assert!(
            class <= MAX_SIZE_CLASS,
            "size too large: {size} bytes exceeds the largest size class (2^{MAX_SIZE_CLASS})"
        );
        &self.classes[class]
    }

    /// Per-class counter snapshots, indexed by size class.
    #[must_use]
    pub fn stats(&self) -> Vec<SlabStats> {
        self.classes.iter().map(SlabStore::stats).collect()
    }

    /// Per-class slab geometry, indexed by size class.
    #[must_use]
    pub fn alloc_configs(&self) -> Vec<AllocConfig> {
        self.classes.iter().map(SlabStore::alloc_config).collect()
    }

    /// Release every mapping in every class. Idempotent; all outstanding
    /// handles are invalid afterwards.
    ///
    /// # Errors
    ///
    /// The first failed unmap stops further work and surfaces.
    pub fn destroy(&self) -> Result<()> {
        for class in &self.classes {
            class.destroy()?;
        }
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
