// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Anonymous memory mapping for one slab.
//!
//! A slab is a single `mmap(ANON | PRIVATE, RW)` region laid out as
//! `[object area][metadata area]`. Nothing is shared across processes and
//! nothing is backed by a file, so the kernel hands back zeroed pages; a
//! zeroed metadata slot is exactly the "never allocated" state (nil
//! `next_free`, generation 0) and needs no further initialization.

use super::{AllocConfig, Result, SlotMeta, StoreError, POINTER_MASK};
use std::io;
use std::ptr;

/// One mapped slab: the region base plus precomputed per-slot addresses.
pub(crate) struct Slab {
    base: *mut u8,
    config: AllocConfig,
    /// Object slot `i` at `base + i * object_size`.
    objects: Vec<*mut u8>,
    /// Metadata slot `i` at `base + total_object_bytes + i * metadata_size`.
    metas: Vec<*mut SlotMeta>,
}

// SAFETY: Slab is Send + Sync because the raw pointers are stable addresses
// into a private mapping that lives until `unmap`; all mutation of slot
// contents is coordinated by the owning SlabStore (free-list mutex, slot
// ownership), never by the Slab itself.
unsafe impl Send for Slab {}
unsafe impl Sync for Slab {}

impl Slab {
    /// Map a new slab for `config`.
    ///
    /// # Errors
    ///
    /// [`StoreError::MapFailed`] if the kernel refuses the mapping,
    /// [`StoreError::AddressRangeExceeded`] if any address in the region
    /// would collide with the generation tag (bits above bit 55).
    pub(crate) fn map(config: &AllocConfig) -> Result<Self> {
        let len = config.slab_total_bytes as usize;

        // SAFETY:
        // - First argument is null, letting the kernel choose the address
        // - len is the exact slab size; mmap fails cleanly if invalid
        // - PROT_READ | PROT_WRITE for a private read-write region
        // - MAP_PRIVATE | MAP_ANONYMOUS: no file, no sharing, zero-filled
        // - fd -1 and offset 0 are required for anonymous mappings
        // - mmap returns MAP_FAILED on error (checked below)
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(StoreError::MapFailed {
                config: *config,
                source: io::Error::last_os_error(),
            });
        }

        let base = ptr as *mut u8;
        let end = base as u64 + config.slab_total_bytes;
        if (end & !POINTER_MASK) != 0 {
            // SAFETY: base/len come from the successful mmap above; the
            // region is unused, so unmapping before bailing out is safe.
            unsafe { libc::munmap(ptr, len) };
            return Err(StoreError::AddressRangeExceeded { addr: end });
        }

        let count = config.objects_per_slab as usize;
        let mut objects = Vec::with_capacity(count);
        let mut metas = Vec::with_capacity(count);
        for i in 0..count {
            // SAFETY: both offsets stay inside the mapped region; the object
            // area spans [0, total_object_bytes) and the metadata area
            // [total_object_bytes, slab_total_bytes).
            unsafe {
                objects.push(base.add(i * config.object_size as usize));
                metas.push(
                    base.add((config.total_object_bytes + i as u64 * config.metadata_size) as usize)
                        .cast::<SlotMeta>(),
                );
            }
        }

        log::debug!(
            "[STORE] mapped slab: {} x {}B objects, {} bytes at {:#x}",
            config.objects_per_slab,
            config.object_size,
            config.slab_total_bytes,
            base as u64
        );

        Ok(Self {
            base,
            config: *config,
            objects,
            metas,
        })
    }

    /// Addresses of object slot and metadata slot `offset`.
    #[inline]
    pub(crate) fn slot(&self, offset: usize) -> (*mut u8, *mut SlotMeta) {
        (self.objects[offset], self.metas[offset])
    }

    /// Unmap the region. Every handle into this slab is invalid afterwards.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnmapFailed`] if the kernel rejects the unmap.
    pub(crate) fn unmap(&self) -> Result<()> {
        // SAFETY:
        // - self.base/slab_total_bytes describe exactly the region mapped in
        //   `map`
        // - the owning store only calls this once (destroy is guarded by an
        //   AtomicBool) before dropping the Slab
        let ret = unsafe {
            libc::munmap(
                self.base.cast::<libc::c_void>(),
                self.config.slab_total_bytes as usize,
            )
        };
        if ret < 0 {
            return Err(StoreError::UnmapFailed {
                config: self.config,
                source: io::Error::last_os_error(),
            });
        }
        log::debug!(
            "[STORE] unmapped slab: {} bytes at {:#x}",
            self.config.slab_total_bytes,
            self.base as u64
        );
        Ok(())
    }
}
