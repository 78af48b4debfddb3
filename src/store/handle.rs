// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generation-tagged slot handles.
//!
//! A [`Handle`] is a 16-byte GC-invisible reference into a mapped slab: one
//! word holds the payload address, the other packs the slot-metadata address
//! into its low 56 bits and an 8-bit generation tag into the top byte. The
//! tag is compared against the slot's metadata on every dereference, so a
//! handle that outlived a free/realloc cycle of its slot fails fast instead
//! of silently reading someone else's data.
//!
//! The generation is 8 bits and wraps: after exactly 256 reuse cycles of the
//! same slot a stale handle passes the check again. That ABA window is a
//! documented trade-off of the compact encoding.

use std::ptr;

/// Low 56 bits of a handle word: the actual pointer.
pub(crate) const POINTER_MASK: u64 = (1 << 56) - 1;

const GENERATION_SHIFT: u32 = 56;

/// Per-slot bookkeeping, colocated in the slab after the object area.
///
/// A slot is free iff `next_free` is non-nil. Free slots chain through
/// `next_free` to form the store's LIFO free list; the tail of the chain
/// points to itself so that "free" stays detectable as "non-nil". A slot
/// fresh out of `mmap` is all zeroes: nil `next_free`, generation 0.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct SlotMeta {
    pub(crate) next_free: Handle,
    pub(crate) generation: u8,
}

/// Compact off-heap reference: data address, metadata address, generation.
///
/// Handles are plain values. Copying one does not copy the referent, and
/// dropping one does not free it; the owning store's `free` does. The nil
/// handle (all zeroes) refers to nothing and is the `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle {
    data: u64,
    meta: u64,
}

impl Handle {
    /// The nil handle.
    pub const NIL: Handle = Handle { data: 0, meta: 0 };

    /// Construct a generation-0 handle for a freshly mapped slot.
    ///
    /// # Panics
    ///
    /// Panics if either address has bits above bit 55; the top byte of the
    /// metadata word is reserved for the generation tag.
    pub(crate) fn new(data: *mut u8, meta: *mut SlotMeta) -> Self {
        let data = data as u64;
        let meta = meta as u64;
        assert!(
            ((data | meta) & !POINTER_MASK) == 0,
            "address range exceeded: {:#x} has bits above bit 55",
            if data & !POINTER_MASK != 0 { data } else { meta }
        );
        Self { data, meta }
    }

    /// True iff this handle refers to nothing.
    #[inline]
    #[must_use]
    pub fn is_nil(&self) -> bool {
        (self.meta & POINTER_MASK) == 0
    }

    /// The 8-bit generation tag carried in the metadata word.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u8 {
        (self.meta >> GENERATION_SHIFT) as u8
    }

    #[inline]
    fn set_generation(&mut self, generation: u8) {
        self.meta = (self.meta & POINTER_MASK) | (u64::from(generation) << GENERATION_SHIFT);
    }

    #[inline]
    fn meta_ptr(&self) -> *mut SlotMeta {
        (self.meta & POINTER_MASK) as *mut SlotMeta
    }

    /// Read the slot metadata.
    ///
    /// SAFETY (of the internal dereference):
    /// - `meta_ptr` was produced by slab construction and stays valid until
    ///   the owning store is destroyed.
    /// - Metadata for a given slot is only written by the thread currently
    ///   transitioning that slot (alloc/free/append under the store's free
    ///   lock or by the sole owner), so a read through an independent live
    ///   handle does not race.
    #[inline]
    fn read_meta(&self) -> SlotMeta {
        assert!(!self.is_nil(), "use after free: nil handle dereference");
        unsafe { ptr::read(self.meta_ptr()) }
    }

    #[inline]
    fn write_meta(&self, meta: SlotMeta) {
        // SAFETY: same provenance and exclusivity argument as `read_meta`;
        // all callers are transitioning this slot.
        unsafe { ptr::write(self.meta_ptr(), meta) };
    }

    /// The payload address, validated against the slot metadata.
    ///
    /// # Panics
    ///
    /// Panics if the slot is currently free (use after free) or if the slot
    /// generation does not match this handle's tag (stale reference).
    #[must_use]
    pub(crate) fn data_ptr(&self) -> *mut u8 {
        let meta = self.read_meta();
        assert!(
            meta.next_free.is_nil(),
            "use after free: slot is on the free list"
        );
        let expected = self.generation();
        assert!(
            meta.generation == expected,
            "stale reference: handle generation {expected} does not match slot generation {}",
            meta.generation
        );
        self.data as *mut u8
    }

    /// Recycle this slot off the free list.
    ///
    /// Clears `next_free`, bumps the slot generation, and retags `self` with
    /// the new generation. Returns the next free-list root: the link that was
    /// stored in this slot, or nil if the link pointed back at this slot
    /// (the self-looping tail, meaning the list is now empty).
    ///
    /// Caller must hold the store's free-list lock.
    pub(crate) fn alloc_from_free(&mut self) -> Handle {
        let mut meta = self.read_meta();
        let next = meta.next_free;
        // Compare before retagging: the tail link was stored with the same
        // generation this handle still carries.
        let was_tail = next == *self;

        meta.next_free = Handle::NIL;
        meta.generation = meta.generation.wrapping_add(1);
        self.write_meta(meta);
        self.set_generation(meta.generation);

        if was_tail {
            Handle::NIL
        } else {
            next
        }
    }

    /// Push this slot onto the free list whose current root is `old_root`.
    ///
    /// The freed slot's `next_free` becomes `old_root`, or the slot itself
    /// when the list was empty, so a free slot's link is never nil.
    ///
    /// Caller must hold the store's free-list lock and then install `self`
    /// as the new root.
    ///
    /// # Panics
    ///
    /// Panics on a double free (`next_free` already set) or a stale handle
    /// (generation mismatch). A slot that has wrapped through all 256
    /// generations back to this handle's tag is indistinguishable from live
    /// and will be freed out from under its current owner.
    pub(crate) fn free(&self, old_root: Handle) {
        let mut meta = self.read_meta();
        assert!(
            meta.next_free.is_nil(),
            "use after free: slot already on the free list (double free)"
        );
        let expected = self.generation();
        assert!(
            meta.generation == expected,
            "stale reference: handle generation {expected} does not match slot generation {}",
            meta.generation
        );

        meta.next_free = if old_root.is_nil() { *self } else { old_root };
        self.write_meta(meta);
    }

    /// Bump the slot generation and return a handle carrying the new tag.
    ///
    /// Used by in-place slice appends: the input reference is invalidated
    /// without the slot changing address. Caller must have just validated
    /// liveness through `data_ptr`.
    pub(crate) fn bump_generation(mut self) -> Handle {
        let mut meta = self.read_meta();
        meta.generation = meta.generation.wrapping_add(1);
        self.write_meta(meta);
        self.set_generation(meta.generation);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Leaked boxes stand in for slab slots; user-space heap addresses stay
    // far below bit 55 on the supported platforms.
    fn slot() -> Handle {
        let meta = Box::into_raw(Box::new(SlotMeta {
            next_free: Handle::NIL,
            generation: 0,
        }));
        let data = Box::into_raw(Box::new(0u64));
        Handle::new(data.cast(), meta)
    }

    fn meta_of(h: Handle) -> SlotMeta {
        unsafe { ptr::read(h.meta_ptr()) }
    }

    #[test]
    fn test_nil_handle() {
        assert!(Handle::NIL.is_nil());
        assert!(Handle::default().is_nil());
        assert_eq!(Handle::NIL.generation(), 0);
    }

    #[test]
    fn test_generation_round_trip() {
        let mut h = slot();
        assert_eq!(h.generation(), 0);
        h.set_generation(0xAB);
        assert_eq!(h.generation(), 0xAB);
        assert!(!h.is_nil());
    }

    #[test]
    #[should_panic(expected = "address range exceeded")]
    fn test_high_address_bits_are_fatal() {
        let bad = (1u64 << 56) as *mut SlotMeta;
        let _ = Handle::new(ptr::null_mut(), bad);
    }

    #[test]
    fn test_data_ptr_on_live_slot() {
        let h = slot();
        assert_eq!(h.data_ptr() as u64, h.data);
    }

    #[test]
    #[should_panic(expected = "use after free")]
    fn test_data_ptr_on_free_slot_panics() {
        let h = slot();
        h.free(Handle::NIL);
        let _ = h.data_ptr();
    }

    #[test]
    #[should_panic(expected = "stale reference")]
    fn test_data_ptr_with_stale_generation_panics() {
        let h = slot();
        let reallocated = h.bump_generation();
        assert_eq!(reallocated.generation(), 1);
        let _ = h.data_ptr();
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics() {
        let h = slot();
        h.free(Handle::NIL);
        h.free(Handle::NIL);
    }

    #[test]
    fn test_free_then_realloc_bumps_generation() {
        let mut h = slot();
        h.free(Handle::NIL);
        assert!(!meta_of(h).next_free.is_nil(), "tail must self-loop");

        let next = h.alloc_from_free();
        assert!(next.is_nil(), "single-entry list drains to empty");
        assert_eq!(h.generation(), 1);
        assert_eq!(meta_of(h).generation, 1);
        assert!(meta_of(h).next_free.is_nil());
    }

    #[test]
    fn test_free_list_is_lifo() {
        let a = slot();
        let b = slot();

        a.free(Handle::NIL); // root = a, a.next -> a
        b.free(a); // root = b, b.next -> a

        let mut root = b;
        let next = root.alloc_from_free();
        assert_eq!(next, a, "last freed pops first");
        let mut root = next;
        assert!(root.alloc_from_free().is_nil());
    }

    #[test]
    fn test_generation_wraps_modulo_256() {
        let mut h = slot();
        let first = h;
        for _ in 0..256 {
            h.free(Handle::NIL);
            h.alloc_from_free();
        }
        // 256 cycles later the tag has wrapped: the stale handle passes the
        // check again. Documented ABA window.
        assert_eq!(h.generation(), first.generation());
        assert_eq!(first.data_ptr(), h.data_ptr());
    }
}
