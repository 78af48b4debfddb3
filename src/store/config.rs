// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Slab geometry derived from a requested object size and a slab byte budget.

use super::SlotMeta;
use std::mem;

/// Layout of one slab for a single size class.
///
/// All fields are powers of two except `slab_total_bytes`, which is the sum
/// of the object area and the metadata area. Derivation from a requested
/// object size `S` and a target slab size `B`:
///
/// 1. `object_size = next_pow2(S)`
/// 2. `total_object_bytes = next_pow2(B)`, raised to `object_size` if smaller
/// 3. `objects_per_slab = total_object_bytes / object_size`
/// 4. `metadata_size = next_pow2(size_of::<SlotMeta>())`
/// 5. `total_metadata_bytes = metadata_size * objects_per_slab`
/// 6. `slab_total_bytes = total_object_bytes + total_metadata_bytes`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocConfig {
    /// Bytes per object slot.
    pub object_size: u64,
    /// Slots per slab (power of two, at least 1).
    pub objects_per_slab: u64,
    /// Bytes of the object area.
    pub total_object_bytes: u64,
    /// Bytes per metadata slot.
    pub metadata_size: u64,
    /// Bytes of the metadata area.
    pub total_metadata_bytes: u64,
    /// Bytes mapped per slab.
    pub slab_total_bytes: u64,
}

impl AllocConfig {
    /// Derive the slab geometry for objects of `requested_size` bytes packed
    /// into slabs of roughly `slab_bytes` object bytes.
    ///
    /// A request of 0 bytes is served by 1-byte slots. A slab budget smaller
    /// than one object degenerates to one object per slab.
    #[must_use]
    pub fn new(requested_size: u64, slab_bytes: u64) -> Self {
        // next_power_of_two(0) is 1, so zero-sized requests still get a slot.
        let object_size = requested_size.next_power_of_two();

        let mut total_object_bytes = slab_bytes.next_power_of_two();
        if total_object_bytes < object_size {
            total_object_bytes = object_size;
        }
        let objects_per_slab = total_object_bytes / object_size;

        let metadata_size = (mem::size_of::<SlotMeta>() as u64).next_power_of_two();
        let total_metadata_bytes = metadata_size * objects_per_slab;

        Self {
            object_size,
            objects_per_slab,
            total_object_bytes,
            metadata_size,
            total_metadata_bytes,
            slab_total_bytes: total_object_bytes + total_metadata_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_object_size_to_pow2() {
        let cfg = AllocConfig::new(24, 8192);
        assert_eq!(cfg.object_size, 32);
        assert_eq!(cfg.total_object_bytes, 8192);
        assert_eq!(cfg.objects_per_slab, 256);
        assert_eq!(cfg.slab_total_bytes, 8192 + 256 * cfg.metadata_size);
    }

    #[test]
    fn test_zero_sized_request_gets_one_byte_slots() {
        let cfg = AllocConfig::new(0, 1024);
        assert_eq!(cfg.object_size, 1);
        assert_eq!(cfg.objects_per_slab, 1024);
    }

    #[test]
    fn test_budget_smaller_than_object_means_one_per_slab() {
        let cfg = AllocConfig::new(1 << 20, 8192);
        assert_eq!(cfg.object_size, 1 << 20);
        assert_eq!(cfg.total_object_bytes, 1 << 20);
        assert_eq!(cfg.objects_per_slab, 1);
    }

    #[test]
    fn test_metadata_size_is_pow2_of_slot_meta() {
        let cfg = AllocConfig::new(8, 8192);
        assert!(cfg.metadata_size.is_power_of_two());
        assert!(cfg.metadata_size as usize >= mem::size_of::<SlotMeta>());
        assert_eq!(
            cfg.total_metadata_bytes,
            cfg.metadata_size * cfg.objects_per_slab
        );
    }

    #[test]
    fn test_non_pow2_budget_rounds_up() {
        let cfg = AllocConfig::new(8, 5000);
        assert_eq!(cfg.total_object_bytes, 8192);
        assert_eq!(cfg.objects_per_slab, 1024);
    }
}
