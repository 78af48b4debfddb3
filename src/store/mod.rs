// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Slab-backed off-heap allocation core.
//!
//! Memory is organized in three layers:
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  Store          one SlabStore per power-of-two size class    |
//! +--------------------------------------------------------------+
//! |  SlabStore      bump index + LIFO free list + slab growth    |
//! +--------------------------------------------------------------+
//! |  Slab           one anonymous mmap region:                   |
//! |                 [object slots][metadata slots]               |
//! +--------------------------------------------------------------+
//! ```
//!
//! Allocations hand out [`Handle`]s: plain 16-byte values carrying the slot's
//! payload address, its metadata address, and an 8-bit generation tag. The
//! garbage collector of a host language never sees these regions; here they
//! are simply memory the borrow checker does not track, so every dereference
//! goes through the handle's generation check.
//!
//! Allocator misuse (double free, stale handle, oversized request) is a
//! program bug and panics. Environmental failure (mmap refusing memory,
//! addresses above the 56-bit budget) surfaces as [`StoreError`].

mod config;
mod handle;
mod sized;
mod slab;
mod slabstore;

pub use config::AllocConfig;
pub use handle::Handle;
pub use sized::{size_class, Store, DEFAULT_SLAB_BYTES, MAX_SIZE_CLASS};
pub use slabstore::{SlabStats, SlabStore};

pub(crate) use handle::{SlotMeta, POINTER_MASK};

use std::fmt;
use std::io;

/// Errors raised by the mapping layer.
#[derive(Debug)]
pub enum StoreError {
    /// Anonymous mapping for a new slab failed.
    MapFailed {
        config: AllocConfig,
        source: io::Error,
    },

    /// Unmapping a slab failed during destruction.
    UnmapFailed {
        config: AllocConfig,
        source: io::Error,
    },

    /// The kernel handed out an address with bits above bit 55, which would
    /// collide with the generation tag.
    AddressRangeExceeded { addr: u64 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MapFailed { config, source } => {
                write!(
                    f,
                    "slab mapping of {} bytes failed ({} x {}B objects): {source}",
                    config.slab_total_bytes, config.objects_per_slab, config.object_size
                )
            }
            Self::UnmapFailed { config, source } => {
                write!(
                    f,
                    "slab unmapping of {} bytes failed: {source}",
                    config.slab_total_bytes
                )
            }
            Self::AddressRangeExceeded { addr } => {
                write!(
                    f,
                    "address range exceeded: {addr:#x} has bits above bit 55"
                )
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MapFailed { source, .. } | Self::UnmapFailed { source, .. } => Some(source),
            Self::AddressRangeExceeded { .. } => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
