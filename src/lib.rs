// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # offheap - slab arena with generation-checked handles
//!
//! An off-heap allocator for very large, long-lived data structures: all
//! payload lives in anonymous private memory mappings, and references into
//! it are plain 16-byte [`Handle`] values a garbage collector (or borrow
//! checker) never chases. Slots carry an 8-bit generation tag, so a stale
//! reference fails fast instead of reading recycled memory.
//!
//! ## Quick Start
//!
//! ```rust
//! use offheap::Store;
//!
//! let store = Store::new();
//!
//! // Single objects
//! let counter = store.alloc_object::<i64>();
//! *counter.value() = 42;
//! assert_eq!(*counter.value(), 42);
//! store.free_object(counter);
//!
//! // Growable slices
//! let mut points = store.alloc_slice::<f64>(0, 0);
//! for i in 0..10 {
//!     points = store.append(points, i as f64);
//! }
//! assert_eq!(points.len(), 10);
//! store.free_slice(points);
//!
//! // Interned strings: one off-heap copy per distinct value
//! let interner = offheap::BytesInterner::new(64, 1 << 20);
//! let a = interner.get(b"label");
//! let b = interner.get(b"label");
//! assert_eq!(a.as_ptr(), b.as_ptr());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  Interners     BytesInterner / IntInterner / Float / Time    |
//! +--------------------------------------------------------------+
//! |  Typed refs    ObjectRef<T> | SliceRef<T> | StringRef        |
//! +--------------------------------------------------------------+
//! |  Store         size-class dispatch (class i = (2^(i-1),2^i]) |
//! +--------------------------------------------------------------+
//! |  SlabStore     bump index + LIFO free list per class         |
//! +--------------------------------------------------------------+
//! |  Slab          mmap(ANON|PRIVATE): [objects][metadata]       |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Store`] | Entry point: size-class dispatched allocator |
//! | [`ObjectRef`] | Typed handle to one off-heap object |
//! | [`SliceRef`] | Typed handle to a growable element buffer |
//! | [`StringRef`] | Handle to an immutable off-heap UTF-8 run |
//! | [`BytesInterner`] | Deduplicated off-heap byte strings |
//!
//! ## Safety model
//!
//! Misusing a handle (double free, read after free, stale generation) is a
//! program bug and panics. The generation tag is 8 bits: a slot recycled
//! exactly 256 times between two uses of one handle slips past the check.
//! Handles may be published across threads through any happens-before edge;
//! racing `free` against a concurrent dereference of the *same* handle is
//! as undefined as it is with raw memory.
//!
//! Requires a POSIX `mmap` with anonymous private mappings, and user-space
//! addresses below 2^56 (the top byte of the metadata word is the
//! generation tag; slab construction fails otherwise).

/// Sharded string interning (bytes, ints, floats, timestamps).
pub mod intern;
/// Typed reference wrappers over raw handles.
pub mod refs;
/// Slab mapping, size classes, and the allocation core.
pub mod store;

pub use intern::{BytesInterner, FloatInterner, IntInterner, InternStats, InternSummary, TimeInterner};
pub use refs::{ObjectRef, Plain, SliceRef, StringRef};
pub use store::{
    size_class, AllocConfig, Handle, SlabStats, SlabStore, Store, StoreError,
    DEFAULT_SLAB_BYTES, MAX_SIZE_CLASS,
};
