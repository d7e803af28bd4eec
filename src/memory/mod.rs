//! # Memory Management
//!
//! The kernel owns one fixed arena (see [`crate::config::HEAP_START`]) and
//! hands out variable-size blocks from it through [`Heap`]. Process stacks
//! and every other dynamic buffer in the kernel come from this arena.

pub mod allocators;

pub use allocators::{AllocError, BlockInfo, Heap, HeapPtr, HeapStats, InvariantViolation};
