//! # Memory Allocators
//!
//! ## Heap
//! - Best-fit search over an address-ordered block list
//! - Blocks are split when the tail can hold another minimum allocation
//! - Free neighbours are merged on every release
//! - Headers live in the arena and are addressed by offset, never by pointer
//!
//! ## Common Utilities
//!
//! - `AllocError`: Allocation failure types
//! - Alignment helpers: `align_up`, `align_down`, `is_aligned`

mod common;
pub mod heap;

pub use common::AllocError;
pub use heap::{BlockInfo, Heap, HeapPtr, HeapStats, InvariantViolation};
