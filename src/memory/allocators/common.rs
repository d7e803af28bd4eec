//! Alignment helpers and the allocator error type.

use core::fmt;

#[inline]
pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[inline]
pub(crate) const fn align_down(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

#[inline]
pub(crate) const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free block can hold the request.
    OutOfMemory,
    /// Zero-size request.
    InvalidSize,
    /// The handle is not the payload of a live allocation.
    InvalidAddress,
    /// The arena cannot hold even one minimum block.
    ArenaTooSmall,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of memory"),
            AllocError::InvalidSize => write!(f, "invalid allocation size"),
            AllocError::InvalidAddress => write!(f, "address is not a live allocation"),
            AllocError::ArenaTooSmall => write!(f, "heap arena too small"),
        }
    }
}
