//! Best-fit kernel heap.
//!
//! The arena is tiled by blocks, each a 16-byte header followed by its
//! payload. Headers are stored inside the arena and linked by offset in
//! address order, so the `next` of a block is always the block that starts
//! right after its payload. The whole arena starts out as one free block.

use core::fmt;

use super::common::{align_down, align_up, is_aligned, AllocError};

pub const HEADER_SIZE: usize = 16;
/// Smallest tail worth splitting off into its own free block.
pub const MIN_ALLOC_SIZE: usize = 16;
pub const ALIGNMENT: usize = 8;

const NIL: u32 = u32::MAX;
const FLAG_FREE: u32 = 1;
const MAX_ARENA: usize = align_down(u32::MAX as usize - 1, ALIGNMENT);

/// Handle to a live allocation: the payload offset from the arena base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapPtr(u32);

impl HeapPtr {
    pub const fn offset(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy)]
struct Header {
    size: u32,
    next: u32,
    flags: u32,
    requested: u32,
}

impl Header {
    fn is_free(&self) -> bool {
        self.flags & FLAG_FREE != 0
    }
}

/// Read-only view of the allocator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    pub total: usize,
    /// Header plus payload bytes of every allocated block.
    pub used: usize,
    /// Header plus payload bytes of every free block.
    pub free: usize,
    pub allocations: u64,
    pub releases: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block header.
    pub offset: usize,
    /// Usable payload bytes.
    pub size: usize,
    pub free: bool,
    /// Bytes the caller asked for; zero for free blocks.
    pub requested: usize,
}

impl BlockInfo {
    pub fn span(&self) -> usize {
        HEADER_SIZE + self.size
    }

    pub fn payload(&self) -> HeapPtr {
        HeapPtr((self.offset + HEADER_SIZE) as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// No block header at the offset where the previous block ended.
    Gap { offset: usize },
    /// The block at `offset` runs past the end of the arena.
    Overrun { offset: usize },
    /// The block list ends before the arena does.
    Short { end: usize },
    /// The free block at `offset` follows another free block.
    AdjacentFree { offset: usize },
    /// Counters disagree with the block list.
    Accounting { used: usize, free: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::Gap { offset } => write!(f, "gap at {:#x}", offset),
            InvariantViolation::Overrun { offset } => {
                write!(f, "block at {:#x} overruns arena", offset)
            }
            InvariantViolation::Short { end } => write!(f, "block list ends early at {:#x}", end),
            InvariantViolation::AdjacentFree { offset } => {
                write!(f, "uncoalesced free block at {:#x}", offset)
            }
            InvariantViolation::Accounting { used, free } => {
                write!(f, "counters disagree with blocks (used {}, free {})", used, free)
            }
        }
    }
}

pub struct Heap<'a> {
    arena: &'a mut [u8],
    stats: HeapStats,
}

impl<'a> Heap<'a> {
    /// Takes ownership of `arena`. Leading bytes are skipped to reach 8-byte
    /// alignment and the length is rounded down to a multiple of 8.
    pub fn new(arena: &'a mut [u8]) -> Result<Self, AllocError> {
        let lead = arena.as_ptr().align_offset(ALIGNMENT);
        if lead >= arena.len() {
            return Err(AllocError::ArenaTooSmall);
        }
        let (_, rest) = arena.split_at_mut(lead);
        let len = align_down(rest.len(), ALIGNMENT).min(MAX_ARENA);
        if len < HEADER_SIZE + MIN_ALLOC_SIZE {
            return Err(AllocError::ArenaTooSmall);
        }
        let (arena, _) = rest.split_at_mut(len);

        let mut heap = Heap {
            arena,
            stats: HeapStats {
                total: len,
                used: 0,
                free: len,
                allocations: 0,
                releases: 0,
            },
        };
        heap.write_header(
            0,
            Header {
                size: (len - HEADER_SIZE) as u32,
                next: NIL,
                flags: FLAG_FREE,
                requested: 0,
            },
        );
        klog_info!("heap: {} KiB arena at {:#x}", len / 1024, heap.base());
        Ok(heap)
    }

    /// Address of the first arena byte.
    pub fn base(&self) -> usize {
        self.arena.as_ptr() as usize
    }

    /// Machine address of an allocation's payload.
    pub fn addr(&self, ptr: HeapPtr) -> usize {
        self.base() + ptr.offset()
    }

    /// Handle for a machine address inside the arena. The result is only
    /// checked for range; `release` and friends validate it further.
    pub fn ptr_from_addr(&self, addr: usize) -> Result<HeapPtr, AllocError> {
        addr.checked_sub(self.base())
            .filter(|&offset| offset < self.arena.len())
            .map(|offset| HeapPtr(offset as u32))
            .ok_or(AllocError::InvalidAddress)
    }

    pub fn allocate(&mut self, size: usize) -> Result<HeapPtr, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        if size > self.stats.total {
            return Err(AllocError::OutOfMemory);
        }
        let aligned = align_up(size, ALIGNMENT) as u32;

        let Some((offset, header)) = self.find_best_fit(aligned) else {
            klog_debug!("heap: no block for {} bytes ({} free)", size, self.stats.free);
            return Err(AllocError::OutOfMemory);
        };

        let mut header = self.split(offset, header, aligned);
        header.flags &= !FLAG_FREE;
        header.requested = size as u32;
        self.write_header(offset, header);

        let span = HEADER_SIZE + header.size as usize;
        self.stats.used += span;
        self.stats.free -= span;
        self.stats.allocations += 1;

        Ok(HeapPtr(offset + HEADER_SIZE as u32))
    }

    /// Allocates `count * size` bytes and zeroes them.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Result<HeapPtr, AllocError> {
        let total = count.checked_mul(size).ok_or(AllocError::OutOfMemory)?;
        let ptr = self.allocate(total)?;
        self.arena[ptr.offset()..ptr.offset() + total].fill(0);
        Ok(ptr)
    }

    /// Grows or keeps an allocation.
    ///
    /// Returns `ptr` unchanged when the block already holds `new_size`
    /// bytes. Otherwise the contents move to a fresh block and the old one is
    /// released. On failure the old block is left untouched.
    pub fn reallocate(&mut self, ptr: HeapPtr, new_size: usize) -> Result<HeapPtr, AllocError> {
        if new_size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let (offset, mut header) = self.locate(ptr)?;
        let old_size = header.size as usize;
        if old_size >= new_size {
            header.requested = new_size as u32;
            self.write_header(offset, header);
            return Ok(ptr);
        }

        let moved = self.allocate(new_size)?;
        let len = old_size.min(new_size);
        self.arena
            .copy_within(ptr.offset()..ptr.offset() + len, moved.offset());
        self.release(ptr)?;
        Ok(moved)
    }

    /// Marks the block behind `ptr` free and merges it with free neighbours.
    ///
    /// Handles that are not the payload of an allocated block, including
    /// ones already released, are rejected and leave the heap unchanged.
    pub fn release(&mut self, ptr: HeapPtr) -> Result<(), AllocError> {
        let (offset, mut header) = self.locate(ptr)?;
        header.flags |= FLAG_FREE;
        header.requested = 0;
        self.write_header(offset, header);

        let span = HEADER_SIZE + header.size as usize;
        self.stats.used -= span;
        self.stats.free += span;
        self.stats.releases += 1;

        self.coalesce();
        Ok(())
    }

    pub fn payload(&self, ptr: HeapPtr) -> Result<&[u8], AllocError> {
        let (_, header) = self.locate(ptr)?;
        Ok(&self.arena[ptr.offset()..ptr.offset() + header.size as usize])
    }

    pub fn payload_mut(&mut self, ptr: HeapPtr) -> Result<&mut [u8], AllocError> {
        let (_, header) = self.locate(ptr)?;
        Ok(&mut self.arena[ptr.offset()..ptr.offset() + header.size as usize])
    }

    /// Usable bytes behind `ptr`, which may exceed what was requested.
    pub fn usable_size(&self, ptr: HeapPtr) -> Result<usize, AllocError> {
        self.locate(ptr).map(|(_, header)| header.size as usize)
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub fn total(&self) -> usize {
        self.stats.total
    }

    pub fn used(&self) -> usize {
        self.stats.used
    }

    pub fn free(&self) -> usize {
        self.stats.free
    }

    /// Payload size of the biggest free block.
    pub fn largest_free(&self) -> usize {
        self.walk()
            .filter(|(_, h)| h.is_free())
            .map(|(_, h)| h.size as usize)
            .max()
            .unwrap_or(0)
    }

    /// Blocks in address order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.walk().map(|(offset, h)| BlockInfo {
            offset: offset as usize,
            size: h.size as usize,
            free: h.is_free(),
            requested: h.requested as usize,
        })
    }

    /// Checks that the blocks tile the arena exactly, that no two free
    /// blocks touch, and that the counters match the block list.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let len = self.arena.len();
        let mut expected = 0;
        let mut prev_free = false;
        let (mut used, mut free) = (0, 0);

        for block in self.blocks() {
            if block.offset != expected {
                return Err(InvariantViolation::Gap { offset: expected });
            }
            if prev_free && block.free {
                return Err(InvariantViolation::AdjacentFree {
                    offset: block.offset,
                });
            }
            expected = block.offset + block.span();
            if expected > len {
                return Err(InvariantViolation::Overrun {
                    offset: block.offset,
                });
            }
            if block.free {
                free += block.span();
            } else {
                used += block.span();
            }
            prev_free = block.free;
        }

        if expected != len {
            return Err(InvariantViolation::Short { end: expected });
        }
        if used != self.stats.used || free != self.stats.free {
            return Err(InvariantViolation::Accounting { used, free });
        }
        Ok(())
    }

    /// Logs the block map at debug level.
    pub fn dump(&self) {
        klog_debug!(
            "heap: used {} free {} allocs {} frees {}",
            self.stats.used,
            self.stats.free,
            self.stats.allocations,
            self.stats.releases
        );
        for (index, block) in self.blocks().enumerate() {
            klog_debug!(
                "  #{} {:#08x} {:>8} {}",
                index,
                block.offset,
                block.size,
                if block.free { "free" } else { "used" }
            );
        }
    }

    fn walk(&self) -> impl Iterator<Item = (u32, Header)> + '_ {
        core::iter::successors(Some(0u32), move |&offset| {
            let next = self.read_header(offset).next;
            (next != NIL).then_some(next)
        })
        .map(move |offset| (offset, self.read_header(offset)))
    }

    /// Smallest free block of at least `size` bytes, first one on ties.
    fn find_best_fit(&self, size: u32) -> Option<(u32, Header)> {
        self.walk()
            .filter(|(_, h)| h.is_free() && h.size >= size)
            .min_by_key(|(_, h)| h.size)
    }

    fn split(&mut self, offset: u32, mut header: Header, size: u32) -> Header {
        if header.size as usize >= size as usize + HEADER_SIZE + MIN_ALLOC_SIZE {
            let tail = offset + HEADER_SIZE as u32 + size;
            self.write_header(
                tail,
                Header {
                    size: header.size - size - HEADER_SIZE as u32,
                    next: header.next,
                    flags: FLAG_FREE,
                    requested: 0,
                },
            );
            header.size = size;
            header.next = tail;
        }
        header
    }

    // Merging does not advance after a merge, so runs of any length collapse.
    fn coalesce(&mut self) {
        let mut cursor = 0;
        loop {
            let mut current = self.read_header(cursor);
            if current.next == NIL {
                break;
            }
            let next = self.read_header(current.next);
            if current.is_free() && next.is_free() {
                current.size += HEADER_SIZE as u32 + next.size;
                current.next = next.next;
                self.write_header(cursor, current);
            } else {
                cursor = current.next;
            }
        }
    }

    fn locate(&self, ptr: HeapPtr) -> Result<(u32, Header), AllocError> {
        if !is_aligned(ptr.0 as usize, ALIGNMENT) {
            return Err(AllocError::InvalidAddress);
        }
        let target = ptr
            .0
            .checked_sub(HEADER_SIZE as u32)
            .ok_or(AllocError::InvalidAddress)?;
        self.walk()
            .take_while(|(offset, _)| *offset <= target)
            .find(|(offset, h)| *offset == target && !h.is_free())
            .ok_or(AllocError::InvalidAddress)
    }

    fn read_header(&self, offset: u32) -> Header {
        let at = offset as usize;
        Header {
            size: self.word(at),
            next: self.word(at + 4),
            flags: self.word(at + 8),
            requested: self.word(at + 12),
        }
    }

    fn write_header(&mut self, offset: u32, header: Header) {
        let at = offset as usize;
        self.set_word(at, header.size);
        self.set_word(at + 4, header.next);
        self.set_word(at + 8, header.flags);
        self.set_word(at + 12, header.requested);
    }

    fn word(&self, at: usize) -> u32 {
        let b = &self.arena[at..at + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn set_word(&mut self, at: usize, value: u32) {
        self.arena[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}
