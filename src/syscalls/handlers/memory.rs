//! # Memory System Call Handlers
//!
//! User space sees machine addresses; the heap works in handles, so both
//! directions are translated here.

use crate::kernel::KernelCore;
use crate::syscalls::dispatcher::{SyscallResult, SyscallReturn};

pub fn sys_malloc(core: &mut KernelCore<'_>, size: usize) -> SyscallResult {
    let ptr = core.allocate(size)?;
    Ok(SyscallReturn::Value(core.heap().addr(ptr)))
}

pub fn sys_free(core: &mut KernelCore<'_>, addr: usize) -> SyscallResult {
    let ptr = core.heap().ptr_from_addr(addr)?;
    core.release(ptr)?;
    Ok(SyscallReturn::Value(0))
}
