//! # Process System Call Handlers

use crate::error::KernelError;
use crate::kernel::KernelCore;
use crate::process::Pid;
use crate::syscalls::dispatcher::{SyscallResult, SyscallReturn};

/// Marks the caller a zombie and switches away. The status is kept in the
/// control block until the slot is reaped.
pub fn sys_exit(core: &mut KernelCore<'_>, code: usize) -> SyscallResult {
    core.exit_current(code as u32 as i32);
    Ok(SyscallReturn::Value(0))
}

pub fn sys_getpid(core: &mut KernelCore<'_>) -> SyscallResult {
    Ok(SyscallReturn::Value(core.current_pid() as usize))
}

pub fn sys_yield(core: &mut KernelCore<'_>) -> SyscallResult {
    core.yield_now();
    Ok(SyscallReturn::Value(0))
}

pub fn sys_kill(core: &mut KernelCore<'_>, pid: usize) -> SyscallResult {
    let pid = Pid::try_from(pid).map_err(|_| KernelError::InvalidTarget)?;
    core.kill(pid)?;
    Ok(SyscallReturn::Value(0))
}
