//! # Time System Call Handlers
//!
//! - `sys_time`: whole seconds since the timer started
//! - `sys_sleep`: returns a sleep request; the wait itself runs after the
//!   kernel lock is dropped so the timer interrupt can keep charging ticks

use crate::kernel::KernelCore;
use crate::syscalls::dispatcher::{SyscallResult, SyscallReturn};

pub fn sys_time(core: &mut KernelCore<'_>) -> SyscallResult {
    Ok(SyscallReturn::Value(core.timer().seconds() as usize))
}

pub fn sys_sleep(milliseconds: usize) -> SyscallResult {
    Ok(SyscallReturn::Sleep {
        milliseconds: milliseconds as u64,
    })
}
