//! Kernel-wide error taxonomy.
//!
//! Each subsystem returns its own error enum. Callers at the syscall or
//! shell boundary fold them into [`KernelError`] and hand out errno-style
//! codes.

use core::fmt;

use crate::interrupts::DispatchError;
use crate::memory::AllocError;
use crate::process::SchedError;

pub const ENOMEM: i32 = -12;
pub const EINVAL: i32 = -22;
pub const EAGAIN: i32 = -11;
pub const ESRCH: i32 = -3;
pub const EFAULT: i32 = -14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    OutOfMemory,
    InvalidArgument,
    NoFreeSlot,
    InvalidTarget,
    FatalException,
}

impl KernelError {
    pub const fn as_errno(self) -> i32 {
        match self {
            KernelError::OutOfMemory => ENOMEM,
            KernelError::InvalidArgument => EINVAL,
            KernelError::NoFreeSlot => EAGAIN,
            KernelError::InvalidTarget => ESRCH,
            KernelError::FatalException => EFAULT,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            KernelError::OutOfMemory => "out of memory",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::NoFreeSlot => "no free process slot",
            KernelError::InvalidTarget => "no such process",
            KernelError::FatalException => "fatal exception",
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AllocError> for KernelError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::OutOfMemory => KernelError::OutOfMemory,
            AllocError::InvalidSize | AllocError::InvalidAddress | AllocError::ArenaTooSmall => {
                KernelError::InvalidArgument
            }
        }
    }
}

impl From<SchedError> for KernelError {
    fn from(err: SchedError) -> Self {
        match err {
            SchedError::NoFreeSlot => KernelError::NoFreeSlot,
            SchedError::OutOfMemory => KernelError::OutOfMemory,
            SchedError::InvalidTarget => KernelError::InvalidTarget,
        }
    }
}

impl From<DispatchError> for KernelError {
    fn from(_: DispatchError) -> Self {
        KernelError::InvalidArgument
    }
}
