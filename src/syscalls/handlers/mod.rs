//! # System Call Handlers
//!
//! Contains implementations for all system call categories.
//!
//! ## Modules
//!
//! - `process`: Process management (exit, getpid, yield, kill)
//! - `time`: Time operations (sleep, time)
//! - `memory`: Kernel heap access (malloc, free)
//!
//! ## Handler Signature
//!
//! Handlers take the kernel core plus the register arguments they use:
//! ```ignore
//! fn sys_kill(core: &mut KernelCore<'_>, pid: usize) -> SyscallResult
//! ```

pub mod memory;
pub mod process;
pub mod time;
