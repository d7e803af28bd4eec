//! # System Calls
//!
//! User code enters through `int 0x80` (a ring-3 trap gate). The stub saves
//! the registers into an [`InterruptFrame`]; [`service`] decodes the call,
//! runs it against the kernel core and writes the result back to `eax`.

pub mod dispatcher;
pub mod handlers;
pub mod numbers;

use spin::Mutex;

use crate::arch::Cpu;
use crate::error::KernelError;
use crate::interrupts::{InterruptFrame, Timer};
use crate::kernel::KernelCore;

pub use dispatcher::{dispatch_syscall, encode, SyscallContext, SyscallResult, SyscallReturn};
pub use numbers::SyscallNumber;

/// Services one system call trap. The core lock is held with interrupts
/// masked and released before a sleep starts waiting.
pub fn service(
    core: Option<&Mutex<KernelCore<'_>>>,
    timer: &Timer,
    cpu: &mut impl Cpu,
    frame: &mut InterruptFrame,
) {
    let ctx = SyscallContext::from_frame(frame);
    let result = match core {
        Some(core) => cpu.without_interrupts(|_| dispatch_syscall(&mut core.lock(), &ctx)),
        None => Err(KernelError::InvalidArgument),
    };
    if let Ok(SyscallReturn::Sleep { milliseconds }) = result {
        timer.sleep_ms(milliseconds, cpu);
    }
    frame.eax = encode(&result);
}
