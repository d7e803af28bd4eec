//! # Kernel
//!
//! The kernel core object, the globals the interrupt entry path reaches
//! and the boot sequence.
//!
//! ## Locking
//!
//! Two spin locks exist, [`DISPATCHER`] and [`CORE`]. Interrupt gates enter
//! with IF clear and take either lock directly. Everything else must hold
//! them with interrupts masked ([`with_dispatcher`], [`with_core`]), or the
//! entry path could spin on a lock its own CPU holds. The timer handler only
//! ever `try_lock`s the core and skips the charge when it is busy.

pub mod init;
pub mod state;
pub mod status;

use spin::{Mutex, Once};

use crate::arch::{kernel_pic, Cpu, HardwareCpu, KernelPic};
use crate::interrupts::frame::{CS_INDEX, EAX_INDEX, KERNEL_FRAME_WORDS, USER_FRAME_WORDS};
use crate::interrupts::{Dispatcher, FatalReport, InterruptController, InterruptFrame, InterruptIndex, Route, Timer, TIMER};

pub use init::{bring_up, init_kernel, start_interrupts, Machine, PHASES};
pub use state::KernelCore;
pub use status::{get_all_statuses, ComponentStatus, InitStatus, StatusBoard};

pub type KernelDispatcher = Dispatcher<KernelPic>;

// SAFETY: the kernel is the only owner of the PIC ports.
pub static DISPATCHER: Mutex<KernelDispatcher> = Mutex::new(Dispatcher::new(unsafe { kernel_pic() }));

/// Set once by [`init_kernel`].
pub static CORE: Once<Mutex<KernelCore<'static>>> = Once::new();

/// Runs `f` on the kernel core with interrupts masked. `None` before boot.
pub fn with_core<R>(f: impl FnOnce(&mut KernelCore<'static>) -> R) -> Option<R> {
    let core = CORE.get()?;
    // SAFETY: kernel code runs in ring 0.
    let mut cpu = unsafe { HardwareCpu::new() };
    Some(cpu.without_interrupts(|_| f(&mut core.lock())))
}

/// Runs `f` on the global dispatcher with interrupts masked.
pub fn with_dispatcher<R>(f: impl FnOnce(&mut KernelDispatcher) -> R) -> R {
    // SAFETY: kernel code runs in ring 0.
    let mut cpu = unsafe { HardwareCpu::new() };
    cpu.without_interrupts(|_| f(&mut DISPATCHER.lock()))
}

/// IRQ0 handler installed at boot.
pub fn timer_interrupt(_frame: &InterruptFrame) {
    TIMER.advance();
    if let Some(mut core) = CORE.get().and_then(|core| core.try_lock()) {
        core.timer_tick();
    }
}

/// Common target of every entry stub.
///
/// # Safety
/// `stack` must be null or point to the words the stub just pushed, valid
/// for writes until this returns. Sixteen words must be readable when the
/// saved `cs` is not ring 0, fourteen otherwise.
#[no_mangle]
pub unsafe extern "C" fn isr_dispatch(stack: *mut u32) {
    if stack.is_null() {
        return;
    }
    let cs = unsafe { stack.add(CS_INDEX).read() };
    let len = if cs & 3 != 0 {
        USER_FRAME_WORDS
    } else {
        KERNEL_FRAME_WORDS
    };
    let words = unsafe { core::slice::from_raw_parts_mut(stack, len) };
    // SAFETY: entry stubs run in ring 0.
    let mut cpu = unsafe { HardwareCpu::new() };
    entry(&DISPATCHER, CORE.get(), &TIMER, &mut cpu, words);
}

/// Handles one interrupt given the stub's stack image.
///
/// System calls are serviced against `core` and only their result is
/// written back, into the saved `eax`. Everything else is routed under the
/// dispatcher lock and run after it is released.
pub fn entry<C: InterruptController>(
    dispatcher: &Mutex<Dispatcher<C>>,
    core: Option<&Mutex<KernelCore<'_>>>,
    timer: &Timer,
    cpu: &mut impl Cpu,
    words: &mut [u32],
) {
    let mut frame = match InterruptFrame::from_words(words) {
        Ok(frame) => frame,
        Err(err) => {
            klog_error!("isr: {}", err);
            cpu.halt_forever()
        }
    };

    if frame.vector() == Some(InterruptIndex::Syscall.as_u8()) {
        crate::syscalls::service(core, timer, cpu, &mut frame);
        words[EAX_INDEX] = frame.eax;
        return;
    }

    let route = dispatcher.lock().route(&frame);
    match route {
        Ok(Route::Invoke(handler)) => handler.invoke(&frame),
        Ok(Route::Ignore) => {}
        Ok(Route::Fatal(report)) => halt_with_report(&report, cpu),
        Err(err) => {
            klog_error!("isr: {}", err);
            cpu.halt_forever()
        }
    }
}

/// Reports an unrecoverable interrupt and stops the machine.
pub fn halt_with_report(report: &FatalReport, cpu: &mut impl Cpu) -> ! {
    klog_error!("{}", report);
    cpu.halt_forever()
}
