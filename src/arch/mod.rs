//! Hardware seams.
//!
//! The control path never executes privileged instructions directly. Port
//! traffic goes through [`PortIo`] and processor control through [`Cpu`].
//! One backend per target provides the implementations that run on the
//! machine, together with the interrupt controller and serial port the
//! kernel globals are built from:
//!
//! - `amd64` on x86_64, over the `x86_64`, `pic8259` and `uart_16550` crates
//! - `x86` on 32-bit x86, over `core::arch::asm!`

#[cfg(target_arch = "x86_64")]
pub mod amd64;
#[cfg(target_arch = "x86_64")]
pub use amd64::{kernel_pic, HardwareCpu, HardwarePic, HardwarePorts, KernelPic, SerialPort};

#[cfg(target_arch = "x86")]
pub mod x86;
#[cfg(target_arch = "x86")]
pub use x86::{kernel_pic, HardwareCpu, HardwarePorts, KernelPic, SerialPort};

use crate::interrupts::idt::TablePointer;

/// Byte-wide access to the I/O port space.
pub trait PortIo {
    fn write_u8(&mut self, port: u16, value: u8);
    fn read_u8(&mut self, port: u16) -> u8;

    /// Gives slow devices (the 8259 in particular) time to settle between
    /// initialization words.
    fn io_wait(&mut self) {
        self.write_u8(POST_PORT, 0);
    }
}

/// Unused POST diagnostic port, written to burn one I/O cycle.
pub const POST_PORT: u16 = 0x80;

/// Processor control used by interrupt setup and the idle paths.
pub trait Cpu {
    fn load_vector_table(&mut self, pointer: &TablePointer);
    fn enable_interrupts(&mut self);
    fn disable_interrupts(&mut self);
    fn interrupts_enabled(&self) -> bool;

    /// Sleeps until the next interrupt arrives.
    fn halt(&mut self);

    /// Stops the processor for good with interrupts masked.
    fn halt_forever(&mut self) -> !;

    /// Runs `f` with interrupts masked, restoring the previous state after.
    fn without_interrupts<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        let was_enabled = self.interrupts_enabled();
        if was_enabled {
            self.disable_interrupts();
        }
        let ret = f(self);
        if was_enabled {
            self.enable_interrupts();
        }
        ret
    }
}
