//! 32-bit x86 backend.
//!
//! `pic8259` and `uart_16550` reach their ports through the `x86_64` crate,
//! which has no instructions on this target, so the PIC and the UART are
//! driven through [`HardwarePorts`] here.

use core::arch::asm;
use core::fmt;
use core::hint::spin_loop;

use super::{Cpu, PortIo};
use crate::interrupts::idt::TablePointer;
use crate::interrupts::pic::Pic8259;

const EFLAGS_IF: u32 = 1 << 9;

/// Direct port I/O through `in`/`out`.
pub struct HardwarePorts {
    _private: (),
}

impl HardwarePorts {
    /// # Safety
    /// Port writes reprogram devices; only the kernel may hold one of these.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortIo for HardwarePorts {
    fn write_u8(&mut self, port: u16, value: u8) {
        unsafe {
            asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }

    fn read_u8(&mut self, port: u16) -> u8 {
        let value: u8;
        unsafe {
            asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
        }
        value
    }
}

pub struct HardwareCpu {
    _private: (),
}

impl HardwareCpu {
    /// # Safety
    /// Must only be used in ring 0.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Cpu for HardwareCpu {
    fn load_vector_table(&mut self, pointer: &TablePointer) {
        unsafe {
            asm!("lidt [{}]", in(reg) pointer as *const TablePointer, options(readonly, nostack, preserves_flags));
        }
    }

    fn enable_interrupts(&mut self) {
        unsafe { asm!("sti", options(nomem, nostack)) }
    }

    fn disable_interrupts(&mut self) {
        unsafe { asm!("cli", options(nomem, nostack)) }
    }

    fn interrupts_enabled(&self) -> bool {
        let flags: u32;
        unsafe {
            asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        flags & EFLAGS_IF != 0
    }

    fn halt(&mut self) {
        unsafe { asm!("hlt", options(nomem, nostack, preserves_flags)) }
    }

    fn halt_forever(&mut self) -> ! {
        loop {
            unsafe { asm!("cli; hlt", options(nomem, nostack)) }
        }
    }
}

pub type KernelPic = Pic8259<HardwarePorts>;

/// Controller behind the kernel's global dispatcher.
///
/// # Safety
/// Only the kernel may drive the PIC ports.
pub const unsafe fn kernel_pic() -> KernelPic {
    Pic8259::new(unsafe { HardwarePorts::new() })
}

// 16550 register offsets from the port base.
const DATA: u16 = 0;
const INT_ENABLE: u16 = 1;
const FIFO_CTRL: u16 = 2;
const LINE_CTRL: u16 = 3;
const MODEM_CTRL: u16 = 4;
const LINE_STATUS: u16 = 5;

const LINE_DLAB: u8 = 0x80;
const LINE_8N1: u8 = 0x03;
const STATUS_THR_EMPTY: u8 = 0x20;

/// Polled 16550 UART at a legacy port base.
pub struct SerialPort {
    base: u16,
    ports: HardwarePorts,
}

impl SerialPort {
    /// # Safety
    /// A UART must sit at `base` and nothing else may drive it.
    pub const unsafe fn new(base: u16) -> Self {
        Self {
            base,
            ports: unsafe { HardwarePorts::new() },
        }
    }

    /// 38400 baud, 8N1, FIFOs on, UART interrupts off.
    pub fn init(&mut self) {
        let b = self.base;
        let p = &mut self.ports;
        p.write_u8(b + INT_ENABLE, 0x00);
        p.write_u8(b + LINE_CTRL, LINE_DLAB);
        p.write_u8(b + DATA, 0x03);
        p.write_u8(b + INT_ENABLE, 0x00);
        p.write_u8(b + LINE_CTRL, LINE_8N1);
        p.write_u8(b + FIFO_CTRL, 0xC7);
        p.write_u8(b + MODEM_CTRL, 0x0B);
    }

    pub fn send(&mut self, byte: u8) {
        while self.ports.read_u8(self.base + LINE_STATUS) & STATUS_THR_EMPTY == 0 {
            spin_loop();
        }
        self.ports.write_u8(self.base + DATA, byte);
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().for_each(|byte| self.send(byte));
        Ok(())
    }
}
