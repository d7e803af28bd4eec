//! COM1 serial sink for the kernel log.

use core::fmt::{self, Write};

use spin::Mutex;

use crate::arch::{Cpu, HardwareCpu, SerialPort};

pub const COM1: u16 = 0x3F8;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1) });

/// Programs the UART and routes the kernel log to it.
///
/// # Safety
/// COM1 must exist and must not be driven by anything else.
pub unsafe fn init() {
    SERIAL.lock().init();
    crate::klog::attach_serial();
}

pub(crate) fn write_line(tag: &str, args: fmt::Arguments<'_>) {
    // An IRQ handler that logs while the lock is held would spin forever.
    // SAFETY: only attached once the kernel owns the machine.
    let mut cpu = unsafe { HardwareCpu::new() };
    cpu.without_interrupts(|_| {
        let mut serial = SERIAL.lock();
        let _ = write!(serial, "[{}] ", tag);
        let _ = serial.write_fmt(args);
        let _ = serial.write_str("\n");
    });
}
