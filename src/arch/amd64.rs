//! x86_64 backend.

use core::arch::asm;

use pic8259::ChainedPics;
use x86_64::instructions::{self, interrupts, port::Port};

pub use uart_16550::SerialPort;

use super::{Cpu, PortIo};
use crate::config::{PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET};
use crate::interrupts::idt::TablePointer;
use crate::interrupts::pic::InterruptController;

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
        unsafe { Port::<u8>::new(port).write(value) }
    }

    fn read_u8(&mut self, port: u16) -> u8 {
        unsafe { Port::<u8>::new(port).read() }
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
        interrupts::enable();
    }

    fn disable_interrupts(&mut self) {
        interrupts::disable();
    }

    fn interrupts_enabled(&self) -> bool {
        interrupts::are_enabled()
    }

    fn halt(&mut self) {
        instructions::hlt();
    }

    fn halt_forever(&mut self) -> ! {
        loop {
            interrupts::disable();
            instructions::hlt();
        }
    }
}

/// The chained 8259 pair driven by [`ChainedPics`].
///
/// `ChainedPics` takes vector numbers for end-of-interrupt, so the offsets
/// it was last initialized with are kept alongside it.
pub struct HardwarePic {
    pics: ChainedPics,
    master: u8,
    slave: u8,
}

pub type KernelPic = HardwarePic;

impl HardwarePic {
    /// # Safety
    /// Only the kernel may drive the PIC ports.
    pub const unsafe fn new(master: u8, slave: u8) -> Self {
        Self {
            pics: unsafe { ChainedPics::new(master, slave) },
            master,
            slave,
        }
    }
}

/// Controller behind the kernel's global dispatcher.
///
/// # Safety
/// See [`HardwarePic::new`].
pub const unsafe fn kernel_pic() -> KernelPic {
    unsafe { HardwarePic::new(PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET) }
}

impl InterruptController for HardwarePic {
    fn remap(&mut self, master_offset: u8, slave_offset: u8) {
        // SAFETY: `initialize` saves and restores the line masks around the
        // handshake.
        unsafe {
            self.pics = ChainedPics::new(master_offset, slave_offset);
            self.pics.initialize();
        }
        self.master = master_offset;
        self.slave = slave_offset;
    }

    fn acknowledge(&mut self, irq: u8) {
        let vector = if irq < 8 {
            self.master + irq
        } else {
            self.slave + (irq - 8)
        };
        unsafe { self.pics.notify_end_of_interrupt(vector) }
    }

    fn mask(&mut self) -> u16 {
        let [master, slave] = unsafe { self.pics.read_masks() };
        u16::from_le_bytes([master, slave])
    }

    fn set_mask(&mut self, mask: u16) {
        let [master, slave] = mask.to_le_bytes();
        unsafe { self.pics.write_masks(master, slave) }
    }
}
