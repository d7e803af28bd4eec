//! # Programmable Interrupt Controller (8259 PIC)
//!
//! [`InterruptController`] is the dispatcher's view of the two chained 8259
//! chips. On x86_64 the `pic8259` crate drives them (`arch::HardwarePic`).
//! [`Pic8259`] runs the same handshake over any [`PortIo`] bus; 32-bit
//! builds use it as their controller, since `pic8259` does not build there.
//!
//! ## PIC Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │◀────│   PIC 2     │
//! │  (Master)   │ IRQ2│  (Slave)    │
//! │ IRQ 0-7     │     │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! ## Vector Remapping
//!
//! At power-on IRQ 0-7 land on vectors 8-15, on top of CPU exceptions.
//! The boot sequence moves them:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! ## Interrupt Assignments
//!
//! | IRQ | Vector | Device    |
//! |-----|--------|-----------|
//! | 0   | 32     | PIT timer |
//! | 1   | 33     | Keyboard  |
//! | 8   | 40     | RTC       |

#[cfg(any(test, target_arch = "x86"))]
use crate::arch::PortIo;
use crate::config::{PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET};

pub const PIC1_COMMAND: u16 = 0x20;
pub const PIC1_DATA: u16 = 0x21;
pub const PIC2_COMMAND: u16 = 0xA0;
pub const PIC2_DATA: u16 = 0xA1;

pub const PIC_EOI: u8 = 0x20;
pub const ICW1_ICW4: u8 = 0x01;
pub const ICW1_INIT: u8 = 0x10;
pub const ICW4_8086: u8 = 0x01;

/// Slave is wired to master input 2.
#[cfg(any(test, target_arch = "x86"))]
const CASCADE_IRQ: u8 = 2;

/// Vector numbers the CPU sees once the controller is remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_MASTER_OFFSET,        // 32 - IRQ0
    Keyboard = PIC_MASTER_OFFSET + 1, // 33 - IRQ1
    Rtc = PIC_SLAVE_OFFSET,           // 40 - IRQ8
    Syscall = 0x80,
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.as_u8())
    }
}

/// Hardware interrupt controller as the dispatcher sees it.
pub trait InterruptController {
    /// Moves IRQ 0-7 to `master_offset` and IRQ 8-15 to `slave_offset`,
    /// preserving the line masks.
    fn remap(&mut self, master_offset: u8, slave_offset: u8);
    /// End-of-interrupt for `irq`.
    fn acknowledge(&mut self, irq: u8);
    /// Combined mask, master in the low byte.
    fn mask(&mut self) -> u16;
    fn set_mask(&mut self, mask: u16);

    fn enable_irq(&mut self, irq: u8) {
        let mask = self.mask() & !(1u16 << irq);
        self.set_mask(mask);
    }

    fn disable_irq(&mut self, irq: u8) {
        let mask = self.mask() | (1u16 << irq);
        self.set_mask(mask);
    }
}

/// 8259 pair over a port bus. Masking touches only the chip that owns the
/// line.
#[cfg(any(test, target_arch = "x86"))]
pub struct Pic8259<P: PortIo> {
    ports: P,
}

#[cfg(any(test, target_arch = "x86"))]
impl<P: PortIo> Pic8259<P> {
    pub const fn new(ports: P) -> Self {
        Self { ports }
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    /// Remaps to the standard offsets and unmasks every line.
    pub fn init(&mut self) {
        self.remap(PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET);
        self.set_mask(0);
    }

    fn data_port(irq: u8) -> (u16, u8) {
        if irq < 8 {
            (PIC1_DATA, irq)
        } else {
            (PIC2_DATA, irq - 8)
        }
    }
}

#[cfg(any(test, target_arch = "x86"))]
impl<P: PortIo> InterruptController for Pic8259<P> {
    fn remap(&mut self, master_offset: u8, slave_offset: u8) {
        let p = &mut self.ports;
        let mask1 = p.read_u8(PIC1_DATA);
        let mask2 = p.read_u8(PIC2_DATA);

        // ICW1: start initialization, ICW4 follows
        p.write_u8(PIC1_COMMAND, ICW1_INIT | ICW1_ICW4);
        p.io_wait();
        p.write_u8(PIC2_COMMAND, ICW1_INIT | ICW1_ICW4);
        p.io_wait();

        // ICW2: vector offsets
        p.write_u8(PIC1_DATA, master_offset);
        p.io_wait();
        p.write_u8(PIC2_DATA, slave_offset);
        p.io_wait();

        // ICW3: cascade wiring
        p.write_u8(PIC1_DATA, 1 << CASCADE_IRQ);
        p.io_wait();
        p.write_u8(PIC2_DATA, CASCADE_IRQ);
        p.io_wait();

        // ICW4: 8086 mode
        p.write_u8(PIC1_DATA, ICW4_8086);
        p.io_wait();
        p.write_u8(PIC2_DATA, ICW4_8086);
        p.io_wait();

        p.write_u8(PIC1_DATA, mask1);
        p.write_u8(PIC2_DATA, mask2);
    }

    fn acknowledge(&mut self, irq: u8) {
        if irq >= 8 {
            self.ports.write_u8(PIC2_COMMAND, PIC_EOI);
        }
        self.ports.write_u8(PIC1_COMMAND, PIC_EOI);
    }

    fn enable_irq(&mut self, irq: u8) {
        let (port, line) = Self::data_port(irq);
        let value = self.ports.read_u8(port) & !(1 << line);
        self.ports.write_u8(port, value);
    }

    fn disable_irq(&mut self, irq: u8) {
        let (port, line) = Self::data_port(irq);
        let value = self.ports.read_u8(port) | (1 << line);
        self.ports.write_u8(port, value);
    }

    fn mask(&mut self) -> u16 {
        let low = self.ports.read_u8(PIC1_DATA);
        let high = self.ports.read_u8(PIC2_DATA);
        u16::from_le_bytes([low, high])
    }

    fn set_mask(&mut self, mask: u16) {
        let [low, high] = mask.to_le_bytes();
        self.ports.write_u8(PIC1_DATA, low);
        self.ports.write_u8(PIC2_DATA, high);
    }
}
