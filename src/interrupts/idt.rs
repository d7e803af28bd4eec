//! # Interrupt Descriptor Table
//!
//! Protected-mode (32-bit) gate descriptors and the pointer record handed
//! to `lidt`.
//!
//! ## Gate layout
//!
//! ```text
//! byte  0..2   handler offset, low half
//! byte  2..4   code segment selector
//! byte  4      reserved (zero)
//! byte  5      type/attributes   P | DPL(2) | 0 | type(4)
//! byte  6..8   handler offset, high half
//! ```

use bitflags::bitflags;

pub const IDT_ENTRIES: usize = 256;
pub const EXCEPTION_VECTORS: usize = 32;
pub const IRQ_LINES: usize = 16;
pub const GATE_SIZE: usize = 8;

bitflags! {
    /// The type/attribute byte of a gate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GateAttributes: u8 {
        const PRESENT = 0x80;
        const DPL_RING3 = 0x60;
        const INTERRUPT_32 = 0x0E;
        const TRAP_32 = 0x0F;
    }
}

impl GateAttributes {
    /// Present 32-bit interrupt gate, ring 0 (0x8E).
    pub const INTERRUPT_GATE: Self = Self::PRESENT.union(Self::INTERRUPT_32);
    /// Present 32-bit trap gate, ring 0 (0x8F).
    pub const TRAP_GATE: Self = Self::PRESENT.union(Self::TRAP_32);
    /// Interrupt gate reachable with `int` from ring 3 (0xEE).
    pub const USER_INTERRUPT_GATE: Self = Self::INTERRUPT_GATE.union(Self::DPL_RING3);
    /// Trap gate reachable from ring 3 (0xEF). IF stays as it was.
    pub const USER_TRAP_GATE: Self = Self::TRAP_GATE.union(Self::DPL_RING3);
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDescriptor {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl GateDescriptor {
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    pub const fn new(handler: u32, selector: u16, attributes: GateAttributes) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector,
            zero: 0,
            type_attr: attributes.bits(),
            offset_high: (handler >> 16) as u16,
        }
    }

    pub fn handler(&self) -> u32 {
        let low = self.offset_low;
        let high = self.offset_high;
        u32::from(high) << 16 | u32::from(low)
    }

    pub fn selector(&self) -> u16 {
        self.selector
    }

    pub fn attributes(&self) -> GateAttributes {
        GateAttributes::from_bits_retain(self.type_attr)
    }

    pub fn is_present(&self) -> bool {
        self.attributes().contains(GateAttributes::PRESENT)
    }

    /// The descriptor exactly as the processor reads it.
    pub fn to_bytes(&self) -> [u8; GATE_SIZE] {
        let low = self.offset_low.to_le_bytes();
        let sel = self.selector.to_le_bytes();
        let high = self.offset_high.to_le_bytes();
        [low[0], low[1], sel[0], sel[1], 0, self.type_attr, high[0], high[1]]
    }
}

/// Operand of `lidt`: a 16-bit limit followed by a base as wide as the
/// target's addresses.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePointer {
    pub limit: u16,
    pub base: usize,
}

#[repr(C, align(8))]
pub struct VectorTable {
    gates: [GateDescriptor; IDT_ENTRIES],
}

impl VectorTable {
    pub const fn new() -> Self {
        Self {
            gates: [GateDescriptor::missing(); IDT_ENTRIES],
        }
    }

    pub fn set(&mut self, vector: u8, gate: GateDescriptor) {
        self.gates[usize::from(vector)] = gate;
    }

    pub fn get(&self, vector: u8) -> &GateDescriptor {
        &self.gates[usize::from(vector)]
    }

    /// First vector in `vectors` without a present gate.
    pub fn first_missing(&self, mut vectors: impl Iterator<Item = u8>) -> Option<u8> {
        vectors.find(|&v| !self.get(v).is_present())
    }

    pub fn pointer(&self) -> TablePointer {
        TablePointer {
            limit: (IDT_ENTRIES * GATE_SIZE - 1) as u16,
            base: self.gates.as_ptr() as usize,
        }
    }
}

impl Default for VectorTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry addresses of the assembly stubs, handed over by the boot code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrampolineTable {
    pub exceptions: [u32; EXCEPTION_VECTORS],
    pub irqs: [u32; IRQ_LINES],
    /// Stub for the `int 0x80` system call gate, if the image has one.
    pub syscall: Option<u32>,
}
