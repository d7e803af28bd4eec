//! CPU exception names and the report rendered on the fatal path.

use core::fmt;

use super::frame::InterruptFrame;

pub const EXCEPTION_NAMES: [&str; 32] = [
    "Division By Zero",
    "Debug",
    "Non Maskable Interrupt",
    "Breakpoint",
    "Overflow",
    "Bound Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection Fault",
    "Page Fault",
    "Reserved",
    "x87 FPU Error",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point",
    "Virtualization",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Security Exception",
    "Reserved",
];

pub fn exception_name(vector: u32) -> Option<&'static str> {
    EXCEPTION_NAMES.get(vector as usize).copied()
}

/// Diagnostic for an interrupt nobody handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalReport {
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

impl FatalReport {
    pub fn from_frame(frame: &InterruptFrame) -> Self {
        Self {
            vector: frame.int_no,
            error_code: frame.err_code,
            eip: frame.eip,
            cs: frame.cs,
            eflags: frame.eflags,
        }
    }

    pub fn is_exception(&self) -> bool {
        exception_name(self.vector).is_some()
    }
}

impl fmt::Display for FatalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KERNEL PANIC")?;
        match exception_name(self.vector) {
            Some(name) => writeln!(f, "  Exception:  {} (#{})", name, self.vector)?,
            None => writeln!(f, "  Unknown interrupt: {}", self.vector)?,
        }
        writeln!(f, "  Error code: {:#x}", self.error_code)?;
        writeln!(f, "  EIP:        {:#010x}", self.eip)?;
        writeln!(f, "  CS:         {:#06x}", self.cs)?;
        writeln!(f, "  EFLAGS:     {:#010x}", self.eflags)?;
        write!(f, "System halted.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn names() {
        assert_eq!(exception_name(0), Some("Division By Zero"));
        assert_eq!(exception_name(13), Some("General Protection Fault"));
        assert_eq!(exception_name(14), Some("Page Fault"));
        assert_eq!(exception_name(30), Some("Security Exception"));
        assert_eq!(exception_name(32), None);
    }

    #[test]
    fn report_rendering() {
        let report = FatalReport::from_frame(&testing::frame(13, 0x18));
        let text = report.to_string();
        assert!(text.starts_with("KERNEL PANIC"));
        assert!(text.contains("General Protection Fault (#13)"));
        assert!(text.contains("Error code: 0x18"));
        assert!(text.contains("EIP:        0x00102a40"));
        assert!(text.ends_with("System halted."));
    }

    #[test]
    fn unknown_vector_report() {
        let report = FatalReport::from_frame(&testing::frame(0x90, 0));
        assert!(!report.is_exception());
        assert!(report.to_string().contains("Unknown interrupt: 144"));
    }
}
