//! Kernel configuration.
//!
//! Fixed layout values live in constants; the handful of knobs the boot code
//! may change are collected in [`KernelConfig`].

use crate::klog::KlogLevel;

pub const OS_NAME: &str = "NightOS";
pub const OS_VERSION: &str = "0.1.0";

/// Physical start of the kernel heap (1 MiB).
pub const HEAP_START: usize = 0x10_0000;
/// Size of the kernel heap arena (1 MiB).
pub const HEAP_SIZE: usize = 0x10_0000;

/// Kernel code segment selector loaded into every gate.
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

pub const TIMER_FREQUENCY: u32 = 100;

pub const PIC_MASTER_OFFSET: u8 = 0x20;
pub const PIC_SLAVE_OFFSET: u8 = 0x28;

/// Processes that can exist next to the kernel process (PID 0).
pub const MAX_PROCESSES: usize = 16;
pub const PROCESS_STACK_SIZE: usize = 4096;
pub const PROCESS_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub timer_frequency: u32,
    pub process_stack_size: usize,
    pub pic_master_offset: u8,
    pub pic_slave_offset: u8,
    pub log_level: KlogLevel,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            timer_frequency: TIMER_FREQUENCY,
            process_stack_size: PROCESS_STACK_SIZE,
            pic_master_offset: PIC_MASTER_OFFSET,
            pic_slave_offset: PIC_SLAVE_OFFSET,
            log_level: KlogLevel::Info,
        }
    }

    pub const fn with_timer_frequency(mut self, hz: u32) -> Self {
        self.timer_frequency = hz;
        self
    }

    pub const fn with_process_stack_size(mut self, bytes: usize) -> Self {
        self.process_stack_size = bytes;
        self
    }

    pub const fn with_pic_offsets(mut self, master: u8, slave: u8) -> Self {
        self.pic_master_offset = master;
        self.pic_slave_offset = slave;
        self
    }

    pub const fn with_log_level(mut self, level: KlogLevel) -> Self {
        self.log_level = level;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_only_named_fields() {
        let config = KernelConfig::new()
            .with_timer_frequency(1000)
            .with_process_stack_size(8192);

        assert_eq!(config.timer_frequency, 1000);
        assert_eq!(config.process_stack_size, 8192);
        assert_eq!(config.pic_master_offset, PIC_MASTER_OFFSET);
        assert_eq!(config.pic_slave_offset, PIC_SLAVE_OFFSET);
        assert_eq!(config.log_level, KlogLevel::Info);
    }
}
