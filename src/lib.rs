//! # NightOS kernel control path
//!
//! The interrupt dispatch subsystem, the kernel heap and the cooperative
//! process scheduler of a single-core x86 kernel.
//!
//! ## Layout
//!
//! | Module       | Contents                                               |
//! |--------------|--------------------------------------------------------|
//! | `memory`     | Best-fit heap over a fixed arena                       |
//! | `interrupts` | Vector table, handler registry, 8259 PIC, PIT timer    |
//! | `process`    | Process control blocks and round-robin selection       |
//! | `kernel`     | Kernel core object, globals and the boot sequence      |
//! | `syscalls`   | `int 0x80` decoding and the process, time, heap calls  |
//! | `arch`       | Port I/O and CPU control seams, x86 and x86_64 backends |
//! | `klog`       | Levelled logging to the serial port                    |
//!
//! Hardware is only touched through [`arch::PortIo`] and [`arch::Cpu`], so
//! everything except the `arch` backends runs under `cargo test` on the host.

#![cfg_attr(not(test), no_std)]

#[macro_use]
pub mod klog;

pub mod arch;
pub mod config;
pub mod error;
pub mod interrupts;
pub mod kernel;
pub mod memory;
pub mod process;
pub mod serial;
pub mod syscalls;

#[cfg(test)]
pub(crate) mod testing;

pub use error::KernelError;
