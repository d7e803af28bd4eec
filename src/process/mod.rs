//! # Process Management
//!
//! Cooperative multitasking over a fixed table of process control blocks.
//!
//! ## State Machine
//!
//! ```text
//! FREE --create--> READY <--schedule--> RUNNING --block--> BLOCKED
//!                    ^                     |                  |
//!                    +------ unblock ------+------------------+
//!
//! READY/RUNNING --exit--> ZOMBIE --next schedule--> FREE
//! any live      --kill--> FREE
//! ```
//!
//! PID 0 is the kernel process: never killed, never exits, and the fallback
//! runner when no user process is ready.

pub mod pcb;
pub mod scheduler;

pub use pcb::{
    CpuContext, Pid, Priority, ProcessControlBlock, ProcessInfo, ProcessName, ProcessState,
    StackRegion, KERNEL_PID,
};
pub use scheduler::{SchedError, Scheduler, TABLE_SIZE};
