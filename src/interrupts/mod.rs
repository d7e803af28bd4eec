//! # Interrupt Handling Module
//!
//! Vector table ownership, the handler registry and the routing of every
//! interrupt the entry stubs report.
//!
//! - **IDT**: 32-bit gate descriptors and the `lidt` pointer ([`idt`])
//! - **Frame**: the register snapshot built by the stubs ([`frame`])
//! - **PIC**: 8259 remap, masking and end-of-interrupt ([`pic`])
//! - **Timer**: PIT programming and the tick counter ([`timer`])
//!
//! ## Interrupt Vector Layout
//!
//! | Vector | Type           | Unhandled            |
//! |--------|----------------|----------------------|
//! | 0-31   | CPU Exceptions | fatal report, halt   |
//! | 32-47  | IRQ 0-15       | acknowledged, ignored|
//! | 48-255 | Software       | fatal report, halt   |
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --load_table--> TableLoaded --enable--> InterruptsEnabled
//! ```
//!
//! Gates may be written freely until interrupts are enabled. After that only
//! [`Dispatcher::reinstall_gate`], which masks interrupts around the write,
//! is accepted.

pub mod exceptions;
pub mod frame;
pub mod idt;
pub mod pic;
pub mod timer;

use core::fmt;

use crate::arch::Cpu;
use crate::config::{KERNEL_CODE_SELECTOR, PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET};

pub use exceptions::{exception_name, FatalReport};
pub use frame::{FrameError, InterruptFrame};
pub use idt::{GateAttributes, GateDescriptor, TablePointer, TrampolineTable, VectorTable};
#[cfg(any(test, target_arch = "x86"))]
pub use pic::Pic8259;
pub use pic::{InterruptController, InterruptIndex};
pub use timer::{Pit, Timer, TIMER};

use idt::{EXCEPTION_VECTORS, IDT_ENTRIES, IRQ_LINES};

/// Handler object for callers that need state.
pub trait InterruptHandler: Sync {
    fn handle(&self, frame: &InterruptFrame);
}

#[derive(Clone, Copy)]
pub enum Handler {
    Function(fn(&InterruptFrame)),
    Object(&'static dyn InterruptHandler),
}

impl Handler {
    pub fn invoke(&self, frame: &InterruptFrame) {
        match self {
            Handler::Function(f) => f(frame),
            Handler::Object(h) => h.handle(frame),
        }
    }
}

impl From<fn(&InterruptFrame)> for Handler {
    fn from(f: fn(&InterruptFrame)) -> Self {
        Handler::Function(f)
    }
}

impl From<&'static dyn InterruptHandler> for Handler {
    fn from(h: &'static dyn InterruptHandler) -> Self {
        Handler::Object(h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    TableLoaded,
    InterruptsEnabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Vector number outside 0..=255, or IRQ line outside 0..=15.
    InvalidVector(u32),
    /// Remap offsets overlapping the exceptions or each other.
    InvalidOffsets { master: u8, slave: u8 },
    /// A required gate was not installed before loading the table.
    MissingGate(u8),
    InvalidState(DispatchState),
    /// Unmasked gate write while interrupts are enabled.
    TableLive,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::InvalidVector(v) => write!(f, "invalid vector {}", v),
            DispatchError::InvalidOffsets { master, slave } => {
                write!(f, "invalid PIC offsets {:#x}/{:#x}", master, slave)
            }
            DispatchError::MissingGate(v) => write!(f, "no gate installed for vector {}", v),
            DispatchError::InvalidState(s) => write!(f, "operation not valid in state {:?}", s),
            DispatchError::TableLive => write!(f, "vector table is live, mask interrupts first"),
        }
    }
}

/// What the entry path must do with an interrupt. Produced under the
/// dispatcher lock, carried out after it is released.
#[derive(Clone, Copy)]
pub enum Route {
    Invoke(Handler),
    Ignore,
    Fatal(FatalReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Ignored,
    Fatal(FatalReport),
}

pub struct Dispatcher<C: InterruptController> {
    table: VectorTable,
    handlers: [Option<Handler>; IDT_ENTRIES],
    controller: C,
    state: DispatchState,
    master_offset: u8,
    slave_offset: u8,
}

impl<C: InterruptController> Dispatcher<C> {
    pub const fn new(controller: C) -> Self {
        Self {
            table: VectorTable::new(),
            handlers: [None; IDT_ENTRIES],
            controller,
            state: DispatchState::Uninitialized,
            master_offset: PIC_MASTER_OFFSET,
            slave_offset: PIC_SLAVE_OFFSET,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn table(&self) -> &VectorTable {
        &self.table
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn install_gate(
        &mut self,
        vector: u8,
        handler: u32,
        selector: u16,
        attributes: GateAttributes,
    ) -> Result<(), DispatchError> {
        if self.state == DispatchState::InterruptsEnabled {
            return Err(DispatchError::TableLive);
        }
        self.table.set(vector, GateDescriptor::new(handler, selector, attributes));
        Ok(())
    }

    /// Rewrites a gate on a live table with interrupts masked.
    pub fn reinstall_gate(
        &mut self,
        cpu: &mut impl Cpu,
        vector: u8,
        handler: u32,
        selector: u16,
        attributes: GateAttributes,
    ) {
        let gate = GateDescriptor::new(handler, selector, attributes);
        cpu.without_interrupts(|_| self.table.set(vector, gate));
    }

    /// Binds the exception stubs to 0-31, the IRQ stubs to the current
    /// controller offsets and the system call stub to 0x80.
    pub fn install_trampolines(&mut self, stubs: &TrampolineTable) -> Result<(), DispatchError> {
        for (vector, &addr) in stubs.exceptions.iter().enumerate() {
            self.install_gate(vector as u8, addr, KERNEL_CODE_SELECTOR, GateAttributes::INTERRUPT_GATE)?;
        }
        for (irq, &addr) in stubs.irqs.iter().enumerate() {
            let vector = self.irq_vector(irq as u8);
            self.install_gate(vector, addr, KERNEL_CODE_SELECTOR, GateAttributes::INTERRUPT_GATE)?;
        }
        if let Some(addr) = stubs.syscall {
            let vector = InterruptIndex::Syscall.as_u8();
            self.install_gate(vector, addr, KERNEL_CODE_SELECTOR, GateAttributes::USER_TRAP_GATE)?;
        }
        Ok(())
    }

    /// Runs the controller's initialization handshake with new offsets.
    /// Each offset must start an 8-vector window above the exceptions that
    /// leaves the system call vector alone.
    pub fn remap_controller(&mut self, master: u8, slave: u8) -> Result<(), DispatchError> {
        let syscall = InterruptIndex::Syscall.as_u8();
        let valid = |o: u8| {
            o as usize >= EXCEPTION_VECTORS && o % 8 == 0 && o <= 0xF0 && !(o..o + 8).contains(&syscall)
        };
        if !valid(master) || !valid(slave) || master == slave {
            return Err(DispatchError::InvalidOffsets { master, slave });
        }
        self.controller.remap(master, slave);
        self.master_offset = master;
        self.slave_offset = slave;
        klog_info!("pic: IRQ 0-7 -> {:#x}, IRQ 8-15 -> {:#x}", master, slave);
        Ok(())
    }

    /// Activates the table. Every exception vector and every IRQ vector must
    /// have a present gate.
    pub fn load_table(&mut self, cpu: &mut impl Cpu) -> Result<(), DispatchError> {
        if self.state == DispatchState::InterruptsEnabled {
            return Err(DispatchError::InvalidState(self.state));
        }
        let exceptions = 0..EXCEPTION_VECTORS as u8;
        if let Some(vector) = self.table.first_missing(exceptions) {
            return Err(DispatchError::MissingGate(vector));
        }
        let irqs = (0..IRQ_LINES as u8).map(|irq| self.irq_vector(irq));
        if let Some(vector) = self.table.first_missing(irqs) {
            return Err(DispatchError::MissingGate(vector));
        }
        cpu.load_vector_table(&self.table.pointer());
        self.state = DispatchState::TableLoaded;
        klog_info!("idt: {} gates loaded", IDT_ENTRIES);
        Ok(())
    }

    pub fn enable(&mut self, cpu: &mut impl Cpu) -> Result<(), DispatchError> {
        self.arm()?;
        cpu.enable_interrupts();
        Ok(())
    }

    /// Enters `InterruptsEnabled` without touching the interrupt flag.
    ///
    /// A dispatcher behind a lock that the entry path also takes must not
    /// set the flag while the guard is alive. Such callers arm, drop the
    /// guard, then enable on the CPU.
    pub fn arm(&mut self) -> Result<(), DispatchError> {
        if self.state != DispatchState::TableLoaded {
            return Err(DispatchError::InvalidState(self.state));
        }
        self.state = DispatchState::InterruptsEnabled;
        klog_info!("interrupts enabled");
        Ok(())
    }

    /// Returns the handler it replaced.
    pub fn register(&mut self, vector: u8, handler: impl Into<Handler>) -> Option<Handler> {
        self.handlers[usize::from(vector)].replace(handler.into())
    }

    pub fn unregister(&mut self, vector: u8) -> Option<Handler> {
        self.handlers[usize::from(vector)].take()
    }

    pub fn is_registered(&self, vector: u8) -> bool {
        self.handlers[usize::from(vector)].is_some()
    }

    pub fn register_irq(&mut self, irq: u8, handler: impl Into<Handler>) -> Result<Option<Handler>, DispatchError> {
        if usize::from(irq) >= IRQ_LINES {
            return Err(DispatchError::InvalidVector(u32::from(irq)));
        }
        Ok(self.register(self.irq_vector(irq), handler))
    }

    pub fn enable_irq(&mut self, irq: u8) -> Result<(), DispatchError> {
        if usize::from(irq) >= IRQ_LINES {
            return Err(DispatchError::InvalidVector(u32::from(irq)));
        }
        self.controller.enable_irq(irq);
        Ok(())
    }

    pub fn disable_irq(&mut self, irq: u8) -> Result<(), DispatchError> {
        if usize::from(irq) >= IRQ_LINES {
            return Err(DispatchError::InvalidVector(u32::from(irq)));
        }
        self.controller.disable_irq(irq);
        Ok(())
    }

    pub fn irq_vector(&self, irq: u8) -> u8 {
        if irq < 8 {
            self.master_offset + irq
        } else {
            self.slave_offset + (irq - 8)
        }
    }

    /// IRQ line delivered on `vector`, if any.
    pub fn irq_line(&self, vector: u8) -> Option<u8> {
        if (self.master_offset..self.master_offset + 8).contains(&vector) {
            Some(vector - self.master_offset)
        } else if (self.slave_offset..self.slave_offset + 8).contains(&vector) {
            Some(vector - self.slave_offset + 8)
        } else {
            None
        }
    }

    /// Decides what to do with one interrupt. IRQs are acknowledged here,
    /// before any handler runs.
    pub fn route(&mut self, frame: &InterruptFrame) -> Result<Route, DispatchError> {
        let vector = frame.vector().ok_or(DispatchError::InvalidVector(frame.int_no))?;
        let handler = self.handlers[usize::from(vector)];

        if usize::from(vector) >= EXCEPTION_VECTORS {
            if let Some(irq) = self.irq_line(vector) {
                self.controller.acknowledge(irq);
                return Ok(handler.map_or(Route::Ignore, Route::Invoke));
            }
        }
        Ok(match handler {
            Some(h) => Route::Invoke(h),
            None => Route::Fatal(FatalReport::from_frame(frame)),
        })
    }

    /// Routes and runs one interrupt. A fatal outcome is returned, not
    /// acted upon.
    pub fn dispatch(&mut self, frame: &InterruptFrame) -> Result<Dispatch, DispatchError> {
        Ok(match self.route(frame)? {
            Route::Invoke(handler) => {
                handler.invoke(frame);
                Dispatch::Handled
            }
            Route::Ignore => Dispatch::Ignored,
            Route::Fatal(report) => Dispatch::Fatal(report),
        })
    }
}
