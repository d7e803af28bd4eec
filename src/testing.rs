//! Host-side doubles for the hardware seams.
//!
//! Port traffic and handler marks go to a per-thread journal so parallel
//! tests never see each other's events and orderings can be asserted across
//! both.

use std::cell::RefCell;

use crate::arch::{Cpu, PortIo, POST_PORT};
use crate::interrupts::idt::TablePointer;
use crate::interrupts::timer::Timer;
use crate::interrupts::InterruptFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Write { port: u16, value: u8 },
    Read { port: u16 },
    Mark(&'static str),
}

thread_local! {
    static JOURNAL: RefCell<Vec<Event>> = const { RefCell::new(Vec::new()) };
}

pub fn mark(label: &'static str) {
    JOURNAL.with(|j| j.borrow_mut().push(Event::Mark(label)));
}

/// Everything recorded on this thread, io-wait writes excluded.
pub fn journal() -> Vec<Event> {
    JOURNAL.with(|j| {
        j.borrow()
            .iter()
            .copied()
            .filter(|e| !matches!(e, Event::Write { port: POST_PORT, .. }))
            .collect()
    })
}

pub fn clear_journal() {
    JOURNAL.with(|j| j.borrow_mut().clear());
}

/// Port bus that journals every access. Reads return the last value written
/// to the port, or the scripted value, or zero.
#[derive(Default)]
pub struct RecordingPorts {
    latches: Vec<(u16, u8)>,
}

impl RecordingPorts {
    pub fn new() -> Self {
        clear_journal();
        Self::default()
    }

    pub fn with_value(mut self, port: u16, value: u8) -> Self {
        self.latch(port, value);
        self
    }

    fn latch(&mut self, port: u16, value: u8) {
        match self.latches.iter_mut().find(|(p, _)| *p == port) {
            Some(slot) => slot.1 = value,
            None => self.latches.push((port, value)),
        }
    }
}

impl PortIo for RecordingPorts {
    fn write_u8(&mut self, port: u16, value: u8) {
        JOURNAL.with(|j| j.borrow_mut().push(Event::Write { port, value }));
        self.latch(port, value);
    }

    fn read_u8(&mut self, port: u16) -> u8 {
        JOURNAL.with(|j| j.borrow_mut().push(Event::Read { port }));
        self.latches
            .iter()
            .find(|(p, _)| *p == port)
            .map_or(0, |(_, v)| *v)
    }
}

/// Records table loads and interrupt-flag changes. Each `halt` stands for
/// one timer interrupt when a timer is attached.
#[derive(Default)]
pub struct MockCpu<'t> {
    pub loaded: Option<TablePointer>,
    pub enabled: bool,
    pub halts: usize,
    pub flag_changes: usize,
    pub timer: Option<&'t Timer>,
}

impl<'t> MockCpu<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticking(timer: &'t Timer) -> Self {
        Self {
            timer: Some(timer),
            ..Self::default()
        }
    }
}

impl Cpu for MockCpu<'_> {
    fn load_vector_table(&mut self, pointer: &TablePointer) {
        self.loaded = Some(*pointer);
    }

    fn enable_interrupts(&mut self) {
        self.enabled = true;
        self.flag_changes += 1;
    }

    fn disable_interrupts(&mut self) {
        self.enabled = false;
        self.flag_changes += 1;
    }

    fn interrupts_enabled(&self) -> bool {
        self.enabled
    }

    fn halt(&mut self) {
        self.halts += 1;
        if let Some(timer) = self.timer {
            timer.advance();
        }
    }

    fn halt_forever(&mut self) -> ! {
        panic!("cpu halted");
    }
}

/// Leaked, 8-byte aligned, zeroed arena.
pub fn arena(size: usize) -> &'static mut [u8] {
    let words: &'static mut [u64] = vec![0u64; size.div_ceil(8)].leak();
    unsafe { core::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<u8>(), size) }
}

/// Frame as the entry stubs would build it for `vector`.
pub fn frame(vector: u32, error_code: u32) -> InterruptFrame {
    InterruptFrame {
        ds: 0x10,
        int_no: vector,
        err_code: error_code,
        eip: 0x0010_2a40,
        cs: 0x08,
        eflags: 0x202,
        ..InterruptFrame::default()
    }
}
