//! Process table and round-robin selection.
//!
//! Slot 0 always holds the kernel process. Selection scans every slot
//! starting after the current one and wraps around, so a READY kernel takes
//! its turn in the rotation like any user process. Switching is
//! bookkeeping: the saved [`CpuContext`] is prepared for a future switch
//! but never loaded.

use core::fmt;

use super::pcb::{
    CpuContext, Pid, Priority, ProcessControlBlock, ProcessInfo, ProcessName, ProcessState,
    StackRegion, KERNEL_PID,
};
use crate::config::MAX_PROCESSES;
use crate::memory::Heap;

/// User slots plus the kernel slot.
pub const TABLE_SIZE: usize = MAX_PROCESSES + 1;
const KERNEL_SLOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    NoFreeSlot,
    OutOfMemory,
    /// PID 0, or no live process with that pid.
    InvalidTarget,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::NoFreeSlot => write!(f, "process table full"),
            SchedError::OutOfMemory => write!(f, "no memory for process stack"),
            SchedError::InvalidTarget => write!(f, "no such process"),
        }
    }
}

pub struct Scheduler {
    table: [ProcessControlBlock; TABLE_SIZE],
    current: usize,
    next_pid: Pid,
    stack_size: usize,
    enabled: bool,
}

impl Scheduler {
    /// Table with only the kernel process, running. Selection stays off
    /// until [`Scheduler::enable`].
    pub fn new(stack_size: usize, now: u64) -> Self {
        let mut table = [ProcessControlBlock::vacant(); TABLE_SIZE];
        let kernel = &mut table[KERNEL_SLOT];
        kernel.pid = KERNEL_PID;
        kernel.name = ProcessName::new("kernel");
        kernel.state = ProcessState::Running;
        kernel.priority = Priority::Realtime;
        kernel.parent = KERNEL_PID;
        kernel.created_at = now;
        Self {
            table,
            current: KERNEL_SLOT,
            next_pid: 1,
            stack_size,
            enabled: false,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Takes a free slot and a pid, then allocates the stack. A full table
    /// or an exhausted pid space allocates nothing.
    pub fn create(
        &mut self,
        heap: &mut Heap<'_>,
        name: &str,
        entry: usize,
        priority: Priority,
        now: u64,
    ) -> Result<Pid, SchedError> {
        let slot = self
            .table
            .iter()
            .skip(1)
            .position(ProcessControlBlock::is_free)
            .map(|i| i + 1)
            .ok_or(SchedError::NoFreeSlot)?;
        let pid = self.next_pid;
        let next_pid = pid.checked_add(1).ok_or(SchedError::NoFreeSlot)?;

        let handle = heap
            .allocate(self.stack_size)
            .map_err(|_| SchedError::OutOfMemory)?;
        let stack = StackRegion {
            handle,
            base: heap.addr(handle),
            size: self.stack_size,
        };

        self.next_pid = next_pid;
        let parent = self.table[self.current].pid;
        self.table[slot] = ProcessControlBlock {
            pid,
            name: ProcessName::new(name),
            state: ProcessState::Ready,
            priority,
            context: CpuContext::new(entry, stack.top()),
            stack: Some(stack),
            parent,
            created_at: now,
            cpu_time: 0,
            entry,
            exit_code: 0,
        };
        klog_info!("process: created {} '{}' (parent {})", pid, self.table[slot].name, parent);
        Ok(pid)
    }

    /// Ends the current process. The slot stays ZOMBIE until a later
    /// selection pass reaps it. No-op for the kernel process.
    pub fn exit(&mut self, heap: &mut Heap<'_>, code: i32) {
        let current = self.current;
        if current == KERNEL_SLOT {
            return;
        }
        let pcb = &mut self.table[current];
        pcb.state = ProcessState::Zombie;
        pcb.exit_code = code;
        Self::release_stack(heap, pcb);
        klog_info!("process: {} exited with {}", pcb.pid, code);
        self.schedule();
    }

    /// Ends `pid` and frees its slot at once.
    pub fn kill(&mut self, heap: &mut Heap<'_>, pid: Pid) -> Result<(), SchedError> {
        if pid == KERNEL_PID {
            return Err(SchedError::InvalidTarget);
        }
        let slot = self.slot_of(pid).ok_or(SchedError::InvalidTarget)?;
        let pcb = &mut self.table[slot];
        pcb.state = ProcessState::Zombie;
        Self::release_stack(heap, pcb);
        *pcb = ProcessControlBlock::vacant();
        klog_info!("process: killed {}", pid);

        if slot == self.current {
            self.schedule();
        }
        Ok(())
    }

    /// RUNNING to BLOCKED. `Ok(false)` when `pid` is in any other state.
    pub fn block(&mut self, pid: Pid) -> Result<bool, SchedError> {
        let slot = self.slot_of(pid).ok_or(SchedError::InvalidTarget)?;
        if slot == KERNEL_SLOT || self.table[slot].state != ProcessState::Running {
            return Ok(false);
        }
        self.table[slot].state = ProcessState::Blocked;
        self.schedule();
        Ok(true)
    }

    /// BLOCKED to READY. `Ok(false)` when `pid` is in any other state.
    pub fn unblock(&mut self, pid: Pid) -> Result<bool, SchedError> {
        let slot = self.slot_of(pid).ok_or(SchedError::InvalidTarget)?;
        if self.table[slot].state != ProcessState::Blocked {
            return Ok(false);
        }
        self.table[slot].state = ProcessState::Ready;
        Ok(true)
    }

    pub fn yield_now(&mut self) {
        self.schedule();
    }

    /// Charges the current process one tick.
    pub fn tick(&mut self) {
        if self.enabled {
            self.table[self.current].cpu_time += 1;
        }
    }

    /// Reaps zombies, then picks the next READY process after the current
    /// slot, the kernel included. With none ready a still-running process
    /// keeps the CPU, otherwise the kernel takes over.
    pub fn schedule(&mut self) {
        if !self.enabled {
            return;
        }
        self.reap();

        let current = self.current;
        let next = (1..TABLE_SIZE)
            .map(|step| (current + step) % TABLE_SIZE)
            .find(|&slot| self.table[slot].state == ProcessState::Ready);
        let next = match next {
            Some(slot) => slot,
            None if self.table[current].state == ProcessState::Running => return,
            None => KERNEL_SLOT,
        };

        if self.table[current].state == ProcessState::Running {
            self.table[current].state = ProcessState::Ready;
        }
        self.table[next].state = ProcessState::Running;
        self.current = next;
        klog_trace!("sched: {} -> {}", self.table[current].pid, self.table[next].pid);
    }

    pub fn current(&self) -> &ProcessControlBlock {
        &self.table[self.current]
    }

    pub fn current_pid(&self) -> Pid {
        self.table[self.current].pid
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        self.slot_of(pid).map(|slot| &self.table[slot])
    }

    /// Live processes, FREE slots excluded.
    pub fn count(&self) -> usize {
        self.table.iter().filter(|p| !p.is_free()).count()
    }

    pub fn list(&self) -> impl Iterator<Item = ProcessInfo> + '_ {
        self.table.iter().filter(|p| !p.is_free()).map(ProcessControlBlock::info)
    }

    /// Fills `out` in table order and returns how many entries were written.
    pub fn list_into(&self, out: &mut [ProcessInfo]) -> usize {
        out.iter_mut()
            .zip(self.list())
            .map(|(dst, info)| *dst = info)
            .count()
    }

    fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.table.iter().position(|p| !p.is_free() && p.pid == pid)
    }

    fn release_stack(heap: &mut Heap<'_>, pcb: &mut ProcessControlBlock) {
        if let Some(stack) = pcb.stack.take() {
            if let Err(err) = heap.release(stack.handle) {
                klog_error!("process: stack of {} not released: {}", pcb.pid, err);
            }
        }
    }

    fn reap(&mut self) {
        let current = self.current;
        for (slot, pcb) in self.table.iter_mut().enumerate() {
            if slot != current && pcb.state == ProcessState::Zombie {
                klog_debug!("sched: reaped {}", pcb.pid);
                *pcb = ProcessControlBlock::vacant();
            }
        }
    }
}
