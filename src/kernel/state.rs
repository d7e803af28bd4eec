//! The kernel core: heap and process table behind one owner.
//!
//! Everything that mutates either goes through [`KernelCore`], so a single
//! lock around it is the only exclusion the control path needs.

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::interrupts::Timer;
use crate::memory::{Heap, HeapPtr, HeapStats};
use crate::process::{Pid, Priority, Scheduler};

pub struct KernelCore<'a> {
    heap: Heap<'a>,
    scheduler: Scheduler,
    timer: &'a Timer,
}

impl<'a> KernelCore<'a> {
    pub fn new(arena: &'a mut [u8], timer: &'a Timer, config: &KernelConfig) -> Result<Self, KernelError> {
        let heap = Heap::new(arena)?;
        let scheduler = Scheduler::new(config.process_stack_size, timer.seconds());
        Ok(Self::from_parts(heap, scheduler, timer))
    }

    pub fn from_parts(heap: Heap<'a>, scheduler: Scheduler, timer: &'a Timer) -> Self {
        Self { heap, scheduler, timer }
    }

    /// Starts round-robin selection and tick accounting.
    pub fn start_scheduler(&mut self) {
        self.scheduler.enable();
    }

    pub fn create_process(&mut self, name: &str, entry: usize, priority: Priority) -> Result<Pid, KernelError> {
        let now = self.timer.seconds();
        Ok(self.scheduler.create(&mut self.heap, name, entry, priority, now)?)
    }

    pub fn exit_current(&mut self, code: i32) {
        self.scheduler.exit(&mut self.heap, code);
    }

    pub fn kill(&mut self, pid: Pid) -> Result<(), KernelError> {
        Ok(self.scheduler.kill(&mut self.heap, pid)?)
    }

    pub fn yield_now(&mut self) {
        self.scheduler.yield_now();
    }

    pub fn block(&mut self, pid: Pid) -> Result<bool, KernelError> {
        Ok(self.scheduler.block(pid)?)
    }

    pub fn unblock(&mut self, pid: Pid) -> Result<bool, KernelError> {
        Ok(self.scheduler.unblock(pid)?)
    }

    pub fn current_pid(&self) -> Pid {
        self.scheduler.current_pid()
    }

    /// Time accounting for one timer interrupt.
    pub fn timer_tick(&mut self) {
        self.scheduler.tick();
    }

    pub fn allocate(&mut self, size: usize) -> Result<HeapPtr, KernelError> {
        Ok(self.heap.allocate(size)?)
    }

    pub fn release(&mut self, ptr: HeapPtr) -> Result<(), KernelError> {
        Ok(self.heap.release(ptr)?)
    }

    pub fn reallocate(&mut self, ptr: HeapPtr, new_size: usize) -> Result<HeapPtr, KernelError> {
        Ok(self.heap.reallocate(ptr, new_size)?)
    }

    pub fn memory_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub fn processes(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn heap(&self) -> &Heap<'a> {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap<'a> {
        &mut self.heap
    }

    pub fn timer(&self) -> &Timer {
        self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HEAP_SIZE, MAX_PROCESSES, PROCESS_STACK_SIZE};
    use crate::memory::allocators::heap::HEADER_SIZE;
    use crate::process::ProcessState;
    use crate::testing;

    fn core(timer: &'static Timer) -> KernelCore<'static> {
        let mut core = KernelCore::new(testing::arena(HEAP_SIZE), timer, &KernelConfig::new()).unwrap();
        core.start_scheduler();
        core
    }

    #[test]
    fn sixteen_processes_then_table_full() {
        static TIMER: Timer = Timer::new(100);
        let mut core = core(&TIMER);
        assert_eq!(core.memory_stats().total, 1_048_576);

        let pids: Vec<Pid> = (0..MAX_PROCESSES)
            .map(|_| core.create_process("worker", 0x0010_0000, Priority::Normal).unwrap())
            .collect();
        assert_eq!(pids.len(), 16);

        let used = core.memory_stats().used;
        assert_eq!(
            core.create_process("one-too-many", 0x0010_0000, Priority::Normal),
            Err(KernelError::NoFreeSlot)
        );
        assert_eq!(core.memory_stats().used, used);

        let free = core.memory_stats().free;
        core.kill(pids[5]).unwrap();
        assert_eq!(core.memory_stats().free, free + PROCESS_STACK_SIZE + HEADER_SIZE);
        assert!(core.processes().get(pids[5]).is_none());

        assert!(core.create_process("replacement", 0x0010_0000, Priority::Normal).is_ok());
        core.heap().verify().unwrap();
    }

    #[test]
    fn errors_fold_into_kernel_taxonomy() {
        static TIMER: Timer = Timer::new(100);
        let mut core = core(&TIMER);
        assert_eq!(core.kill(0), Err(KernelError::InvalidTarget));
        assert_eq!(core.kill(77), Err(KernelError::InvalidTarget));
        assert_eq!(core.allocate(0), Err(KernelError::InvalidArgument));
        assert_eq!(core.allocate(HEAP_SIZE * 2), Err(KernelError::OutOfMemory));
        assert_eq!(core.block(77), Err(KernelError::InvalidTarget));
    }

    #[test]
    fn timer_ticks_charge_the_running_process() {
        static TIMER: Timer = Timer::new(100);
        for _ in 0..250 {
            TIMER.advance();
        }
        let mut core = core(&TIMER);
        let pid = core.create_process("busy", 0x0010_0000, Priority::Low).unwrap();
        assert_eq!(core.processes().get(pid).unwrap().created_at(), 2);

        core.yield_now();
        assert_eq!(core.current_pid(), pid);
        core.timer_tick();
        core.timer_tick();
        core.timer_tick();
        assert_eq!(core.processes().current().cpu_time(), 3);

        core.exit_current(0);
        assert_eq!(core.current_pid(), 0);
        assert_eq!(core.processes().get(pid).unwrap().state(), ProcessState::Zombie);
    }

    #[test]
    fn memory_round_trip_through_core() {
        static TIMER: Timer = Timer::new(100);
        let mut core = core(&TIMER);
        let p = core.allocate(100).unwrap();
        let p = core.reallocate(p, 400).unwrap();
        assert_eq!(core.heap().usable_size(p), Ok(400));
        core.release(p).unwrap();
        assert_eq!(core.release(p), Err(KernelError::InvalidArgument));
        assert_eq!(core.memory_stats().used, 0);
        assert_eq!(core.memory_stats().allocations, 2);
    }
}
