/// Kernel initialization phases
use spin::Mutex;

use crate::arch::{Cpu, HardwareCpu, HardwarePorts, PortIo};
use crate::config::{KernelConfig, OS_NAME, OS_VERSION};
use crate::error::KernelError;
use crate::interrupts::{Dispatcher, InterruptController, InterruptFrame, Pit, Timer, TrampolineTable, TIMER};
use crate::kernel::state::KernelCore;
use crate::kernel::status::{self, InitStatus, StatusBoard};
use crate::kernel::{timer_interrupt, CORE, DISPATCHER};
use crate::klog::klog_set_level;
use crate::memory::Heap;
use crate::process::Scheduler;

/// Boot phases in the order they run.
pub const PHASES: [&str; 6] = [
    "Heap",
    "Interrupt Controller",
    "Interrupt Table",
    "Timer",
    "Scheduler",
    "Interrupts",
];

/// The hardware a boot runs against.
pub struct Machine<'m, C: InterruptController, U: Cpu, P: PortIo> {
    pub dispatcher: &'m mut Dispatcher<C>,
    pub cpu: &'m mut U,
    /// Bus the PIT is programmed through.
    pub ports: &'m mut P,
    /// Installed on IRQ0.
    pub tick: fn(&InterruptFrame),
}

/// Initialize kernel in proper order with error handling
///
/// Attaches the kernel log to COM1, runs every phase against the real
/// machine, publishes the core and the status board, and leaves interrupts
/// enabled. May only succeed once.
pub fn init_kernel(
    arena: &'static mut [u8],
    stubs: &TrampolineTable,
    config: &KernelConfig,
) -> Result<(), KernelError> {
    // SAFETY: boot runs in ring 0 and the kernel is the only COM1 driver.
    unsafe { crate::serial::init() };
    klog_set_level(config.log_level);
    klog_info!("{} {} kernel initialization", OS_NAME, OS_VERSION);
    if CORE.is_completed() {
        klog_warn!("kernel already initialized");
        return Err(KernelError::InvalidArgument);
    }

    let mut board = StatusBoard::new();
    for name in PHASES {
        board.register(name);
    }

    // SAFETY: boot runs in ring 0 and is the only user of the PIT ports.
    let mut cpu = unsafe { HardwareCpu::new() };
    let mut pit = unsafe { HardwarePorts::new() };
    cpu.disable_interrupts();

    let core = {
        let mut dispatcher = DISPATCHER.lock();
        let machine = Machine {
            dispatcher: &mut *dispatcher,
            cpu: &mut cpu,
            ports: &mut pit,
            tick: timer_interrupt,
        };
        bring_up(&mut board, machine, &TIMER, arena, stubs, config)
    };
    let result = core.and_then(|core| {
        CORE.call_once(|| Mutex::new(core));
        start_interrupts(&mut board, &DISPATCHER, &mut cpu)
    });

    status::publish(&board);
    match result {
        Ok(()) => klog_info!("kernel initialization complete"),
        Err(err) => klog_error!("kernel initialization failed: {}", err),
    }
    result
}

/// Runs every phase up to, not including, enabling interrupts. The
/// returned core is ready to be published.
pub fn bring_up<'a, C, U, P>(
    board: &mut StatusBoard,
    machine: Machine<'_, C, U, P>,
    timer: &'a Timer,
    arena: &'a mut [u8],
    stubs: &TrampolineTable,
    config: &KernelConfig,
) -> Result<KernelCore<'a>, KernelError>
where
    C: InterruptController,
    U: Cpu,
    P: PortIo,
{
    let Machine {
        dispatcher,
        cpu,
        ports,
        tick,
    } = machine;

    let heap = init_phase(board, 1, "Heap", || Ok(Heap::new(arena)?))?;

    init_phase(board, 2, "Interrupt Controller", || {
        dispatcher.remap_controller(config.pic_master_offset, config.pic_slave_offset)?;
        dispatcher.controller_mut().set_mask(0);
        Ok(())
    })?;

    init_phase(board, 3, "Interrupt Table", || {
        dispatcher.install_trampolines(stubs)?;
        dispatcher.load_table(cpu)?;
        Ok(())
    })?;

    init_phase(board, 4, "Timer", || {
        if config.timer_frequency == 0 {
            return Err(KernelError::InvalidArgument);
        }
        timer.set_frequency(config.timer_frequency);
        let divisor = Pit::program(ports, config.timer_frequency);
        klog_debug!("pit: {} Hz, divisor {}", config.timer_frequency, divisor);
        dispatcher.register_irq(0, tick)?;
        dispatcher.enable_irq(0)?;
        Ok(())
    })?;

    init_phase(board, 5, "Scheduler", || {
        if config.process_stack_size == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let scheduler = Scheduler::new(config.process_stack_size, timer.seconds());
        let mut core = KernelCore::from_parts(heap, scheduler, timer);
        core.start_scheduler();
        Ok(core)
    })
}

/// Last phase. The dispatcher guard is released before the flag is set so
/// the first interrupt can take the lock.
pub fn start_interrupts<C: InterruptController>(
    board: &mut StatusBoard,
    dispatcher: &Mutex<Dispatcher<C>>,
    cpu: &mut impl Cpu,
) -> Result<(), KernelError> {
    init_phase(board, 6, "Interrupts", || {
        dispatcher.lock().arm()?;
        cpu.enable_interrupts();
        Ok(())
    })
}

fn init_phase<T>(
    board: &mut StatusBoard,
    step: usize,
    name: &'static str,
    init_fn: impl FnOnce() -> Result<T, KernelError>,
) -> Result<T, KernelError> {
    board.update(name, InitStatus::InProgress);
    klog_info!("[{}/{}] Initializing {}...", step, PHASES.len(), name);

    match init_fn() {
        Ok(value) => {
            board.update(name, InitStatus::Completed);
            klog_info!("    {} initialized", name);
            Ok(value)
        }
        Err(e) => {
            board.update(name, InitStatus::Failed(e));
            klog_error!("    {} failed: {}", name, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::pic::{PIC1_DATA, PIC2_DATA};
    use crate::interrupts::timer::{PIT_CHANNEL0, PIT_COMMAND, PIT_MODE_RATE};
    use crate::interrupts::{Dispatch, DispatchState, Pic8259};
    use crate::testing::{self, journal, mark, Event, MockCpu, RecordingPorts};

    fn stubs() -> TrampolineTable {
        let mut exceptions = [0u32; 32];
        let mut irqs = [0u32; 16];
        for (i, e) in exceptions.iter_mut().enumerate() {
            *e = 0x0010_0000 + (i as u32) * 0x10;
        }
        for (i, e) in irqs.iter_mut().enumerate() {
            *e = 0x0010_1000 + (i as u32) * 0x10;
        }
        TrampolineTable {
            exceptions,
            irqs,
            syscall: Some(0x0010_2000),
        }
    }

    fn board() -> StatusBoard {
        let mut board = StatusBoard::new();
        for name in PHASES {
            board.register(name);
        }
        board
    }

    fn on_tick(_: &InterruptFrame) {
        mark("tick");
    }

    #[test]
    fn every_phase_completes() {
        static CLOCK: Timer = Timer::new(18);
        let dispatcher = Mutex::new(Dispatcher::new(Pic8259::new(RecordingPorts::new())));
        let mut pit = RecordingPorts::new();
        let mut cpu = MockCpu::new();
        let mut board = board();

        let core = {
            let mut guard = dispatcher.lock();
            let machine = Machine {
                dispatcher: &mut *guard,
                cpu: &mut cpu,
                ports: &mut pit,
                tick: on_tick,
            };
            bring_up(&mut board, machine, &CLOCK, testing::arena(256 * 1024), &stubs(), &KernelConfig::new())
                .unwrap()
        };
        assert_eq!(board.get("Scheduler"), Some(InitStatus::Completed));
        assert_eq!(board.get("Interrupts"), Some(InitStatus::NotStarted));
        assert!(core.processes().is_enabled());
        assert_eq!(CLOCK.frequency(), 100);
        assert!(cpu.loaded.is_some());
        assert!(!cpu.enabled);

        start_interrupts(&mut board, &dispatcher, &mut cpu).unwrap();
        assert!(board.all_ready());
        assert!(cpu.enabled);
        assert_eq!(dispatcher.lock().state(), DispatchState::InterruptsEnabled);

        let events = journal();
        let divisor = Pit::divisor(100).to_le_bytes();
        let pit_program = [
            Event::Write { port: PIT_COMMAND, value: PIT_MODE_RATE },
            Event::Write { port: PIT_CHANNEL0, value: divisor[0] },
            Event::Write { port: PIT_CHANNEL0, value: divisor[1] },
        ];
        assert!(events.windows(3).any(|w| w == pit_program));
        assert!(events.contains(&Event::Write { port: PIC1_DATA, value: 0 }));
        assert!(events.contains(&Event::Write { port: PIC2_DATA, value: 0 }));
    }

    #[test]
    fn timer_irq_reaches_the_tick_handler() {
        static CLOCK: Timer = Timer::new(100);
        let mut dispatcher = Dispatcher::new(Pic8259::new(RecordingPorts::new()));
        let mut pit = RecordingPorts::new();
        let mut cpu = MockCpu::new();
        let mut board = board();
        let config = KernelConfig::new().with_pic_offsets(0x30, 0x38);

        let machine = Machine {
            dispatcher: &mut dispatcher,
            cpu: &mut cpu,
            ports: &mut pit,
            tick: on_tick,
        };
        bring_up(&mut board, machine, &CLOCK, testing::arena(64 * 1024), &stubs(), &config).unwrap();

        assert_eq!(dispatcher.irq_vector(0), 0x30);
        assert!(dispatcher.table().get(0x30).is_present());
        testing::clear_journal();
        assert_eq!(dispatcher.dispatch(&testing::frame(0x30, 0)), Ok(Dispatch::Handled));
        assert_eq!(journal().last(), Some(&Event::Mark("tick")));
    }

    #[test]
    fn failure_stops_the_sequence() {
        static CLOCK: Timer = Timer::new(100);
        let mut dispatcher = Dispatcher::new(Pic8259::new(RecordingPorts::new()));
        let mut pit = RecordingPorts::new();
        let mut cpu = MockCpu::new();
        let mut board = board();

        let machine = Machine {
            dispatcher: &mut dispatcher,
            cpu: &mut cpu,
            ports: &mut pit,
            tick: on_tick,
        };
        let result = bring_up(&mut board, machine, &CLOCK, testing::arena(16), &stubs(), &KernelConfig::new());
        assert_eq!(result.err(), Some(KernelError::InvalidArgument));
        assert_eq!(board.get("Heap"), Some(InitStatus::Failed(KernelError::InvalidArgument)));
        assert_eq!(board.get("Interrupt Controller"), Some(InitStatus::NotStarted));
        assert_eq!(dispatcher.state(), DispatchState::Uninitialized);
        assert!(journal().is_empty());
    }

    #[test]
    fn bad_offsets_fail_the_controller_phase() {
        static CLOCK: Timer = Timer::new(100);
        let mut dispatcher = Dispatcher::new(Pic8259::new(RecordingPorts::new()));
        let mut pit = RecordingPorts::new();
        let mut cpu = MockCpu::new();
        let mut board = board();
        let config = KernelConfig::new().with_pic_offsets(0x08, 0x28);

        let machine = Machine {
            dispatcher: &mut dispatcher,
            cpu: &mut cpu,
            ports: &mut pit,
            tick: on_tick,
        };
        let result = bring_up(&mut board, machine, &CLOCK, testing::arena(64 * 1024), &stubs(), &config);
        assert!(result.is_err());
        assert_eq!(board.get("Heap"), Some(InitStatus::Completed));
        assert_eq!(
            board.get("Interrupt Controller"),
            Some(InitStatus::Failed(KernelError::InvalidArgument))
        );
        assert!(cpu.loaded.is_none());
    }

    #[test]
    fn interrupts_need_a_loaded_table() {
        let dispatcher = Mutex::new(Dispatcher::new(Pic8259::new(RecordingPorts::new())));
        let mut cpu = MockCpu::new();
        let mut board = board();
        assert!(start_interrupts(&mut board, &dispatcher, &mut cpu).is_err());
        assert!(!cpu.enabled);
        assert_eq!(board.get("Interrupts"), Some(InitStatus::Failed(KernelError::InvalidArgument)));
    }
}
