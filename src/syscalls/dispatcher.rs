use crate::error::KernelError;
use crate::interrupts::InterruptFrame;
use crate::kernel::KernelCore;
use crate::syscalls::handlers;
use crate::syscalls::numbers::SyscallNumber;

/// System call result type
pub type SyscallResult = Result<SyscallReturn, KernelError>;

/// What a serviced call hands back to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallReturn {
    /// Goes to the caller's `eax`.
    Value(usize),
    /// The caller waits this long, then sees 0.
    Sleep { milliseconds: u64 },
}

/// System call context - the registers the `int 0x80` stub saved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallContext {
    pub syscall_num: u32,
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
    pub arg4: usize,
}

impl SyscallContext {
    /// i386 `int 0x80` convention:
    ///   eax = syscall number
    ///   ebx, ecx, edx, esi, edi = arg0..arg4
    pub fn from_frame(frame: &InterruptFrame) -> Self {
        Self {
            syscall_num: frame.eax,
            arg0: frame.ebx as usize,
            arg1: frame.ecx as usize,
            arg2: frame.edx as usize,
            arg3: frame.esi as usize,
            arg4: frame.edi as usize,
        }
    }
}

/// Main syscall dispatcher
pub fn dispatch_syscall(core: &mut KernelCore<'_>, ctx: &SyscallContext) -> SyscallResult {
    let syscall = SyscallNumber::from(ctx.syscall_num);
    klog_trace!("syscall {:?} ({:#x}, {:#x})", syscall, ctx.arg0, ctx.arg1);

    match syscall {
        SyscallNumber::Exit => handlers::process::sys_exit(core, ctx.arg0),
        SyscallNumber::GetPid => handlers::process::sys_getpid(core),
        SyscallNumber::Yield => handlers::process::sys_yield(core),
        SyscallNumber::Kill => handlers::process::sys_kill(core, ctx.arg0),
        SyscallNumber::Sleep => handlers::time::sys_sleep(ctx.arg0),
        SyscallNumber::Time => handlers::time::sys_time(core),
        SyscallNumber::Malloc => handlers::memory::sys_malloc(core, ctx.arg0),
        SyscallNumber::Free => handlers::memory::sys_free(core, ctx.arg0),
        SyscallNumber::Unknown => {
            klog_warn!("unknown syscall {}", ctx.syscall_num);
            Err(KernelError::InvalidArgument)
        }
    }
}

/// Value written back to `eax`. Errors travel as negative errno codes.
pub fn encode(result: &SyscallResult) -> u32 {
    match result {
        Ok(SyscallReturn::Value(v)) => *v as u32,
        Ok(SyscallReturn::Sleep { .. }) => 0,
        Err(err) => err.as_errno() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::interrupts::Timer;
    use crate::memory::allocators::heap::HEADER_SIZE;
    use crate::process::{Priority, ProcessState};
    use crate::testing;

    fn core(timer: &'static Timer) -> KernelCore<'static> {
        let mut core = KernelCore::new(testing::arena(64 * 1024), timer, &KernelConfig::new()).unwrap();
        core.start_scheduler();
        core
    }

    fn call(num: SyscallNumber, arg0: usize) -> SyscallContext {
        SyscallContext {
            syscall_num: num as u32,
            arg0,
            arg1: 0,
            arg2: 0,
            arg3: 0,
            arg4: 0,
        }
    }

    #[test]
    fn context_reads_the_i386_registers() {
        let mut frame = testing::frame(0x80, 0);
        frame.eax = 11;
        frame.ebx = 64;
        frame.ecx = 1;
        frame.edx = 2;
        frame.esi = 3;
        frame.edi = 4;
        let ctx = SyscallContext::from_frame(&frame);
        assert_eq!(ctx.syscall_num, 11);
        assert_eq!((ctx.arg0, ctx.arg1, ctx.arg2, ctx.arg3, ctx.arg4), (64, 1, 2, 3, 4));
    }

    #[test]
    fn malloc_and_free_use_machine_addresses() {
        static TIMER: Timer = Timer::new(100);
        let mut core = core(&TIMER);

        let addr = match dispatch_syscall(&mut core, &call(SyscallNumber::Malloc, 64)) {
            Ok(SyscallReturn::Value(addr)) => addr,
            other => panic!("malloc returned {:?}", other),
        };
        assert!(addr > core.heap().base());
        assert_eq!(core.memory_stats().used, 64 + HEADER_SIZE);

        let freed = dispatch_syscall(&mut core, &call(SyscallNumber::Free, addr));
        assert_eq!(freed, Ok(SyscallReturn::Value(0)));
        assert_eq!(core.memory_stats().used, 0);

        let again = dispatch_syscall(&mut core, &call(SyscallNumber::Free, addr));
        assert_eq!(again, Err(KernelError::InvalidArgument));
        let outside = dispatch_syscall(&mut core, &call(SyscallNumber::Free, 0x10));
        assert_eq!(outside, Err(KernelError::InvalidArgument));
    }

    #[test]
    fn process_calls() {
        static TIMER: Timer = Timer::new(100);
        let mut core = core(&TIMER);
        let pid = core.create_process("shell", 0x0010_4000, Priority::Normal).unwrap();

        assert_eq!(dispatch_syscall(&mut core, &call(SyscallNumber::GetPid, 0)), Ok(SyscallReturn::Value(0)));
        dispatch_syscall(&mut core, &call(SyscallNumber::Yield, 0)).unwrap();
        assert_eq!(
            dispatch_syscall(&mut core, &call(SyscallNumber::GetPid, 0)),
            Ok(SyscallReturn::Value(pid as usize))
        );

        dispatch_syscall(&mut core, &call(SyscallNumber::Exit, 3)).unwrap();
        let pcb = core.processes().get(pid).unwrap();
        assert_eq!(pcb.state(), ProcessState::Zombie);
        assert_eq!(pcb.exit_code(), 3);
        assert_eq!(core.current_pid(), 0);

        let victim = core.create_process("victim", 0x0010_4000, Priority::Low).unwrap();
        assert_eq!(
            dispatch_syscall(&mut core, &call(SyscallNumber::Kill, victim as usize)),
            Ok(SyscallReturn::Value(0))
        );
        assert_eq!(
            dispatch_syscall(&mut core, &call(SyscallNumber::Kill, 0)),
            Err(KernelError::InvalidTarget)
        );
    }

    #[test]
    fn time_and_sleep() {
        static TIMER: Timer = Timer::new(10);
        for _ in 0..35 {
            TIMER.advance();
        }
        let mut core = core(&TIMER);
        assert_eq!(dispatch_syscall(&mut core, &call(SyscallNumber::Time, 0)), Ok(SyscallReturn::Value(3)));
        assert_eq!(
            dispatch_syscall(&mut core, &call(SyscallNumber::Sleep, 250)),
            Ok(SyscallReturn::Sleep { milliseconds: 250 })
        );
    }

    #[test]
    fn unknown_calls_and_error_encoding() {
        static TIMER: Timer = Timer::new(100);
        let mut core = core(&TIMER);
        let mut ctx = call(SyscallNumber::Unknown, 0);
        ctx.syscall_num = 1;
        let result = dispatch_syscall(&mut core, &ctx);
        assert_eq!(result, Err(KernelError::InvalidArgument));
        assert_eq!(encode(&result) as i32, -22);

        let oom = dispatch_syscall(&mut core, &call(SyscallNumber::Malloc, 1 << 20));
        assert_eq!(encode(&oom) as i32, -12);
        assert_eq!(encode(&Ok(SyscallReturn::Sleep { milliseconds: 5 })), 0);
        assert_eq!(encode(&Ok(SyscallReturn::Value(42))), 42);
    }
}
