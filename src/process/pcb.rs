use core::fmt;

use crate::config::PROCESS_NAME_LEN;
use crate::memory::HeapPtr;

pub type Pid = u32;

pub const KERNEL_PID: Pid = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Free,
    Ready,
    Running,
    Blocked,
    Zombie,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Free => "FREE",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Zombie => "ZOMBIE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
    Realtime,
}

/// Reserved bit 1 plus IF.
pub const INITIAL_EFLAGS: usize = 0x202;

/// Register snapshot restored when the process is switched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuContext {
    pub eax: usize,
    pub ebx: usize,
    pub ecx: usize,
    pub edx: usize,
    pub esi: usize,
    pub edi: usize,
    pub esp: usize,
    pub ebp: usize,
    pub eip: usize,
    pub eflags: usize,
}

impl CpuContext {
    /// Fresh context: one word below the stack top, entry in `eip`,
    /// interrupts enabled.
    pub fn new(entry: usize, stack_top: usize) -> Self {
        let esp = stack_top - 4;
        Self {
            esp,
            ebp: esp,
            eip: entry,
            eflags: INITIAL_EFLAGS,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    pub(crate) handle: HeapPtr,
    pub base: usize,
    pub size: usize,
}

impl StackRegion {
    pub fn top(&self) -> usize {
        self.base + self.size
    }
}

/// Fixed-size, NUL-free process name.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProcessName {
    bytes: [u8; PROCESS_NAME_LEN],
    len: u8,
}

impl ProcessName {
    pub const MAX_LEN: usize = PROCESS_NAME_LEN - 1;

    pub const fn empty() -> Self {
        Self {
            bytes: [0; PROCESS_NAME_LEN],
            len: 0,
        }
    }

    /// Keeps at most [`Self::MAX_LEN`] bytes, cut on a character boundary.
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(Self::MAX_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0; PROCESS_NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..usize::from(self.len)]).unwrap_or("")
    }
}

impl fmt::Debug for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessControlBlock {
    pub(crate) pid: Pid,
    pub(crate) name: ProcessName,
    pub(crate) state: ProcessState,
    pub(crate) priority: Priority,
    pub(crate) context: CpuContext,
    pub(crate) stack: Option<StackRegion>,
    pub(crate) parent: Pid,
    pub(crate) created_at: u64,
    pub(crate) cpu_time: u64,
    pub(crate) entry: usize,
    pub(crate) exit_code: i32,
}

impl ProcessControlBlock {
    pub const fn vacant() -> Self {
        Self {
            pid: 0,
            name: ProcessName::empty(),
            state: ProcessState::Free,
            priority: Priority::Low,
            context: CpuContext {
                eax: 0,
                ebx: 0,
                ecx: 0,
                edx: 0,
                esi: 0,
                edi: 0,
                esp: 0,
                ebp: 0,
                eip: 0,
                eflags: 0,
            },
            stack: None,
            parent: 0,
            created_at: 0,
            cpu_time: 0,
            entry: 0,
            exit_code: 0,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn context(&self) -> &CpuContext {
        &self.context
    }

    pub fn stack(&self) -> Option<&StackRegion> {
        self.stack.as_ref()
    }

    pub fn parent(&self) -> Pid {
        self.parent
    }

    /// Uptime in seconds when the process was created.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Timer ticks spent as the running process.
    pub fn cpu_time(&self) -> u64 {
        self.cpu_time
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_free(&self) -> bool {
        self.state == ProcessState::Free
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name,
            state: self.state,
            priority: self.priority,
            cpu_time: self.cpu_time,
        }
    }
}

/// Listing entry, detached from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: ProcessName,
    pub state: ProcessState,
    pub priority: Priority,
    pub cpu_time: u64,
}

impl ProcessInfo {
    pub const EMPTY: Self = Self {
        pid: 0,
        name: ProcessName::empty(),
        state: ProcessState::Free,
        priority: Priority::Low,
        cpu_time: 0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_truncated() {
        let long = "a-process-name-well-beyond-thirty-one-bytes";
        let name = ProcessName::new(long);
        assert_eq!(name.as_str().len(), 31);
        assert_eq!(name.as_str(), &long[..31]);
        assert_eq!(ProcessName::new("shell").as_str(), "shell");
    }

    #[test]
    fn truncation_respects_utf8() {
        // 30 ASCII bytes then a two-byte character straddling the limit
        let s = "012345678901234567890123456789é";
        assert_eq!(ProcessName::new(s).as_str(), "012345678901234567890123456789");
    }

    #[test]
    fn initial_context() {
        let ctx = CpuContext::new(0x0010_4000, 0x0020_1000);
        assert_eq!(ctx.esp, 0x0020_0FFC);
        assert_eq!(ctx.ebp, ctx.esp);
        assert_eq!(ctx.eip, 0x0010_4000);
        assert_eq!(ctx.eflags, 0x202);
        assert_eq!(ctx.eax, 0);
    }
}
