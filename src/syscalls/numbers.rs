//! System call numbers
//!
//! Numbers are fixed by the user-space ABI; gaps belong to the console and
//! file calls that this kernel core does not service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    // Process Management
    Exit = 0,
    GetPid = 5,
    Yield = 13,
    Kill = 14,

    // Time
    Sleep = 9,
    Time = 10,

    // Memory Management
    Malloc = 11,
    Free = 12,

    // Unknown
    Unknown = u32::MAX,
}

impl From<u32> for SyscallNumber {
    fn from(num: u32) -> Self {
        match num {
            0 => Self::Exit,
            5 => Self::GetPid,
            9 => Self::Sleep,
            10 => Self::Time,
            11 => Self::Malloc,
            12 => Self::Free,
            13 => Self::Yield,
            14 => Self::Kill,
            _ => Self::Unknown,
        }
    }
}
