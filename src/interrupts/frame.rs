use core::fmt;

/// Processor state saved by an entry stub, lowest address first.
///
/// The stub pushes the vector and error code, runs `pusha`, then pushes
/// `ds`. The processor pushed `eip`, `cs` and `eflags` before that, plus
/// `useresp` and `ss` when the interrupt crossed a privilege level.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptFrame {
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// Value of `esp` at the `pusha`, not the interrupted stack.
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

/// Words in a frame taken without a privilege change.
pub const KERNEL_FRAME_WORDS: usize = 14;
/// Words in a frame taken from ring 3.
pub const USER_FRAME_WORDS: usize = 16;

/// Word holding `eax`, where a system call result goes back.
pub const EAX_INDEX: usize = 8;
/// Word holding the saved `cs`, whose low bits tell the frame's length.
pub const CS_INDEX: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    Truncated { needed: usize, got: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Truncated { needed, got } => {
                write!(f, "interrupt frame truncated: {} of {} words", got, needed)
            }
        }
    }
}

impl InterruptFrame {
    /// Parses the stub's stack image. The last two words are read only when
    /// the saved `cs` has a non-zero privilege level.
    pub fn from_words(words: &[u32]) -> Result<Self, FrameError> {
        if words.len() < KERNEL_FRAME_WORDS {
            return Err(FrameError::Truncated {
                needed: KERNEL_FRAME_WORDS,
                got: words.len(),
            });
        }
        let from_user = words[CS_INDEX] & 3 != 0;
        if from_user && words.len() < USER_FRAME_WORDS {
            return Err(FrameError::Truncated {
                needed: USER_FRAME_WORDS,
                got: words.len(),
            });
        }
        let (useresp, ss) = if from_user { (words[14], words[15]) } else { (0, 0) };
        Ok(Self {
            ds: words[0],
            edi: words[1],
            esi: words[2],
            ebp: words[3],
            esp: words[4],
            ebx: words[5],
            edx: words[6],
            ecx: words[7],
            eax: words[8],
            int_no: words[9],
            err_code: words[10],
            eip: words[11],
            cs: words[12],
            eflags: words[13],
            useresp,
            ss,
        })
    }

    /// `None` when the stub reported a number outside 0..=255.
    pub fn vector(&self) -> Option<u8> {
        u8::try_from(self.int_no).ok()
    }

    pub fn privilege_level(&self) -> u8 {
        (self.cs & 3) as u8
    }

    pub fn from_user(&self) -> bool {
        self.privilege_level() != 0
    }

    /// Interrupted stack `(esp, ss)`, present only after a ring change.
    pub fn user_stack(&self) -> Option<(u32, u32)> {
        self.from_user().then_some((self.useresp, self.ss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(cs: u32) -> [u32; 16] {
        [
            0x10, 1, 2, 3, 4, 5, 6, 7, 8, // ds, pusha block
            14, 0x2, // vector, error code
            0xC000_1234, cs, 0x202, // eip, cs, eflags
            0xBFFF_F000, 0x23, // useresp, ss
        ]
    }

    #[test]
    fn layout_matches_stub_push_order() {
        assert_eq!(core::mem::size_of::<InterruptFrame>(), USER_FRAME_WORDS * 4);
        let frame = InterruptFrame::from_words(&words(0x08)[..14]).unwrap();
        assert_eq!(frame.ds, 0x10);
        assert_eq!(frame.edi, 1);
        assert_eq!(frame.eax, 8);
        assert_eq!(frame.vector(), Some(14));
        assert_eq!(frame.err_code, 2);
        assert_eq!(frame.eip, 0xC000_1234);
        assert_eq!(frame.eflags, 0x202);
        assert_eq!(frame.user_stack(), None);
    }

    #[test]
    fn ring3_frame_carries_stack() {
        let frame = InterruptFrame::from_words(&words(0x1B)).unwrap();
        assert!(frame.from_user());
        assert_eq!(frame.privilege_level(), 3);
        assert_eq!(frame.user_stack(), Some((0xBFFF_F000, 0x23)));
    }

    #[test]
    fn short_frames_rejected() {
        assert_eq!(
            InterruptFrame::from_words(&words(0x08)[..13]),
            Err(FrameError::Truncated { needed: 14, got: 13 })
        );
        assert_eq!(
            InterruptFrame::from_words(&words(0x1B)[..14]),
            Err(FrameError::Truncated { needed: 16, got: 14 })
        );
    }

    #[test]
    fn out_of_range_vector() {
        let frame = InterruptFrame {
            int_no: 256,
            ..InterruptFrame::default()
        };
        assert_eq!(frame.vector(), None);
    }
}
