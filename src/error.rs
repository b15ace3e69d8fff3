use thiserror::Error;

/// Faults raised by the decode-execute engine and the program loader.
///
/// Every variant is reported to the caller of the operation that raised it;
/// nothing is swallowed and nothing is retried. Whether a fault halts the
/// whole machine is the host's call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The fetched word does not decode to any documented instruction.
    #[error("unknown opcode {word:#06X}")]
    UnknownOpcode { word: u16 },

    /// A `2nnn` call was executed with all 16 stack frames in use.
    #[error("call stack overflow at {pc:#05X}")]
    StackOverflow { pc: u16 },

    /// A `00EE` return was executed with no frame on the stack.
    #[error("return with an empty call stack at {pc:#05X}")]
    StackUnderflow { pc: u16 },

    /// The program image does not fit between 0x200 and the end of memory.
    /// Memory is left untouched when this is returned.
    #[error("program image of {size} bytes exceeds the {capacity} loadable bytes")]
    ImageTooLarge { size: usize, capacity: usize },
}
