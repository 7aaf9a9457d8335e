use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures the core can raise.
///
/// Program-level failures (`StackOverflow`, `StackUnderflow`,
/// `UnknownInstruction`) halt execution until the machine is reset; the
/// remaining kinds reject bad host input without mutating any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("call stack overflow: the stack is at capacity")]
    StackOverflow,

    #[error("call stack underflow: the stack is empty")]
    StackUnderflow,

    #[error("unknown instruction: {opcode:#06X}")]
    UnknownInstruction { opcode: u16 },

    #[error("program is too large ({size} bytes), max size is {max} bytes")]
    RomTooLarge { size: usize, max: usize },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
