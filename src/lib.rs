//! A cycle-stepped CHIP-8 virtual machine core.
//!
//! The crate is display-less by design: it models registers, memory, the
//! call stack, timers, and the keypad, and leaves rendering, input mapping,
//! and persistence to the host. The host drives execution by calling
//! [`Emulator::tick`] from its own timing source with elapsed wall-clock
//! time; the scheduler converts that into a deterministic number of machine
//! steps.

pub use architecture::Architecture;
pub use emulator::{Emulator, Event, RunState};
pub use error::{Error, Result};
pub use isa::{ExecuteFn, Instruction, Ir, Isa};
pub use machine::Machine;
pub use snapshot::Snapshot;
pub use stack::{ProgramStack, StackSnapshot};

mod architecture;
pub mod constants;
mod emulator;
mod error;
mod isa;
mod machine;
pub mod opcode;
mod operations;
mod snapshot;
mod stack;
