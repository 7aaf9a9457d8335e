use serde::{Deserialize, Serialize};

use crate::stack::StackSnapshot;

/// A complete, independent copy of machine state.
///
/// Every field is deep-copied from the live machine; mutating a snapshot
/// never affects the machine it came from and vice versa. The value is
/// self-describing (lengths are carried, not implied), so a restore can
/// reject a structurally malformed or foreign snapshot up front. Hosts that
/// want to persist one can serialize it however they like; the core never
/// writes to disk itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The sixteen general-purpose registers.
    pub v: Vec<u8>,
    /// The index register.
    pub i: u16,
    /// The program counter.
    pub pc: u16,
    pub delay_timer: u8,
    pub sound_timer: u8,
    /// The full memory image, including the reserved region and program.
    pub memory: Vec<u8>,
    /// Pressed state of the sixteen keys.
    pub keyboard: Vec<bool>,
    pub stack: StackSnapshot,
}
