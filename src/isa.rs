use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::opcode::{OpMask, Opcode};

/// The behavior half of an instruction descriptor.
///
/// Receives the machine and the instruction's two decoded operands. The
/// program counter has already been advanced past the instruction when the
/// behavior runs, so control-flow instructions overwrite it directly.
pub type ExecuteFn = fn(&mut Machine, u16, u16) -> Result<()>;

/// An immutable instruction descriptor: the opcode pattern it claims, the
/// mask splitting fixed bits from operand bits, and its execute behavior.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub name: &'static str,
    pub pattern: Opcode,
    pub mask: OpMask,
    pub execute: ExecuteFn,
}

impl Instruction {
    pub const fn new(name: &'static str, pattern: Opcode, mask: OpMask, execute: ExecuteFn) -> Self {
        Instruction {
            name,
            pattern,
            mask,
            execute,
        }
    }

    /// Checks whether an opcode is for this instruction.
    pub fn matches(&self, opcode: Opcode) -> bool {
        opcode & self.mask.mask == self.pattern
    }
}

/// A decoded instruction: the registry index of its descriptor plus the
/// extracted operands. Caching one of these skips re-deriving the operands
/// on repeat execution; it is an optimization, never required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ir {
    pub index: usize,
    pub p1: u16,
    pub p2: u16,
}

/// The instruction registry for one architecture.
///
/// Holds an ordered set of descriptors and guarantees, from construction
/// onward, that no opcode can resolve to more than one of them.
#[derive(Debug)]
pub struct Isa {
    ops: Vec<Instruction>,
}

impl Isa {
    /// Builds a registry from a set of descriptors.
    ///
    /// Panics if a pattern has bits outside its own mask, or if any two
    /// descriptors could both match the same opcode. Both are construction
    /// bugs in an architecture definition, not runtime conditions.
    pub fn new(ops: Vec<Instruction>) -> Self {
        for op in &ops {
            assert!(
                op.pattern & !op.mask.mask == 0,
                "instruction {} has pattern bits outside its mask",
                op.name
            );
        }
        for (index, a) in ops.iter().enumerate() {
            for b in &ops[index + 1..] {
                // Some opcode matches both iff the patterns agree on every
                // bit fixed by both masks.
                assert!(
                    (a.pattern ^ b.pattern) & a.mask.mask & b.mask.mask != 0,
                    "instructions {} and {} overlap",
                    a.name,
                    b.name
                );
            }
        }
        Isa { ops }
    }

    /// Resolves an opcode to its instruction and operands.
    pub fn decode(&self, opcode: Opcode) -> Result<Ir> {
        self.ops
            .iter()
            .position(|op| op.matches(opcode))
            .map(|index| Ir {
                index,
                p1: self.ops[index].mask.p1.decode(opcode),
                p2: self.ops[index].mask.p2.decode(opcode),
            })
            .ok_or(Error::UnknownInstruction { opcode })
    }

    /// Maps a decoded instruction back to its descriptor.
    pub fn get(&self, ir: Ir) -> &Instruction {
        &self.ops[ir.index]
    }

    /// Executes a decoded instruction against the machine.
    pub fn execute(&self, ir: Ir, machine: &mut Machine) -> Result<()> {
        (self.ops[ir.index].execute)(machine, ir.p1, ir.p2)
    }

    /// All registered descriptors, in registration order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.ops
    }
}
