use crate::constants::{
    CLOCK_SPEED, MEMORY_SIZE, PROGRAM_OFFSET, STACK_DEPTH, TIMER_SPEED,
};
use crate::isa::{Instruction, Isa};
use crate::opcode::{KK, NNN, NONE, OpMask, X, Y};
use crate::operations;

/// One target machine: its instruction set, memory layout, and clock
/// constants.
///
/// A binding is built once per emulator session and never mutated;
/// building a different binding is building a different machine. Every
/// collaborator that needs it receives it by reference.
#[derive(Debug)]
pub struct Architecture {
    pub isa: Isa,
    /// Addressable memory in bytes. Must be a power of two.
    pub memory_size: usize,
    /// Where programs are loaded and where execution starts.
    pub program_offset: u16,
    /// Call stack capacity.
    pub stack_depth: usize,
    /// Default CPU frequency in instructions per second.
    pub clock_speed: f64,
    /// Timer countdown frequency in Hz.
    pub timer_speed: f64,
}

impl Architecture {
    /// The CHIP-8 target.
    pub fn chip8() -> Self {
        assert!(MEMORY_SIZE.is_power_of_two());
        Architecture {
            isa: chip8_isa(),
            memory_size: MEMORY_SIZE,
            program_offset: PROGRAM_OFFSET,
            stack_depth: STACK_DEPTH,
            clock_speed: CLOCK_SPEED,
            timer_speed: TIMER_SPEED,
        }
    }
}

/// The CHIP-8 instruction registry.
///
/// Covers every instruction that operates on the state this machine
/// models; the two frame-buffer instructions (00E0, Dxyn) belong to the
/// excluded display layer and decode as unknown.
fn chip8_isa() -> Isa {
    Isa::new(vec![
        Instruction::new("rts", 0x00EE, OpMask::new(0xFFFF, NONE, NONE), operations::rts),
        Instruction::new("jump", 0x1000, OpMask::new(0xF000, NNN, NONE), operations::jump),
        Instruction::new("call", 0x2000, OpMask::new(0xF000, NNN, NONE), operations::call),
        Instruction::new("ske", 0x3000, OpMask::new(0xF000, X, KK), operations::ske),
        Instruction::new("skne", 0x4000, OpMask::new(0xF000, X, KK), operations::skne),
        Instruction::new("skre", 0x5000, OpMask::new(0xF00F, X, Y), operations::skre),
        Instruction::new("load", 0x6000, OpMask::new(0xF000, X, KK), operations::load),
        Instruction::new("add", 0x7000, OpMask::new(0xF000, X, KK), operations::add),
        Instruction::new("mv", 0x8000, OpMask::new(0xF00F, X, Y), operations::mv),
        Instruction::new("or", 0x8001, OpMask::new(0xF00F, X, Y), operations::or),
        Instruction::new("and", 0x8002, OpMask::new(0xF00F, X, Y), operations::and),
        Instruction::new("xor", 0x8003, OpMask::new(0xF00F, X, Y), operations::xor),
        Instruction::new("addr", 0x8004, OpMask::new(0xF00F, X, Y), operations::addr),
        Instruction::new("sub", 0x8005, OpMask::new(0xF00F, X, Y), operations::sub),
        Instruction::new("shr", 0x8006, OpMask::new(0xF00F, X, Y), operations::shr),
        Instruction::new("subn", 0x8007, OpMask::new(0xF00F, X, Y), operations::subn),
        Instruction::new("shl", 0x800E, OpMask::new(0xF00F, X, Y), operations::shl),
        Instruction::new("skrne", 0x9000, OpMask::new(0xF00F, X, Y), operations::skrne),
        Instruction::new("loadi", 0xA000, OpMask::new(0xF000, NNN, NONE), operations::loadi),
        Instruction::new("jumpi", 0xB000, OpMask::new(0xF000, NNN, NONE), operations::jumpi),
        Instruction::new("rand", 0xC000, OpMask::new(0xF000, X, KK), operations::rand),
        Instruction::new("skpr", 0xE09E, OpMask::new(0xF0FF, X, NONE), operations::skpr),
        Instruction::new("skup", 0xE0A1, OpMask::new(0xF0FF, X, NONE), operations::skup),
        Instruction::new("moved", 0xF007, OpMask::new(0xF0FF, X, NONE), operations::moved),
        Instruction::new("keyd", 0xF00A, OpMask::new(0xF0FF, X, NONE), operations::keyd),
        Instruction::new("loads", 0xF015, OpMask::new(0xF0FF, X, NONE), operations::loads),
        Instruction::new("ld", 0xF018, OpMask::new(0xF0FF, X, NONE), operations::ld),
        Instruction::new("addi", 0xF01E, OpMask::new(0xF0FF, X, NONE), operations::addi),
        Instruction::new("ldspr", 0xF029, OpMask::new(0xF0FF, X, NONE), operations::ldspr),
        Instruction::new("bcd", 0xF033, OpMask::new(0xF0FF, X, NONE), operations::bcd),
        Instruction::new("stor", 0xF055, OpMask::new(0xF0FF, X, NONE), operations::stor),
        Instruction::new("read", 0xF065, OpMask::new(0xF0FF, X, NONE), operations::read),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_registry_validates_at_construction() {
        // a malformed table would have panicked here
        let arch = Architecture::chip8();
        assert_eq!(arch.isa.instructions().len(), 32);
    }

    #[test]
    fn test_every_opcode_resolves_to_at_most_one_instruction() {
        let arch = Architecture::chip8();
        for op in 0..=0xFFFFu16 {
            let matches = arch
                .isa
                .instructions()
                .iter()
                .filter(|instruction| instruction.matches(op))
                .count();
            assert!(matches <= 1, "{:#06X} matched {} instructions", op, matches);
            match arch.isa.decode(op) {
                Ok(_) => assert_eq!(matches, 1),
                Err(Error::UnknownInstruction { opcode }) => {
                    assert_eq!(matches, 0);
                    assert_eq!(opcode, op);
                }
                Err(other) => panic!("unexpected decode failure: {}", other),
            }
        }
    }

    #[test]
    fn test_decode_resolves_known_instructions() {
        let arch = Architecture::chip8();
        for &(op, name) in &[
            (0x00EE, "rts"),
            (0x1ABC, "jump"),
            (0x2ABC, "call"),
            (0x8127, "subn"),
            (0xE19E, "skpr"),
            (0xF465, "read"),
        ] {
            let ir = arch.isa.decode(op).unwrap();
            assert_eq!(arch.isa.get(ir).name, name);
        }
    }

    #[test]
    fn test_display_instructions_are_not_registered() {
        let arch = Architecture::chip8();
        assert!(arch.isa.decode(0x00E0).is_err());
        assert!(arch.isa.decode(0xD125).is_err());
    }
}
