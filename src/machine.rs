use log::trace;

use crate::architecture::Architecture;
use crate::constants::SPRITE_SHEET;
use crate::error::{Error, Result};
use crate::opcode::{self, Opcode};
use crate::snapshot::Snapshot;
use crate::stack::ProgramStack;

/// The virtual machine context.
///
/// ## CPU
/// - (v) 16 8-bit registers V0..VF; VF doubles as the carry flag.
///   Arithmetic wraps modulo 256 and never traps.
/// - (i) a 16-bit memory address register
/// - (pc) a 16-bit program counter; in bounds at every instruction boundary
///
/// ## Timers
/// - 2 8-bit countdown timers (delay & sound), clamped at zero. They are
///   ticked by the scheduler at a fixed rate, never by `step`.
///
/// ## Memory
/// - a byte array sized by the architecture, with the sprite sheet baked
///   into the reserved low region and programs loaded at the load offset
/// - a bounded call stack of return addresses
///
/// ## Input
/// - pressed state for the 16-key pad
///
/// All mutating operations (`step`, `reset`, `load`, `restore`) take `&mut
/// self` and run to completion; the borrow checker enforces the
/// single-writer discipline the core requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub v: [u8; 16],
    pub i: u16,
    pub pc: u16,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub memory: Box<[u8]>,
    pub keyboard: [bool; 16],
    pub stack: ProgramStack,
}

impl Machine {
    /// Creates a zeroed machine for an architecture, with the sprite sheet
    /// in place and the program counter at the load offset.
    pub fn new(arch: &Architecture) -> Self {
        let mut machine = Machine {
            v: [0; 16],
            i: 0,
            pc: arch.program_offset,
            delay_timer: 0,
            sound_timer: 0,
            memory: vec![0; arch.memory_size].into_boxed_slice(),
            keyboard: [false; 16],
            stack: ProgramStack::new(arch.stack_depth),
        };
        machine.memory[..SPRITE_SHEET.len()].copy_from_slice(&SPRITE_SHEET);
        machine
    }

    /// Executes one fetch/decode/execute cycle.
    ///
    /// The program counter is advanced past the instruction before the
    /// behavior runs, so `call` pushes the address of the next instruction
    /// and control-flow instructions overwrite `pc` directly. A failed
    /// decode leaves the machine untouched; a failed execute fails on the
    /// instruction's first (and only) fallible operation, before any other
    /// field of the instruction's update is written.
    pub fn step(&mut self, arch: &Architecture) -> Result<()> {
        let op = self.fetch();
        let ir = arch.isa.decode(op)?;
        trace!(
            "{:04X} {} v{:02X?} i{:04X} pc{:04X}",
            op,
            arch.isa.get(ir).name,
            self.v,
            self.i,
            self.pc
        );
        self.pc = self.wrap_addr(self.pc.wrapping_add(2));
        arch.isa.execute(ir, self)
    }

    /// Returns every field to its zero/default state without reallocating.
    /// The sprite sheet is re-baked; any loaded program is erased.
    pub fn reset(&mut self, arch: &Architecture) {
        self.v = [0; 16];
        self.i = 0;
        self.pc = arch.program_offset;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keyboard = [false; 16];
        self.stack.clear();
        for byte in self.memory.iter_mut() {
            *byte = 0;
        }
        self.memory[..SPRITE_SHEET.len()].copy_from_slice(&SPRITE_SHEET);
    }

    /// Writes a program at the architecture's load offset.
    ///
    /// Fails without touching memory when the program exceeds the loadable
    /// region.
    pub fn load(&mut self, arch: &Architecture, program: &[u8]) -> Result<()> {
        let offset = arch.program_offset as usize;
        let max = self.memory.len() - offset;
        if program.len() > max {
            return Err(Error::RomTooLarge {
                size: program.len(),
                max,
            });
        }
        self.memory[offset..offset + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Sets the pressed state of one of the sixteen keys.
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        self.keyboard[(key & 0xF) as usize] = pressed;
    }

    /// One fixed-rate timer tick. Driven by the scheduler at the
    /// architecture's timer speed, independent of the CPU clock; the
    /// timers clamp at zero.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Deep-copies the full machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            v: self.v.to_vec(),
            i: self.i,
            pc: self.pc,
            delay_timer: self.delay_timer,
            sound_timer: self.sound_timer,
            memory: self.memory.to_vec(),
            keyboard: self.keyboard.to_vec(),
            stack: self.stack.snapshot(),
        }
    }

    /// Replaces the full machine state from a snapshot.
    ///
    /// Every structural check happens before the first write, so a rejected
    /// snapshot leaves the machine exactly as it was.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.v.len() != self.v.len() {
            return Err(Error::InvalidSnapshot(format!(
                "expected {} registers, got {}",
                self.v.len(),
                snapshot.v.len()
            )));
        }
        if snapshot.memory.len() != self.memory.len() {
            return Err(Error::InvalidSnapshot(format!(
                "expected {} bytes of memory, got {}",
                self.memory.len(),
                snapshot.memory.len()
            )));
        }
        if snapshot.keyboard.len() != self.keyboard.len() {
            return Err(Error::InvalidSnapshot(format!(
                "expected {} keys, got {}",
                self.keyboard.len(),
                snapshot.keyboard.len()
            )));
        }
        // validates capacity and fill before mutating the stack
        self.stack.restore(&snapshot.stack)?;

        self.v.copy_from_slice(&snapshot.v);
        self.i = snapshot.i;
        self.pc = snapshot.pc;
        self.delay_timer = snapshot.delay_timer;
        self.sound_timer = snapshot.sound_timer;
        self.memory.copy_from_slice(&snapshot.memory);
        for (key, pressed) in self.keyboard.iter_mut().zip(&snapshot.keyboard) {
            *key = *pressed;
        }
        Ok(())
    }

    /// Gets the opcode currently pointed at by the pc. Memory is stored as
    /// bytes, but opcodes are 16 bits, so two subsequent bytes are combined.
    fn fetch(&self) -> Opcode {
        let pc = self.pc as usize & (self.memory.len() - 1);
        let next = (pc + 1) & (self.memory.len() - 1);
        opcode::from_bytes(self.memory[pc], self.memory[next])
    }

    /// Wraps an address at the memory boundary. Memory sizes are powers of
    /// two, so this is a mask.
    pub(crate) fn wrap_addr(&self, address: u16) -> u16 {
        address & (self.memory.len() as u16 - 1)
    }

    /// Maps an address to a memory index, wrapping at the boundary.
    pub(crate) fn mem_index(&self, address: u16) -> usize {
        address as usize & (self.memory.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROGRAM_OFFSET;

    fn fixture() -> (Architecture, Machine) {
        let arch = Architecture::chip8();
        let machine = Machine::new(&arch);
        (arch, machine)
    }

    #[test]
    fn test_fetch_combines_bytes() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0xAA, 0xBB]).unwrap();
        assert_eq!(machine.fetch(), 0xAABB);
    }

    #[test]
    fn test_memory_zeroed_past_sprite_sheet() {
        let (_, machine) = fixture();
        assert!(machine.memory[SPRITE_SHEET.len()..].iter().all(|&b| b == 0));
        assert_eq!(&machine.memory[..80], &SPRITE_SHEET[..]);
    }

    #[test]
    fn test_load_places_program_at_offset() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0x12, 0x34]).unwrap();
        let offset = PROGRAM_OFFSET as usize;
        assert_eq!(&machine.memory[offset..offset + 2], &[0x12, 0x34]);
    }

    #[test]
    fn test_load_rejects_oversized_program() {
        let (arch, mut machine) = fixture();
        let max = arch.memory_size - PROGRAM_OFFSET as usize;
        let program = vec![0u8; max + 1];
        assert_eq!(
            machine.load(&arch, &program),
            Err(Error::RomTooLarge {
                size: max + 1,
                max
            })
        );
        // nothing written
        assert!(machine.memory[PROGRAM_OFFSET as usize..]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_load_at_exact_capacity() {
        let (arch, mut machine) = fixture();
        let max = arch.memory_size - PROGRAM_OFFSET as usize;
        let program = vec![0xEE; max];
        assert_eq!(machine.load(&arch, &program), Ok(()));
        assert_eq!(machine.memory[arch.memory_size - 1], 0xEE);
    }

    #[test]
    fn test_step_advances_pc_by_instruction_width() {
        let (arch, mut machine) = fixture();
        // 6xkk only writes a register
        machine.load(&arch, &[0x60, 0x42]).unwrap();
        machine.step(&arch).unwrap();
        assert_eq!(machine.pc, PROGRAM_OFFSET + 2);
        assert_eq!(machine.v[0x0], 0x42);
    }

    #[test]
    fn test_step_unknown_instruction_leaves_state_unchanged() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0xFF, 0xFF]).unwrap();
        let before = machine.clone();
        assert_eq!(
            machine.step(&arch),
            Err(Error::UnknownInstruction { opcode: 0xFFFF })
        );
        assert_eq!(machine, before);
    }

    #[test]
    fn test_jump_scenario() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0x13, 0x00]).unwrap();
        let registers = machine.v;
        machine.step(&arch).unwrap();
        assert_eq!(machine.pc, 0x300);
        assert_eq!(machine.v, registers);
    }

    #[test]
    fn test_call_then_return_scenario() {
        let (arch, mut machine) = fixture();
        // 0x200: call 0x300; 0x300: ret
        machine.load(&arch, &[0x23, 0x00]).unwrap();
        machine.memory[0x300] = 0x00;
        machine.memory[0x301] = 0xEE;

        machine.step(&arch).unwrap();
        assert_eq!(machine.pc, 0x300);
        assert_eq!(machine.stack.inspect(), vec![0x202]);

        machine.step(&arch).unwrap();
        assert_eq!(machine.pc, 0x202);
        assert!(machine.stack.is_empty());
    }

    #[test]
    fn test_call_overflow_is_atomic() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0x23, 0x00]).unwrap();
        for _ in 0..arch.stack_depth {
            machine.stack.push(0xAAA).unwrap();
        }
        let stack_before = machine.stack.inspect();
        let registers = machine.v;
        assert_eq!(machine.step(&arch), Err(Error::StackOverflow));
        // no half-applied call: the stack and registers are untouched and
        // the pc did not take the branch
        assert_eq!(machine.stack.inspect(), stack_before);
        assert_eq!(machine.v, registers);
        assert_ne!(machine.pc, 0x300);
    }

    #[test]
    fn test_return_underflow_is_atomic() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0x00, 0xEE]).unwrap();
        assert_eq!(machine.step(&arch), Err(Error::StackUnderflow));
        assert!(machine.stack.is_empty());
    }

    #[test]
    fn test_reset_restores_defaults_in_place() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0x23, 0x00]).unwrap();
        machine.step(&arch).unwrap();
        machine.v[3] = 9;
        machine.delay_timer = 10;
        machine.set_key(0xE, true);

        machine.reset(&arch);
        assert_eq!(machine.v, [0; 16]);
        assert_eq!(machine.pc, PROGRAM_OFFSET);
        assert_eq!(machine.delay_timer, 0);
        assert_eq!(machine.keyboard, [false; 16]);
        assert!(machine.stack.is_empty());
        // program erased, sprite sheet re-baked
        assert_eq!(machine.memory[PROGRAM_OFFSET as usize], 0);
        assert_eq!(&machine.memory[..80], &SPRITE_SHEET[..]);
    }

    #[test]
    fn test_timers_clamp_at_zero() {
        let (_, mut machine) = fixture();
        machine.delay_timer = 2;
        machine.sound_timer = 1;
        for _ in 0..5 {
            machine.tick_timers();
        }
        assert_eq!(machine.delay_timer, 0);
        assert_eq!(machine.sound_timer, 0);
    }

    #[test]
    fn test_snapshot_round_trip_is_exact() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0x23, 0x00]).unwrap();
        machine.step(&arch).unwrap();
        machine.v[7] = 0x77;
        machine.i = 0x345;
        machine.delay_timer = 30;
        machine.sound_timer = 2;
        machine.set_key(0xA, true);
        let snapshot = machine.snapshot();

        let mut other = Machine::new(&arch);
        other.restore(&snapshot).unwrap();
        assert_eq!(other, machine);
    }

    #[test]
    fn test_snapshot_does_not_alias_live_state() {
        let (arch, mut machine) = fixture();
        machine.load(&arch, &[0x60, 0x42]).unwrap();
        let mut snapshot = machine.snapshot();

        snapshot.memory[0x200] = 0xFF;
        snapshot.v[0] = 0xFF;
        assert_eq!(machine.memory[0x200], 0x60);
        assert_eq!(machine.v[0], 0);

        machine.step(&arch).unwrap();
        assert_eq!(snapshot.pc, 0x200);
    }

    #[test]
    fn test_restore_rejects_wrong_memory_length() {
        let (arch, mut machine) = fixture();
        let mut snapshot = machine.snapshot();
        snapshot.memory.truncate(16);
        snapshot.v[0] = 0xFF;
        assert!(matches!(
            machine.restore(&snapshot),
            Err(Error::InvalidSnapshot(_))
        ));
        // nothing applied
        assert_eq!(machine.v[0], 0);
        assert_eq!(machine, Machine::new(&arch));
    }

    #[test]
    fn test_restore_rejects_wrong_register_count() {
        let (_, mut machine) = fixture();
        let mut snapshot = machine.snapshot();
        snapshot.v.push(0);
        assert!(matches!(
            machine.restore(&snapshot),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_restore_rejects_wrong_keyboard_length() {
        let (_, mut machine) = fixture();
        let mut snapshot = machine.snapshot();
        snapshot.keyboard.pop();
        assert!(matches!(
            machine.restore(&snapshot),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_restore_rejects_foreign_stack_capacity() {
        let (arch, mut machine) = fixture();
        let mut snapshot = machine.snapshot();
        snapshot.stack.max = arch.stack_depth * 2;
        snapshot.pc = 0x999;
        assert!(matches!(
            machine.restore(&snapshot),
            Err(Error::InvalidSnapshot(_))
        ));
        assert_eq!(machine.pc, PROGRAM_OFFSET);
    }

    #[test]
    fn test_pc_wraps_at_memory_boundary() {
        let (arch, mut machine) = fixture();
        machine.pc = (arch.memory_size - 2) as u16;
        machine.memory[arch.memory_size - 2] = 0x60; // 6xkk
        machine.memory[arch.memory_size - 1] = 0x01;
        machine.step(&arch).unwrap();
        assert_eq!(machine.pc, 0x000);
    }
}
