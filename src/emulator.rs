use std::collections::VecDeque;

use log::{debug, error, warn};

use crate::architecture::Architecture;
use crate::constants::{TICK_INTERVAL_MS, TURBO_MULTIPLIER};
use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::snapshot::Snapshot;

/// Scheduler lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No program loaded.
    Stopped,
    /// Program loaded but not advancing.
    Paused,
    /// Ticks advance the machine.
    Running,
    /// A step failed; terminal until `reset`.
    Errored,
}

/// Notifications for the host UI, drained with [`Emulator::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Load,
    Reset,
    Step,
    Pause,
    Resume,
    Error(Error),
    KeyDown(u8),
    KeyUp(u8),
}

/// The emulator: a machine plus the pacing scheduler that drives it.
///
/// The emulator never owns a timer. The host calls [`tick`](Self::tick)
/// from its own timing source with the elapsed wall-clock milliseconds
/// since the previous call, and the scheduler converts that into a
/// deterministic number of `step`s:
///
/// - normal mode: `cycles = frequency * ms / 1000` plus a fractional
///   carry persisted across ticks, so truncation never drifts the
///   long-run rate;
/// - turbo mode: a fixed multiple of the ideal per-tick cycle count,
///   ignoring elapsed time entirely;
/// - backlog: when a tick arrives so late that the cycle count exceeds
///   twice the ideal, it is clamped to the ideal and the excess cycles
///   are dropped. Catch-up is deliberately lossy; responsiveness wins
///   over exact cycle accounting.
///
/// The delay and sound timers are decremented from a separate
/// elapsed-time accumulator at the architecture's fixed timer rate, so
/// neither the frequency setting nor turbo changes how fast they run.
pub struct Emulator {
    arch: Architecture,
    machine: Machine,
    program: Option<Vec<u8>>,
    state: RunState,
    frequency: f64,
    turbo: bool,
    carry: f64,
    timer_budget: f64,
    last_error: Option<Error>,
    events: VecDeque<Event>,
}

impl Emulator {
    pub fn new(arch: Architecture) -> Self {
        let machine = Machine::new(&arch);
        let frequency = arch.clock_speed;
        Emulator {
            arch,
            machine,
            program: None,
            state: RunState::Stopped,
            frequency,
            turbo: false,
            carry: 0.0,
            timer_budget: 0.0,
            last_error: None,
            events: VecDeque::new(),
        }
    }

    /// Loads a program and resets the machine around it. The emulator is
    /// left paused; `resume` starts execution.
    pub fn load(&mut self, program: &[u8]) -> Result<()> {
        // sized against memory before anything is committed
        self.machine.load(&self.arch, program)?;
        self.program = Some(program.to_vec());
        self.reset();
        debug!("loaded {} byte program", program.len());
        self.events.push_back(Event::Load);
        Ok(())
    }

    /// Clears any recorded failure and returns the machine to its
    /// post-load state. Paused if a program is loaded, stopped otherwise.
    pub fn reset(&mut self) {
        self.last_error = None;
        self.carry = 0.0;
        self.timer_budget = 0.0;
        self.machine.reset(&self.arch);
        if let Some(program) = &self.program {
            // cannot fail: the program fit when it was first loaded
            let offset = self.arch.program_offset as usize;
            self.machine.memory[offset..offset + program.len()].copy_from_slice(program);
        }
        self.state = if self.program.is_some() {
            RunState::Paused
        } else {
            RunState::Stopped
        };
        debug!("reset");
        self.events.push_back(Event::Reset);
    }

    /// Pauses the emulator; only future ticks are affected. Idempotent.
    pub fn pause(&mut self) {
        if self.state != RunState::Running {
            return;
        }
        self.state = RunState::Paused;
        self.events.push_back(Event::Pause);
    }

    /// Resumes a paused emulator. A no-op when no program is loaded or a
    /// failure is still recorded.
    pub fn resume(&mut self) {
        if self.state != RunState::Paused {
            return;
        }
        self.state = RunState::Running;
        self.events.push_back(Event::Resume);
    }

    /// Advances the emulator by one host tick of `elapsed_ms` wall-clock
    /// milliseconds. Does nothing unless running.
    pub fn tick(&mut self, elapsed_ms: f64) {
        if self.state != RunState::Running {
            return;
        }

        // Timers run off elapsed time at a fixed rate, decoupled from the
        // cycle budget below.
        self.timer_budget += elapsed_ms;
        let period = 1000.0 / self.arch.timer_speed;
        while self.timer_budget >= period {
            self.machine.tick_timers();
            self.timer_budget -= period;
        }

        let ideal = self.frequency * TICK_INTERVAL_MS / 1000.0;
        let cycles = if self.turbo {
            (TURBO_MULTIPLIER * ideal) as u64
        } else {
            let target = self.frequency * elapsed_ms / 1000.0 + self.carry;
            self.carry = target.fract();
            let mut cycles = target as u64;
            if cycles as f64 > ideal * 2.0 {
                // lossy by design: the dropped cycles are never re-run
                warn!(
                    "behind by {} cycles, clamping to {}",
                    cycles as f64 - ideal,
                    ideal
                );
                cycles = ideal as u64;
            }
            cycles
        };

        for _ in 0..cycles {
            if let Err(err) = self.machine.step(&self.arch) {
                self.fail(err);
                return;
            }
        }
    }

    /// Executes a single instruction regardless of pacing, for paused
    /// single-stepping. Does nothing when stopped or errored.
    pub fn step_once(&mut self) {
        if self.state != RunState::Paused && self.state != RunState::Running {
            return;
        }
        match self.machine.step(&self.arch) {
            Ok(()) => self.events.push_back(Event::Step),
            Err(err) => self.fail(err),
        }
    }

    /// Notifies the emulator of a key press. Idempotent per key.
    pub fn key_down(&mut self, key: u8) {
        let key = key & 0xF;
        if self.machine.keyboard[key as usize] {
            return;
        }
        self.machine.set_key(key, true);
        self.events.push_back(Event::KeyDown(key));
    }

    /// Notifies the emulator of a key release. Idempotent per key.
    pub fn key_up(&mut self, key: u8) {
        let key = key & 0xF;
        if !self.machine.keyboard[key as usize] {
            return;
        }
        self.machine.set_key(key, false);
        self.events.push_back(Event::KeyUp(key));
    }

    /// Deep-copies the machine state.
    pub fn snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    /// Replaces the machine state from a snapshot. A malformed snapshot
    /// is rejected without touching anything; on success the emulator is
    /// paused at the restored state.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.machine.restore(snapshot)?;
        self.last_error = None;
        self.carry = 0.0;
        self.timer_budget = 0.0;
        self.state = RunState::Paused;
        debug!("restored snapshot at pc {:#05X}", snapshot.pc);
        self.events.push_back(Event::Load);
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The failure that moved the emulator to `Errored`, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Retunes the CPU clock. Timer rate is unaffected.
    pub fn set_frequency(&mut self, hz: f64) {
        self.frequency = hz;
    }

    pub fn is_turbo(&self) -> bool {
        self.turbo
    }

    pub fn set_turbo(&mut self, enabled: bool) {
        self.turbo = enabled;
    }

    /// Read access to the machine for renderers and debug views.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn architecture(&self) -> &Architecture {
        &self.arch
    }

    /// Returns and clears all pending notifications, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn fail(&mut self, err: Error) {
        error!("halted: {}", err);
        self.state = RunState::Errored;
        self.events.push_back(Event::Error(err.clone()));
        self.last_error = Some(err);
    }
}
